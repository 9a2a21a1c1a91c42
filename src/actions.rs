use crossterm::event::KeyEvent;

use crate::collector::HostSnapshot;

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// A fresh host snapshot arrived from the poller
    SnapshotUpdated(Box<HostSnapshot>),
    /// Ask the poller to collect now
    Refresh,
}
