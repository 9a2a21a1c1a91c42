mod detector;
mod parse;

pub use detector::TmuxDetector;
pub use parse::{
    is_server_invocation, parse_client_line, parse_lines, parse_session_line, CLIENT_FORMAT,
    SESSION_FORMAT,
};

use serde::{Deserialize, Serialize};

/// A client attached to a tmux session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxClient {
    pub session_name: String,
    pub window_index: u32,
    pub pane_index: u32,
    /// Client tty, e.g. "/dev/pts/3"
    pub client_name: String,
    /// Terminal type reported by the client
    pub terminal: String,
    /// Raw `client_created` timestamp as tmux printed it
    pub created: String,
}

/// Represents a tmux session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxSession {
    /// Session name
    pub name: String,
    /// Number of windows
    pub windows: u32,
    /// Unix timestamp when session was created
    pub created_at: i64,
    /// Age of the session, e.g. "2 hours, 5 minutes"
    pub created: String,
    /// At least one client is attached
    pub attached: bool,
    pub clients: Vec<TmuxClient>,
}

/// Overall multiplexer state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxStatus {
    pub installed: bool,
    pub running: bool,
    pub server_pid: Option<u32>,
    pub sessions: Vec<TmuxSession>,
    pub total_clients: usize,
    pub error_message: Option<String>,
}
