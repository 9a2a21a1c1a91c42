//! Host introspection core.
//!
//! Each detector gathers raw OS, process or subprocess data, classifies it and
//! returns an immutable snapshot. Detectors are independent and run on demand;
//! only the SSH and tmux detectors lean on the process & socket inventory.

pub mod command;
pub mod config;
pub mod duration;
pub mod error;
pub mod git;
pub mod inventory;
pub mod probe;
pub mod recent;
pub mod servers;
pub mod ssh;
pub mod tmux;
pub mod uptime;
pub mod zombie;

pub use config::Config;
pub use error::{InspectError, Result};
pub use inventory::{Inventory, SystemInventory};
