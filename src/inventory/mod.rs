//! Process & socket inventory.
//!
//! Wraps OS enumeration into filtered, sorted, serializable views. The
//! [`Inventory`] trait is the seam detectors consume so they can be exercised
//! against a fixed process table.

mod connections;
mod process;

pub use connections::{list_inet_connections, sort_and_filter};
pub use process::{process_snapshot, CPU_SAMPLE_WINDOW};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::error::Result;

/// Kernel-reported socket state, named the way netstat prints it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketStatus {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    /// Connectionless sockets (UDP) carry no state
    None,
}

impl fmt::Display for SocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketStatus::Established => "ESTABLISHED",
            SocketStatus::SynSent => "SYN_SENT",
            SocketStatus::SynRecv => "SYN_RECV",
            SocketStatus::FinWait1 => "FIN_WAIT1",
            SocketStatus::FinWait2 => "FIN_WAIT2",
            SocketStatus::TimeWait => "TIME_WAIT",
            SocketStatus::Close => "CLOSE",
            SocketStatus::CloseWait => "CLOSE_WAIT",
            SocketStatus::LastAck => "LAST_ACK",
            SocketStatus::Listen => "LISTEN",
            SocketStatus::Closing => "CLOSING",
            SocketStatus::None => "NONE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// One row of the inet socket table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub local: SocketAddr,
    /// `None` for unconnected sockets (remote `0.0.0.0:0`)
    pub remote: Option<SocketAddr>,
    pub family: AddressFamily,
    pub kind: SocketKind,
    pub status: SocketStatus,
    /// Owning process, when visible to the current user
    pub pid: Option<u32>,
    pub process_name: Option<String>,
}

impl ConnectionRecord {
    pub fn is_listening(&self) -> bool {
        self.status == SocketStatus::Listen
    }
}

/// Coarse scheduler state of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Running => "running",
            ProcessState::Sleeping => "sleeping",
            ProcessState::Idle => "idle",
            ProcessState::Stopped => "stopped",
            ProcessState::Zombie => "zombie",
            ProcessState::Dead => "dead",
            ProcessState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Lightweight process-table row used for name/state scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cmdline: Vec<String>,
    pub state: ProcessState,
}

/// Resource usage and ownership of a single process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessUsage {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub started_at: DateTime<Local>,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

/// Full point-in-time view of one process. Stale as soon as it is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
    pub user: String,
    pub cwd: String,
    pub exe: String,
    pub create_time: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub num_threads: u64,
    pub status: ProcessState,
    pub connections: Vec<ConnectionRecord>,
}

/// Source of process-table and socket-table data.
///
/// Reads are racy by nature: a pid listed by [`Inventory::processes`] may be
/// gone by the time [`Inventory::usage`] is called.
pub trait Inventory: Send + Sync {
    /// Every visible process, in enumeration order
    fn processes(&self) -> Vec<ProcessEntry>;

    /// Inet sockets without TIME_WAIT, sorted by local address
    fn inet_connections(&self) -> Result<Vec<ConnectionRecord>>;

    /// Ownership and usage for `pid`; `ProcessNotFound` if it has exited
    fn usage(&self, pid: u32) -> Result<ProcessUsage>;
}

/// [`Inventory`] backed by sysinfo (processes) and procfs (sockets)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInventory;

impl SystemInventory {
    pub fn new() -> Self {
        Self
    }
}

impl Inventory for SystemInventory {
    fn processes(&self) -> Vec<ProcessEntry> {
        process::list_processes()
    }

    fn inet_connections(&self) -> Result<Vec<ConnectionRecord>> {
        list_inet_connections()
    }

    fn usage(&self, pid: u32) -> Result<ProcessUsage> {
        process::process_usage(pid)
    }
}
