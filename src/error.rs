use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the inspection core.
///
/// Most detectors fold these into their snapshot instead of returning them;
/// only operations with no meaningful partial result surface them directly.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The process exited (or never existed) by the time it was inspected
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("procfs error: {0}")]
    Proc(#[from] procfs::ProcError),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl InspectError {
    /// True when the error only means the target vanished mid-scan.
    pub fn is_not_found(&self) -> bool {
        match self {
            InspectError::ProcessNotFound(_) => true,
            InspectError::Proc(procfs::ProcError::NotFound(_)) => true,
            InspectError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, InspectError>;
