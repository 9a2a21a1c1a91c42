//! Time-boxed subprocess execution for control-plane tools (tmux, git).

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{InspectError, Result};

/// Default upper bound for any control-plane subprocess.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Turn a nonzero exit into [`InspectError::CommandFailed`].
    pub fn into_success(self, program: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(InspectError::CommandFailed {
                program: program.to_string(),
                status: self.status.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Run `program args..` to completion, killing it once `timeout` elapses.
///
/// Spawn failures (including a missing binary) come back as
/// [`InspectError::Io`]; a nonzero exit is *not* an error here.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            debug!(program, ?args, ?timeout, "subprocess timed out");
            return Err(InspectError::Timeout {
                what: format!("{} {}", program, args.join(" ")),
                after: timeout,
            });
        }
    };

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
