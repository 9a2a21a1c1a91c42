use chrono::Local;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::parse::{
    is_server_invocation, parse_client_line, parse_lines, parse_session_line, CLIENT_FORMAT,
    SESSION_FORMAT,
};
use super::{TmuxClient, TmuxSession, TmuxStatus};
use crate::command::{self, DEFAULT_COMMAND_TIMEOUT};
use crate::inventory::Inventory;

/// Queries a tmux server through its CLI
pub struct TmuxDetector {
    /// Path to tmux binary
    tmux_path: String,
    timeout: Duration,
    inventory: Arc<dyn Inventory>,
    /// Installation cannot change while we run, so it is looked up once
    installed: OnceCell<bool>,
}

impl TmuxDetector {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self {
            tmux_path: "tmux".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            inventory,
            installed: OnceCell::new(),
        }
    }

    pub fn with_binary(mut self, tmux_path: impl Into<String>) -> Self {
        self.tmux_path = tmux_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the tmux binary can be found
    pub fn is_installed(&self) -> bool {
        *self
            .installed
            .get_or_init(|| which::which(&self.tmux_path).is_ok())
    }

    /// Check if tmux server is running.
    ///
    /// A live server exits 0 on `list-sessions` even with no sessions.
    pub async fn is_running(&self) -> bool {
        command::run(&self.tmux_path, &["list-sessions"], self.timeout)
            .await
            .map(|out| out.success())
            .unwrap_or(false)
    }

    /// List all tmux sessions, each with its attached clients
    pub async fn list_sessions(&self) -> Vec<TmuxSession> {
        let Some(output) = self.run_tmux(&["list-sessions", "-F", SESSION_FORMAT]).await else {
            return Vec::new();
        };

        let now = Local::now();
        let mut sessions = parse_lines(&output, |line| parse_session_line(line, now));
        for session in &mut sessions {
            session.clients = self.list_clients(Some(&session.name)).await;
        }
        sessions
    }

    /// List clients of `session`, or of every session when `None`
    pub async fn list_clients(&self, session: Option<&str>) -> Vec<TmuxClient> {
        let mut args = vec!["list-clients"];
        if let Some(name) = session {
            args.extend(["-t", name]);
        }
        args.extend(["-F", CLIENT_FORMAT]);

        match self.run_tmux(&args).await {
            Some(output) => parse_lines(&output, parse_client_line),
            None => Vec::new(),
        }
    }

    /// Pid of the tmux server process, told apart from client invocations by
    /// its command line
    pub fn get_server_pid(&self) -> Option<u32> {
        self.inventory
            .processes()
            .into_iter()
            .filter(|p| p.name.contains("tmux"))
            .find(|p| is_server_invocation(&p.cmdline))
            .map(|p| p.pid)
    }

    /// Compose installation, liveness, sessions and clients.
    pub async fn get_status(&self) -> TmuxStatus {
        if !self.is_installed() {
            return TmuxStatus::default();
        }

        let running = self.is_running().await;
        if !running {
            return TmuxStatus {
                installed: true,
                ..TmuxStatus::default()
            };
        }

        let sessions = self.list_sessions().await;
        let total_clients = self.list_clients(None).await.len();

        TmuxStatus {
            installed: true,
            running,
            server_pid: self.get_server_pid(),
            sessions,
            total_clients,
            error_message: None,
        }
    }

    /// Stdout of `tmux args..` when it exits 0 or still printed something.
    async fn run_tmux(&self, args: &[&str]) -> Option<String> {
        match command::run(&self.tmux_path, args, self.timeout).await {
            Ok(out) if out.success() || !out.stdout.trim().is_empty() => Some(out.stdout),
            Ok(out) => {
                debug!(?args, stderr = %out.stderr.trim(), "tmux returned no data");
                None
            }
            Err(e) => {
                debug!(?args, error = %e, "tmux invocation failed");
                None
            }
        }
    }
}
