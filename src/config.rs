use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{InspectError, Result};

/// Runtime settings shared by the CLI and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root scanned for git repositories and recently modified files
    pub workspace_root: PathBuf,
    /// How many recent files to report
    pub recent_limit: usize,
    /// Skip dot-prefixed files and directories in the recent-files walk
    pub exclude_hidden: bool,
    /// Timeout for each TCP probe
    pub probe_timeout_ms: u64,
    /// Timeout for each tmux/git subprocess
    pub command_timeout_secs: u64,
    /// Dashboard refresh period
    pub refresh_interval_ms: u64,
    pub tmux_binary: String,
    pub git_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("/home/devuser/workspace"),
            recent_limit: 20,
            exclude_hidden: false,
            probe_timeout_ms: 500,
            command_timeout_secs: 5,
            refresh_interval_ms: 2000,
            tmux_binary: "tmux".into(),
            git_binary: "git".into(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
        match Self::read(&path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!(error = %e, "falling back to default config");
                Config::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| InspectError::Config {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("hostwatch")
        .join("config.json")
}
