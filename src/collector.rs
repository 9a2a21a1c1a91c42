use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use hostwatch::git::{GitScanner, GitStatus};
use hostwatch::inventory::ConnectionRecord;
use hostwatch::probe::TcpBannerProbe;
use hostwatch::recent::{get_recent_files, FileInfo};
use hostwatch::ssh::{PortCache, SshDetector, SshStatus};
use hostwatch::tmux::{TmuxDetector, TmuxStatus};
use hostwatch::uptime::{get_uptime, UptimeInfo};
use hostwatch::zombie::{self, ZombieInfo};
use hostwatch::{Config, Inventory, SystemInventory};

/// Everything the dashboard shows, gathered in one pass
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub ssh: SshStatus,
    pub tmux: TmuxStatus,
    pub git: Vec<GitStatus>,
    pub zombies: Vec<ZombieInfo>,
    pub uptime: Option<UptimeInfo>,
    pub recent: Vec<FileInfo>,
    pub connections: Vec<ConnectionRecord>,
    pub collected_at: DateTime<Local>,
    pub elapsed_ms: u128,
}

/// Long-lived detector set. Holding it for the whole run keeps the SSH port
/// and tmux installation lookups cached.
pub struct Detectors {
    pub config: Config,
    pub inventory: Arc<dyn Inventory>,
    pub ssh: SshDetector<TcpBannerProbe>,
    pub tmux: TmuxDetector,
    pub git: GitScanner,
}

impl Detectors {
    pub fn new(config: Config) -> Self {
        let inventory: Arc<dyn Inventory> = Arc::new(SystemInventory::new());
        let ssh = SshDetector::new(
            inventory.clone(),
            TcpBannerProbe::new(config.probe_timeout()),
            Arc::new(PortCache::new()),
        );
        let tmux = TmuxDetector::new(inventory.clone())
            .with_binary(config.tmux_binary.clone())
            .with_timeout(config.command_timeout());
        let git = GitScanner::new()
            .with_binary(config.git_binary.clone())
            .with_timeout(config.command_timeout());

        Self {
            config,
            inventory,
            ssh,
            tmux,
            git,
        }
    }

    /// Run every detector once
    pub async fn collect(&self) -> HostSnapshot {
        let started = Instant::now();

        let ssh = self.ssh.get_status().await;
        let tmux = self.tmux.get_status().await;
        let git = self.git.scan_all(&self.config.workspace_root).await;
        let zombies = zombie::scan(self.inventory.as_ref());
        let uptime = match get_uptime(self.inventory.as_ref()) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "uptime unavailable");
                None
            }
        };
        let recent = get_recent_files(
            &self.config.workspace_root,
            self.config.recent_limit,
            self.config.exclude_hidden,
        );
        let connections = self.inventory.inet_connections().unwrap_or_else(|e| {
            warn!(error = %e, "socket table unavailable");
            Vec::new()
        });

        let elapsed_ms = started.elapsed().as_millis();
        debug!(elapsed_ms, "host snapshot collected");

        HostSnapshot {
            ssh,
            tmux,
            git,
            zombies,
            uptime,
            recent,
            connections,
            collected_at: Local::now(),
            elapsed_ms,
        }
    }
}
