//! Discovery of local HTTP-like servers from the listening socket table.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::time::Duration;

use crate::error::Result;
use crate::inventory::{Inventory, SocketKind};
use crate::probe::probe_http_once;

const UNKNOWN_PROCESS: &str = "unknown";

/// A listening TCP endpoint and what answers on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub ip: IpAddr,
    pub port: u16,
    pub pid: Option<u32>,
    pub process_name: String,
    pub process_cmdline: String,
    /// Answered a `HEAD /` like an HTTP server
    pub http_probe: bool,
    pub last_seen: DateTime<Local>,
}

/// Probe every listening TCP socket and attach its owning process.
///
/// Sockets are de-duplicated on (ip, port); a later duplicate only fills in a
/// missing pid. Sockets owned by `ignore_pids` are skipped. Sorted by
/// (ip, port).
pub async fn build_server_list(
    inventory: &dyn Inventory,
    ignore_pids: &[u32],
    probe_timeout: Duration,
) -> Result<Vec<ServerInfo>> {
    let mut listeners: BTreeMap<(IpAddr, u16), Option<u32>> = BTreeMap::new();
    for conn in inventory
        .inet_connections()?
        .into_iter()
        .filter(|c| c.is_listening() && c.kind == SocketKind::Stream)
    {
        if conn.pid.is_some_and(|pid| ignore_pids.contains(&pid)) {
            continue;
        }
        let slot = listeners
            .entry((conn.local.ip(), conn.local.port()))
            .or_insert(conn.pid);
        if slot.is_none() {
            *slot = conn.pid;
        }
    }

    let commands: HashMap<u32, (String, String)> = inventory
        .processes()
        .into_iter()
        .map(|p| (p.pid, (p.name, p.cmdline.join(" "))))
        .collect();

    let mut servers = Vec::with_capacity(listeners.len());
    for ((ip, port), pid) in listeners {
        let (process_name, process_cmdline) = pid
            .and_then(|pid| commands.get(&pid).cloned())
            .unwrap_or_else(|| (UNKNOWN_PROCESS.to_string(), String::new()));
        let http_probe = probe_http_once((ip, port).into(), probe_timeout).await;

        servers.push(ServerInfo {
            ip,
            port,
            pid,
            process_name,
            process_cmdline,
            http_probe,
            last_seen: Local::now(),
        });
    }

    Ok(servers)
}
