use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{PortCache, SshStatus};
use crate::inventory::{ConnectionRecord, Inventory, SocketStatus};
use crate::probe::BannerProbe;

/// Exact process name of the OpenSSH daemon. Renamed binaries are missed.
const SSHD_PROCESS_NAME: &str = "sshd";

/// Picks one port when several listeners answer with an SSH banner.
pub type TieBreak = fn(&BTreeSet<u16>) -> Option<u16>;

/// Default [`TieBreak`]: the numerically lowest port.
pub fn lowest_port(candidates: &BTreeSet<u16>) -> Option<u16> {
    candidates.iter().next().copied()
}

/// Outcome of probing every listening socket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDetection {
    /// Every port that offered an SSH banner
    pub candidates: BTreeSet<u16>,
    /// The port the tie-break settled on
    pub chosen: Option<u16>,
}

impl PortDetection {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Finds the SSH daemon, its port and its live sessions without privileges.
pub struct SshDetector<P> {
    inventory: Arc<dyn Inventory>,
    prober: P,
    cache: Arc<PortCache>,
    tie_break: TieBreak,
}

impl<P: BannerProbe> SshDetector<P> {
    pub fn new(inventory: Arc<dyn Inventory>, prober: P, cache: Arc<PortCache>) -> Self {
        Self {
            inventory,
            prober,
            cache,
            tie_break: lowest_port,
        }
    }

    /// Replace the policy used when more than one port looks like SSH.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Whether a process named exactly `sshd` exists, and its pid.
    pub fn is_daemon_running(&self) -> (bool, Option<u32>) {
        self.inventory
            .processes()
            .into_iter()
            .find(|p| p.name == SSHD_PROCESS_NAME)
            .map_or((false, None), |p| (true, Some(p.pid)))
    }

    /// Probe every LISTEN socket for an SSH banner.
    pub async fn probe_ssh_ports(&self, connections: &[ConnectionRecord]) -> PortDetection {
        debug!("probing listeners for an SSH banner");
        let mut candidates = BTreeSet::new();
        for conn in connections.iter().filter(|c| c.is_listening()) {
            if candidates.contains(&conn.local.port()) {
                continue;
            }
            if let Some(banner) = self.prober.probe(conn.local).await {
                debug!(addr = %conn.local, %banner, "SSH banner");
                candidates.insert(conn.local.port());
            }
        }

        let chosen = (self.tie_break)(&candidates);
        let detection = PortDetection { candidates, chosen };
        if detection.is_ambiguous() {
            warn!(
                candidates = ?detection.candidates,
                chosen = ?detection.chosen,
                "more than one port answers with an SSH banner"
            );
        }
        detection
    }

    /// The SSH port among `connections`, if any listener offers a banner.
    pub async fn detect_port_unprivileged(&self, connections: &[ConnectionRecord]) -> Option<u16> {
        self.probe_ssh_ports(connections).await.chosen
    }

    /// Established connections whose local port is `port`, keyed 1.. in scan
    /// order.
    pub fn count_established(
        &self,
        port: u16,
        connections: &[ConnectionRecord],
    ) -> BTreeMap<u32, ConnectionRecord> {
        count_established(port, connections)
    }

    /// Compose daemon check, (cached) port discovery and session count.
    ///
    /// Never fails: an unreadable socket table lands in `error_message`.
    pub async fn get_status(&self) -> SshStatus {
        let (is_active, pid) = self.is_daemon_running();

        let connections = match self.inventory.inet_connections() {
            Ok(conns) => conns,
            Err(e) => {
                warn!(error = %e, "cannot read socket table");
                return SshStatus {
                    is_active,
                    pid,
                    port: self.cache.get(),
                    error_message: Some(e.to_string()),
                    ..SshStatus::default()
                };
            }
        };

        let port = match self.cache.get() {
            Some(port) => Some(port),
            None => {
                let detected = self.detect_port_unprivileged(&connections).await;
                if let Some(port) = detected {
                    info!(port, "SSH port detected");
                    self.cache.store(port);
                }
                detected
            }
        };

        let active_connections = port
            .map(|p| count_established(p, &connections))
            .unwrap_or_default();

        SshStatus {
            is_active,
            pid,
            port,
            active_connections,
            error_message: None,
        }
    }
}

fn count_established(port: u16, connections: &[ConnectionRecord]) -> BTreeMap<u32, ConnectionRecord> {
    connections
        .iter()
        .filter(|c| c.local.port() == port && c.status == SocketStatus::Established)
        .cloned()
        .zip(1u32..)
        .map(|(conn, key)| (key, conn))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fake::{conn, FakeInventory};
    use crate::probe::test_support::greeting_server;
    use crate::probe::TcpBannerProbe;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed port -> banner table and counts calls.
    struct ScriptedProbe {
        banners: HashMap<u16, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProbe {
        fn new(banners: &[(u16, &'static str)]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let probe = Self {
                banners: banners.iter().copied().collect(),
                calls: calls.clone(),
            };
            (probe, calls)
        }
    }

    impl BannerProbe for ScriptedProbe {
        async fn probe(&self, addr: SocketAddr) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.banners.get(&addr.port()).map(|b| b.to_string())
        }
    }

    fn listeners(ports: &[u16]) -> Vec<ConnectionRecord> {
        ports
            .iter()
            .map(|p| conn(&format!("127.0.0.1:{}", p), None, SocketStatus::Listen))
            .collect()
    }

    fn detector<P: BannerProbe>(inventory: FakeInventory, probe: P) -> SshDetector<P> {
        SshDetector::new(Arc::new(inventory), probe, Arc::new(PortCache::new()))
    }

    #[test]
    fn test_daemon_name_is_exact() {
        let inv = FakeInventory::default()
            .with_process(10, "sshd-session", &["sshd-session"])
            .with_process(11, "SSHD", &["SSHD"])
            .with_process(12, "sshd", &["/usr/sbin/sshd", "-D"]);
        let (probe, _) = ScriptedProbe::new(&[]);
        assert_eq!(detector(inv, probe).is_daemon_running(), (true, Some(12)));

        let inv = FakeInventory::default().with_process(10, "sshd-session", &[]);
        let (probe, _) = ScriptedProbe::new(&[]);
        assert_eq!(detector(inv, probe).is_daemon_running(), (false, None));
    }

    #[tokio::test]
    async fn test_single_real_ssh_listener_detected() {
        let ssh = greeting_server(b"SSH-2.0-OpenSSH_x\r\n").await;
        let other = greeting_server(b"220 ready\r\n").await;
        let det = detector(FakeInventory::default(), TcpBannerProbe::default());

        let port = det.detect_port_unprivileged(&listeners(&[other, ssh])).await;
        assert_eq!(port, Some(ssh));
    }

    #[tokio::test]
    async fn test_no_ssh_listener() {
        let (probe, calls) = ScriptedProbe::new(&[]);
        let det = detector(FakeInventory::default(), probe);

        let mut conns = listeners(&[80, 443]);
        conns.push(conn("127.0.0.1:22", Some("127.0.0.1:50000"), SocketStatus::Established));
        assert_eq!(det.detect_port_unprivileged(&conns).await, None);
        // Only LISTEN sockets are dialled
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_two_ssh_listeners_are_ambiguous() {
        let (probe, _) = ScriptedProbe::new(&[(22, "SSH-2.0-a"), (2222, "SSH-2.0-b")]);
        let det = detector(FakeInventory::default(), probe);

        let detection = det.probe_ssh_ports(&listeners(&[8080, 2222, 22])).await;
        assert!(detection.is_ambiguous());
        assert!(detection.candidates.contains(&detection.chosen.unwrap()));
        assert_eq!(detection.chosen, Some(22));
    }

    #[tokio::test]
    async fn test_tie_break_is_overridable() {
        let (probe, _) = ScriptedProbe::new(&[(22, "SSH-2.0-a"), (2222, "SSH-2.0-b")]);
        let det = detector(FakeInventory::default(), probe)
            .with_tie_break(|c| c.iter().next_back().copied());

        assert_eq!(
            det.detect_port_unprivileged(&listeners(&[22, 2222])).await,
            Some(2222)
        );
    }

    #[test]
    fn test_count_established_keys_in_scan_order() {
        let conns = vec![
            conn("0.0.0.0:22", None, SocketStatus::Listen),
            conn("10.0.0.1:22", Some("10.0.0.7:50001"), SocketStatus::Established),
            conn("10.0.0.1:8080", Some("10.0.0.7:50002"), SocketStatus::Established),
            conn("10.0.0.1:22", Some("10.0.0.8:50003"), SocketStatus::Established),
            conn("10.0.0.1:22", Some("10.0.0.9:50004"), SocketStatus::CloseWait),
        ];
        let sessions = count_established(22, &conns);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[&1].remote.unwrap().to_string(), "10.0.0.7:50001");
        assert_eq!(sessions[&2].remote.unwrap().to_string(), "10.0.0.8:50003");
    }

    #[tokio::test]
    async fn test_status_caches_discovered_port() {
        let mut inv = FakeInventory::default().with_process(7, "sshd", &["sshd"]);
        inv.connections = listeners(&[22, 80]);
        inv.connections
            .push(conn("127.0.0.1:22", Some("127.0.0.1:40000"), SocketStatus::Established));
        let (probe, calls) = ScriptedProbe::new(&[(22, "SSH-2.0-OpenSSH_x")]);
        let cache = Arc::new(PortCache::new());
        let det = SshDetector::new(Arc::new(inv), probe, cache.clone());

        let first = det.get_status().await;
        assert!(first.is_active);
        assert_eq!(first.pid, Some(7));
        assert_eq!(first.port, Some(22));
        assert_eq!(first.active_connections.len(), 1);
        let probed = calls.load(Ordering::SeqCst);
        assert!(probed > 0);
        assert_eq!(cache.get(), Some(22));

        let second = det.get_status().await;
        assert_eq!(second.port, Some(22));
        assert_eq!(calls.load(Ordering::SeqCst), probed);
    }

    #[tokio::test]
    async fn test_status_reprobes_when_nothing_found() {
        let mut inv = FakeInventory::default();
        inv.connections = listeners(&[80]);
        let (probe, calls) = ScriptedProbe::new(&[]);
        let det = detector(inv, probe);

        let first = det.get_status().await;
        assert_eq!(first.port, None);
        assert!(first.active_connections.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        det.get_status().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_degrades_on_socket_table_error() {
        let inv = FakeInventory {
            connections_fail: true,
            ..FakeInventory::default()
        };
        let (probe, calls) = ScriptedProbe::new(&[]);
        let status = detector(inv, probe).get_status().await;
        assert!(!status.is_active);
        assert_eq!(status.port, None);
        assert!(status.error_message.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
