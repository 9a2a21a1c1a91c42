mod detector;

pub use detector::{lowest_port, PortDetection, SshDetector, TieBreak};

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::inventory::ConnectionRecord;

/// SSH daemon state at query time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SshStatus {
    /// An `sshd` process exists
    pub is_active: bool,
    pub pid: Option<u32>,
    /// Port that answered with an SSH banner
    pub port: Option<u16>,
    /// Established sessions on `port`, keyed 1.. in scan order
    pub active_connections: BTreeMap<u32, ConnectionRecord>,
    pub error_message: Option<String>,
}

/// Write-once home for the discovered SSH port.
///
/// Shared by `Arc` between detector instances. Only a successful detection is
/// stored; once set it never changes for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct PortCache {
    port: OnceCell<u16>,
}

impl PortCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u16> {
        self.port.get().copied()
    }

    /// Record `port` unless a value is already present. Concurrent first
    /// detections resolve to the same port, so losing the race is harmless.
    pub fn store(&self, port: u16) {
        let _ = self.port.set(port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_cache_is_write_once() {
        let cache = PortCache::new();
        assert_eq!(cache.get(), None);
        cache.store(2222);
        cache.store(22);
        assert_eq!(cache.get(), Some(2222));
    }
}
