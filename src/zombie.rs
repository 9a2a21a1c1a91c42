//! Defunct-process detection.

use serde::Serialize;
use tracing::{debug, warn};

use crate::inventory::{Inventory, ProcessState};

const CREATE_TIME_FORMAT: &str = "%H:%M:%S %Y-%m-%d";

/// A process that exited but was never reaped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZombieInfo {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub create_time: String,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

/// Every zombie in the process table, in enumeration order.
///
/// Never fails: a zombie reaped between the state check and the detail read
/// is skipped quietly, any other read failure is logged and skipped.
pub fn scan(inventory: &dyn Inventory) -> Vec<ZombieInfo> {
    let mut zombies = Vec::new();

    for entry in inventory
        .processes()
        .into_iter()
        .filter(|p| p.state == ProcessState::Zombie)
    {
        match inventory.usage(entry.pid) {
            Ok(usage) => zombies.push(ZombieInfo {
                pid: usage.pid,
                name: usage.name,
                user: usage.user,
                create_time: usage.started_at.format(CREATE_TIME_FORMAT).to_string(),
                cpu_percent: usage.cpu_percent,
                memory_mb: usage.memory_mb,
            }),
            Err(e) if e.is_not_found() => {
                debug!(pid = entry.pid, "zombie reaped before inspection");
            }
            Err(e) => {
                warn!(pid = entry.pid, error = %e, "zombie detected but details unreadable");
            }
        }
    }

    zombies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fake::{entry, FakeInventory, FakeUsage};
    use crate::inventory::ProcessUsage;
    use chrono::{Local, TimeZone};

    fn usage(pid: u32, name: &str) -> FakeUsage {
        FakeUsage::Present(ProcessUsage {
            pid,
            name: name.to_string(),
            user: "dev".to_string(),
            started_at: Local.with_ymd_and_hms(2024, 5, 1, 13, 45, 7).unwrap(),
            cpu_percent: 0.0,
            memory_mb: 0.0,
        })
    }

    #[test]
    fn test_only_zombies_reported_in_table_order() {
        let mut inv = FakeInventory::default();
        inv.processes = vec![
            entry(30, "worker", &[], ProcessState::Zombie),
            entry(10, "bash", &["bash"], ProcessState::Sleeping),
            entry(20, "child", &[], ProcessState::Zombie),
        ];
        inv.usage.insert(30, usage(30, "worker"));
        inv.usage.insert(10, usage(10, "bash"));
        inv.usage.insert(20, usage(20, "child"));

        let zombies = scan(&inv);
        let pids: Vec<u32> = zombies.iter().map(|z| z.pid).collect();
        assert_eq!(pids, vec![30, 20]);
        assert_eq!(zombies[0].create_time, "13:45:07 2024-05-01");
        assert_eq!(zombies[0].user, "dev");
    }

    #[test]
    fn test_vanished_and_unreadable_zombies_skipped() {
        let mut inv = FakeInventory::default();
        inv.processes = vec![
            entry(1, "gone", &[], ProcessState::Zombie),
            entry(2, "locked", &[], ProcessState::Zombie),
            entry(3, "kept", &[], ProcessState::Zombie),
        ];
        inv.usage.insert(1, FakeUsage::Gone);
        inv.usage.insert(2, FakeUsage::Denied);
        inv.usage.insert(3, usage(3, "kept"));

        let zombies = scan(&inv);
        assert_eq!(zombies.len(), 1);
        assert_eq!(zombies[0].name, "kept");
    }

    #[test]
    fn test_no_zombies_is_empty() {
        let inv = FakeInventory::default().with_process(1, "init", &["/sbin/init"]);
        assert!(scan(&inv).is_empty());
    }

    #[test]
    fn test_live_scan_never_panics() {
        let _ = scan(&crate::inventory::SystemInventory::new());
    }
}
