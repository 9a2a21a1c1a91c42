//! Container uptime, measured from the start of pid 1.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::duration::format_seconds;
use crate::error::Result;
use crate::inventory::Inventory;

/// In a container pid 1 is the workload's epoch, so its start time stands in
/// for boot time.
pub const EPOCH_PID: u32 = 1;

const BOOT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeInfo {
    pub uptime_seconds: f64,
    /// e.g. "3 days, 4 hours, 12 minutes"
    pub uptime_formatted: String,
    pub boot_time: String,
    /// Unix timestamp of the epoch process start
    pub boot_timestamp: i64,
}

/// Uptime relative to the start of [`EPOCH_PID`].
pub fn get_uptime(inventory: &dyn Inventory) -> Result<UptimeInfo> {
    let started = inventory.usage(EPOCH_PID)?.started_at;
    Ok(uptime_since(started, Local::now()))
}

pub fn uptime_since(boot: DateTime<Local>, now: DateTime<Local>) -> UptimeInfo {
    let elapsed = now.signed_duration_since(boot);
    UptimeInfo {
        uptime_seconds: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
        uptime_formatted: format_seconds(elapsed.num_seconds(), false),
        boot_time: boot.format(BOOT_TIME_FORMAT).to_string(),
        boot_timestamp: boot.timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fake::{FakeInventory, FakeUsage};
    use crate::inventory::ProcessUsage;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_uptime_since() {
        let boot = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = boot + Duration::seconds(90061);
        let info = uptime_since(boot, now);
        assert_eq!(info.uptime_seconds, 90061.0);
        assert_eq!(info.uptime_formatted, "1 day, 1 hour, 1 minute");
        assert_eq!(info.boot_time, "2024-01-01 00:00:00");
        assert_eq!(info.boot_timestamp, boot.timestamp());
    }

    #[test]
    fn test_uptime_uses_pid_one() {
        let boot = Local::now() - Duration::hours(2) - Duration::seconds(30);
        let mut inv = FakeInventory::default();
        inv.usage.insert(
            EPOCH_PID,
            FakeUsage::Present(ProcessUsage {
                pid: EPOCH_PID,
                name: "init".into(),
                user: "root".into(),
                started_at: boot,
                cpu_percent: 0.0,
                memory_mb: 1.0,
            }),
        );

        let info = get_uptime(&inv).unwrap();
        assert!(info.uptime_formatted.starts_with("2 hours, 0 minutes"));
        assert!(info.uptime_seconds >= 7230.0);
    }

    #[test]
    fn test_missing_epoch_process_is_an_error() {
        assert!(get_uptime(&FakeInventory::default()).is_err());
    }
}
