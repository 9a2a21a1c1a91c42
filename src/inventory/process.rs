use chrono::{DateTime, Local};
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, Users};
use tracing::debug;

use super::{list_inet_connections, ProcessEntry, ProcessSnapshot, ProcessState, ProcessUsage};
use crate::error::{InspectError, Result};

/// Window between the two CPU samples of [`process_snapshot`]. Without it the
/// instantaneous CPU reading is always zero.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(100);

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(super) fn list_processes() -> Vec<ProcessEntry> {
    let mut sys = System::new();
    sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::everything());

    sys.processes()
        .values()
        .map(|p| ProcessEntry {
            pid: p.pid().as_u32(),
            name: p.name().to_string_lossy().into_owned(),
            cmdline: p
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            state: map_status(p.status()),
        })
        .collect()
}

pub(super) fn process_usage(pid: u32) -> Result<ProcessUsage> {
    let spid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[spid]),
        true,
        ProcessRefreshKind::everything(),
    );
    let process = sys.process(spid).ok_or(InspectError::ProcessNotFound(pid))?;
    let users = Users::new_with_refreshed_list();

    Ok(ProcessUsage {
        pid,
        name: process.name().to_string_lossy().into_owned(),
        user: owner_name(process, &users),
        started_at: local_time(process.start_time()),
        cpu_percent: process.cpu_usage(),
        memory_mb: bytes_to_mb(process.memory()),
    })
}

/// Capture a full [`ProcessSnapshot`] for `pid`.
///
/// Blocks for [`CPU_SAMPLE_WINDOW`] to get a meaningful CPU reading. Fails with
/// [`InspectError::ProcessNotFound`] if the process exits before or during
/// sampling.
pub async fn process_snapshot(pid: u32) -> Result<ProcessSnapshot> {
    let spid = Pid::from_u32(pid);
    let mut sys = System::new();
    let refresh = ProcessRefreshKind::everything();

    sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[spid]), true, refresh);
    if sys.process(spid).is_none() {
        return Err(InspectError::ProcessNotFound(pid));
    }

    tokio::time::sleep(CPU_SAMPLE_WINDOW).await;
    sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[spid]), true, refresh);
    let process = sys.process(spid).ok_or(InspectError::ProcessNotFound(pid))?;

    let users = Users::new_with_refreshed_list();
    let connections = match list_inet_connections() {
        Ok(conns) => conns.into_iter().filter(|c| c.pid == Some(pid)).collect(),
        Err(e) => {
            debug!(pid, error = %e, "socket table unavailable for snapshot");
            Vec::new()
        }
    };

    Ok(ProcessSnapshot {
        pid,
        name: process.name().to_string_lossy().into_owned(),
        cmdline: process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" "),
        user: owner_name(process, &users),
        cwd: display_path(process.cwd()),
        exe: display_path(process.exe()),
        create_time: local_time(process.start_time()).format(TIME_FORMAT).to_string(),
        cpu_percent: process.cpu_usage(),
        memory_mb: bytes_to_mb(process.memory()),
        num_threads: thread_count(pid),
        status: map_status(process.status()),
        connections,
    })
}

fn owner_name(process: &Process, users: &Users) -> String {
    match process.user_id() {
        Some(uid) => users
            .get_user_by_id(uid)
            .map(|u| u.name().to_string())
            .unwrap_or_else(|| uid.to_string()),
        None => String::new(),
    }
}

fn thread_count(pid: u32) -> u64 {
    procfs::process::Process::new(pid as i32)
        .and_then(|p| p.stat())
        .map(|stat| stat.num_threads.max(0) as u64)
        .unwrap_or(1)
}

fn display_path(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

pub(crate) fn local_time(epoch_secs: u64) -> DateTime<Local> {
    DateTime::from_timestamp(epoch_secs as i64, 0)
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_default()
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

fn map_status(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run => ProcessState::Running,
        ProcessStatus::Sleep | ProcessStatus::UninterruptibleDiskSleep | ProcessStatus::Waking => {
            ProcessState::Sleeping
        }
        ProcessStatus::Idle | ProcessStatus::Parked => ProcessState::Idle,
        ProcessStatus::Stop | ProcessStatus::Tracing => ProcessState::Stopped,
        ProcessStatus::Zombie => ProcessState::Zombie,
        ProcessStatus::Dead => ProcessState::Dead,
        _ => ProcessState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status(ProcessStatus::Zombie), ProcessState::Zombie);
        assert_eq!(map_status(ProcessStatus::Run), ProcessState::Running);
        assert_eq!(map_status(ProcessStatus::Sleep), ProcessState::Sleeping);
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(bytes_to_mb(3 * 1024 * 1024), 3.0);
    }

    #[test]
    fn test_own_process_is_listed() {
        let me = std::process::id();
        let procs = list_processes();
        assert!(procs.iter().any(|p| p.pid == me));
    }

    #[tokio::test]
    async fn test_snapshot_of_self() {
        let me = std::process::id();
        let snap = process_snapshot(me).await.unwrap();
        assert_eq!(snap.pid, me);
        assert!(!snap.name.is_empty());
        assert!(snap.num_threads >= 1);
        assert!(snap.memory_mb > 0.0);
    }

    #[tokio::test]
    async fn test_snapshot_of_missing_pid() {
        // Above the kernel's pid_max ceiling
        let err = process_snapshot(u32::MAX - 1).await.unwrap_err();
        assert!(matches!(err, InspectError::ProcessNotFound(_)));
    }
}
