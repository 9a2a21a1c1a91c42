use procfs::net::{TcpNetEntry, TcpState, UdpNetEntry};
use procfs::process::{all_processes, FDTarget};
use procfs::{ProcError, ProcResult};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::debug;

use super::{AddressFamily, ConnectionRecord, SocketKind, SocketStatus};
use crate::error::Result;

/// List every inet (TCP/UDP, v4/v6) socket on the host.
///
/// TIME_WAIT sockets are dropped and the rest are ordered by local
/// (address, port). Owners are resolved through `/proc/<pid>/fd`; sockets of
/// processes we may not inspect keep `pid: None`.
pub fn list_inet_connections() -> Result<Vec<ConnectionRecord>> {
    let owners = socket_owners();
    let mut records = Vec::new();

    for (family, table) in [
        (AddressFamily::Inet, procfs::net::tcp()),
        (AddressFamily::Inet6, procfs::net::tcp6()),
    ] {
        for entry in optional_table(table)? {
            records.push(tcp_record(&entry, family, &owners));
        }
    }

    for (family, table) in [
        (AddressFamily::Inet, procfs::net::udp()),
        (AddressFamily::Inet6, procfs::net::udp6()),
    ] {
        for entry in optional_table(table)? {
            records.push(udp_record(&entry, family, &owners));
        }
    }

    Ok(sort_and_filter(records))
}

/// Drop TIME_WAIT rows and sort ascending by local (ip, port).
pub fn sort_and_filter(mut records: Vec<ConnectionRecord>) -> Vec<ConnectionRecord> {
    records.retain(|c| c.status != SocketStatus::TimeWait);
    records.sort_by_key(|c| (c.local.ip(), c.local.port()));
    records
}

/// A missing table (e.g. IPv6 disabled) is empty, anything else is an error.
fn optional_table<T>(table: ProcResult<Vec<T>>) -> Result<Vec<T>> {
    match table {
        Ok(entries) => Ok(entries),
        Err(ProcError::NotFound(path)) => {
            debug!(?path, "socket table not present");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Map socket inode -> (pid, comm) for every process whose fds we can read.
fn socket_owners() -> HashMap<u64, (u32, String)> {
    let mut owners = HashMap::new();
    let procs = match all_processes() {
        Ok(procs) => procs,
        Err(e) => {
            debug!(error = %e, "cannot enumerate /proc");
            return owners;
        }
    };

    for proc in procs.flatten() {
        // Other users' fd tables are unreadable without privileges
        let Ok(fds) = proc.fd() else { continue };
        let mut name: Option<String> = None;
        for fd in fds.flatten() {
            if let FDTarget::Socket(inode) = fd.target {
                let name = name
                    .get_or_insert_with(|| proc.stat().map(|s| s.comm).unwrap_or_default())
                    .clone();
                owners.insert(inode, (proc.pid() as u32, name));
            }
        }
    }

    owners
}

fn tcp_record(
    entry: &TcpNetEntry,
    family: AddressFamily,
    owners: &HashMap<u64, (u32, String)>,
) -> ConnectionRecord {
    let owner = lookup_owner(entry.inode, owners);
    ConnectionRecord {
        local: entry.local_address,
        remote: connected_peer(entry.remote_address),
        family,
        kind: SocketKind::Stream,
        status: tcp_status(&entry.state),
        pid: owner.map(|(pid, _)| pid),
        process_name: owner.map(|(_, name)| name.to_string()),
    }
}

fn udp_record(
    entry: &UdpNetEntry,
    family: AddressFamily,
    owners: &HashMap<u64, (u32, String)>,
) -> ConnectionRecord {
    let owner = lookup_owner(entry.inode, owners);
    ConnectionRecord {
        local: entry.local_address,
        remote: connected_peer(entry.remote_address),
        family,
        kind: SocketKind::Datagram,
        status: SocketStatus::None,
        pid: owner.map(|(pid, _)| pid),
        process_name: owner.map(|(_, name)| name.to_string()),
    }
}

fn lookup_owner(inode: u64, owners: &HashMap<u64, (u32, String)>) -> Option<(u32, &str)> {
    if inode == 0 {
        return None;
    }
    owners.get(&inode).map(|(pid, name)| (*pid, name.as_str()))
}

fn connected_peer(addr: SocketAddr) -> Option<SocketAddr> {
    if addr.ip().is_unspecified() && addr.port() == 0 {
        None
    } else {
        Some(addr)
    }
}

#[allow(unreachable_patterns)]
fn tcp_status(state: &TcpState) -> SocketStatus {
    match state {
        TcpState::Established => SocketStatus::Established,
        TcpState::SynSent => SocketStatus::SynSent,
        TcpState::SynRecv | TcpState::NewSynRecv => SocketStatus::SynRecv,
        TcpState::FinWait1 => SocketStatus::FinWait1,
        TcpState::FinWait2 => SocketStatus::FinWait2,
        TcpState::TimeWait => SocketStatus::TimeWait,
        TcpState::Close => SocketStatus::Close,
        TcpState::CloseWait => SocketStatus::CloseWait,
        TcpState::LastAck => SocketStatus::LastAck,
        TcpState::Listen => SocketStatus::Listen,
        TcpState::Closing => SocketStatus::Closing,
        _ => SocketStatus::None,
    }
}
