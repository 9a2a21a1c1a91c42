//! Unprivileged TCP fingerprinting: SSH banner sniffing and HTTP-likeness.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Most bytes read from a peer per probe
pub const PROBE_READ_LIMIT: usize = 512;

const SSH_MARKER: &str = "SSH-";
const HTTP_HEAD_REQUEST: &[u8] = b"HEAD / HTTP/1.0\r\nHost: localhost\r\n\r\n";

/// Something that can fetch an SSH banner from a listening socket.
pub trait BannerProbe: Send + Sync {
    /// The SSH banner line offered at `addr`, or `None` if the peer is not SSH
    /// or could not be reached in time.
    fn probe(&self, addr: SocketAddr) -> impl Future<Output = Option<String>> + Send;
}

/// [`BannerProbe`] that opens a real TCP connection
#[derive(Debug, Clone, Copy)]
pub struct TcpBannerProbe {
    timeout: Duration,
}

impl TcpBannerProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpBannerProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl BannerProbe for TcpBannerProbe {
    async fn probe(&self, addr: SocketAddr) -> Option<String> {
        let mut stream = connect(addr, self.timeout).await?;
        let mut buf = [0u8; PROBE_READ_LIMIT];
        let n = match timeout(self.timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => n,
            _ => return None,
        };
        extract_ssh_banner(&buf[..n])
    }
}

/// Pull an SSH banner out of the first bytes a server sent.
///
/// The banner normally opens the stream, but some servers print a preamble
/// first; in that case the text from the first `SSH-` up to the end of that
/// line is returned.
pub fn extract_ssh_banner(data: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(data);
    let text = text.trim();
    let idx = text.find(SSH_MARKER)?;
    text[idx..]
        .lines()
        .next()
        .map(|line| line.trim_end().to_string())
}

/// True if `addr` answers a bare `HEAD` request like an HTTP server.
///
/// Tolerates truncated replies: any of `HTTP/`, `Server:` or `Content-Type`
/// in the first chunk counts.
pub async fn probe_http_once(addr: SocketAddr, wait: Duration) -> bool {
    let Some(mut stream) = connect(addr, wait).await else {
        return false;
    };
    if !matches!(timeout(wait, stream.write_all(HTTP_HEAD_REQUEST)).await, Ok(Ok(()))) {
        return false;
    }
    let mut buf = [0u8; PROBE_READ_LIMIT];
    let n = match timeout(wait, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        _ => return false,
    };
    looks_like_http(&buf[..n])
}

fn looks_like_http(reply: &[u8]) -> bool {
    [&b"HTTP/"[..], b"Server:", b"Content-Type"]
        .iter()
        .any(|needle| reply.windows(needle.len()).any(|w| w == *needle))
}

async fn connect(addr: SocketAddr, wait: Duration) -> Option<TcpStream> {
    let target = dial_target(addr);
    match timeout(wait, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => Some(stream),
        Ok(Err(e)) => {
            trace!(%target, error = %e, "probe connect failed");
            None
        }
        Err(_) => {
            trace!(%target, "probe connect timed out");
            None
        }
    }
}

/// Wildcard listeners are reached through loopback.
fn dial_target(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
