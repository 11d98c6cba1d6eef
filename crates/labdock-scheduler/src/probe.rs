//! Reachability probing for live endpoints.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use labdock_core::PresentationKind;

/// Tests whether a presentation port on a live endpoint is serving.
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    /// Returns true if `host:port` answered a probe appropriate for the
    /// presentation kind.
    async fn probe(&self, host: &str, port: u16, kind: PresentationKind) -> bool;
}

/// Network prober used in production.
///
/// Http, vnc, and any future presentation kinds get a plain TCP connect;
/// ssh presentations additionally exchange protocol identification strings
/// so a bare open port does not pass for a running SSH daemon.
#[derive(Debug, Clone)]
pub struct NetProber {
    timeout: Duration,
}

impl NetProber {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn tcp_probe(&self, host: &str, port: u16) -> bool {
        let addr = format!("{host}:{port}");
        match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %addr, error = %e, "tcp probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %addr, "tcp probe timed out");
                false
            }
        }
    }

    async fn ssh_probe(&self, host: &str, port: u16) -> bool {
        let addr = format!("{host}:{port}");
        let exchange = async {
            let mut stream = TcpStream::connect(&addr).await?;
            // RFC 4253 protocol version exchange: both sides send an
            // identification string; the server's must start with "SSH-".
            stream.write_all(b"SSH-2.0-labdock_probe\r\n").await?;
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await?;
            Ok::<bool, std::io::Error>(n >= 4 && buf.starts_with(b"SSH-"))
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(identified)) => identified,
            Ok(Err(e)) => {
                debug!(addr = %addr, error = %e, "ssh probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %addr, "ssh probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl ReachabilityProber for NetProber {
    async fn probe(&self, host: &str, port: u16, kind: PresentationKind) -> bool {
        match kind {
            PresentationKind::Ssh => self.ssh_probe(host, port).await,
            PresentationKind::Http | PresentationKind::Vnc => self.tcp_probe(host, port).await,
        }
    }
}
