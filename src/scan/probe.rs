use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;

/// Decides whether a port accepts connections.
pub trait PortProber {
    fn probe(&self, ip: &str, port: u16) -> impl std::future::Future<Output = bool> + Send;
}

/// Probes with a single TCP connect attempt bounded by a timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PortProber for TcpProber {
    async fn probe(&self, ip: &str, port: u16) -> bool {
        probe_tcp(ip, port, self.timeout).await
    }
}

/// Attempts one TCP connection to `ip:port`.
///
/// Returns `true` if the handshake completes within `timeout`; the stream is
/// closed right away. Refused, unreachable, timed out and unparseable
/// addresses all yield `false`.
pub async fn probe_tcp(ip: &str, port: u16, timeout: Duration) -> bool {
    let ip = match ip.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => {
            log::trace!("not probing port {port}: invalid ip `{ip}`");
            return false;
        }
    };
    let addr = SocketAddr::new(ip, port);

    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(err)) => {
            log::trace!("{addr} closed: {err}");
            false
        }
        Err(_) => {
            log::trace!("{addr} closed: no answer within {timeout:?}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::net::TcpListener;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(150);

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(TcpProber::new(TIMEOUT).probe("127.0.0.1", port).await);
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        assert!(!probe_tcp("127.0.0.1", port, TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_probe_unroutable_address_is_bounded() {
        // TEST-NET-1, nothing answers there
        let start = Instant::now();
        assert!(!probe_tcp("192.0.2.1", 80, TIMEOUT).await);
        assert!(start.elapsed() < TIMEOUT + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_probe_invalid_ip() {
        assert!(!probe_tcp("", 80, TIMEOUT).await);
        assert!(!probe_tcp("not-an-ip", 80, TIMEOUT).await);
    }
}
