use std::net::SocketAddr;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use futures::future::{self, FutureExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use shared::protocol::format_host_port;
use shared::types::{ProbeOutcome, ServiceKind};
use crate::config::FamilyStrategy;
use super::Probe;

/// Measures the TCP connect time to a KDC.
///
/// `timeout` bounds the whole probe; `connect_timeout` bounds each connect
/// attempt, so a black-holed address cannot starve the ones after it.
pub struct KdcProbe {
    timeout: Duration,
    connect_timeout: Duration,
    strategy: FamilyStrategy,
}

impl KdcProbe {
    pub fn new(timeout: Duration, connect_timeout: Duration, strategy: FamilyStrategy) -> Self {
        Self {
            timeout,
            connect_timeout,
            strategy,
        }
    }

    async fn measure(&self, host: &str, port: u16) -> Option<(Duration, TcpStream)> {
        let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                tracing::debug!("KDC server {} could not be resolved: {}", host, e);
                return None;
            }
        };
        let (v6, v4): (Vec<SocketAddr>, Vec<SocketAddr>) =
            addrs.into_iter().partition(SocketAddr::is_ipv6);

        self.connect_families(&v6, &v4).await
    }

    /// Walk the IPv6 and IPv4 address lists according to the strategy.
    async fn connect_families(
        &self,
        v6: &[SocketAddr],
        v4: &[SocketAddr],
    ) -> Option<(Duration, TcpStream)> {
        match self.strategy {
            FamilyStrategy::Sequential => match self.connect_family(v6, "IPv6").await {
                Some(connected) => Some(connected),
                None => self.connect_family(v4, "IPv4").await,
            },
            FamilyStrategy::Race => {
                let attempts = [
                    async { self.connect_family(v6, "IPv6").await.ok_or(()) }.boxed(),
                    async { self.connect_family(v4, "IPv4").await.ok_or(()) }.boxed(),
                ];
                // The losing attempt is dropped, which closes its socket
                future::select_ok(attempts).await.ok().map(|(connected, _)| connected)
            }
        }
    }

    /// Try each address of one family in turn. Latency covers only the
    /// successful connect.
    async fn connect_family(&self, addrs: &[SocketAddr], family: &str) -> Option<(Duration, TcpStream)> {
        if addrs.is_empty() {
            tracing::debug!("No {} addresses to try", family);
            return None;
        }

        for addr in addrs {
            let start = Instant::now();
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Some((start.elapsed(), stream)),
                Ok(Err(e)) => {
                    tracing::debug!("KDC server {} was unreachable over {}: {}", addr, family, e);
                }
                Err(_) => {
                    tracing::debug!(
                        "KDC server {} did not accept a connection over {} within {:?}",
                        addr,
                        family,
                        self.connect_timeout
                    );
                }
            }
        }
        None
    }
}

/// Best-effort close. Shutdown errors are logged and otherwise ignored; the
/// socket is released when `stream` drops either way.
async fn release(mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("Failed to shut down KDC probe socket: {}", e);
    }
}

#[async_trait]
impl Probe for KdcProbe {
    fn protocol(&self) -> ServiceKind {
        ServiceKind::Kdc
    }

    async fn probe(&self, host: &str, port: u16) -> ProbeOutcome {
        let uri = format_host_port(host, port);

        match tokio::time::timeout(self.timeout, self.measure(host, port)).await {
            Ok(Some((latency, stream))) => {
                release(stream).await;
                ProbeOutcome::reachable(latency, uri)
            }
            Ok(None) => {
                tracing::debug!("KDC server {} was unreachable on port {}", host, port);
                ProbeOutcome::Unreachable
            }
            Err(_) => {
                tracing::debug!(
                    "KDC server {} did not accept a connection on port {} within {:?}",
                    host,
                    port,
                    self.timeout
                );
                ProbeOutcome::Unreachable
            }
        }
    }
}
