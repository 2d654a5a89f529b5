use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::types::MonitorStatus;

const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Watchpost/0.1; +https://github.com/watchpost)";

/// Probe trait for determining target reachability
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Determine whether the target is currently reachable.
    ///
    /// Infallible by contract: every network failure collapses into `Down`.
    async fn probe(&self, target: &str) -> MonitorStatus;
}

/// Production prober: HTTP(S) request with a raw TCP connect fallback
pub struct Prober {
    client: reqwest::Client,
    tcp_timeout: Duration,
}

impl Prober {
    pub fn new(probe_timeout_seconds: u64, tcp_timeout_seconds: u64) -> Result<Self> {
        // Reachability only - targets with self-signed or expired
        // certificates still count as up.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(probe_timeout_seconds))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { client, tcp_timeout: Duration::from_secs(tcp_timeout_seconds) })
    }

    async fn tcp_probe(&self, target: &str) -> MonitorStatus {
        let Some((host, port)) = tcp_endpoint(target) else {
            return MonitorStatus::Down;
        };

        let connect = tokio::net::TcpStream::connect((host.as_str(), port));
        match timeout(self.tcp_timeout, connect).await {
            Ok(Ok(_stream)) => MonitorStatus::Up,
            Ok(Err(error)) => {
                debug!("TCP probe of {host}:{port} failed: {error}");
                MonitorStatus::Down
            }
            Err(_) => {
                debug!("TCP probe of {host}:{port} timed out");
                MonitorStatus::Down
            }
        }
    }
}

#[async_trait::async_trait]
impl Probe for Prober {
    async fn probe(&self, target: &str) -> MonitorStatus {
        let web_target = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{target}")
        };

        // Any received response is reachable - status codes, redirects and
        // server errors all prove the transport is alive.
        match self.client.get(&web_target).send().await {
            Ok(_response) => MonitorStatus::Up,
            Err(error) => {
                debug!("HTTP probe of {target} failed ({error}), trying TCP");
                self.tcp_probe(target).await
            }
        }
    }
}

/// Derive the host and port for the TCP fallback probe.
///
/// Explicit ports win; otherwise 443 for https targets and 80 for everything
/// else.
fn tcp_endpoint(target: &str) -> Option<(String, u16)> {
    if let Ok(url) = Url::parse(target) {
        if matches!(url.scheme(), "http" | "https") {
            let host = url.host_str()?.to_string();
            let port = url.port_or_known_default().unwrap_or(80);
            return Some((host, port));
        }
    }

    if let Some((host, port)) = target.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return Some((host.to_string(), port));
        }
    }

    if target.is_empty() { None } else { Some((target.to_string(), 80)) }
}
