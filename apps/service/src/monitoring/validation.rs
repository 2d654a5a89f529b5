//! Input validation for the CRUD boundary.
//!
//! Malformed targets and addresses are rejected here, before anything
//! reaches the monitoring loop.

use anyhow::{Result, anyhow};
use url::Url;

/// Validate a monitor target: an http/https URL or a host\[:port\] pair
pub fn validate_monitor_target(target: &str) -> Result<()> {
    if target.trim().is_empty() {
        return Err(anyhow!("Target must not be empty"));
    }

    if target.contains("://") {
        let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {e}"))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(anyhow!("Unsupported scheme for monitor target: {other}")),
        }
        if url.host_str().is_none() {
            return Err(anyhow!("Target URL has no host"));
        }
        return Ok(());
    }

    // host or host:port
    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (target, None),
    };

    if host.is_empty() {
        return Err(anyhow!("Target host must not be empty"));
    }
    if let Some(port) = port {
        port.parse::<u16>().map_err(|_| anyhow!("Invalid port number: {port}"))?;
    }

    Ok(())
}

/// Validate a subscriber address
pub fn validate_email(email: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(anyhow!("Invalid email address: {email}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_urls_and_host_port_pairs() {
        assert!(validate_monitor_target("https://example.com/health").is_ok());
        assert!(validate_monitor_target("http://example.com:8080").is_ok());
        assert!(validate_monitor_target("db.example.com:5432").is_ok());
        assert!(validate_monitor_target("example.com").is_ok());
    }

    #[test]
    fn rejects_malformed_targets() {
        assert!(validate_monitor_target("").is_err());
        assert!(validate_monitor_target("ftp://example.com").is_err());
        assert!(validate_monitor_target("example.com:notaport").is_err());
        assert!(validate_monitor_target(":8080").is_err());
    }

    #[test]
    fn rejects_addresses_without_at_sign() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("not-an-address").is_err());
    }
}
