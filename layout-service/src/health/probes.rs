//! Built-in probe kinds
//!
//! Both kinds bound their I/O by the probe context: the remaining time until
//! the deadline is used as the connect/request timeout and caller cancellation
//! ends the check early.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use super::probe::{Probe, ProbeContext, ProbeError};
use crate::config::{ProbeConfig, ProbeKind};
use crate::error::{Error, Result};

const CANCELLED_REASON: &str = "check cancelled";

/// Open and immediately close a TCP connection to `address`
pub async fn tcp_ping(address: &str, timeout: Duration) -> std::io::Result<()> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connection timed out"))??;
    drop(stream);
    Ok(())
}

/// Probe that is UP while `address` accepts TCP connections
pub fn tcp(name: impl Into<String>, address: impl Into<String>) -> Probe {
    let address: Arc<str> = Arc::from(address.into());

    Probe::new(name, move |ctx: ProbeContext| {
        let address = address.clone();
        async move {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(ProbeError::new(CANCELLED_REASON)),
                result = tcp_ping(&address, ctx.remaining()) => result
                    .map_err(|e| ProbeError::new(format!("tcp dial {}: {}", address, e))),
            }
        }
    })
}

/// Probe that GETs `url` and expects `expect_status`, or any 2xx when unset
pub fn http(
    name: impl Into<String>,
    url: &str,
    expect_status: Option<u16>,
) -> Result<Probe> {
    let name = name.into();
    let url = reqwest::Url::parse(url).map_err(|e| {
        Error::InvalidConfig(format!("probe '{}' has an invalid url '{}': {}", name, url, e))
    })?;
    if let Some(code) = expect_status {
        reqwest::StatusCode::from_u16(code).map_err(|_| {
            Error::InvalidConfig(format!(
                "probe '{}' expects an invalid status code {}",
                name, code
            ))
        })?;
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Probe::new(name, move |ctx: ProbeContext| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let request = client.get(url).timeout(ctx.remaining()).send();
            let response = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ProbeError::new(CANCELLED_REASON)),
                response = request => response?,
            };

            let status = response.status();
            let healthy = match expect_status {
                Some(code) => status.as_u16() == code,
                None => status.is_success(),
            };

            if healthy {
                Ok(())
            } else {
                Err(ProbeError::new(format!("unexpected status {}", status)))
            }
        }
    }))
}

/// Build the probe described by a config entry
pub fn from_config(config: &ProbeConfig) -> Result<Probe> {
    match &config.kind {
        ProbeKind::Tcp { address } => Ok(tcp(config.name.clone(), address.clone())),
        ProbeKind::Http { url, expect_status } => http(config.name.clone(), url, *expect_status),
    }
}
