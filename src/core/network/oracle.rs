//! Reachability oracle: a pluggable "is this host reachable" check, kept
//! behind a trait so the scheduler can be tested against a fake without
//! shelling out to real network tools.

use async_trait::async_trait;
use std::time::Duration;

/// Dependency-injected reachability check. Implementations must never
/// return `Err`; every internal failure (binary missing, spawn error,
/// timeout) collapses to `Ok(false)`.
#[async_trait]
pub trait ReachabilityOracle: Send + Sync {
    async fn is_reachable(&self, host: &str, timeout_ms: u64) -> bool;
}

/// Primary oracle: shells out to `fping -c1 -t<timeout_ms> -q <host>` and
/// treats a zero exit code as reachable.
pub struct FpingOracle;

#[async_trait]
impl ReachabilityOracle for FpingOracle {
    async fn is_reachable(&self, host: &str, timeout_ms: u64) -> bool {
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms + 200),
            tokio::process::Command::new("fping")
                .arg("-c1")
                .arg("-t")
                .arg(timeout_ms.to_string())
                .arg("-q")
                .arg(host)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status(),
        )
        .await;

        matches!(result, Ok(Ok(status)) if status.success())
    }
}

/// Fallback oracle for hosts where `fping` is unavailable or not
/// permitted. Attempts a TCP connect as a reachability heuristic: even a
/// `ConnectionRefused` proves the host answered at the IP layer.
pub struct TcpFallbackOracle {
    ports: [u16; 2],
}

impl Default for TcpFallbackOracle {
    fn default() -> Self {
        Self { ports: [7, 80] }
    }
}

#[async_trait]
impl ReachabilityOracle for TcpFallbackOracle {
    async fn is_reachable(&self, host: &str, timeout_ms: u64) -> bool {
        let deadline = Duration::from_millis(timeout_ms);
        for port in self.ports {
            let addr = format!("{host}:{port}");
            let attempt = tokio::time::timeout(deadline, tokio::net::TcpStream::connect(&addr)).await;
            match attempt {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => return true,
                _ => continue,
            }
        }
        false
    }
}

/// Picks `FpingOracle` when the `fping` binary resolves, otherwise falls
/// back to `TcpFallbackOracle`. Checked once at process startup — per the
/// "no mutable globals" design note, the choice does not change at
/// runtime.
pub fn default_oracle() -> std::sync::Arc<dyn ReachabilityOracle> {
    let fping_available = std::process::Command::new("fping")
        .arg("-v")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success() || s.code().is_some())
        .unwrap_or(false);

    if fping_available {
        std::sync::Arc::new(FpingOracle)
    } else {
        std::sync::Arc::new(TcpFallbackOracle::default())
    }
}
