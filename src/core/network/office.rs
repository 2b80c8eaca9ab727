//! Per-office runtime registry and the single probe cycle.

use super::debounce::{DebounceOutcome, Debouncer};
use super::oracle::ReachabilityOracle;
use super::types::{OfficeRuntime, RawSample, StateChange};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// A live probe task's handle: the shared runtime record it mutates, plus
/// the cancellation token the reconciler signals on removal.
pub struct OfficeHandle {
    pub runtime: Arc<Mutex<OfficeRuntime>>,
    pub cancel: CancellationToken,
    pub task: tokio::task::JoinHandle<()>,
}

/// The in-memory office map. Owned by the reconciler; probe tasks hold
/// only their own `Arc<Mutex<OfficeRuntime>>` clone, never the registry
/// itself.
pub type Registry = HashMap<String, OfficeHandle>;

/// Runs the three reachability probes for one office in parallel, gated by
/// the process-wide concurrency limiter, then feeds the joint reading
/// through the debouncer. Returns the resulting `StateChange` if a
/// transition committed.
pub async fn probe_cycle(
    runtime: &Arc<Mutex<OfficeRuntime>>,
    oracle: &Arc<dyn ReachabilityOracle>,
    semaphore: &Arc<Semaphore>,
    timeout_ms: u64,
    now_ts: i64,
) -> Option<StateChange> {
    let (gateway_ip, mx_ip, tunnel_probe_ip, retries_down, retries_up) = {
        let rt = runtime.lock();
        (
            rt.gateway_ip.clone(),
            rt.mx_ip.clone(),
            rt.tunnel_probe_ip.clone(),
            rt.retries_down,
            rt.retries_up,
        )
    };

    let (gateway, mx, ipsec) = tokio::join!(
        probe_one(oracle, semaphore, &gateway_ip, timeout_ms),
        probe_one(oracle, semaphore, &mx_ip, timeout_ms),
        probe_one(oracle, semaphore, &tunnel_probe_ip, timeout_ms),
    );

    let sample = RawSample {
        ts: now_ts,
        gateway,
        mx,
        ipsec,
    };

    let debouncer = Debouncer::new(retries_down, retries_up);
    let mut rt = runtime.lock();
    rt.last_sample = Some(sample);

    let mut confirmed = rt.state;
    let mut fail_streak = rt.fail_streak;
    let mut ok_streak = rt.ok_streak;
    let outcome = debouncer.feed(&mut confirmed, &mut fail_streak, &mut ok_streak, &sample);
    rt.state = confirmed;
    rt.fail_streak = fail_streak;
    rt.ok_streak = ok_streak;

    match outcome {
        DebounceOutcome::Committed { from, to } => {
            rt.last_change = Some(now_ts);
            let office = rt.name.clone();
            Some(StateChange {
                office,
                at_ts: now_ts,
                from_state: from,
                to_state: to,
                sample_gateway: sample.gateway,
                sample_mx: sample.mx,
                sample_ipsec: sample.ipsec,
            })
        }
        DebounceOutcome::NoChange => None,
    }
}

async fn probe_one(
    oracle: &Arc<dyn ReachabilityOracle>,
    semaphore: &Arc<Semaphore>,
    host: &str,
    timeout_ms: u64,
) -> bool {
    let _permit = match semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => return false,
    };
    oracle.is_reachable(host, timeout_ms).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use async_trait::async_trait;

    struct AllUpOracle;

    #[async_trait]
    impl ReachabilityOracle for AllUpOracle {
        async fn is_reachable(&self, _host: &str, _timeout_ms: u64) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn first_up_sample_commits_from_unknown() {
        let cfg = OfficeConfig {
            name: "hq".to_string(),
            gateway_ip: "10.0.0.1".to_string(),
            mx_ip: "10.0.0.2".to_string(),
            tunnel_probe_ip: "10.0.0.3".to_string(),
            retries_down: 2,
            retries_up: 1,
        };
        let runtime = Arc::new(Mutex::new(OfficeRuntime::new(&cfg)));
        let oracle: Arc<dyn ReachabilityOracle> = Arc::new(AllUpOracle);
        let semaphore = Arc::new(Semaphore::new(20));

        let change = probe_cycle(&runtime, &oracle, &semaphore, 500, 1000).await;
        let change = change.expect("unknown -> up should commit on first corroborating sample");
        assert_eq!(change.office, "hq");
        assert_eq!(change.at_ts, 1000);
    }
}
