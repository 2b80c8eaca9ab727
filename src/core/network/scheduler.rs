//! Drives one independent probe cycle per office at a steady cadence,
//! jittered to spread load and avoid thundering-herd cycles.

use super::ingest_client::Ingestor;
use super::office::{probe_cycle, OfficeHandle};
use super::oracle::ReachabilityOracle;
use super::types::OfficeRuntime;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Emits a newline-delimited JSON stdout event, per the monitor's stdout
/// event protocol. Kept outside `tracing` so the two streams never mix.
pub fn emit_event(event: serde_json::Value) {
    println!("{event}");
}

/// Spawns the per-office probe task. The task runs until `cancel` fires,
/// at which point it stops at its next suspension point; an in-flight
/// cycle is allowed to finish but its result is simply the last thing
/// emitted before exit.
#[allow(clippy::too_many_arguments)]
pub fn spawn_office_task(
    name: String,
    runtime: Arc<Mutex<OfficeRuntime>>,
    oracle: Arc<dyn ReachabilityOracle>,
    semaphore: Arc<Semaphore>,
    ingestor: Arc<Ingestor>,
    interval_seconds: u64,
    timeout_ms: u64,
    cancel: CancellationToken,
) -> OfficeHandle {
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let interval = Duration::from_secs(interval_seconds.max(1));

        let initial_jitter_bound = (interval.as_secs_f64() / 4.0).min(0.5);
        let initial_jitter = Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=initial_jitter_bound.max(0.0)));
        tokio::select! {
            _ = tokio::time::sleep(initial_jitter) => {}
            _ = task_cancel.cancelled() => return,
        }

        loop {
            let cycle_start = tokio::time::Instant::now();
            let now_ts = chrono::Utc::now().timestamp();

            let change = tokio::select! {
                result = probe_cycle(&runtime, &oracle, &semaphore, timeout_ms, now_ts) => result,
                _ = task_cancel.cancelled() => return,
            };

            if let Some(change) = change {
                emit_event(serde_json::json!({
                    "event": "state_change",
                    "office": change.office,
                    "state": change.to_state.as_str(),
                    "sample": {
                        "gateway": change.sample_gateway,
                        "mx": change.sample_mx,
                        "ipsec": change.sample_ipsec,
                        "ts": change.at_ts,
                    },
                    "at": change.at_ts,
                }));

                let post_ingestor = ingestor.clone();
                let post_change = change.clone();
                tokio::spawn(async move {
                    if let Err(err) = post_ingestor.post_state_change(&post_change).await {
                        tracing::warn!(office = %post_change.office, error = %err, "transient ingest failure posting state change");
                    }
                });
            }

            let elapsed = cycle_start.elapsed();
            let remaining = interval.saturating_sub(elapsed);
            let jitter_bound = (interval.as_secs_f64() * 0.05).min(0.25);
            let jitter = Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=jitter_bound.max(0.0)));

            tokio::select! {
                _ = tokio::time::sleep(remaining + jitter) => {}
                _ = task_cancel.cancelled() => return,
            }
        }
    });

    OfficeHandle {
        runtime,
        cancel,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OfficeConfig;
    use async_trait::async_trait;

    struct AlwaysUp;

    #[async_trait]
    impl ReachabilityOracle for AlwaysUp {
        async fn is_reachable(&self, _host: &str, _timeout_ms: u64) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn cancelled_task_stops_without_panicking() {
        let cfg = OfficeConfig {
            name: "hq".to_string(),
            gateway_ip: "127.0.0.1".to_string(),
            mx_ip: "127.0.0.1".to_string(),
            tunnel_probe_ip: "127.0.0.1".to_string(),
            retries_down: 2,
            retries_up: 1,
        };
        let runtime = Arc::new(Mutex::new(OfficeRuntime::new(&cfg)));
        let oracle: Arc<dyn ReachabilityOracle> = Arc::new(AlwaysUp);
        let semaphore = Arc::new(Semaphore::new(20));
        let ingestor = Arc::new(Ingestor::one_shot("http://127.0.0.1:0"));
        let cancel = CancellationToken::new();

        let handle = spawn_office_task(
            "hq".to_string(),
            runtime,
            oracle,
            semaphore,
            ingestor,
            60,
            500,
            cancel.clone(),
        );

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle.task).await;
    }
}
