//! Periodically assembles a tick snapshot of every office's current
//! runtime state and submits it to the ingest surface as a batch.

use super::ingest_client::Ingestor;
use super::office::Registry;
use super::scheduler::emit_event;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs the broadcaster loop until `cancel` fires or `iterations` ticks
/// have been emitted (when `Some`). Ingest failures are logged and do not
/// interrupt the next tick.
pub async fn run_broadcaster(
    registry: Arc<tokio::sync::Mutex<Registry>>,
    ingestor: Arc<Ingestor>,
    broadcast_seconds: u64,
    iterations: Option<u64>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(broadcast_seconds.max(1)));
    let mut ticks_emitted = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => return,
        }

        let entries = snapshot_entries(&registry).await;

        emit_event(json!({ "event": "tick", "offices": entries }));

        if let Err(err) = ingestor.post_tick(entries).await {
            tracing::warn!(error = %err, "transient ingest failure posting tick batch");
        }

        ticks_emitted += 1;
        if let Some(limit) = iterations {
            if ticks_emitted >= limit {
                cancel.cancel();
                return;
            }
        }
    }
}

async fn snapshot_entries(registry: &Arc<tokio::sync::Mutex<Registry>>) -> Vec<serde_json::Value> {
    let reg = registry.lock().await;
    reg.values()
        .map(|handle| {
            let rt = handle.runtime.lock();
            match rt.last_sample {
                Some(sample) => json!({
                    "office": rt.name,
                    "state": rt.state.as_str(),
                    "gateway": sample.gateway,
                    "mx": sample.mx,
                    "ipsec": sample.ipsec,
                    "ts": sample.ts,
                }),
                None => json!({
                    "office": rt.name,
                    "state": "unknown",
                    "gateway": false,
                    "mx": false,
                    "ipsec": false,
                    "ts": 0,
                }),
            }
        })
        .collect()
}
