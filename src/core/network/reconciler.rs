//! Watches the configuration source and reconciles the live office set
//! against it: additions spawn probe tasks, removals cancel them, and
//! in-place updates mutate runtime fields without disturbing streaks.

use super::ingest_client::Ingestor;
use super::office::{spawn_office_task, Registry};
use super::oracle::ReachabilityOracle;
use super::types::{content_hash, OfficeRuntime};
use crate::config::{Config, OfficeConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Shared inputs every spawned probe task needs; held by the reconciler
/// and cloned into each `spawn_office_task` call.
pub struct ReconcilerDeps {
    pub oracle: Arc<dyn ReachabilityOracle>,
    pub semaphore: Arc<Semaphore>,
    pub ingestor: Arc<Ingestor>,
    pub interval_seconds: u64,
    pub timeout_ms: u64,
}

/// Applies the desired office set to the live registry per the
/// reconciliation algorithm: removals cancel and drop, additions spawn and
/// upsert, hash-changed updates mutate in place and re-upsert.
pub async fn reconcile(registry: &mut Registry, desired: &[OfficeConfig], deps: &ReconcilerDeps) {
    let desired_names: HashMap<&str, &OfficeConfig> =
        desired.iter().map(|o| (o.name.as_str(), o)).collect();

    let removed: Vec<String> = registry
        .keys()
        .filter(|name| !desired_names.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in removed {
        if let Some(handle) = registry.remove(&name) {
            handle.cancel.cancel();
        }
    }

    for cfg in desired {
        match registry.get(&cfg.name) {
            None => {
                let runtime = Arc::new(Mutex::new(OfficeRuntime::new(cfg)));
                let cancel = CancellationToken::new();
                let handle = spawn_office_task(
                    cfg.name.clone(),
                    runtime,
                    deps.oracle.clone(),
                    deps.semaphore.clone(),
                    deps.ingestor.clone(),
                    deps.interval_seconds,
                    deps.timeout_ms,
                    cancel,
                );
                upsert(&deps.ingestor, cfg).await;
                registry.insert(cfg.name.clone(), handle);
            }
            Some(handle) => {
                let changed = {
                    let rt = handle.runtime.lock();
                    rt.content_hash != content_hash(cfg)
                };
                if changed {
                    {
                        let mut rt = handle.runtime.lock();
                        rt.apply_update(cfg);
                    }
                    upsert(&deps.ingestor, cfg).await;
                }
            }
        }
    }
}

async fn upsert(ingestor: &Ingestor, cfg: &OfficeConfig) {
    if let Err(err) = ingestor
        .upsert_office(
            &cfg.name,
            &cfg.gateway_ip,
            &cfg.mx_ip,
            &cfg.tunnel_probe_ip,
            cfg.retries_down,
            cfg.retries_up,
        )
        .await
    {
        tracing::warn!(office = %cfg.name, error = %err, "office upsert failed");
    }
}

/// Polls the config source by file modification time, reconciling only
/// when it advances. On parse failure the previous snapshot remains in
/// force and reconciliation for this tick is skipped.
pub async fn watch_config(
    path: String,
    poll_seconds: u64,
    registry: Arc<tokio::sync::Mutex<Registry>>,
    deps: Arc<ReconcilerDeps>,
    cancel: CancellationToken,
) {
    let mut last_modified: Option<std::time::SystemTime> = None;
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(poll_seconds.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => return,
        }

        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "config stat failed");
                continue;
            }
        };

        if last_modified == Some(modified) {
            continue;
        }

        match Config::load(&path) {
            Ok(cfg) => {
                let mut reg = registry.lock().await;
                reconcile(&mut reg, &cfg.offices, &deps).await;
                last_modified = Some(modified);
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "config parse failed, keeping previous snapshot");
            }
        }
    }
}
