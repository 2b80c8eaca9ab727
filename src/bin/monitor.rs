use sitesla::cli::MonitorCli;
use sitesla::config::{Config, EnvOverrides};
use sitesla::core::network::broadcaster::run_broadcaster;
use sitesla::core::network::ingest_client::Ingestor;
use sitesla::core::network::office::{probe_cycle, Registry};
use sitesla::core::network::oracle::default_oracle;
use sitesla::core::network::reconciler::{reconcile, watch_config, ReconcilerDeps};
use sitesla::core::network::scheduler::emit_event;
use sitesla::core::network::OfficeRuntime;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = MonitorCli::parse_args();
    let env = EnvOverrides::from_env();

    let config_path = cli
        .config
        .or(env.offices_yaml.clone())
        .unwrap_or_else(|| "offices.yaml".to_string());

    let config = Config::load(&config_path)?;

    let interval_seconds = cli.interval_seconds.unwrap_or(config.interval_seconds);
    let timeout_ms = cli.timeout_ms.unwrap_or(config.timeout_ms);
    let ping_concurrency = cli
        .ping_concurrency
        .or(env.ping_concurrency)
        .unwrap_or(20);
    let api_base = env.api_base.unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

    if cli.once {
        return run_once(&config, timeout_ms, &api_base).await;
    }

    let oracle = default_oracle();
    let semaphore = Arc::new(Semaphore::new(ping_concurrency));
    let ingestor = Arc::new(Ingestor::new(&api_base)?);
    let deps = Arc::new(ReconcilerDeps {
        oracle,
        semaphore,
        ingestor: ingestor.clone(),
        interval_seconds,
        timeout_ms,
    });

    let registry = Arc::new(tokio::sync::Mutex::new(Registry::new()));
    {
        let mut reg = registry.lock().await;
        reconcile(&mut reg, &config.offices, &deps).await;
    }

    let cancel = CancellationToken::new();

    let watcher = tokio::spawn(watch_config(
        config_path,
        5,
        registry.clone(),
        deps.clone(),
        cancel.clone(),
    ));

    let broadcaster = tokio::spawn(run_broadcaster(
        registry.clone(),
        ingestor.clone(),
        config.broadcast_seconds,
        cli.iterations,
        cancel.clone(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
        _ = cancel.cancelled() => {
            tracing::info!("iteration limit reached");
        }
    }

    cancel.cancel();
    let _ = watcher.await;
    let _ = broadcaster.await;

    let reg = registry.lock().await;
    for handle in reg.values() {
        handle.cancel.cancel();
    }

    Ok(())
}

/// `--once`: a single probe pass across every configured office, printed
/// as JSON, with no background tasks started.
async fn run_once(
    config: &Config,
    timeout_ms: u64,
    api_base: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let oracle = default_oracle();
    let semaphore = Arc::new(Semaphore::new(config.offices.len().max(1) * 3));
    let ingestor = Ingestor::one_shot(api_base);

    let mut status = Vec::with_capacity(config.offices.len());

    for cfg in &config.offices {
        ingestor
            .upsert_office(
                &cfg.name,
                &cfg.gateway_ip,
                &cfg.mx_ip,
                &cfg.tunnel_probe_ip,
                cfg.retries_down,
                cfg.retries_up,
            )
            .await
            .ok();

        let runtime = Arc::new(parking_lot::Mutex::new(OfficeRuntime::new(cfg)));
        let now_ts = chrono::Utc::now().timestamp();
        let change = probe_cycle(&runtime, &oracle, &semaphore, timeout_ms, now_ts).await;

        let rt = runtime.lock();
        let sample = rt.last_sample.expect("probe_cycle always records a sample");
        status.push(serde_json::json!({
            "office": rt.name,
            "state": sample.instant_state().as_str(),
            "gateway": sample.gateway,
            "mx": sample.mx,
            "ipsec": sample.ipsec,
            "ts": sample.ts,
        }));
        drop(rt);

        if let Some(change) = change {
            ingestor.post_state_change(&change).await.ok();
        }
    }

    emit_event(serde_json::json!({
        "event": "oneshot",
        "status": status,
    }));

    Ok(())
}
