use sitesla::cli::ServerCli;
use sitesla::config::EnvOverrides;
use sitesla::ingest::{router, AppState};
use sitesla::store::Store;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = ServerCli::parse_args();
    let env = EnvOverrides::from_env();

    let db_path = cli.db.or(env.db_path).unwrap_or_else(|| "sitesla.db".to_string());
    let bind_addr = cli
        .bind
        .or(env.api_base.map(|base| {
            base.trim_start_matches("http://")
                .trim_start_matches("https://")
                .to_string()
        }))
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let store = Arc::new(Store::open(&db_path)?);
    let app = router(AppState { store });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, db = %db_path, "sitesla server listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
