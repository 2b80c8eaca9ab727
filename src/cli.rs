use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sitesla-monitor")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Branch-office reachability probe engine")]
pub struct MonitorCli {
    /// Path to the offices.yaml config document
    #[arg(long)]
    pub config: Option<String>,

    /// Run a single probe cycle for every office and exit
    #[arg(long)]
    pub once: bool,

    /// Stop after this many probe cycles (mutually informative with --once)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Override the per-office probe interval in seconds
    #[arg(long)]
    pub interval_seconds: Option<u64>,

    /// Override the per-probe timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Override the global concurrent-ping permit count
    #[arg(long)]
    pub ping_concurrency: Option<usize>,
}

impl MonitorCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Parser, Debug)]
#[command(name = "sitesla-server")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Branch-office SLA ingest and query service")]
pub struct ServerCli {
    /// Path to the SQLite database file
    #[arg(long)]
    pub db: Option<String>,

    /// Bind address, e.g. 127.0.0.1:8080
    #[arg(long)]
    pub bind: Option<String>,
}

impl ServerCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
