pub mod broadcaster;
pub mod debounce;
pub mod ingest_client;
pub mod office;
pub mod oracle;
pub mod reconciler;
pub mod scheduler;
pub mod types;

pub use debounce::{DebounceOutcome, Debouncer};
pub use office::{OfficeHandle, Registry};
pub use oracle::{default_oracle, FpingOracle, ReachabilityOracle, TcpFallbackOracle};
pub use types::{OfficeRuntime, RawSample, State, StateChange};
