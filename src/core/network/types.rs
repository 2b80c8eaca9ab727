//! Core data model for the probe engine: office runtime state, raw samples,
//! and the confirmed state-change events the debouncer emits.

use crate::config::OfficeConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Confirmed connectivity state for an office, after debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Unknown,
    Up,
    Degraded,
    Down,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Unknown => "unknown",
            State::Up => "up",
            State::Degraded => "degraded",
            State::Down => "down",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One instantaneous reachability reading across the three probed hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub ts: i64,
    pub gateway: bool,
    pub mx: bool,
    pub ipsec: bool,
}

impl RawSample {
    /// Classifies an instantaneous reading into an unconfirmed state,
    /// before debounce thresholds are applied.
    ///
    /// `down` if neither `gateway` nor `mx` answered; `degraded` if either
    /// did but the IPsec tunnel probe didn't; `up` if either answered and
    /// the tunnel did too.
    pub fn instant_state(&self) -> State {
        let wan_up = self.gateway || self.mx;
        if !wan_up {
            State::Down
        } else if !self.ipsec {
            State::Degraded
        } else {
            State::Up
        }
    }
}

/// A confirmed transition, ready to be persisted and posted to the ingest
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub office: String,
    pub at_ts: i64,
    pub from_state: State,
    pub to_state: State,
    pub sample_gateway: bool,
    pub sample_mx: bool,
    pub sample_ipsec: bool,
}

/// Live runtime record for one configured office: identity plus debounce
/// bookkeeping. Mirrors the config-level `OfficeConfig` but carries mutable
/// state the scheduler and reconciler update in place.
#[derive(Debug, Clone)]
pub struct OfficeRuntime {
    pub name: String,
    pub gateway_ip: String,
    pub mx_ip: String,
    pub tunnel_probe_ip: String,
    pub retries_down: u32,
    pub retries_up: u32,
    pub content_hash: String,
    pub state: State,
    pub fail_streak: u32,
    pub ok_streak: u32,
    pub last_change: Option<i64>,
    pub last_sample: Option<RawSample>,
}

impl OfficeRuntime {
    pub fn new(cfg: &OfficeConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            gateway_ip: cfg.gateway_ip.clone(),
            mx_ip: cfg.mx_ip.clone(),
            tunnel_probe_ip: cfg.tunnel_probe_ip.clone(),
            retries_down: cfg.retries_down,
            retries_up: cfg.retries_up,
            content_hash: content_hash(cfg),
            state: State::Unknown,
            fail_streak: 0,
            ok_streak: 0,
            last_change: None,
            last_sample: None,
        }
    }

    /// Applies an updated config in place, preserving debounce streaks and
    /// confirmed state, as a reconciled update rather than a fresh office.
    pub fn apply_update(&mut self, cfg: &OfficeConfig) {
        self.gateway_ip = cfg.gateway_ip.clone();
        self.mx_ip = cfg.mx_ip.clone();
        self.tunnel_probe_ip = cfg.tunnel_probe_ip.clone();
        self.retries_down = cfg.retries_down;
        self.retries_up = cfg.retries_up;
        self.content_hash = content_hash(cfg);
    }
}

/// Stable content hash over the fields that define an office's identity,
/// used by the reconciler to detect config drift without diffing every
/// field by hand.
pub fn content_hash(cfg: &OfficeConfig) -> String {
    let joined = format!(
        "{}|{}|{}|{}|{}|{}",
        cfg.name, cfg.gateway_ip, cfg.mx_ip, cfg.tunnel_probe_ip, cfg.retries_down, cfg.retries_up
    );
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}
