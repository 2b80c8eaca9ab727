//! Fire-and-forget HTTP client for the monitor's posts to the ingest
//! surface. Grounded on the scoped long-lived-client pattern in DESIGN
//! NOTES: the monitor acquires one client for its lifetime, but its
//! absence must fall back to one-shot request semantics so tests can
//! drive the ingestor without a context phase.

use crate::core::network::types::StateChange;
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, Request, RequestExt};
use serde_json::json;
use std::time::Duration;

/// Posts JSON bodies to the ingest surface. Errors are returned to the
/// caller (the scheduler/broadcaster decide whether to log and swallow —
/// per spec this client itself never retries).
pub struct Ingestor {
    base_url: String,
    client: Option<isahc::HttpClient>,
}

impl Ingestor {
    /// Constructs an ingestor backed by a long-lived client, built once at
    /// process startup.
    pub fn new(base_url: impl Into<String>) -> Result<Self, String> {
        let client = isahc::HttpClient::new().map_err(|e| e.to_string())?;
        Ok(Self {
            base_url: base_url.into(),
            client: Some(client),
        })
    }

    /// Constructs an ingestor with no pre-built client; each post opens a
    /// one-shot connection. Used by tests that don't run a context phase.
    pub fn one_shot(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: None,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value, timeout: Duration) -> Result<(), String> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let payload = serde_json::to_vec(&body).map_err(|e| e.to_string())?;
        let request = Request::post(&url)
            .header("content-type", "application/json")
            .timeout(timeout)
            .body(payload)
            .map_err(|e| e.to_string())?;

        let mut response = match &self.client {
            Some(client) => client.send_async(request).await.map_err(|e| e.to_string())?,
            None => request.send_async().await.map_err(|e| e.to_string())?,
        };

        // Drain the body so the connection can be reused/closed cleanly.
        let _ = response.text().await;
        Ok(())
    }

    pub async fn upsert_office(
        &self,
        name: &str,
        gateway_ip: &str,
        mx_ip: &str,
        tunnel_probe_ip: &str,
        retries_down: u32,
        retries_up: u32,
    ) -> Result<(), String> {
        self.post(
            "/offices",
            json!({
                "name": name,
                "gateway_ip": gateway_ip,
                "mx_ip": mx_ip,
                "tunnel_probe_ip": tunnel_probe_ip,
                "retries_down": retries_down,
                "retries_up": retries_up,
            }),
            Duration::from_secs(5),
        )
        .await
    }

    pub async fn post_state_change(&self, change: &StateChange) -> Result<(), String> {
        self.post(
            "/ingest/state_change",
            json!({
                "office": change.office,
                "state": change.to_state.as_str(),
                "sample": {
                    "gateway": change.sample_gateway,
                    "mx": change.sample_mx,
                    "ipsec": change.sample_ipsec,
                },
                "at": change.at_ts,
            }),
            Duration::from_secs(5),
        )
        .await
    }

    pub async fn post_tick(&self, entries: Vec<serde_json::Value>) -> Result<(), String> {
        self.post(
            "/ingest/tick",
            serde_json::Value::Array(entries),
            Duration::from_secs(5),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_has_no_pre_built_client() {
        let ingestor = Ingestor::one_shot("http://127.0.0.1:9");
        assert!(ingestor.client.is_none());
        assert_eq!(ingestor.base_url, "http://127.0.0.1:9");
    }
}
