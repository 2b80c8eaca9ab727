//! Durable store: office registry, append-only state-change log, and raw
//! sample log, backed by a single SQLite connection guarded by a mutex so
//! writes serialize per the concurrency model's store-owns-backpressure
//! design.

pub mod schema;
pub mod sla;

pub use sla::{LatestSample, SlaEntry, SlaResponse, SlaWindow};

use crate::core::network::types::State;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown office: {0}")]
    UnknownOffice(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One entry of an `/ingest/tick` batch, before it is resolved against the
/// office registry. The `state` field is accepted but never persisted —
/// see DESIGN.md for why this laxity is intentional.
pub struct TickEntry {
    pub office: String,
    pub gateway: bool,
    pub mx: bool,
    pub ipsec: bool,
    pub ts: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OfficeRow {
    pub id: i64,
    pub name: String,
    pub gateway_ip: String,
    pub mx_ip: String,
    pub tunnel_probe_ip: String,
    pub retries_down: u32,
    pub retries_up: u32,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates the office if absent, otherwise updates every field but
    /// `id`. Returns the stable office id either way.
    pub fn upsert_office(
        &self,
        name: &str,
        gateway_ip: &str,
        mx_ip: &str,
        tunnel_probe_ip: &str,
        retries_down: u32,
        retries_up: u32,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO offices (name, gateway_ip, mx_ip, tunnel_probe_ip, retries_down, retries_up)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                gateway_ip = excluded.gateway_ip,
                mx_ip = excluded.mx_ip,
                tunnel_probe_ip = excluded.tunnel_probe_ip,
                retries_down = excluded.retries_down,
                retries_up = excluded.retries_up",
            params![name, gateway_ip, mx_ip, tunnel_probe_ip, retries_down, retries_up],
        )?;
        let id = conn.query_row("SELECT id FROM offices WHERE name = ?1", params![name], |row| {
            row.get(0)
        })?;
        Ok(id)
    }

    fn office_id(conn: &Connection, name: &str) -> Result<i64, StoreError> {
        conn.query_row("SELECT id FROM offices WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| StoreError::UnknownOffice(name.to_string()))
    }

    /// Persists a confirmed state change. `from_state` is derived
    /// server-side from the strictly-prior event for this office (or
    /// `unknown` if none exists), never supplied by the caller. Returns
    /// the number of rows actually inserted: 0 on an exact `(office, at)`
    /// duplicate, 1 otherwise.
    pub fn ingest_state_change(
        &self,
        office_name: &str,
        to_state: State,
        sample_gateway: bool,
        sample_mx: bool,
        sample_ipsec: bool,
        at_ts: i64,
    ) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let office_id = Self::office_id(&conn, office_name)?;

        let from_state: String = conn
            .query_row(
                "SELECT to_state FROM state_changes
                 WHERE office_id = ?1 AND at_ts < ?2
                 ORDER BY at_ts DESC, id DESC LIMIT 1",
                params![office_id, at_ts],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_else(|| State::Unknown.as_str().to_string());

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO state_changes
                (office_id, at_ts, from_state, to_state, sample_gateway, sample_mx, sample_ipsec)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                office_id,
                at_ts,
                from_state,
                to_state.as_str(),
                sample_gateway,
                sample_mx,
                sample_ipsec,
            ],
        )?;
        Ok(inserted as u64)
    }

    /// Persists one raw sample per tick entry. Fails atomically with
    /// `UnknownOffice` on the first unregistered name; no rows are
    /// committed in that case.
    pub fn ingest_tick_batch(&self, entries: &[TickEntry]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut count = 0usize;
        for entry in entries {
            let office_id = Self::office_id(&tx, &entry.office)?;
            tx.execute(
                "INSERT INTO samples (office_id, ts, gateway, mx, ipsec) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![office_id, entry.ts, entry.gateway, entry.mx, entry.ipsec],
            )?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// Lists the office registry with no filtering. Additive read surface,
    /// not named by any ingest contract but harmless to expose.
    pub fn list_offices(&self) -> Result<Vec<OfficeRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, gateway_ip, mx_ip, tunnel_probe_ip, retries_down, retries_up FROM offices ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OfficeRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    gateway_ip: row.get(2)?,
                    mx_ip: row.get(3)?,
                    tunnel_probe_ip: row.get(4)?,
                    retries_down: row.get(5)?,
                    retries_up: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(rows)
    }

    pub fn query_sla(
        &self,
        office: Option<&str>,
        t_start: i64,
        t_end: i64,
    ) -> Result<SlaResponse, StoreError> {
        let conn = self.conn.lock();
        Ok(sla::query(&conn, office, t_start, t_end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_office() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_office("hq", "10.0.0.1", "10.0.0.2", "10.0.0.3", 2, 1)
            .unwrap();
        store
    }

    #[test]
    fn upsert_office_is_idempotent_and_stable() {
        let store = store_with_office();
        let id1 = store
            .upsert_office("hq", "10.0.0.1", "10.0.0.2", "10.0.0.3", 2, 1)
            .unwrap();
        let id2 = store
            .upsert_office("hq", "10.0.0.9", "10.0.0.2", "10.0.0.3", 4, 1)
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn ingest_state_change_unknown_office_errors() {
        let store = Store::open_in_memory().unwrap();
        let result = store.ingest_state_change("ghost", State::Up, true, true, true, 1);
        assert!(matches!(result, Err(StoreError::UnknownOffice(_))));
    }

    /// Scenario 2: duplicate state change submission is idempotent.
    #[test]
    fn scenario_two_duplicate_suppression() {
        let store = store_with_office();
        let inserted1 = store
            .ingest_state_change("hq", State::Down, false, false, true, 100)
            .unwrap();
        assert_eq!(inserted1, 1);

        let inserted2 = store
            .ingest_state_change("hq", State::Up, true, true, true, 200)
            .unwrap();
        assert_eq!(inserted2, 1);

        let inserted3 = store
            .ingest_state_change("hq", State::Degraded, true, true, false, 200)
            .unwrap();
        assert_eq!(inserted3, 0);

        let conn = store.conn.lock();
        let mut stmt = conn
            .prepare("SELECT from_state, to_state, at_ts FROM state_changes ORDER BY at_ts")
            .unwrap();
        let rows: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                ("unknown".to_string(), "down".to_string(), 100),
                ("down".to_string(), "up".to_string(), 200),
            ]
        );
    }

    /// Scenario 1: basic window aggregation.
    #[test]
    fn scenario_one_basic_window() {
        let store = store_with_office();
        store.ingest_state_change("hq", State::Down, false, false, true, 0).unwrap();
        store
            .ingest_state_change("hq", State::Degraded, true, false, false, 30)
            .unwrap();
        store.ingest_state_change("hq", State::Up, true, true, true, 90).unwrap();

        let response = store.query_sla(Some("hq"), 10, 150).unwrap();
        assert_eq!(response.sla.len(), 1);
        let entry = &response.sla[0];
        assert_eq!(entry.sec_down, 20);
        assert_eq!(entry.sec_deg, 60);
        assert_eq!(entry.sec_up, 60);
        assert_eq!(entry.sec_total, 140);
        assert_eq!(entry.current_state, State::Up);
        assert_eq!(entry.previous_state, State::Degraded);
        assert!((entry.uptime_strict - 0.428571).abs() < 1e-6);
        assert!((entry.uptime_lenient - 0.857143).abs() < 1e-6);
    }

    /// Scenario 6: office with no state changes yields an empty SLA list.
    #[test]
    fn scenario_six_empty_sla() {
        let store = store_with_office();
        let response = store.query_sla(Some("hq"), 0, 100).unwrap();
        assert!(response.sla.is_empty());
    }

    #[test]
    fn tick_batch_fails_atomically_on_unknown_office() {
        let store = store_with_office();
        let entries = vec![
            TickEntry {
                office: "hq".to_string(),
                gateway: true,
                mx: true,
                ipsec: true,
                ts: 1,
            },
            TickEntry {
                office: "ghost".to_string(),
                gateway: true,
                mx: true,
                ipsec: true,
                ts: 2,
            },
        ];
        let result = store.ingest_tick_batch(&entries);
        assert!(matches!(result, Err(StoreError::UnknownOffice(_))));

        let conn = store.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 0, "partial batch must not commit any row");
    }
}
