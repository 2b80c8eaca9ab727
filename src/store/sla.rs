//! The SLA query: event-sourced state-interval reconstruction and windowed
//! aggregation, translated directly from the CTE pipeline of the reference
//! implementation this system's semantics were distilled from.

use crate::core::network::types::State;
use rusqlite::{named_params, Connection};
use serde::Serialize;

const SLA_QUERY: &str = "
WITH sc AS (
    SELECT office_id, id, at_ts, from_state, to_state,
           LEAD(at_ts) OVER (PARTITION BY office_id ORDER BY at_ts, id) AS next_ts
    FROM state_changes
    WHERE at_ts <= :t_end
),
scw AS (
    SELECT office_id, to_state AS seg_state,
           MAX(at_ts, :t_start) AS seg_start,
           MIN(COALESCE(next_ts, :t_end), :t_end) AS seg_end
    FROM sc
    WHERE COALESCE(next_ts, :t_end) > :t_start
),
sla AS (
    SELECT office_id, seg_state, SUM(seg_end - seg_start) AS secs
    FROM scw
    GROUP BY office_id, seg_state
),
latest AS (
    SELECT office_id, to_state, from_state, at_ts,
           ROW_NUMBER() OVER (PARTITION BY office_id ORDER BY at_ts DESC, id DESC) AS rn
    FROM state_changes
    WHERE at_ts <= :t_end
),
latest_samples AS (
    SELECT office_id, gateway, mx, ipsec, ts,
           ROW_NUMBER() OVER (PARTITION BY office_id ORDER BY ts DESC, id DESC) AS rn
    FROM samples
    WHERE ts <= :t_end
)
SELECT
    o.name,
    COALESCE((SELECT secs FROM sla WHERE office_id = o.id AND seg_state = 'up'), 0) AS sec_up,
    COALESCE((SELECT secs FROM sla WHERE office_id = o.id AND seg_state = 'degraded'), 0) AS sec_deg,
    COALESCE((SELECT secs FROM sla WHERE office_id = o.id AND seg_state = 'down'), 0) AS sec_down,
    l.to_state AS current_state,
    l.at_ts AS current_at,
    l.from_state AS previous_state,
    ls.gateway AS latest_gateway,
    ls.mx AS latest_mx,
    ls.ipsec AS latest_ipsec,
    ls.ts AS latest_ts
FROM offices o
JOIN latest l ON l.office_id = o.id AND l.rn = 1
LEFT JOIN latest_samples ls ON ls.office_id = o.id AND ls.rn = 1
WHERE (:office IS NULL OR o.name = :office)
ORDER BY o.name ASC
";

#[derive(Debug, Clone, Serialize)]
pub struct SlaWindow {
    pub t_start: i64,
    pub t_end: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlaEntry {
    pub office: String,
    pub sec_up: i64,
    pub sec_deg: i64,
    pub sec_down: i64,
    pub sec_total: i64,
    pub uptime_strict: f64,
    pub uptime_lenient: f64,
    pub current_state: State,
    pub current_at: i64,
    pub previous_state: State,
    pub latest_sample: Option<LatestSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestSample {
    pub gateway: bool,
    pub mx: bool,
    pub ipsec: bool,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlaResponse {
    pub window: SlaWindow,
    pub sla: Vec<SlaEntry>,
}

fn parse_state(s: &str) -> State {
    match s {
        "up" => State::Up,
        "degraded" => State::Degraded,
        "down" => State::Down,
        _ => State::Unknown,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn query(
    conn: &Connection,
    office: Option<&str>,
    t_start: i64,
    t_end: i64,
) -> rusqlite::Result<SlaResponse> {
    let sec_total = (t_end - t_start).max(1) as f64;

    let mut stmt = conn.prepare(SLA_QUERY)?;
    let rows = stmt.query_map(
        named_params! {
            ":t_start": t_start,
            ":t_end": t_end,
            ":office": office,
        },
        |row| {
            let sec_up: i64 = row.get("sec_up")?;
            let sec_deg: i64 = row.get("sec_deg")?;
            let sec_down: i64 = row.get("sec_down")?;
            let current_state: String = row.get("current_state")?;
            let previous_state: String = row.get("previous_state")?;
            let latest_gateway: Option<i64> = row.get("latest_gateway")?;
            let latest_mx: Option<i64> = row.get("latest_mx")?;
            let latest_ipsec: Option<i64> = row.get("latest_ipsec")?;
            let latest_ts: Option<i64> = row.get("latest_ts")?;

            let latest_sample = match (latest_gateway, latest_mx, latest_ipsec, latest_ts) {
                (Some(gw), Some(mx), Some(ipsec), Some(ts)) => Some(LatestSample {
                    gateway: gw != 0,
                    mx: mx != 0,
                    ipsec: ipsec != 0,
                    ts,
                }),
                _ => None,
            };

            Ok(SlaEntry {
                office: row.get("name")?,
                sec_up,
                sec_deg,
                sec_down,
                sec_total: sec_total as i64,
                uptime_strict: round6(sec_up as f64 / sec_total),
                uptime_lenient: round6((sec_up + sec_deg) as f64 / sec_total),
                current_state: parse_state(&current_state),
                current_at: row.get("current_at")?,
                previous_state: parse_state(&previous_state),
                latest_sample,
            })
        },
    )?;

    let sla = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(SlaResponse {
        window: SlaWindow { t_start, t_end },
        sla,
    })
}
