//! Schema creation and idempotent evolution, grounded on the
//! check-then-`ALTER TABLE` migration pattern common to embedded-SQLite
//! services in this stack.

use rusqlite::Connection;

const CREATE_OFFICES: &str = "
CREATE TABLE IF NOT EXISTS offices (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    gateway_ip TEXT NOT NULL,
    mx_ip TEXT NOT NULL,
    tunnel_probe_ip TEXT NOT NULL
)";

const CREATE_STATE_CHANGES: &str = "
CREATE TABLE IF NOT EXISTS state_changes (
    id INTEGER PRIMARY KEY,
    office_id INTEGER NOT NULL REFERENCES offices(id),
    at_ts INTEGER NOT NULL,
    from_state TEXT NOT NULL,
    to_state TEXT NOT NULL,
    sample_gateway INTEGER NOT NULL,
    sample_mx INTEGER NOT NULL,
    sample_ipsec INTEGER NOT NULL,
    UNIQUE (office_id, at_ts)
)";

const CREATE_STATE_CHANGES_IDX: &str =
    "CREATE INDEX IF NOT EXISTS idx_state_changes_office_ts ON state_changes (office_id, at_ts)";

const CREATE_SAMPLES: &str = "
CREATE TABLE IF NOT EXISTS samples (
    id INTEGER PRIMARY KEY,
    office_id INTEGER NOT NULL REFERENCES offices(id),
    ts INTEGER NOT NULL,
    gateway INTEGER NOT NULL,
    mx INTEGER NOT NULL,
    ipsec INTEGER NOT NULL
)";

const CREATE_SAMPLES_IDX: &str = "CREATE INDEX IF NOT EXISTS idx_samples_office_ts ON samples (office_id, ts)";

pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(&format!(
        "{CREATE_OFFICES}; {CREATE_STATE_CHANGES}; {CREATE_STATE_CHANGES_IDX}; {CREATE_SAMPLES}; {CREATE_SAMPLES_IDX};"
    ))?;

    ensure_retry_columns(conn)?;
    Ok(())
}

/// Adds `retries_down`/`retries_up` to a pre-existing `offices` table,
/// defaulting existing rows to 2/1 per the documented schema evolution.
fn ensure_retry_columns(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('offices')")?;
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    if !columns.iter().any(|c| c == "retries_down") {
        conn.execute(
            "ALTER TABLE offices ADD COLUMN retries_down INTEGER NOT NULL DEFAULT 2",
            [],
        )?;
    }
    if !columns.iter().any(|c| c == "retries_up") {
        conn.execute(
            "ALTER TABLE offices ADD COLUMN retries_up INTEGER NOT NULL DEFAULT 1",
            [],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('offices')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(columns.contains(&"retries_down".to_string()));
        assert!(columns.contains(&"retries_up".to_string()));
    }
}
