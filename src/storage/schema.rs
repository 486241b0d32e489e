//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Accident-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Accident records, one row per listing row
CREATE TABLE IF NOT EXISTS accidents (
    Date TEXT NOT NULL,
    AircraftType TEXT NOT NULL,
    Registration TEXT NOT NULL,
    Operator TEXT NOT NULL,
    Fatalities TEXT NOT NULL,
    Location TEXT NOT NULL,
    Flag TEXT NOT NULL,
    Dmg TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accidents_date ON accidents(Date);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_ok INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0,
    records_updated INTEGER NOT NULL DEFAULT 0
);
"#;

/// Counts natural keys shared by more than one stored row
pub const KEY_CONFLICTS_SQL: &str = r#"
SELECT COUNT(*) FROM (
    SELECT 1 FROM accidents
    GROUP BY Date, Registration, Operator
    HAVING COUNT(*) > 1
);
"#;

/// Unique index backing upserts on (Date, Registration, Operator)
pub const NATURAL_KEY_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_accidents_natural_key
    ON accidents(Date, Registration, Operator);
"#;

/// Initializes the database schema
///
/// Every statement is create-if-absent, so this is safe to run on each open.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Installs the natural key index if the stored rows allow it
///
/// Stored rows are never rewritten here. If rows from naive appends already
/// share a key the index is not created.
///
/// # Returns
///
/// * `Ok(0)` - Index present
/// * `Ok(n)` - `n` keys are shared by several rows; no index was created
pub fn install_natural_key(conn: &rusqlite::Connection) -> Result<u64, rusqlite::Error> {
    let conflicts: i64 = conn.query_row(KEY_CONFLICTS_SQL, [], |row| row.get(0))?;
    if conflicts > 0 {
        return Ok(conflicts as u64);
    }
    conn.execute_batch(NATURAL_KEY_SQL)?;
    Ok(0)
}
