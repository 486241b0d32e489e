//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::AccidentRecord;
use crate::storage::schema::{initialize_schema, install_natural_key};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{BatchWrite, RunRecord, RunStatus, RunTotals, WriteMode};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Column format for the `Date` column; sorts lexically in date order
const DB_DATE_FORMAT: &str = "%Y-%m-%d";

const INSERT_SQL: &str = "INSERT INTO accidents
     (Date, AircraftType, Registration, Operator, Fatalities, Location, Flag, Dmg)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const UPSERT_SQL: &str = "INSERT INTO accidents
     (Date, AircraftType, Registration, Operator, Fatalities, Location, Flag, Dmg)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(Date, Registration, Operator) DO UPDATE SET
         AircraftType = excluded.AircraftType,
         Fatalities = excluded.Fatalities,
         Location = excluded.Location,
         Flag = excluded.Flag,
         Dmg = excluded.Dmg
     WHERE AircraftType IS NOT excluded.AircraftType
        OR Fatalities IS NOT excluded.Fatalities
        OR Location IS NOT excluded.Location
        OR Flag IS NOT excluded.Flag
        OR Dmg IS NOT excluded.Dmg";

const COUNT_SQL: &str = "SELECT COUNT(*) FROM accidents";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status,
     pages_ok, pages_failed, records_inserted, records_updated";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    mode: WriteMode,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `mode` - Whether writes deduplicate on the natural key
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open or bootstrap the database
    pub fn new(path: &Path, mode: WriteMode) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::bootstrap(conn, mode)
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory(mode: WriteMode) -> StorageResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?, mode)
    }

    fn bootstrap(conn: Connection, mode: WriteMode) -> StorageResult<Self> {
        initialize_schema(&conn)?;

        if mode == WriteMode::Upsert {
            let conflicts = install_natural_key(&conn)?;
            if conflicts > 0 {
                return Err(StorageError::ConstraintViolation(format!(
                    "{} (Date, Registration, Operator) keys are stored more than once; \
                     set deduplicate = false to keep appending to this database",
                    conflicts
                )));
            }
        }

        Ok(Self { conn, mode })
    }

    fn parse_db_date(text: &str) -> StorageResult<NaiveDate> {
        NaiveDate::parse_from_str(text, DB_DATE_FORMAT).map_err(|e| {
            StorageError::Serialization(format!("Invalid stored date '{}': {}", text, e))
        })
    }

    fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RunStatus::Running),
            totals: RunTotals {
                pages_ok: row.get::<_, i64>(5)? as u64,
                pages_failed: row.get::<_, i64>(6)? as u64,
                records_inserted: row.get::<_, i64>(7)? as u64,
                records_updated: row.get::<_, i64>(8)? as u64,
            },
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Accident Records =====

    fn append_batch(&mut self, records: &[AccidentRecord]) -> StorageResult<BatchWrite> {
        if records.is_empty() {
            return Ok(BatchWrite::default());
        }

        let sql = match self.mode {
            WriteMode::Append => INSERT_SQL,
            WriteMode::Upsert => UPSERT_SQL,
        };

        let tx = self.conn.transaction()?;
        let rows_before: i64 = tx.query_row(COUNT_SQL, [], |row| row.get(0))?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for record in records {
                changed += stmt.execute(params![
                    record.date.format(DB_DATE_FORMAT).to_string(),
                    record.aircraft_type,
                    record.registration,
                    record.operator,
                    record.fatalities,
                    record.location,
                    record.flag,
                    record.damage,
                ])?;
            }
        }
        let rows_after: i64 = tx.query_row(COUNT_SQL, [], |row| row.get(0))?;
        tx.commit()?;

        // A guarded upsert reports one change per new or modified row
        let inserted = (rows_after - rows_before) as usize;
        Ok(BatchWrite {
            inserted,
            updated: changed - inserted,
        })
    }

    fn max_date(&self) -> StorageResult<Option<NaiveDate>> {
        let max: Option<String> =
            self.conn
                .query_row("SELECT MAX(Date) FROM accidents", [], |row| row.get(0))?;

        max.as_deref().map(Self::parse_db_date).transpose()
    }

    fn date_range(&self) -> StorageResult<Option<(NaiveDate, NaiveDate)>> {
        let (min, max): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(Date), MAX(Date) FROM accidents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        match (min, max) {
            (Some(min), Some(max)) => Ok(Some((
                Self::parse_db_date(&min)?,
                Self::parse_db_date(&max)?,
            ))),
            _ => Ok(None),
        }
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row(COUNT_SQL, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_year(&self) -> StorageResult<Vec<(i32, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(substr(Date, 1, 4) AS INTEGER) AS year, COUNT(*)
             FROM accidents
             GROUP BY year
             ORDER BY year",
        )?;

        let years = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i32>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(years)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                Self::run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map(params![limit as i64], Self::run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
             pages_ok = ?3, pages_failed = ?4, records_inserted = ?5, records_updated = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.pages_ok as i64,
                totals.pages_failed as i64,
                totals.records_inserted as i64,
                totals.records_updated as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}
