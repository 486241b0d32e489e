//! Storage module for persisting harvested records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema bootstrap
//! - Batch writes of accident records, optionally keyed for deduplication
//! - Queries the resume cursor and statistics rely on
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path, mode: WriteMode) -> Result<SqliteStorage, HarvestError> {
    Ok(SqliteStorage::new(path, mode)?)
}

/// Opens a database for queries only
///
/// The natural key is never installed on this path, so stored rows are
/// left exactly as they are whatever the configured write mode.
pub fn open_for_reading(path: &Path) -> Result<SqliteStorage, HarvestError> {
    open_storage(path, WriteMode::Append)
}

/// How repeated records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Plain insert; re-crawling a page duplicates its rows
    Append,
    /// Insert or update on the (Date, Registration, Operator) natural key
    Upsert,
}

impl WriteMode {
    pub fn from_deduplicate(deduplicate: bool) -> Self {
        if deduplicate {
            Self::Upsert
        } else {
            Self::Append
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// What one batch write did to the accident table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWrite {
    /// New rows
    pub inserted: usize,
    /// Existing rows whose non-key fields changed (upsert mode only)
    pub updated: usize,
}

/// Counters stored with a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub pages_ok: u64,
    pub pages_failed: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
