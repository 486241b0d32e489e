//! Statistics over the accident store
//!
//! Used by `--stats` to show what previous runs collected without touching
//! the network.

use crate::storage::{RunRecord, Storage, StorageResult};
use chrono::NaiveDate;

/// How many recent runs are listed
const RECENT_RUNS: usize = 5;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of stored accident records
    pub total_records: u64,

    /// Earliest and latest stored dates
    pub date_range: Option<(NaiveDate, NaiveDate)>,

    /// Record count per calendar year, ascending
    pub per_year: Vec<(i32, u64)>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_records: storage.count_records()?,
        date_range: storage.date_range()?,
        per_year: storage.count_by_year()?,
        recent_runs: storage.recent_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    match stats.date_range {
        Some((first, last)) => println!("  Date range: {} to {}", first, last),
        None => println!("  Date range: (empty store)"),
    }
    println!();

    if !stats.per_year.is_empty() {
        println!("Records by Year:");
        for (year, count) in &stats.per_year {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", year, count, percentage);
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} [{}] pages ok {}, failed {}, records +{} ~{}",
                run.id,
                run.started_at,
                run.status.to_db_string(),
                run.totals.pages_ok,
                run.totals.pages_failed,
                run.totals.records_inserted,
                run.totals.records_updated
            );
        }
    }
}
