//! Resume cursor: which years still need collecting
//!
//! The cursor is derived from the latest stored accident date. The year of
//! that date is revisited in full because it may have been only partly
//! collected; with upsert writes this is harmless, with plain appends it
//! duplicates that year's already-stored rows.

use crate::crawler::discovery::discover_years;
use crate::crawler::fetcher::SiteClient;
use crate::record::YearToken;
use crate::storage::{Storage, StorageResult};
use crate::HarvestError;
use chrono::{Datelike, NaiveDate};

/// Latest stored position, `(None, None)` for an empty store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeCursor {
    pub last_year: Option<i32>,
    pub last_date: Option<NaiveDate>,
}

impl ResumeCursor {
    /// Reads the cursor from the store's maximum `Date`
    pub fn from_storage(storage: &dyn Storage) -> StorageResult<Self> {
        let last_date = storage.max_date()?;
        Ok(Self {
            last_year: last_date.map(|d| d.year()),
            last_date,
        })
    }

    /// Years `[last_year, upper_bound)`, or `None` if nothing is stored yet
    ///
    /// An empty vector means the store already reaches the upper bound.
    pub fn window(&self, upper_bound: i32) -> Option<Vec<YearToken>> {
        self.last_year
            .map(|start| (start..upper_bound).map(YearToken::from).collect())
    }
}

/// Resolves the year set for a cursor, discovering years if the store was empty
pub async fn resolve_years(
    cursor: ResumeCursor,
    client: &SiteClient,
    upper_bound: i32,
) -> Result<Vec<YearToken>, HarvestError> {
    match cursor.window(upper_bound) {
        Some(years) => {
            tracing::info!(
                "Last stored date {:?}; resuming with {} years up to {} (exclusive)",
                cursor.last_date,
                years.len(),
                upper_bound
            );
            Ok(years)
        }
        None => {
            tracing::info!("Store is empty; discovering years from landing page");
            discover_years(client).await
        }
    }
}

/// Computes the set of years a run should (re-)process
///
/// # Arguments
///
/// * `storage` - Store to read the latest date from
/// * `client` - Used for year discovery when the store is empty
/// * `upper_bound` - Exclusive end year of the resume window
pub async fn compute_resume_window(
    storage: &dyn Storage,
    client: &SiteClient,
    upper_bound: i32,
) -> Result<Vec<YearToken>, HarvestError> {
    let cursor = ResumeCursor::from_storage(storage)?;
    resolve_years(cursor, client, upper_bound).await
}

/// Orders years for visiting: numeric tokens ascending, others after in their original order
///
/// Resuming from the latest stored date assumes years are visited in
/// non-decreasing order, while discovery returns document order.
pub fn order_years(mut years: Vec<YearToken>) -> Vec<YearToken> {
    years.sort_by_key(|year| match year.as_year() {
        Some(value) => (false, value),
        None => (true, 0),
    });
    years
}
