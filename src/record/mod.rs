//! Accident records and their normalization
//!
//! A listing row arrives as eight raw strings. It becomes an
//! [`AccidentRecord`] only if its date survives [`normalize_date`]; rows with
//! an unparseable date are dropped rather than stored with a placeholder.

mod date;

pub use date::{normalize_date, DATE_FORMAT};

use chrono::{Datelike, NaiveDate};
use std::fmt;

/// Year label exposed by the registry, used verbatim in listing URLs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct YearToken(String);

impl YearToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the token, if it is a plain year number
    pub fn as_year(&self) -> Option<i32> {
        self.0.trim().parse().ok()
    }
}

impl From<i32> for YearToken {
    fn from(year: i32) -> Self {
        Self(year.to_string())
    }
}

impl From<&str> for YearToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for YearToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One data row of a listing table, cells in listing column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub date: String,
    pub aircraft_type: String,
    pub registration: String,
    pub operator: String,
    pub fatalities: String,
    pub location: String,
    pub flag: String,
    pub damage: String,
}

/// A normalized accident record as written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccidentRecord {
    pub date: NaiveDate,
    pub aircraft_type: String,
    pub registration: String,
    pub operator: String,
    /// Kept as text; the registry mixes counts with qualifiers like "2+1"
    pub fatalities: String,
    pub location: String,
    pub flag: String,
    pub damage: String,
}

impl AccidentRecord {
    /// Builds a record from a raw row, or `None` if the date is rejected
    pub fn from_raw(row: RawRow) -> Option<Self> {
        let date = normalize_date(&row.date)?;
        Some(Self {
            date,
            aircraft_type: row.aircraft_type,
            registration: row.registration,
            operator: row.operator,
            fatalities: row.fatalities,
            location: row.location,
            flag: row.flag,
            damage: row.damage,
        })
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// Result of normalizing one page worth of rows
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<AccidentRecord>,
    /// Rows dropped because their date did not normalize
    pub rejected: usize,
}

/// Filters raw rows through the date normalizer
pub fn from_rows(rows: Vec<RawRow>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for row in rows {
        let raw_date = row.date.clone();
        match AccidentRecord::from_raw(row) {
            Some(record) => batch.records.push(record),
            None => {
                tracing::debug!("Dropping row with unparseable date '{}'", raw_date);
                batch.rejected += 1;
            }
        }
    }
    batch
}
