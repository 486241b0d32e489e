//! Accident-Harvest: an incremental aviation accident registry harvester
//!
//! This crate walks the year-by-year accident listings of a public registry,
//! extracts one record per table row, and persists them to SQLite so that
//! later runs resume from what is already stored instead of starting over.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Accident-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Run aborted after page failure: {0}")]
    Aborted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Transport-level failures while talking to the registry
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },

    #[error("Failed to build URL: {0}")]
    Url(#[from] ::url::ParseError),
}

/// Markup that does not have the shape the extractor expects
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Navigation region '{0}' not found on landing page")]
    MissingRegion(&'static str),

    #[error("Accident table not found on listing page")]
    TableNotFound,

    #[error("Header row has {found} columns, expected {expected}")]
    HeaderMismatch { expected: usize, found: usize },

    #[error("Invalid selector '{0}'")]
    Selector(&'static str),
}

impl ExtractionError {
    /// Soft conditions are logged and yield zero records; the page still counts as done
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::TableNotFound)
    }
}

/// Result type alias for Accident-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Coordinator};
pub use output::CrawlReport;
pub use record::{normalize_date, AccidentRecord, RawRow, YearToken};
pub use state::CrawlPhase;
pub use storage::{SqliteStorage, Storage, WriteMode};
