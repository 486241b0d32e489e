//! Crawler module for registry fetching and processing
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching against the registry
//! - Markup extraction for years, page counts and accident rows
//! - Resume window computation from the store
//! - Bounded page fan-out and overall run coordination

mod coordinator;
mod discovery;
mod fetcher;
mod parser;
mod resume;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator};
pub use discovery::{count_pages, discover_years, YearListing};
pub use fetcher::{build_http_client, SiteClient};
pub use parser::{
    count_pages_in, extract_rows, extract_years, ExtractedTable, COLUMN_COUNT, LISTING_COLUMNS,
    MARKUP_VERSION,
};
pub use resume::{compute_resume_window, order_years, resolve_years, ResumeCursor};
pub use scheduler::PageScheduler;
