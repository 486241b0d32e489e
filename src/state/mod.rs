//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: where a run is in its lifecycle, with validated transitions
//! - `PageOutcome` / `PageFailure`: what happened to one listing page

mod page_outcome;
mod phase;

// Re-export main types
pub use page_outcome::{FailureKind, PageFailure, PageOutcome};
pub use phase::{CrawlPhase, PhaseTracker};
