//! Run lifecycle phases
//!
//! ```text
//! Idle → ResolvingYears → { CountingPages → FetchingPages → Persisted }* → Done
//! ```

use crate::HarvestError;
use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Run constructed but not started
    Idle,

    /// Computing the resume window or discovering years
    ResolvingYears,

    /// Fetching page 1 of a year to learn its page count
    CountingPages,

    /// Page tasks for the current year are in flight
    FetchingPages,

    /// All page tasks for the current year have finished
    Persisted,

    /// All years visited, or the run was cancelled
    Done,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        use CrawlPhase::*;
        matches!(
            (self, next),
            (Idle, ResolvingYears)
                | (ResolvingYears, CountingPages)
                | (ResolvingYears, Done)
                | (CountingPages, FetchingPages)
                // page count failed; the year is skipped
                | (CountingPages, Persisted)
                | (CountingPages, Done)
                | (FetchingPages, Persisted)
                | (FetchingPages, Done)
                | (Persisted, CountingPages)
                | (Persisted, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingYears => "resolving_years",
            Self::CountingPages => "counting_pages",
            Self::FetchingPages => "fetching_pages",
            Self::Persisted => "persisted",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Holds the current phase and rejects illegal transitions
#[derive(Debug)]
pub struct PhaseTracker {
    current: CrawlPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: CrawlPhase::Idle,
        }
    }

    pub fn current(&self) -> CrawlPhase {
        self.current
    }

    /// Moves to `next`, or returns `InvalidTransition` leaving the phase unchanged
    pub fn advance(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.current.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::trace!("Phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
