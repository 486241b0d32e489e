//! Bounded fan-out for listing page fetches
//!
//! A single semaphore caps how many listing fetches are outstanding at once,
//! whatever a year's page count. The cancellation token is checked while
//! waiting for a slot so a shutdown stops pages that have not started yet.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Hands out fetch slots until the run is cancelled
#[derive(Debug, Clone)]
pub struct PageScheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl PageScheduler {
    /// Creates a scheduler allowing `max_concurrent` simultaneous fetches
    pub fn new(max_concurrent: u32, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1) as usize)),
            cancel,
        }
    }

    /// Waits for a fetch slot
    ///
    /// Returns `None` if the run is cancelled before a slot frees up. The
    /// slot is released when the permit is dropped.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of currently free fetch slots
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}
