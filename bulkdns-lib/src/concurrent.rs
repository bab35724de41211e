//! Bounded admission control for in-flight queries.
//!
//! [`ConcurrencyLimiter`] is a counting gate over a tokio semaphore. The
//! dispatcher acquires a [`ConcurrencySlot`] before it launches a query, so
//! a saturated limiter throttles work creation instead of piling up tasks.

use crate::error::BulkDnsError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Gate admitting at most `capacity` holders at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Permit for one in-flight query.
///
/// Dropping the slot returns it to the limiter, so a failing or panicking
/// query can't leak capacity.
#[derive(Debug)]
#[must_use = "a slot is released as soon as it is dropped"]
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots. Zero is raised to 1, which
    /// makes execution strictly sequential.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot is free and take it.
    ///
    /// # Errors
    ///
    /// Only if the underlying semaphore was closed, which this type never
    /// does.
    pub async fn acquire(&self) -> Result<ConcurrencySlot, BulkDnsError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BulkDnsError::internal("concurrency limiter closed"))?;
        Ok(ConcurrencySlot { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<ConcurrencySlot> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| ConcurrencySlot { _permit: permit })
    }

    /// Configured number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

impl ConcurrencySlot {
    /// Give the slot back. Equivalent to dropping it.
    pub fn release(self) {}
}
