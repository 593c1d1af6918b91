//! Concurrency limiting for outbound source calls.
//!
//! Each rate-limit group owns a counting semaphore. A call acquires a
//! [`RatePermit`] before it goes out and the permit is released when it is
//! dropped, so success, failure, timeout and task abort all give the slot
//! back.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Rate limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Concurrent calls allowed in a group with no explicit limit.
    pub default_permits: usize,
    /// Per-group overrides.
    pub groups: BTreeMap<String, usize>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_permits: 5,
            groups: BTreeMap::new(),
        }
    }
}

/// A held slot in a rate-limit group. Dropping it frees the slot.
#[derive(Debug)]
pub struct RatePermit {
    group: String,
    _permit: OwnedSemaphorePermit,
}

impl RatePermit {
    /// The group this permit belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }
}

/// Per-group concurrent-call limiter.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    groups: RwLock<HashMap<String, Arc<Semaphore>>>,
}

impl RateLimiter {
    /// Create a limiter. Groups are created lazily on first use.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Wait for a free slot in `group`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, group: &str, cancel: &CancellationToken) -> Result<RatePermit, SearchError> {
        let semaphore = self.semaphore(group);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            permit = semaphore.acquire_owned() => {
                // The semaphore is never closed, so acquisition only fails if
                // that invariant is broken.
                let permit = permit.map_err(|_| SearchError::Config(format!("rate-limit group {group} closed")))?;
                Ok(RatePermit { group: group.to_owned(), _permit: permit })
            }
        }
    }

    /// Free slots in `group` right now.
    pub fn available(&self, group: &str) -> usize {
        self.semaphore(group).available_permits()
    }

    /// Configured capacity of `group`.
    pub fn capacity(&self, group: &str) -> usize {
        self.config
            .groups
            .get(group)
            .copied()
            .unwrap_or(self.config.default_permits)
            .max(1)
    }

    fn semaphore(&self, group: &str) -> Arc<Semaphore> {
        if let Some(existing) = self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
        {
            return Arc::clone(existing);
        }
        let capacity = self.capacity(group);
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            groups
                .entry(group.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(capacity))),
        )
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
