//! Tiered degradation when live sources give nothing usable.
//!
//! | Tier | Answer from | I/O |
//! |------|-------------|-----|
//! | 1 | [`StaticCache`] prepared answers | none |
//! | 2 | [`SecondarySearch`] under its own timeout | optional |
//! | 3 | [`GuaranteedResponder`] | none |
//!
//! A tier is tried only when the one before it produced nothing at or above
//! the relevance floor. Tier 3 always answers, so the cascade cannot fail.

pub mod guaranteed;
pub mod secondary;
pub mod static_cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::scoring::clamp_unit;
use crate::source::until_cancelled;
use crate::types::{CandidateResult, QueryContext, ResponseOrigin};

pub use guaranteed::{GuaranteedEntry, GuaranteedResponder};
pub use secondary::{CorpusDocument, LocalCorpusSearch, SecondarySearch};
pub use static_cache::{StaticCache, StaticEntry};

/// What the cascade produced.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// Candidates from the tier that answered.
    pub candidates: Vec<CandidateResult>,
    /// Which tier answered.
    pub tier: ResponseOrigin,
    /// Follow-up suggestions (tier 3 only).
    pub suggestions: Vec<String>,
}

/// Best-effort answer source used when the live round comes up short.
///
/// Implementations must always return an outcome. A cancelled `cancel`
/// means "no more I/O": skip slow tiers and answer immediately.
#[async_trait]
pub trait FallbackCascade: Send + Sync {
    /// Produce fallback candidates for `ctx`.
    async fn resolve(&self, ctx: &QueryContext, cancel: &CancellationToken) -> FallbackOutcome;
}

/// The standard three-tier cascade.
pub struct TieredFallback {
    static_cache: Arc<StaticCache>,
    secondary: Option<Arc<dyn SecondarySearch>>,
    secondary_timeout: Duration,
    guaranteed: GuaranteedResponder,
    relevance_floor: f64,
}

impl TieredFallback {
    /// A cascade with only tier 1 and tier 3.
    pub fn new(static_cache: Arc<StaticCache>, guaranteed: GuaranteedResponder, relevance_floor: f64) -> Self {
        Self {
            static_cache,
            secondary: None,
            secondary_timeout: Duration::from_secs(5),
            guaranteed,
            relevance_floor: clamp_unit(relevance_floor),
        }
    }

    /// Add a tier-2 search bounded by `timeout`.
    pub fn with_secondary(mut self, secondary: Arc<dyn SecondarySearch>, timeout: Duration) -> Self {
        self.secondary = Some(secondary);
        self.secondary_timeout = timeout;
        self
    }

    /// The tier-1 cache, for refreshing.
    pub fn static_cache(&self) -> &Arc<StaticCache> {
        &self.static_cache
    }

    fn usable(&self, candidates: &[CandidateResult]) -> bool {
        candidates
            .iter()
            .any(|c| clamp_unit(c.relevance_score) >= self.relevance_floor)
    }

    async fn try_secondary(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Option<Vec<CandidateResult>> {
        let secondary = self.secondary.as_ref()?;
        if cancel.is_cancelled() {
            return None;
        }
        let search = until_cancelled(cancel, secondary.search(ctx, cancel));
        match tokio::time::timeout(self.secondary_timeout, search).await {
            Ok(Ok(candidates)) => Some(candidates),
            Ok(Err(err)) => {
                tracing::warn!(search = secondary.name(), error = %err, "secondary search failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    search = secondary.name(),
                    timeout_ms = self.secondary_timeout.as_millis() as u64,
                    "secondary search timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl FallbackCascade for TieredFallback {
    async fn resolve(&self, ctx: &QueryContext, cancel: &CancellationToken) -> FallbackOutcome {
        let cached = self.static_cache.lookup(ctx);
        if self.usable(&cached) {
            tracing::debug!(count = cached.len(), "fallback answered from static cache");
            return FallbackOutcome {
                candidates: cached,
                tier: ResponseOrigin::StaticCache,
                suggestions: Vec::new(),
            };
        }

        if let Some(found) = self.try_secondary(ctx, cancel).await {
            if self.usable(&found) {
                tracing::debug!(count = found.len(), "fallback answered from secondary search");
                return FallbackOutcome {
                    candidates: found,
                    tier: ResponseOrigin::Secondary,
                    suggestions: Vec::new(),
                };
            }
        }

        let (result, suggestions) = self.guaranteed.respond(&ctx.language);
        tracing::debug!("fallback answered with guaranteed response");
        FallbackOutcome {
            candidates: vec![result],
            tier: ResponseOrigin::Guaranteed,
            suggestions,
        }
    }
}
