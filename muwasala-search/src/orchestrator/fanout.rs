//! Parallel dispatch of one query to every routed source under a shared
//! deadline.
//!
//! # Pipeline
//!
//! 1. Route: the [`TopicRouter`] picks sources by topic and language
//! 2. Sources whose circuit is open are skipped without a task
//! 3. Each remaining source gets its own task in a [`JoinSet`]: acquire a
//!    rate-limit permit, then call the adapter through the circuit breaker
//!    with `min(source timeout, time left in the round)`
//! 4. Results are gathered until every task finishes or the round deadline
//!    passes; stragglers are cancelled and aborted
//!
//! All tasks share one child of the caller's cancellation token, so a
//! caller cancel or the round deadline reaches every in-flight call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{Result, SearchError};
use crate::rate_limit::RateLimiter;
use crate::routing::{SkipReason, TopicRouter};
use crate::source::{call_timeout, SourceRegistry};
use crate::types::{CandidateResult, QueryContext};

/// Extra time after the round deadline before unfinished tasks are
/// aborted. Per-call budgets already end at the deadline; this only lets
/// those calls record their timeout with the breaker.
const ABANDON_GRACE: Duration = Duration::from_millis(50);

/// What one fan-out round produced.
#[derive(Debug, Default)]
pub struct FanOutOutcome {
    /// Candidates from every source that answered in time, grouped by
    /// source in registration order.
    pub candidates: Vec<CandidateResult>,
    /// Candidates contributed by each invoked source (zero included).
    pub per_source: BTreeMap<String, usize>,
    /// Sources that were called.
    pub invoked: Vec<String>,
    /// Sources that were not called, with the reason.
    pub skipped: Vec<(String, SkipReason)>,
    /// Invoked sources that ran out of time.
    pub timed_out: Vec<String>,
}

enum TaskStatus {
    Completed,
    TimedOut,
    Cancelled,
}

struct TaskReport {
    index: usize,
    name: String,
    candidates: Vec<CandidateResult>,
    status: TaskStatus,
}

/// Runs fan-out rounds over a fixed set of sources.
pub struct FanOutCoordinator {
    registry: SourceRegistry,
    router: TopicRouter,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    default_source_timeout: Duration,
}

impl FanOutCoordinator {
    /// Create a coordinator. `default_source_timeout` applies to sources
    /// whose descriptor sets no timeout of its own.
    pub fn new(
        registry: SourceRegistry,
        router: TopicRouter,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
        default_source_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            router,
            breaker,
            limiter,
            default_source_timeout,
        }
    }

    /// The registered sources.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Query every routed source for `ctx`, giving up on stragglers after
    /// `deadline`.
    ///
    /// Source failures and timeouts are absorbed: they show up as missing
    /// candidates and circuit failures, never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires before the round
    /// completes.
    pub async fn run(
        &self,
        ctx: &QueryContext,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<FanOutOutcome> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let round_deadline = Instant::now() + deadline;
        let round_token = cancel.child_token();
        let shared_ctx = Arc::new(ctx.clone());

        let selection = self.router.select(ctx, self.registry.adapters());
        let mut outcome = FanOutOutcome {
            skipped: selection.skipped,
            ..FanOutOutcome::default()
        };

        let mut tasks = JoinSet::new();
        for (index, adapter) in selection.selected.into_iter().enumerate() {
            let name = adapter.name().to_owned();
            if !self.breaker.is_available(&name) {
                tracing::debug!(source = %name, "circuit open, source skipped");
                outcome.skipped.push((name, SkipReason::CircuitOpen));
                continue;
            }
            outcome.invoked.push(name.clone());
            outcome.per_source.insert(name.clone(), 0);

            let source_timeout = call_timeout(adapter.descriptor(), self.default_source_timeout);
            let group = adapter.descriptor().rate_limit_group.clone();
            let breaker = Arc::clone(&self.breaker);
            let limiter = Arc::clone(&self.limiter);
            let ctx = Arc::clone(&shared_ctx);
            let token = round_token.clone();

            tasks.spawn(async move {
                let report = |candidates, status| TaskReport {
                    index,
                    name: name.clone(),
                    candidates,
                    status,
                };
                // Waiting on a crowded group is local congestion, not a
                // source failure: the round deadline ends the wait without
                // touching the circuit.
                let _permit = match tokio::time::timeout_at(round_deadline, limiter.acquire(&group, &token)).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => return report(Vec::new(), TaskStatus::Cancelled),
                    Err(_) => {
                        tracing::debug!(source = %name, group = %group, "no rate-limit slot before round deadline");
                        return report(Vec::new(), TaskStatus::TimedOut);
                    }
                };
                let left = round_deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return report(Vec::new(), TaskStatus::TimedOut);
                }
                let budget = source_timeout.min(left);
                let started = Instant::now();
                let candidates = breaker
                    .execute_with_cancel(&name, || adapter.fetch(&ctx, &token), Vec::new(), budget, &token)
                    .await;
                let status = if token.is_cancelled() {
                    TaskStatus::Cancelled
                } else if started.elapsed() >= budget {
                    TaskStatus::TimedOut
                } else {
                    TaskStatus::Completed
                };
                report(candidates, status)
            });
        }

        let mut reports: Vec<TaskReport> = Vec::with_capacity(outcome.invoked.len());
        let abandon_at = tokio::time::sleep_until(round_deadline + ABANDON_GRACE);
        tokio::pin!(abandon_at);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    round_token.cancel();
                    tasks.abort_all();
                    tracing::debug!("fan-out cancelled by caller");
                    return Err(SearchError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(report)) => reports.push(report),
                    Some(Err(err)) => tracing::warn!(error = %err, "source task failed to complete"),
                    None => break,
                },
                _ = &mut abandon_at => {
                    round_token.cancel();
                    tasks.abort_all();
                    tracing::warn!(pending = tasks.len(), "fan-out deadline reached, abandoning sources");
                    break;
                }
            }
        }

        reports.sort_by_key(|r| r.index);
        for name in &outcome.invoked {
            if !reports.iter().any(|r| &r.name == name) {
                outcome.timed_out.push(name.clone());
            }
        }
        for report in reports {
            match report.status {
                TaskStatus::TimedOut => outcome.timed_out.push(report.name.clone()),
                TaskStatus::Cancelled | TaskStatus::Completed => {}
            }
            tracing::debug!(source = %report.name, count = report.candidates.len(), "source finished");
            outcome.per_source.insert(report.name, report.candidates.len());
            outcome.candidates.extend(report.candidates);
        }
        Ok(outcome)
    }
}
