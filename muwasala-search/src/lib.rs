//! # muwasala-search
//!
//! Resilient multi-source knowledge search.
//!
//! One query is classified, routed to the knowledge sources that suit its
//! topics, fanned out concurrently and merged into a single ranked page
//! with a synthesised answer. The caller always gets an answer before the
//! search deadline, whatever state the sources are in.
//!
//! ## Design
//!
//! - Every source call goes through a per-source circuit breaker and a
//!   per-group concurrency limit
//! - The live round has its own deadline; stragglers are abandoned
//! - Too few usable live results trigger a tiered fallback: static answers,
//!   then a secondary search, then a guaranteed minimal response
//! - Results are ranked by `relevance × authenticity`, deduplicated and paged
//! - Live, successful responses are cached with a TTL
//! - Completed searches are queued to a history sink without blocking
//!
//! ## Security
//!
//! - No network listeners: this is a library
//! - Raw query text is logged only at trace level

pub mod aggregator;
pub mod cache;
pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fallback;
pub mod history;
pub mod http;
pub mod orchestrator;
pub mod rate_limit;
pub mod routing;
pub mod source;
pub mod sources;
pub mod types;

pub use aggregator::{Aggregator, AggregatorBuilder, HealthReport, HealthStatus, SourceHealth};
pub use cache::{CacheConfig, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use collaborators::{QueryClassifier, RawClassifier, TextSynthesizer};
pub use config::{AggregatorConfig, FallbackConfig, SynthesisConfig, TimeoutConfig};
pub use error::{Result, SearchError};
pub use fallback::{
    CorpusDocument, FallbackCascade, FallbackOutcome, GuaranteedEntry, GuaranteedResponder, LocalCorpusSearch,
    SecondarySearch, StaticCache, StaticEntry, TieredFallback,
};
pub use history::{HistoryQueue, HistoryRecord, HistorySink, TracingHistorySink};
pub use orchestrator::{FanOutCoordinator, FanOutOutcome, Ranker, RankerConfig};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use routing::{SkipReason, TopicRouter};
pub use source::{SourceAdapter, SourceRegistry};
pub use types::{
    AdapterKind, AggregatedResponse, CandidateResult, ContentKind, QueryContext, ResponseOrigin, SearchRequest,
    SourceDescriptor,
};

/// Answer `query` with the built-in sources and no synthesizer.
///
/// Convenience wrapper for one-off searches. Long-running callers should
/// build an [`Aggregator`] once and reuse it, so circuit state and the
/// response cache carry over between searches.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an empty query.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> muwasala_search::Result<()> {
/// let response = muwasala_search::search_default("conditions of zakat", "en").await?;
/// for result in &response.results {
///     println!("{}: {}", result.title, result.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_default(query: &str, language: &str) -> Result<AggregatedResponse> {
    let aggregator = Aggregator::builder(AggregatorConfig::default()).build()?;
    let cancel = tokio_util::sync::CancellationToken::new();
    aggregator
        .search(SearchRequest::new(query, language, 0), &cancel)
        .await
}
