//! The aggregator façade: one call that classifies, fans out, degrades,
//! ranks and synthesises under a single end-to-end deadline.
//!
//! # Pipeline
//!
//! 1. Classify the query (own timeout; raw-text context on failure)
//! 2. Serve from the response cache when possible
//! 3. Fan out to the routed sources
//! 4. Run the fallback cascade when too few live results clear the
//!    relevance floor
//! 5. Rank and page the final candidates
//! 6. Synthesise an answer from the top results through the circuit
//!    breaker under key [`SYNTHESIZER_KEY`]
//! 7. Log a summary, cache live successes, queue a history record
//!
//! Every stage's budget is the tighter of its own timeout and the time
//! left before the search deadline.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheKey, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::collaborators::{QueryClassifier, RawClassifier, TextSynthesizer};
use crate::config::AggregatorConfig;
use crate::error::{Result, SearchError};
use crate::fallback::{
    FallbackCascade, FallbackOutcome, GuaranteedResponder, LocalCorpusSearch, StaticCache, TieredFallback,
};
use crate::history::{HistoryQueue, HistoryRecord};
use crate::orchestrator::{FanOutCoordinator, RankedPage, Ranker};
use crate::rate_limit::RateLimiter;
use crate::routing::TopicRouter;
use crate::source::{until_cancelled, SourceAdapter, SourceRegistry};
use crate::types::{AggregatedResponse, CandidateResult, QueryContext, ResponseOrigin, SearchRequest};

/// Circuit-breaker key guarding the text synthesizer.
pub const SYNTHESIZER_KEY: &str = "synthesizer";

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every source circuit is closed.
    Healthy,
    /// Some source circuits are not closed.
    Degraded,
    /// No source circuit is closed.
    Unavailable,
}

/// Circuit condition of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHealth {
    /// Source name.
    pub name: String,
    /// Circuit state.
    pub state: CircuitState,
    /// Consecutive failures recorded.
    pub consecutive_failures: u32,
    /// Seconds until an open circuit admits a probe.
    pub retry_in_secs: Option<u64>,
}

/// Result of [`Aggregator::health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Per-source detail, in registration order.
    pub sources: Vec<SourceHealth>,
}

/// Canned answer used when synthesis is unavailable.
pub fn canned_apology(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("ar") {
        "عذرا، تعذر إعداد إجابة مكتوبة الآن. يمكنك مراجعة المصادر أدناه."
    } else {
        "Sorry, a written answer could not be prepared right now. Please review the sources below."
    }
}

/// Prompt sent to the synthesizer: the question plus numbered sources.
pub fn build_prompt(query: &str, results: &[CandidateResult]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the numbered sources below. \
         Cite sources by number. If the sources do not answer the question, say so.\n\n",
    );
    prompt.push_str(&format!("Question: {query}\n\nSources:\n"));
    for (i, result) in results.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} ({}, {})\n{}\n{}\n\n",
            i + 1,
            result.title,
            result.source,
            result.content.label(),
            result.snippet,
            result.url
        ));
    }
    prompt
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Assembles an [`Aggregator`].
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    registry: Option<SourceRegistry>,
    extra_sources: Vec<Arc<dyn SourceAdapter>>,
    classifier: Arc<dyn QueryClassifier>,
    synthesizer: Option<Arc<dyn TextSynthesizer>>,
    fallback: Option<Arc<dyn FallbackCascade>>,
    history: Option<HistoryQueue>,
}

impl AggregatorBuilder {
    /// Start from `config`. Sources are built from `config.sources` unless
    /// a registry is supplied.
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            registry: None,
            extra_sources: Vec::new(),
            classifier: Arc::new(RawClassifier),
            synthesizer: None,
            fallback: None,
            history: None,
        }
    }

    /// Use these sources instead of the configured descriptors.
    pub fn registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a source on top of the configured ones.
    pub fn source(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.extra_sources.push(adapter);
        self
    }

    /// Query classifier. Defaults to [`RawClassifier`].
    pub fn classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Answer synthesizer. Without one every answer is the canned apology.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn TextSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Replace the configured three-tier cascade.
    pub fn fallback(mut self, fallback: Arc<dyn FallbackCascade>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Queue a history record after every search.
    pub fn history(mut self, history: HistoryQueue) -> Self {
        self.history = Some(history);
        self
    }

    /// Validate and assemble.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid configuration, a source
    /// that cannot be built, a duplicate source name, a routing entry
    /// naming an unknown source, or an unreadable corpus file.
    pub fn build(self) -> Result<Aggregator> {
        let config = self.config;
        config.validate_settings()?;

        let mut registry = match self.registry {
            Some(registry) => registry,
            None => SourceRegistry::from_descriptors(
                &config.sources,
                config.timeouts.source(),
                config.user_agent.as_deref(),
            )?,
        };
        for adapter in self.extra_sources {
            registry.register(adapter)?;
        }
        config.validate_routing(|name| registry.get(name).is_some())?;

        let (fallback, static_cache) = match self.fallback {
            Some(fallback) => (fallback, None),
            None => {
                let (tiered, cache) = tiered_fallback(&config)?;
                (Arc::new(tiered) as Arc<dyn FallbackCascade>, Some(cache))
            }
        };

        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let ranker = Ranker::new(config.ranker.clone(), &registry.descriptors());
        let fanout = FanOutCoordinator::new(
            registry,
            TopicRouter::new(config.routing.clone()),
            Arc::clone(&breaker),
            limiter,
            config.timeouts.source(),
        );

        tracing::info!(
            sources = ?fanout.registry().names(),
            synthesizer = self.synthesizer.is_some(),
            "aggregator ready"
        );

        Ok(Aggregator {
            cache: ResponseCache::new(&config.cache),
            guaranteed: config.fallback.guaranteed.clone(),
            config,
            classifier: self.classifier,
            synthesizer: self.synthesizer,
            fanout,
            ranker,
            fallback,
            static_cache,
            breaker,
            history: self.history,
        })
    }
}

fn tiered_fallback(config: &AggregatorConfig) -> Result<(TieredFallback, Arc<StaticCache>)> {
    let fb = &config.fallback;
    let static_cache = Arc::new(StaticCache::new(fb.static_entries.clone()));
    let mut tiered = TieredFallback::new(
        Arc::clone(&static_cache),
        fb.guaranteed.clone(),
        config.ranker.relevance_floor,
    );

    let mut documents = fb.corpus.clone();
    if let Some(path) = &fb.corpus_path {
        let loaded = LocalCorpusSearch::from_json_file(path, fb.corpus_authenticity)?;
        documents.extend(loaded.documents().iter().cloned());
    }
    if !documents.is_empty() {
        let corpus = LocalCorpusSearch::new(documents, fb.corpus_authenticity);
        tiered = tiered.with_secondary(Arc::new(corpus), config.timeouts.secondary());
    }
    Ok((tiered, static_cache))
}

/// The search entry point.
pub struct Aggregator {
    config: AggregatorConfig,
    classifier: Arc<dyn QueryClassifier>,
    synthesizer: Option<Arc<dyn TextSynthesizer>>,
    fanout: FanOutCoordinator,
    ranker: Ranker,
    fallback: Arc<dyn FallbackCascade>,
    static_cache: Option<Arc<StaticCache>>,
    guaranteed: GuaranteedResponder,
    breaker: Arc<CircuitBreaker>,
    cache: ResponseCache,
    history: Option<HistoryQueue>,
}

impl Aggregator {
    /// Start building an aggregator from `config`.
    pub fn builder(config: AggregatorConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(config)
    }

    /// The configuration in use.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// The shared circuit breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// The tier-1 cache, when the built-in cascade is in use.
    pub fn static_cache(&self) -> Option<&Arc<StaticCache>> {
        self.static_cache.as_ref()
    }

    /// Answer `request`.
    ///
    /// Always returns a response with at least one result before the search
    /// deadline, whatever state the sources are in.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Config`] for an empty query or page 0, before any work
    /// - [`SearchError::Cancelled`] if `cancel` fires
    pub async fn search(&self, request: SearchRequest, cancel: &CancellationToken) -> Result<AggregatedResponse> {
        if request.query.trim().is_empty() {
            return Err(SearchError::Config("query must not be empty".into()));
        }
        if request.page == 0 {
            return Err(SearchError::Config("page must be 1 or greater".into()));
        }
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let started = Instant::now();
        let deadline = started + self.config.timeouts.search();
        let page_size = self.ranker.effective_page_size(request.page_size);
        tracing::trace!(query = %request.query, language = %request.language, "search started");

        let key = CacheKey::new(&request, page_size);
        if let Some(mut hit) = self.cache.get(&key).await {
            hit.elapsed = started.elapsed();
            tracing::info!(elapsed_ms = hit.elapsed.as_millis() as u64, "search served from cache");
            return Ok(hit);
        }

        let ctx = self.classify(&request, deadline, cancel).await?;

        let fanout_budget = self.config.timeouts.fanout().min(remaining(deadline));
        let (mut candidates, per_source_counts, live_failed) =
            match self.fanout.run(&ctx, cancel, fanout_budget).await {
                Ok(outcome) => (outcome.candidates, outcome.per_source, false),
                Err(SearchError::Cancelled) => return Err(SearchError::Cancelled),
                Err(err) => {
                    tracing::warn!(error = %err, "live search failed");
                    (Vec::new(), Default::default(), true)
                }
            };

        let usable = self.ranker.usable_count(&candidates);
        let mut origin = ResponseOrigin::Live;
        let mut suggestions = Vec::new();
        if live_failed || usable < self.config.min_live_results {
            tracing::debug!(usable, min = self.config.min_live_results, "too few live results, falling back");
            let outcome = self.run_fallback(&ctx, deadline, cancel).await?;
            origin = outcome.tier;
            suggestions = outcome.suggestions;
            if usable == 0 {
                candidates = outcome.candidates;
            } else {
                candidates.extend(outcome.candidates);
            }
        }

        let mut ranked = self.ranker.rank_all(candidates);
        if ranked.is_empty() {
            let (result, canned) = self.guaranteed.respond(&ctx.language);
            ranked.push(result);
            origin = ResponseOrigin::Guaranteed;
            if suggestions.is_empty() {
                suggestions = canned;
            }
        }
        let top = self.config.synthesis.top_results.min(ranked.len());
        let answer = self.synthesize(&request.query, &ranked[..top], deadline, cancel).await?;
        let synthesized = answer.is_some();

        let RankedPage { results, total_found } = self.ranker.page(ranked, request.page, page_size);

        let response = AggregatedResponse {
            query: request.query.clone(),
            answer: answer.unwrap_or_else(|| canned_apology(&ctx.language).to_owned()),
            success: synthesized && origin == ResponseOrigin::Live,
            results,
            total_found,
            page: request.page,
            page_size,
            elapsed: started.elapsed(),
            per_source_counts,
            origin,
            suggestions,
        };

        tracing::info!(
            elapsed_ms = response.elapsed.as_millis() as u64,
            origin = %response.origin,
            total_found = response.total_found,
            success = response.success,
            per_source = ?response.per_source_counts,
            "search finished"
        );

        self.cache.insert(key, &response).await;
        if let Some(history) = &self.history {
            history.try_record(HistoryRecord::from_response(&ctx, &response));
        }
        Ok(response)
    }

    /// Circuit state of every registered source.
    pub fn health(&self) -> HealthReport {
        let sources: Vec<SourceHealth> = self
            .fanout
            .registry()
            .names()
            .into_iter()
            .map(|name| {
                let snapshot = self.breaker.snapshot(&name);
                SourceHealth {
                    name,
                    state: snapshot.state,
                    consecutive_failures: snapshot.consecutive_failures,
                    retry_in_secs: snapshot.retry_in.map(|d| d.as_secs()),
                }
            })
            .collect();

        let closed = sources.iter().filter(|s| s.state == CircuitState::Closed).count();
        let status = if closed == sources.len() {
            HealthStatus::Healthy
        } else if closed == 0 {
            HealthStatus::Unavailable
        } else {
            HealthStatus::Degraded
        };
        HealthReport { status, sources }
    }

    /// Stop the history writer after it drains.
    pub async fn shutdown(self) {
        if let Some(history) = self.history {
            history.shutdown().await;
        }
    }

    async fn classify(
        &self,
        request: &SearchRequest,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<QueryContext> {
        let budget = self.config.timeouts.classifier().min(remaining(deadline));
        let call = until_cancelled(cancel, self.classifier.classify(&request.query, &request.language));
        let outcome = tokio::time::timeout(budget, call).await;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        match outcome {
            Ok(Ok(mut ctx)) => {
                if ctx.language.is_empty() {
                    ctx.language = request.language.clone();
                }
                tracing::debug!(topics = ?ctx.topics, keywords = ctx.keywords.len(), "query classified");
                Ok(ctx)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "classifier failed, using raw query");
                Ok(QueryContext::from_raw(&request.query, &request.language))
            }
            Err(_) => {
                tracing::warn!(timeout_ms = budget.as_millis() as u64, "classifier timed out, using raw query");
                Ok(QueryContext::from_raw(&request.query, &request.language))
            }
        }
    }

    async fn run_fallback(
        &self,
        ctx: &QueryContext,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<FallbackOutcome> {
        let token = cancel.child_token();
        let outcome = tokio::time::timeout(remaining(deadline), self.fallback.resolve(ctx, &token)).await;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        Ok(outcome.unwrap_or_else(|_| {
            token.cancel();
            tracing::warn!("fallback cascade ran out of time");
            let (result, suggestions) = self.guaranteed.respond(&ctx.language);
            FallbackOutcome {
                candidates: vec![result],
                tier: ResponseOrigin::Guaranteed,
                suggestions,
            }
        }))
    }

    /// Synthesised answer, or `None` when synthesis is unavailable, fails or
    /// runs out of time.
    async fn synthesize(
        &self,
        query: &str,
        top: &[CandidateResult],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let Some(synthesizer) = &self.synthesizer else {
            return Ok(None);
        };
        let prompt = build_prompt(query, top);
        let model = self.config.synthesis.model.as_str();
        let budget = self.config.timeouts.synthesis().min(remaining(deadline));

        let answer = self
            .breaker
            .execute_with_cancel(
                SYNTHESIZER_KEY,
                || async {
                    let text = synthesizer.generate(&prompt, model).await?;
                    if text.trim().is_empty() {
                        return Err(SearchError::Synthesis("empty answer".into()));
                    }
                    Ok(Some(text))
                },
                None,
                budget,
                cancel,
            )
            .await;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKind;

    #[test]
    fn prompt_numbers_sources() {
        let results = vec![
            CandidateResult::new("Al-Baqara 2:183", "Fasting is prescribed", "https://quran.com/2/183", "quran", ContentKind::Verse { surah: 2, ayah: 183 }),
            CandidateResult::new("Fasting is a shield", "", "https://sunnah.com/bukhari:1894", "hadith", ContentKind::Article),
        ];
        let prompt = build_prompt("why fast?", &results);
        assert!(prompt.contains("Question: why fast?"));
        assert!(prompt.contains("[1] Al-Baqara 2:183 (quran, verse)"));
        assert!(prompt.contains("[2] Fasting is a shield"));
    }

    #[test]
    fn apology_by_language() {
        assert!(canned_apology("en").starts_with("Sorry"));
        assert_ne!(canned_apology("AR"), canned_apology("en"));
        assert_eq!(canned_apology("fr"), canned_apology("en"));
    }

    #[tokio::test]
    async fn empty_query_is_config_error() {
        let aggregator = Aggregator::builder(AggregatorConfig::default())
            .registry(SourceRegistry::new())
            .build();
        // Default routing names sources that an empty registry lacks.
        assert!(matches!(aggregator, Err(SearchError::Config(_))));

        let config = AggregatorConfig {
            sources: vec![],
            routing: Default::default(),
            ..AggregatorConfig::default()
        };
        let aggregator = Aggregator::builder(config).build().expect("build");
        let err = aggregator
            .search(SearchRequest::new("   ", "en", 10), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[tokio::test]
    async fn no_sources_still_answers() {
        let config = AggregatorConfig {
            sources: vec![],
            routing: Default::default(),
            ..AggregatorConfig::default()
        };
        let aggregator = Aggregator::builder(config).build().expect("build");
        let response = aggregator
            .search(SearchRequest::new("zakat", "en", 10), &CancellationToken::new())
            .await
            .expect("search");
        assert_eq!(response.origin, ResponseOrigin::StaticCache);
        assert!(!response.results.is_empty());
        assert!(!response.success);
        assert_eq!(aggregator.health().status, HealthStatus::Healthy);
    }
}
