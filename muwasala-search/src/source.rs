//! Source adapter framework.
//!
//! Each external knowledge source implements [`SourceAdapter`] to turn a
//! [`QueryContext`] into one source-specific request and map the answer into
//! [`CandidateResult`] values. Adapters report failures as `Err`; the fan-out
//! coordinator runs every call through the circuit breaker, which records
//! the failure and substitutes an empty list, so failures never travel
//! further than the breaker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SearchError};
use crate::orchestrator::scoring::{clamp_unit, keyword_relevance};
use crate::sources::{HtmlListingSource, JsonApiSource, QuranApiSource};
use crate::types::{AdapterKind, CandidateResult, QueryContext, SourceDescriptor};

/// Most candidates kept from a single source per query.
pub const MAX_CANDIDATES_PER_SOURCE: usize = 25;

/// Longest snippet kept, in characters.
const MAX_SNIPPET_CHARS: usize = 400;

/// A pluggable knowledge source.
///
/// Implementations must be `Send + Sync`: one adapter instance serves every
/// concurrent query.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Static description of this source.
    fn descriptor(&self) -> &SourceDescriptor;

    /// Source name; also the circuit-breaker key.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Query the source.
    ///
    /// Implementations should stop promptly when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Any network, status or payload problem is an error. The caller
    /// converts it into an empty result and a circuit failure.
    async fn fetch(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>>;
}

/// Run `fut`, giving up with [`SearchError::Cancelled`] once `cancel` fires.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SearchError::Cancelled),
        result = fut => result,
    }
}

/// Collapse whitespace runs and trim.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finish raw candidates from `descriptor`: stamp the source name and
/// trust weight, compute keyword relevance, tidy text, drop items without
/// a title or link, and cap the count.
pub fn finalize_candidates(
    descriptor: &SourceDescriptor,
    ctx: &QueryContext,
    raw: Vec<CandidateResult>,
) -> Vec<CandidateResult> {
    let trust = clamp_unit(descriptor.trust_weight);
    raw.into_iter()
        .filter_map(|mut c| {
            c.title = clean_text(&c.title);
            c.url = c.url.trim().to_owned();
            if c.title.is_empty() || c.url.is_empty() {
                return None;
            }
            c.snippet = truncate_chars(&clean_text(&c.snippet), MAX_SNIPPET_CHARS);
            c.source = descriptor.name.clone();
            c.authenticity_score = trust;
            c.relevance_score = keyword_relevance(&ctx.keywords, &c.title, &c.snippet);
            Some(c)
        })
        .take(MAX_CANDIDATES_PER_SOURCE)
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_owned(),
    }
}

/// Per-call timeout for `descriptor`, falling back to `default`.
pub fn call_timeout(descriptor: &SourceDescriptor, default: Duration) -> Duration {
    descriptor
        .timeout_seconds
        .filter(|s| *s > 0)
        .map_or(default, Duration::from_secs)
}

/// Build the built-in adapter described by `descriptor`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid endpoint or selector and
/// [`SearchError::Http`] if the HTTP client cannot be built.
pub fn build_adapter(
    descriptor: &SourceDescriptor,
    default_timeout: Duration,
    user_agent: Option<&str>,
) -> Result<Arc<dyn SourceAdapter>> {
    let timeout = call_timeout(descriptor, default_timeout);
    let adapter: Arc<dyn SourceAdapter> = match &descriptor.adapter {
        AdapterKind::JsonApi { .. } => Arc::new(JsonApiSource::new(descriptor.clone(), timeout, user_agent)?),
        AdapterKind::QuranApi { .. } => Arc::new(QuranApiSource::new(descriptor.clone(), timeout, user_agent)?),
        AdapterKind::HtmlListing { .. } => {
            Arc::new(HtmlListingSource::new(descriptor.clone(), timeout, user_agent)?)
        }
    };
    Ok(adapter)
}

/// The set of registered sources, in registration order.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.iter().map(|a| a.name())).finish()
    }
}

impl SourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build built-in adapters for every descriptor.
    ///
    /// # Errors
    ///
    /// Fails on the first descriptor that cannot be turned into an adapter,
    /// or on a duplicate source name.
    pub fn from_descriptors(
        descriptors: &[SourceDescriptor],
        default_timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(build_adapter(descriptor, default_timeout, user_agent)?)?;
        }
        Ok(registry)
    }

    /// Add an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if a source with the same name exists.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<()> {
        if self.get(adapter.name()).is_some() {
            return Err(SearchError::Config(format!(
                "duplicate source name: {}",
                adapter.name()
            )));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    /// Look a source up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    /// All adapters in registration order.
    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Descriptors of all adapters.
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.adapters.iter().map(|a| a.descriptor().clone()).collect()
    }

    /// Names of all adapters.
    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_owned()).collect()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
