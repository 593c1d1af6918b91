//! Tier 1: prepared answers held in memory, looked up by topic or keyword.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::orchestrator::normalize::normalize_url;
use crate::orchestrator::scoring::{keyword_relevance, NEUTRAL_RELEVANCE};
use crate::types::{CandidateResult, ContentKind, QueryContext};

/// Source name stamped on static answers unless an entry names its own.
pub const STATIC_SOURCE: &str = "static";

/// One prepared answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticEntry {
    /// Topic tags or keywords this answer is filed under.
    pub keys: Vec<String>,
    /// Result title.
    pub title: String,
    /// Result snippet.
    #[serde(default)]
    pub snippet: String,
    /// Result link.
    pub url: String,
    /// Source name shown to the caller.
    #[serde(default = "default_source")]
    pub source: String,
    /// Trust weight of the answer.
    #[serde(default = "default_authenticity")]
    pub authenticity: f64,
    /// Content kind of the answer.
    #[serde(default = "default_content")]
    pub content: ContentKind,
}

fn default_source() -> String {
    STATIC_SOURCE.to_owned()
}

fn default_authenticity() -> f64 {
    0.8
}

fn default_content() -> ContentKind {
    ContentKind::Generic
}

#[derive(Debug, Default)]
struct Snapshot {
    entries: Vec<StaticEntry>,
    by_key: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    fn build(entries: Vec<StaticEntry>) -> Self {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            for key in &entry.keys {
                let slot = by_key.entry(key.trim().to_lowercase()).or_default();
                if !slot.contains(&index) {
                    slot.push(index);
                }
            }
        }
        Self { entries, by_key }
    }
}

/// Read-mostly table of prepared answers.
///
/// Lookups clone an `Arc` to the current snapshot and never block on a
/// [`StaticCache::refresh`], which swaps in a whole new snapshot.
#[derive(Debug, Default)]
pub struct StaticCache {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl StaticCache {
    /// Build the cache from `entries`.
    pub fn new(entries: Vec<StaticEntry>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::build(entries))),
        }
    }

    /// Replace every entry.
    pub fn refresh(&self, entries: Vec<StaticEntry>) {
        let fresh = Arc::new(Snapshot::build(entries));
        let count = fresh.entries.len();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        tracing::info!(entries = count, "static answers refreshed");
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answers filed under any topic of `ctx`, then under any keyword.
    ///
    /// Each answer appears once even when several keys match it. Answers
    /// found by topic get at least neutral relevance.
    pub fn lookup(&self, ctx: &QueryContext) -> Vec<CandidateResult> {
        let snapshot = self.current();
        let mut seen_urls = Vec::new();
        let mut out = Vec::new();

        let topic_hits = ctx.topics.iter().map(|k| (k, true));
        let keyword_hits = ctx.keywords.iter().map(|k| (k, false));
        for (key, by_topic) in topic_hits.chain(keyword_hits) {
            let Some(indices) = snapshot.by_key.get(&key.to_lowercase()) else {
                continue;
            };
            for &index in indices {
                let entry = &snapshot.entries[index];
                let url = normalize_url(&entry.url);
                if seen_urls.contains(&url) {
                    continue;
                }
                seen_urls.push(url);

                let mut candidate = CandidateResult::new(
                    entry.title.clone(),
                    entry.snippet.clone(),
                    entry.url.clone(),
                    entry.source.clone(),
                    entry.content.clone(),
                );
                let relevance = keyword_relevance(&ctx.keywords, &entry.title, &entry.snippet);
                candidate.relevance_score = if by_topic {
                    relevance.max(NEUTRAL_RELEVANCE)
                } else {
                    relevance
                };
                candidate.authenticity_score = entry.authenticity;
                out.push(candidate);
            }
        }
        out
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(keys: &[&str], title: &str, url: &str) -> StaticEntry {
        StaticEntry {
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
            title: title.into(),
            snippet: String::new(),
            url: url.into(),
            source: default_source(),
            authenticity: 0.8,
            content: ContentKind::Generic,
        }
    }

    fn ctx(text: &str, topics: &[&str]) -> QueryContext {
        QueryContext {
            topics: topics.iter().map(|t| (*t).to_owned()).collect(),
            ..QueryContext::from_raw(text, "en")
        }
    }

    #[test]
    fn topic_lookup_gets_neutral_floor() {
        let cache = StaticCache::new(vec![entry(&["Zakat"], "Nisab thresholds", "https://x.org/nisab")]);
        let hits = cache.lookup(&ctx("how much do I give", &["zakat"]));
        assert_eq!(hits.len(), 1);
        assert!(hits[0].relevance_score >= NEUTRAL_RELEVANCE);
        assert_eq!(hits[0].source, STATIC_SOURCE);
    }

    #[test]
    fn keyword_lookup_and_dedup() {
        let cache = StaticCache::new(vec![
            entry(&["fasting", "ramadan"], "Fasting in Ramadan", "https://x.org/fast"),
            entry(&["ramadan"], "Ramadan calendar", "https://x.org/cal"),
        ]);
        let hits = cache.lookup(&ctx("ramadan fasting", &[]));
        let titles: Vec<&str> = hits.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Fasting in Ramadan", "Ramadan calendar"]);
    }

    #[test]
    fn miss_is_empty() {
        let cache = StaticCache::new(vec![entry(&["hajj"], "Hajj", "https://x.org/hajj")]);
        assert!(cache.lookup(&ctx("zakat", &[])).is_empty());
    }

    #[test]
    fn refresh_swaps_snapshot() {
        let cache = StaticCache::new(vec![]);
        assert!(cache.is_empty());
        cache.refresh(vec![entry(&["hajj"], "Hajj", "https://x.org/hajj")]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&ctx("hajj", &[])).len(), 1);
    }
}
