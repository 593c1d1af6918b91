//! Aggregator configuration with sensible defaults.
//!
//! [`AggregatorConfig`] gathers every tunable: breaker, rate limits,
//! ranking, deadlines, fallback content, the source list and the topic
//! routing table. [`AggregatorConfig::default`] ships four sources and a
//! routing table for the common topics.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;
use crate::fallback::{CorpusDocument, GuaranteedResponder, StaticEntry};
use crate::orchestrator::RankerConfig;
use crate::rate_limit::RateLimitConfig;
use crate::types::{AdapterKind, ContentKind, SourceDescriptor};

/// Time budgets, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-call timeout for sources that set none of their own.
    pub source_secs: u64,
    /// Deadline for one fan-out round.
    pub fanout_secs: u64,
    /// End-to-end deadline for a whole search.
    pub search_secs: u64,
    /// Budget for the query classifier.
    pub classifier_secs: u64,
    /// Budget for the text synthesizer.
    pub synthesis_secs: u64,
    /// Budget for the tier-2 secondary search.
    pub secondary_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            source_secs: 10,
            fanout_secs: 25,
            search_secs: 30,
            classifier_secs: 2,
            synthesis_secs: 20,
            secondary_secs: 5,
        }
    }
}

impl TimeoutConfig {
    /// Per-source call timeout.
    pub fn source(&self) -> Duration {
        Duration::from_secs(self.source_secs)
    }

    /// Fan-out round deadline.
    pub fn fanout(&self) -> Duration {
        Duration::from_secs(self.fanout_secs)
    }

    /// End-to-end search deadline.
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    /// Classifier budget.
    pub fn classifier(&self) -> Duration {
        Duration::from_secs(self.classifier_secs)
    }

    /// Synthesizer budget.
    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }

    /// Secondary search budget.
    pub fn secondary(&self) -> Duration {
        Duration::from_secs(self.secondary_secs)
    }
}

/// Answer synthesis settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Model name passed to the synthesizer.
    pub model: String,
    /// Number of top results included in the prompt.
    pub top_results: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1".into(),
            top_results: 5,
        }
    }
}

/// Content for the fallback tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Tier 1 prepared answers.
    pub static_entries: Vec<StaticEntry>,
    /// Tier 2 documents held inline.
    pub corpus: Vec<CorpusDocument>,
    /// Tier 2 documents loaded from a JSON file, added to `corpus`.
    pub corpus_path: Option<PathBuf>,
    /// Trust weight of tier 2 results.
    pub corpus_authenticity: f64,
    /// Tier 3 answers per language.
    pub guaranteed: GuaranteedResponder,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            static_entries: default_static_entries(),
            corpus: Vec::new(),
            corpus_path: None,
            corpus_authenticity: 0.7,
            guaranteed: GuaranteedResponder::default(),
        }
    }
}

/// Everything the aggregator needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Circuit breaker thresholds.
    pub breaker: CircuitBreakerConfig,
    /// Concurrent call limits per rate-limit group.
    pub rate_limit: RateLimitConfig,
    /// Relevance floor and page sizes.
    pub ranker: RankerConfig,
    /// Response cache.
    pub cache: CacheConfig,
    /// Time budgets.
    pub timeouts: TimeoutConfig,
    /// Answer synthesis.
    pub synthesis: SynthesisConfig,
    /// Fallback tier content.
    pub fallback: FallbackConfig,
    /// Live results at or above the relevance floor needed to skip the
    /// fallback cascade.
    pub min_live_results: usize,
    /// History queue capacity.
    pub history_capacity: usize,
    /// Fixed User-Agent for source requests. `None` rotates browser agents.
    pub user_agent: Option<String>,
    /// Knowledge sources.
    pub sources: Vec<SourceDescriptor>,
    /// Topic tag → source names.
    pub routing: BTreeMap<String, Vec<String>>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ranker: RankerConfig::default(),
            cache: CacheConfig::default(),
            timeouts: TimeoutConfig::default(),
            synthesis: SynthesisConfig::default(),
            fallback: FallbackConfig::default(),
            min_live_results: 1,
            history_capacity: crate::history::DEFAULT_HISTORY_CAPACITY,
            user_agent: None,
            sources: default_sources(),
            routing: default_routing(),
        }
    }
}

impl AggregatorConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - every timeout is greater than 0
    /// - the fan-out deadline does not exceed the search deadline
    /// - `breaker.failure_threshold` and every permit count are greater than 0
    /// - `ranker.relevance_floor` is within `[0, 1]`
    /// - page sizes are greater than 0 and the default does not exceed the maximum
    /// - source names are non-empty and unique, trust weights finite
    /// - the routing table only names configured sources
    pub fn validate(&self) -> Result<(), SearchError> {
        self.validate_settings()?;
        let names: HashSet<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        self.validate_routing(|name| names.contains(name))
    }

    /// Every check in [`AggregatorConfig::validate`] except the routing
    /// table, for callers that register sources outside `sources`.
    pub fn validate_settings(&self) -> Result<(), SearchError> {
        let t = &self.timeouts;
        for (name, secs) in [
            ("source", t.source_secs),
            ("fanout", t.fanout_secs),
            ("search", t.search_secs),
            ("classifier", t.classifier_secs),
            ("synthesis", t.synthesis_secs),
            ("secondary", t.secondary_secs),
        ] {
            if secs == 0 {
                return Err(SearchError::Config(format!(
                    "timeouts.{name}_secs must be greater than 0"
                )));
            }
        }
        if t.fanout_secs > t.search_secs {
            return Err(SearchError::Config(
                "timeouts.fanout_secs must be <= timeouts.search_secs".into(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(SearchError::Config(
                "breaker.failure_threshold must be greater than 0".into(),
            ));
        }
        if self.rate_limit.default_permits == 0 || self.rate_limit.groups.values().any(|p| *p == 0) {
            return Err(SearchError::Config(
                "rate_limit permits must be greater than 0".into(),
            ));
        }
        let floor = self.ranker.relevance_floor;
        if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
            return Err(SearchError::Config(
                "ranker.relevance_floor must be within [0, 1]".into(),
            ));
        }
        if self.ranker.default_page_size == 0 || self.ranker.max_page_size == 0 {
            return Err(SearchError::Config(
                "page sizes must be greater than 0".into(),
            ));
        }
        if self.ranker.default_page_size > self.ranker.max_page_size {
            return Err(SearchError::Config(
                "ranker.default_page_size must be <= ranker.max_page_size".into(),
            ));
        }
        if self.synthesis.top_results == 0 {
            return Err(SearchError::Config(
                "synthesis.top_results must be greater than 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(SearchError::Config("source name must not be empty".into()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(SearchError::Config(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
            if !source.trust_weight.is_finite() {
                return Err(SearchError::Config(format!(
                    "source {} trust_weight must be finite",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Check that every routing target satisfies `known`.
    pub fn validate_routing(&self, known: impl Fn(&str) -> bool) -> Result<(), SearchError> {
        for (topic, targets) in &self.routing {
            if let Some(unknown) = targets.iter().find(|n| !known(n.as_str())) {
                return Err(SearchError::Config(format!(
                    "routing for {topic} names unknown source {unknown}"
                )));
            }
        }
        Ok(())
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

/// The built-in source list.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor {
            name: "quran".into(),
            endpoint: "https://api.alquran.cloud/v1/search".into(),
            topics: names(&["quran", "prayer", "fasting", "zakat", "hajj"]),
            languages: Vec::new(),
            priority: 0,
            rate_limit_group: "alquran".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        },
        SourceDescriptor {
            name: "hadith".into(),
            endpoint: "http://localhost:8081/api/hadith/search".into(),
            topics: names(&["hadith", "fasting", "hajj"]),
            languages: Vec::new(),
            priority: 1,
            rate_limit_group: "local".into(),
            trust_weight: 0.95,
            timeout_seconds: None,
            adapter: AdapterKind::JsonApi {
                query_param: "q".into(),
                language_param: Some("lang".into()),
                results_pointer: "/results".into(),
                content: ContentKind::Hadith {
                    collection: "unknown".into(),
                    number: None,
                },
            },
        },
        SourceDescriptor {
            name: "islamqa".into(),
            endpoint: "https://islamqa.info/en/search".into(),
            topics: names(&["prayer", "fasting", "zakat", "hajj", "family"]),
            languages: names(&["en"]),
            priority: 2,
            rate_limit_group: "islamqa".into(),
            trust_weight: 0.85,
            timeout_seconds: Some(8),
            adapter: AdapterKind::HtmlListing {
                query_param: "q".into(),
                result_selector: ".search-result".into(),
                title_selector: ".search-result__title".into(),
                snippet_selector: ".search-result__summary".into(),
                content: ContentKind::Fatwa { question_id: None },
            },
        },
        SourceDescriptor {
            name: "articles".into(),
            endpoint: "http://localhost:8082/api/articles/search".into(),
            topics: names(&["family"]),
            languages: Vec::new(),
            priority: 3,
            rate_limit_group: "local".into(),
            trust_weight: 0.6,
            timeout_seconds: None,
            adapter: AdapterKind::JsonApi {
                query_param: "q".into(),
                language_param: Some("lang".into()),
                results_pointer: "/results".into(),
                content: ContentKind::Article,
            },
        },
    ]
}

/// The built-in topic routing table.
pub fn default_routing() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 7] = [
        ("prayer", &["quran", "islamqa"]),
        ("fasting", &["quran", "hadith", "islamqa"]),
        ("zakat", &["quran", "islamqa"]),
        ("hajj", &["quran", "hadith", "islamqa"]),
        ("quran", &["quran"]),
        ("hadith", &["hadith"]),
        ("family", &["islamqa", "articles"]),
    ];
    table
        .into_iter()
        .map(|(topic, sources)| (topic.to_owned(), names(sources)))
        .collect()
}

fn default_static_entries() -> Vec<StaticEntry> {
    let entry = |keys: &[&str], title: &str, snippet: &str, url: &str| StaticEntry {
        keys: names(keys),
        title: title.into(),
        snippet: snippet.into(),
        url: url.into(),
        source: crate::fallback::static_cache::STATIC_SOURCE.into(),
        authenticity: 0.8,
        content: ContentKind::Generic,
    };
    vec![
        entry(
            &["prayer", "salah"],
            "The five daily prayers",
            "Fajr, Dhuhr, Asr, Maghrib and Isha, with their times and number of units.",
            "https://quran.com/4/103",
        ),
        entry(
            &["fasting", "ramadan", "sawm"],
            "Fasting in Ramadan",
            "Fasting is prescribed for you as it was prescribed for those before you.",
            "https://quran.com/2/183",
        ),
        entry(
            &["zakat", "charity"],
            "Who receives zakat",
            "Zakat is for the poor, the needy and the other categories named in the verse.",
            "https://quran.com/9/60",
        ),
        entry(
            &["hajj", "pilgrimage"],
            "The obligation of hajj",
            "Pilgrimage to the House is a duty owed to God by everyone able to make the journey.",
            "https://quran.com/3/97",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sources.len(), 4);
        assert_eq!(config.timeouts.fanout(), Duration::from_secs(25));
        assert_eq!(config.timeouts.search(), Duration::from_secs(30));
        assert_eq!(config.min_live_results, 1);
    }

    #[test]
    fn prayer_routes_to_quran_and_islamqa() {
        let routing = default_routing();
        assert_eq!(routing["prayer"], vec!["quran", "islamqa"]);
        assert!(!routing["prayer"].contains(&"hadith".to_owned()));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AggregatorConfig::default();
        config.timeouts.source_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_secs"));
    }

    #[test]
    fn fanout_longer_than_search_rejected() {
        let mut config = AggregatorConfig::default();
        config.timeouts.fanout_secs = 40;
        assert!(config.validate().unwrap_err().to_string().contains("fanout_secs"));
    }

    #[test]
    fn relevance_floor_out_of_range_rejected() {
        let mut config = AggregatorConfig::default();
        config.ranker.relevance_floor = f64::NAN;
        assert!(config.validate().is_err());
        config.ranker.relevance_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_source_rejected() {
        let mut config = AggregatorConfig::default();
        let copy = config.sources[0].clone();
        config.sources.push(copy);
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn routing_to_unknown_source_rejected() {
        let mut config = AggregatorConfig::default();
        config.routing.insert("astronomy".into(), vec!["observatory".into()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("observatory"));
    }

    #[test]
    fn zero_permits_rejected() {
        let mut config = AggregatorConfig::default();
        config.rate_limit.groups.insert("local".into(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_page_size_above_max_rejected() {
        let mut config = AggregatorConfig::default();
        config.ranker.default_page_size = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = AggregatorConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: AggregatorConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.sources.len(), config.sources.len());
        assert_eq!(back.routing, config.routing);
    }
}
