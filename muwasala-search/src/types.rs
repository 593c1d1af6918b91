//! Core types: source descriptors, candidate results, query context and
//! the aggregated response returned to callers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// What kind of text a candidate points at.
///
/// Sources return very different payloads (verses, hadith, fatwas, plain
/// articles). They are normalised into a single [`CandidateResult`] and this
/// tag carries the source-specific identity of the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentKind {
    /// A Quran verse.
    Verse {
        /// Surah number (1-114).
        surah: u32,
        /// Ayah number within the surah.
        ayah: u32,
    },
    /// A hadith from a named collection.
    Hadith {
        /// Collection name, e.g. "bukhari".
        collection: String,
        /// Hadith number within the collection, when the source exposes one.
        number: Option<String>,
    },
    /// A scholarly answer to a question.
    Fatwa {
        /// Question identifier on the publishing site, if known.
        question_id: Option<String>,
    },
    /// An article or essay.
    Article,
    /// Anything else.
    Generic,
}

impl ContentKind {
    /// Short label used in logs and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Verse { .. } => "verse",
            Self::Hadith { .. } => "hadith",
            Self::Fatwa { .. } => "fatwa",
            Self::Article => "article",
            Self::Generic => "generic",
        }
    }
}

/// One unranked item returned by a source before merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Title of the item.
    pub title: String,
    /// Short text excerpt.
    pub snippet: String,
    /// Canonical link to the item.
    pub url: String,
    /// Name of the source that produced the item.
    pub source: String,
    /// How well the item matches the query, in `[0, 1]`.
    pub relevance_score: f64,
    /// How trustworthy the source is, in `[0, 1]`.
    pub authenticity_score: f64,
    /// Content-type discriminator.
    pub content: ContentKind,
    /// Publication date, when the source exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<NaiveDate>,
    /// Free-form source-specific attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CandidateResult {
    /// Build a candidate with empty metadata and no date.
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        content: ContentKind,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
            source: source.into(),
            relevance_score: 0.0,
            authenticity_score: 0.0,
            content,
            published_date: None,
            metadata: BTreeMap::new(),
        }
    }

    /// `relevance × authenticity`, each clamped into `[0, 1]` first.
    ///
    /// Depends on nothing but those two fields, so it can be recomputed
    /// anywhere and always agrees with the ranker.
    pub fn combined_score(&self) -> f64 {
        crate::orchestrator::scoring::combined_score(self.relevance_score, self.authenticity_score)
    }
}

/// Which adapter implementation backs a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterKind {
    /// Generic JSON search API returning a list of items.
    JsonApi {
        /// Query-string parameter carrying the search text.
        query_param: String,
        /// Query-string parameter carrying the language, if the API takes one.
        language_param: Option<String>,
        /// JSON pointer to the result array in the response body.
        results_pointer: String,
        /// Content kind assigned to every item.
        content: ContentKind,
    },
    /// alquran.cloud-style verse search.
    QuranApi {
        /// Edition identifier, e.g. "en.sahih".
        edition: String,
    },
    /// HTML search page scraped with CSS selectors.
    HtmlListing {
        /// Query-string parameter carrying the search text.
        query_param: String,
        /// Selector matching one result block.
        result_selector: String,
        /// Selector for the title element inside a result (its `href` is the link).
        title_selector: String,
        /// Selector for the snippet element inside a result.
        snippet_selector: String,
        /// Content kind assigned to every item.
        content: ContentKind,
    },
}

/// Static description of one external knowledge source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique source name, also the circuit-breaker key.
    pub name: String,
    /// Base endpoint URL.
    pub endpoint: String,
    /// Topic tags this source is useful for. Informational; routing uses
    /// the router's table.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Languages the source serves. Empty means every language.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Tie-break priority; lower values win.
    #[serde(default)]
    pub priority: u32,
    /// Rate-limiter group this source's calls count against.
    #[serde(default = "default_rate_limit_group")]
    pub rate_limit_group: String,
    /// Static trust weight applied as `authenticity_score`.
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
    /// Per-call timeout override in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Adapter implementation and its settings.
    pub adapter: AdapterKind,
}

fn default_rate_limit_group() -> String {
    "default".into()
}

fn default_trust_weight() -> f64 {
    1.0
}

impl SourceDescriptor {
    /// Whether the source serves `language`.
    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.is_empty()
            || self
                .languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// The classified form of a user query. Produced by a
/// [`crate::QueryClassifier`] and consumed read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    /// The original query text.
    pub text: String,
    /// Query language code, e.g. "en".
    pub language: String,
    /// Topic tags used for source routing.
    pub topics: Vec<String>,
    /// Keywords used for relevance scoring.
    pub keywords: Vec<String>,
}

impl QueryContext {
    /// A context with no topics, keywords taken from whitespace tokens.
    ///
    /// Used when the classifier fails or times out.
    pub fn from_raw(text: &str, language: &str) -> Self {
        let keywords = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 2)
            .map(str::to_lowercase)
            .collect();
        Self {
            text: text.to_owned(),
            language: language.to_owned(),
            topics: Vec::new(),
            keywords,
        }
    }
}

/// Caller-facing search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Raw query text.
    pub query: String,
    /// Language code.
    pub language: String,
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
}

impl SearchRequest {
    /// First page with the given page size.
    pub fn new(query: impl Into<String>, language: impl Into<String>, page_size: usize) -> Self {
        Self {
            query: query.into(),
            language: language.into(),
            page: 1,
            page_size,
        }
    }
}

/// Where the results of a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    /// Live fan-out produced enough results.
    Live,
    /// Served from the response cache.
    Cache,
    /// Tier 1: static in-memory answers.
    StaticCache,
    /// Tier 2: secondary search path.
    Secondary,
    /// Tier 3: guaranteed minimal response.
    Guaranteed,
}

impl fmt::Display for ResponseOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::StaticCache => "static_cache",
            Self::Secondary => "secondary",
            Self::Guaranteed => "guaranteed",
        })
    }
}

/// The final, ranked answer to a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResponse {
    /// The original query text.
    pub query: String,
    /// Synthesised prose answer (or a canned apology).
    pub answer: String,
    /// `false` when synthesis failed or a fallback tier answered.
    pub success: bool,
    /// Ranked results for the requested page.
    pub results: Vec<CandidateResult>,
    /// Number of results that survived filtering and dedup, across all pages.
    pub total_found: usize,
    /// 1-based page number.
    pub page: usize,
    /// Requested page size.
    pub page_size: usize,
    /// Wall-clock time spent producing the response.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    /// Number of candidates each source contributed to the live round.
    pub per_source_counts: BTreeMap<String, usize>,
    /// Which path produced the results.
    pub origin: ResponseOrigin,
    /// Suggested follow-up queries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(relevance: f64, authenticity: f64) -> CandidateResult {
        let mut c = CandidateResult::new(
            "Title",
            "snippet",
            "https://example.org/1",
            "quran",
            ContentKind::Verse { surah: 2, ayah: 183 },
        );
        c.relevance_score = relevance;
        c.authenticity_score = authenticity;
        c
    }

    #[test]
    fn combined_score_is_product() {
        assert!((candidate(0.9, 1.0).combined_score() - 0.9).abs() < 1e-12);
        assert!((candidate(0.5, 0.8).combined_score() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn content_kind_serialises_with_tag() {
        let json = serde_json::to_value(ContentKind::Verse { surah: 1, ayah: 5 }).expect("serialize");
        assert_eq!(json["type"], "verse");
        assert_eq!(json["surah"], 1);

        let hadith: ContentKind =
            serde_json::from_str(r#"{"type":"hadith","collection":"muslim","number":"1151"}"#)
                .expect("deserialize");
        assert_eq!(hadith.label(), "hadith");
    }

    #[test]
    fn source_with_no_languages_supports_all() {
        let source = SourceDescriptor {
            name: "any".into(),
            endpoint: "https://example.org".into(),
            topics: vec![],
            languages: vec![],
            priority: 0,
            rate_limit_group: "default".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        };
        assert!(source.supports_language("ar"));

        let english_only = SourceDescriptor {
            languages: vec!["EN".into()],
            ..source
        };
        assert!(english_only.supports_language("en"));
        assert!(!english_only.supports_language("ar"));
    }

    #[test]
    fn raw_context_extracts_keywords() {
        let ctx = QueryContext::from_raw("How to pray Fajr?", "en");
        assert_eq!(ctx.keywords, vec!["how", "to", "pray", "fajr"]);
        assert!(ctx.topics.is_empty());
        assert_eq!(ctx.language, "en");
    }

    #[test]
    fn response_origin_display() {
        assert_eq!(ResponseOrigin::StaticCache.to_string(), "static_cache");
        assert_eq!(ResponseOrigin::Guaranteed.to_string(), "guaranteed");
    }

    #[test]
    fn response_serialises_elapsed_as_millis() {
        let response = AggregatedResponse {
            query: "q".into(),
            answer: "a".into(),
            success: true,
            results: vec![],
            total_found: 0,
            page: 1,
            page_size: 20,
            elapsed: Duration::from_millis(1500),
            per_source_counts: BTreeMap::new(),
            origin: ResponseOrigin::Live,
            suggestions: vec![],
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["origin"], "live");
    }
}
