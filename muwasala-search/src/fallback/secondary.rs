//! Tier 2: a secondary search path that does not depend on any live source.
//!
//! The shipped [`LocalCorpusSearch`] ranks an in-memory document set by
//! keyword term frequency, counting title hits [`TITLE_BOOST`] times.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SearchError};
use crate::orchestrator::scoring::clamp_unit;
use crate::types::{CandidateResult, ContentKind, QueryContext};

/// Weight of a keyword occurrence in a title relative to one in the body.
pub const TITLE_BOOST: f64 = 3.0;

/// Most results returned by the corpus search.
const MAX_CORPUS_RESULTS: usize = 10;

/// Source name stamped on corpus results.
pub const CORPUS_SOURCE: &str = "corpus";

/// An independent search path used when live sources give nothing usable.
#[async_trait]
pub trait SecondarySearch: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Search for `ctx`. Scores must already be in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Any failure; the cascade moves on to the next tier.
    async fn search(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>>;
}

/// A document in the local corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// Document title.
    pub title: String,
    /// Full text searched for keywords; the first part becomes the snippet.
    pub body: String,
    /// Link to the document.
    pub url: String,
    /// Content kind.
    #[serde(default = "default_content")]
    pub content: ContentKind,
}

fn default_content() -> ContentKind {
    ContentKind::Article
}

/// Term-frequency search over documents held in memory.
#[derive(Debug, Clone)]
pub struct LocalCorpusSearch {
    documents: Vec<CorpusDocument>,
    authenticity: f64,
}

impl LocalCorpusSearch {
    /// Search over `documents`, reporting `authenticity` as every result's
    /// trust weight.
    pub fn new(documents: Vec<CorpusDocument>, authenticity: f64) -> Self {
        Self {
            documents,
            authenticity: clamp_unit(authenticity),
        }
    }

    /// Load documents from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path, authenticity: f64) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("cannot read corpus {}: {e}", path.display())))?;
        let documents: Vec<CorpusDocument> = serde_json::from_str(&raw)
            .map_err(|e| SearchError::Config(format!("invalid corpus {}: {e}", path.display())))?;
        tracing::debug!(documents = documents.len(), path = %path.display(), "corpus loaded");
        Ok(Self::new(documents, authenticity))
    }

    /// The documents searched.
    pub fn documents(&self) -> &[CorpusDocument] {
        &self.documents
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Rank documents for `keywords`. Scores are divided by the best score,
    /// so the top document gets relevance 1.0.
    pub fn rank(&self, keywords: &[String]) -> Vec<CandidateResult> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut scored: Vec<(f64, &CorpusDocument)> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let score = raw_score(&keywords, doc);
                (score > 0.0).then_some((score, doc))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let best = scored.first().map_or(1.0, |(s, _)| *s);
        scored
            .into_iter()
            .take(MAX_CORPUS_RESULTS)
            .map(|(score, doc)| {
                let snippet: String = doc.body.chars().take(200).collect();
                let mut candidate = CandidateResult::new(
                    doc.title.clone(),
                    snippet,
                    doc.url.clone(),
                    CORPUS_SOURCE,
                    doc.content.clone(),
                );
                candidate.relevance_score = clamp_unit(score / best);
                candidate.authenticity_score = self.authenticity;
                candidate
            })
            .collect()
    }
}

fn raw_score(keywords: &[String], doc: &CorpusDocument) -> f64 {
    let title = doc.title.to_lowercase();
    let body = doc.body.to_lowercase();
    keywords
        .iter()
        .map(|k| {
            let in_title = title.matches(k.as_str()).count() as f64;
            let in_body = body.matches(k.as_str()).count() as f64;
            in_title * TITLE_BOOST + in_body
        })
        .sum()
}

#[async_trait]
impl SecondarySearch for LocalCorpusSearch {
    fn name(&self) -> &str {
        CORPUS_SOURCE
    }

    async fn search(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        Ok(self.rank(&ctx.keywords))
    }
}
