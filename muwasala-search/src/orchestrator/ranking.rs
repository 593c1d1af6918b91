//! Result ranking and merging: filter, dedup, score, sort, page.
//!
//! # Pipeline
//!
//! 1. Clamp both scores into `[0, 1]`
//! 2. Drop candidates whose relevance is below the floor
//! 3. Drop duplicates: same source and same normalised title, first
//!    occurrence (discovery order) wins
//! 4. Sort by `relevance × authenticity` descending; ties go to the source
//!    with the lower priority number, then to discovery order
//! 5. Cut the requested page

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{CandidateResult, SourceDescriptor};

use super::normalize::normalize_title;
use super::scoring::clamp_unit;

/// Ranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Candidates with relevance below this are discarded.
    pub relevance_floor: f64,
    /// Page size used when a request does not name one.
    pub default_page_size: usize,
    /// Largest page size a request may ask for.
    pub max_page_size: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            relevance_floor: 0.3,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// One page of ranked results.
#[derive(Debug, Clone)]
pub struct RankedPage {
    /// Results on the requested page, best first.
    pub results: Vec<CandidateResult>,
    /// Results that survived filtering and dedup, across all pages.
    pub total_found: usize,
}

/// Scores, deduplicates and orders candidates from any mix of sources.
#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankerConfig,
    priorities: HashMap<String, u32>,
}

impl Ranker {
    /// Create a ranker that breaks ties using the priorities of `sources`.
    pub fn new(config: RankerConfig, sources: &[SourceDescriptor]) -> Self {
        let priorities = sources
            .iter()
            .map(|s| (s.name.clone(), s.priority))
            .collect();
        Self { config, priorities }
    }

    /// The ranker's configuration.
    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Number of candidates at or above the relevance floor.
    pub fn usable_count(&self, candidates: &[CandidateResult]) -> usize {
        candidates
            .iter()
            .filter(|c| clamp_unit(c.relevance_score) >= self.config.relevance_floor)
            .count()
    }

    /// Filter, dedup and sort every candidate without paging.
    pub fn rank_all(&self, candidates: Vec<CandidateResult>) -> Vec<CandidateResult> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut kept: Vec<(usize, CandidateResult)> = Vec::with_capacity(candidates.len());

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            candidate.relevance_score = clamp_unit(candidate.relevance_score);
            candidate.authenticity_score = clamp_unit(candidate.authenticity_score);
            if candidate.relevance_score < self.config.relevance_floor {
                continue;
            }
            let key = (candidate.source.clone(), normalize_title(&candidate.title));
            if !seen.insert(key) {
                continue;
            }
            kept.push((index, candidate));
        }

        kept.sort_by(|(ia, a), (ib, b)| self.compare(a, *ia, b, *ib));
        kept.into_iter().map(|(_, c)| c).collect()
    }

    /// Cut 1-based `page` of `page_size` items out of an already ranked
    /// list from [`Ranker::rank_all`].
    ///
    /// `page_size` is capped at the configured maximum; zero selects the
    /// default. Page 0 is treated as page 1.
    pub fn page(&self, ranked: Vec<CandidateResult>, page: usize, page_size: usize) -> RankedPage {
        let size = self.effective_page_size(page_size);
        let total_found = ranked.len();
        let start = page.max(1).saturating_sub(1).saturating_mul(size);
        let results = ranked.into_iter().skip(start).take(size).collect();
        RankedPage {
            results,
            total_found,
        }
    }

    /// Page size after applying the default and the cap.
    pub fn effective_page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.config.default_page_size
        } else {
            requested
        };
        size.clamp(1, self.config.max_page_size.max(1))
    }

    fn priority(&self, source: &str) -> u32 {
        self.priorities.get(source).copied().unwrap_or(u32::MAX)
    }

    fn compare(&self, a: &CandidateResult, ia: usize, b: &CandidateResult, ib: usize) -> Ordering {
        b.combined_score()
            .total_cmp(&a.combined_score())
            .then_with(|| self.priority(&a.source).cmp(&self.priority(&b.source)))
            .then_with(|| ia.cmp(&ib))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AdapterKind, ContentKind};

    fn source(name: &str, priority: u32) -> SourceDescriptor {
        SourceDescriptor {
            name: name.into(),
            endpoint: format!("https://{name}.example.org"),
            topics: vec![],
            languages: vec![],
            priority,
            rate_limit_group: "default".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        }
    }

    fn candidate(source: &str, title: &str, relevance: f64, authenticity: f64) -> CandidateResult {
        let mut c = CandidateResult::new(
            title,
            "snippet",
            format!("https://{source}.example.org/{}", title.len()),
            source,
            ContentKind::Generic,
        );
        c.relevance_score = relevance;
        c.authenticity_score = authenticity;
        c
    }

    fn ranker() -> Ranker {
        Ranker::new(RankerConfig::default(), &[source("a", 1), source("b", 2)])
    }

    #[test]
    fn higher_combined_score_ranks_first() {
        let ranked = ranker().rank_all(vec![
            candidate("b", "B result", 0.5, 0.8),
            candidate("a", "A result", 0.9, 1.0),
        ]);
        assert_eq!(ranked[0].source, "a");
        assert!((ranked[0].combined_score() - 0.9).abs() < 1e-12);
        assert!((ranked[1].combined_score() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn below_floor_is_dropped() {
        let ranked = ranker().rank_all(vec![
            candidate("a", "kept", 0.3, 1.0),
            candidate("a", "dropped", 0.29, 1.0),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "kept");
    }

    #[test]
    fn duplicate_source_and_title_first_wins() {
        let ranked = ranker().rank_all(vec![
            candidate("a", "Night Prayer", 0.4, 1.0),
            candidate("a", "night  prayer!", 0.9, 1.0),
            candidate("b", "Night Prayer", 0.6, 1.0),
        ]);
        assert_eq!(ranked.len(), 2);
        let from_a = ranked.iter().find(|c| c.source == "a").expect("a kept");
        assert!((from_a.relevance_score - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_break_by_priority_then_discovery() {
        let ranked = ranker().rank_all(vec![
            candidate("b", "first b", 0.5, 1.0),
            candidate("a", "first a", 0.5, 1.0),
            candidate("a", "second a", 0.5, 1.0),
            candidate("zz", "unknown source", 0.5, 1.0),
        ]);
        let titles: Vec<&str> = ranked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["first a", "second a", "first b", "unknown source"]);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let ranked = ranker().rank_all(vec![
            candidate("a", "big", 3.0, 2.0),
            candidate("a", "nan", f64::NAN, 1.0),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].relevance_score, 1.0);
        assert_eq!(ranked[0].authenticity_score, 1.0);
    }

    #[test]
    fn paging_and_total() {
        let candidates: Vec<CandidateResult> = (0..45)
            .map(|i| candidate("a", &format!("item {i}"), 1.0 - f64::from(i) * 0.01, 1.0))
            .collect();
        let ranker = ranker();
        let ranked = ranker.rank_all(candidates);

        let first = ranker.page(ranked.clone(), 1, 20);
        assert_eq!(first.total_found, 45);
        assert_eq!(first.results.len(), 20);
        assert_eq!(first.results[0].title, "item 0");

        let third = ranker.page(ranked.clone(), 3, 20);
        assert_eq!(third.results.len(), 5);
        assert_eq!(third.results[0].title, "item 40");

        let beyond = ranker.page(ranked, 9, 20);
        assert!(beyond.results.is_empty());
        assert_eq!(beyond.total_found, 45);
    }

    #[test]
    fn page_size_defaults_and_caps() {
        let ranker = ranker();
        assert_eq!(ranker.effective_page_size(0), 20);
        assert_eq!(ranker.effective_page_size(500), 100);
        assert_eq!(ranker.effective_page_size(7), 7);
    }

    #[test]
    fn output_is_sorted_and_unique() {
        let mut candidates = Vec::new();
        for i in 0..60u32 {
            let source = if i % 2 == 0 { "a" } else { "b" };
            let relevance = f64::from((i * 37) % 100) / 100.0;
            let authenticity = f64::from((i * 53) % 100) / 100.0;
            candidates.push(candidate(source, &format!("t{}", i % 17), relevance, authenticity));
        }
        let ranked = ranker().rank_all(candidates);
        for pair in ranked.windows(2) {
            assert!(pair[0].combined_score() >= pair[1].combined_score());
        }
        let mut keys = HashSet::new();
        for c in &ranked {
            assert!(keys.insert((c.source.clone(), normalize_title(&c.title))));
        }
    }

    #[test]
    fn usable_count_respects_floor() {
        let candidates = vec![
            candidate("a", "x", 0.1, 1.0),
            candidate("a", "y", 0.8, 0.1),
        ];
        assert_eq!(ranker().usable_count(&candidates), 1);
    }
}
