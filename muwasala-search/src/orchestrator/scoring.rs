//! Scoring contract for candidate results.
//!
//! - Every score is bounded in `[0, 1]`; non-finite inputs become 0.
//! - `combined = relevance × authenticity`, so it is monotone in both and
//!   reproducible from those two fields alone.
//! - Keyword relevance grows with the number of query keywords an item
//!   mentions, a title hit weighing more than a snippet-only hit.
//!
//! The keyword heuristic is deliberately simple. Only the contract above is
//! relied upon elsewhere.

/// Relevance assigned when the query has no usable keywords.
pub const NEUTRAL_RELEVANCE: f64 = 0.5;

/// Weight of a keyword found only in the snippet, relative to a title hit.
const SNIPPET_HIT_WEIGHT: f64 = 0.6;

/// Clamp `value` into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `relevance × authenticity` after clamping both into `[0, 1]`.
pub fn combined_score(relevance: f64, authenticity: f64) -> f64 {
    clamp_unit(relevance) * clamp_unit(authenticity)
}

/// Fraction of distinct `keywords` mentioned by an item, in `[0, 1]`.
///
/// A keyword found in the title counts 1.0, one found only in the snippet
/// counts [`SNIPPET_HIT_WEIGHT`]. Matching is case-insensitive substring
/// containment, which also works for scripts without word spacing rules.
pub fn keyword_relevance(keywords: &[String], title: &str, snippet: &str) -> f64 {
    let mut distinct: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    distinct.sort();
    distinct.dedup();
    if distinct.is_empty() {
        return NEUTRAL_RELEVANCE;
    }

    let title = title.to_lowercase();
    let snippet = snippet.to_lowercase();
    let hits: f64 = distinct
        .iter()
        .map(|k| {
            if title.contains(k.as_str()) {
                1.0
            } else if snippet.contains(k.as_str()) {
                SNIPPET_HIT_WEIGHT
            } else {
                0.0
            }
        })
        .sum();

    clamp_unit(hits / distinct.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    #[test]
    fn combined_score_examples() {
        assert!((combined_score(0.9, 1.0) - 0.9).abs() < 1e-12);
        assert!((combined_score(0.5, 0.8) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn combined_score_is_bounded() {
        assert_eq!(combined_score(1.7, 2.0), 1.0);
        assert_eq!(combined_score(-0.2, 0.9), 0.0);
        assert_eq!(combined_score(f64::NAN, 1.0), 0.0);
        assert_eq!(combined_score(f64::INFINITY, 0.5), 0.5);
    }

    #[test]
    fn combined_score_is_monotone() {
        let mut last = 0.0;
        for step in 0..=10 {
            let r = f64::from(step) / 10.0;
            let score = combined_score(r, 0.7);
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn title_hit_beats_snippet_hit() {
        let keywords = kw(&["fasting"]);
        let title = keyword_relevance(&keywords, "Rules of fasting", "");
        let snippet = keyword_relevance(&keywords, "Ramadan", "about fasting");
        assert!((title - 1.0).abs() < f64::EPSILON);
        assert!((snippet - SNIPPET_HIT_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn more_matched_keywords_never_lower_relevance() {
        let keywords = kw(&["prayer", "travel", "shorten"]);
        let one = keyword_relevance(&keywords, "Prayer times", "");
        let two = keyword_relevance(&keywords, "Prayer while travel", "");
        let three = keyword_relevance(&keywords, "Shorten prayer while travel", "");
        assert!(one < two && two < three);
        assert!((three - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_keywords_count_once() {
        let keywords = kw(&["zakat", "Zakat", "gold"]);
        let score = keyword_relevance(&keywords, "Zakat on savings", "");
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn no_keywords_is_neutral() {
        assert_eq!(keyword_relevance(&[], "anything", "at all"), NEUTRAL_RELEVANCE);
        assert_eq!(keyword_relevance(&kw(&["  "]), "x", "y"), NEUTRAL_RELEVANCE);
    }

    #[test]
    fn matching_is_case_insensitive_and_unicode() {
        let keywords = kw(&["صلاة"]);
        assert!((keyword_relevance(&keywords, "أحكام الصلاة", "") - 1.0).abs() < f64::EPSILON);
        let keywords = kw(&["HAJJ"]);
        assert!((keyword_relevance(&keywords, "hajj guide", "") - 1.0).abs() < f64::EPSILON);
    }
}
