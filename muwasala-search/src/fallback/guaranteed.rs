//! Tier 3: the answer that is always available.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CandidateResult, ContentKind};

/// Source name stamped on the guaranteed result.
pub const GUARANTEED_SOURCE: &str = "muwasala";

/// The guaranteed result and follow-up suggestions for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteedEntry {
    /// Result title.
    pub title: String,
    /// Result snippet.
    pub snippet: String,
    /// Result link.
    pub url: String,
    /// Suggested follow-up queries.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Per-language guaranteed responses. English is used for any language
/// without an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuaranteedResponder {
    /// Entries by language code.
    pub entries: BTreeMap<String, GuaranteedEntry>,
}

impl Default for GuaranteedResponder {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "en".to_owned(),
            GuaranteedEntry {
                title: "Read and search the Quran".into(),
                snippet: "Live sources are unavailable right now. The full text of the Quran with translations can be searched directly.".into(),
                url: "https://quran.com".into(),
                suggestions: vec![
                    "Try a shorter query with one key term".into(),
                    "Search a related topic such as prayer, fasting or zakat".into(),
                    "Try again in a minute".into(),
                ],
            },
        );
        entries.insert(
            "ar".to_owned(),
            GuaranteedEntry {
                title: "اقرأ القرآن الكريم وابحث فيه".into(),
                snippet: "المصادر غير متاحة حاليا. يمكنك البحث في نص القرآن الكريم مباشرة.".into(),
                url: "https://quran.com/ar".into(),
                suggestions: vec![
                    "جرّب كلمة مفتاحية واحدة".into(),
                    "ابحث عن موضوع قريب مثل الصلاة أو الصيام أو الزكاة".into(),
                    "أعد المحاولة بعد قليل".into(),
                ],
            },
        );
        Self { entries }
    }
}

impl GuaranteedResponder {
    /// Entry for `language`, falling back to English, then to any entry.
    pub fn entry(&self, language: &str) -> Option<&GuaranteedEntry> {
        self.entries
            .get(&language.to_lowercase())
            .or_else(|| self.entries.get("en"))
            .or_else(|| self.entries.values().next())
    }

    /// The guaranteed result and suggestions for `language`.
    ///
    /// Never empty: a configuration without entries still yields a bare
    /// link to the Quran text.
    pub fn respond(&self, language: &str) -> (CandidateResult, Vec<String>) {
        let (mut result, suggestions) = match self.entry(language) {
            Some(entry) => (
                CandidateResult::new(
                    entry.title.clone(),
                    entry.snippet.clone(),
                    entry.url.clone(),
                    GUARANTEED_SOURCE,
                    ContentKind::Generic,
                ),
                entry.suggestions.clone(),
            ),
            None => (
                CandidateResult::new("Quran.com", "", "https://quran.com", GUARANTEED_SOURCE, ContentKind::Generic),
                Vec::new(),
            ),
        };
        result.relevance_score = 1.0;
        result.authenticity_score = 0.5;
        (result, suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_has_its_own_entry() {
        let (result, suggestions) = GuaranteedResponder::default().respond("ar");
        assert_eq!(result.url, "https://quran.com/ar");
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn unknown_language_uses_english() {
        let (result, suggestions) = GuaranteedResponder::default().respond("sw");
        assert_eq!(result.url, "https://quran.com");
        assert!(!suggestions.is_empty());
    }

    #[test]
    fn empty_configuration_still_answers() {
        let responder = GuaranteedResponder {
            entries: BTreeMap::new(),
        };
        let (result, _) = responder.respond("en");
        assert!(!result.title.is_empty());
        assert_eq!(result.relevance_score, 1.0);
    }
}
