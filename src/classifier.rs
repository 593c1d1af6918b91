//! Rule-based query classifier.
//!
//! Tokenises on anything that is not a letter or digit, so Arabic and Latin
//! text split the same way. Keywords are the tokens left after stopwords
//! and one-character tokens are removed; topics are tagged when any of
//! their trigger words appears among the tokens.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use muwasala_search::{QueryClassifier, QueryContext, Result};

use crate::config::ClassifierConfig;

/// Keyword and trigger-word classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    stopwords: HashSet<String>,
    topics: BTreeMap<String, HashSet<String>>,
}

impl KeywordClassifier {
    /// Build from configured stopwords and topic trigger words.
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            stopwords: config.stopwords.iter().map(|w| w.to_lowercase()).collect(),
            topics: config
                .topics
                .iter()
                .map(|(topic, words)| {
                    (
                        topic.to_lowercase(),
                        words.iter().map(|w| w.to_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Classify synchronously.
    pub fn classify_text(&self, text: &str, language: &str) -> QueryContext {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let topics = self
            .topics
            .iter()
            .filter(|(_, triggers)| tokens.iter().any(|t| triggers.contains(t)))
            .map(|(topic, _)| topic.clone())
            .collect();

        let mut seen = HashSet::new();
        let keywords = tokens
            .into_iter()
            .filter(|t| t.chars().count() >= 2 && !self.stopwords.contains(t))
            .filter(|t| seen.insert(t.clone()))
            .collect();

        QueryContext {
            text: text.to_owned(),
            language: language.to_owned(),
            topics,
            keywords,
        }
    }
}

#[async_trait]
impl QueryClassifier for KeywordClassifier {
    async fn classify(&self, text: &str, language: &str) -> Result<QueryContext> {
        let ctx = self.classify_text(text, language);
        tracing::debug!(topics = ?ctx.topics, keywords = ctx.keywords.len(), "keyword classification");
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> KeywordClassifier {
        KeywordClassifier::new(&ClassifierConfig::default())
    }

    #[test]
    fn tags_prayer_and_drops_stopwords() {
        let ctx = classifier().classify_text("How do I pray Witr at night?", "en");
        assert_eq!(ctx.topics, vec!["prayer"]);
        assert_eq!(ctx.keywords, vec!["pray", "witr", "night"]);
        assert_eq!(ctx.text, "How do I pray Witr at night?");
    }

    #[test]
    fn tags_several_topics_in_table_order() {
        let ctx = classifier().classify_text("Zakat on money saved for Hajj", "en");
        assert_eq!(ctx.topics, vec!["hajj", "zakat"]);
    }

    #[test]
    fn untagged_query_has_no_topics() {
        let ctx = classifier().classify_text("history of Andalusian astronomy", "en");
        assert!(ctx.topics.is_empty());
        assert_eq!(ctx.keywords, vec!["history", "andalusian", "astronomy"]);
    }

    #[test]
    fn arabic_text_is_tokenised() {
        let ctx = classifier().classify_text("ما حكم الصوم في السفر؟ صوم", "ar");
        assert_eq!(ctx.topics, vec!["fasting"]);
        assert!(ctx.keywords.contains(&"السفر".to_owned()));
        assert_eq!(ctx.language, "ar");
    }

    #[test]
    fn repeated_words_become_one_keyword() {
        let ctx = classifier().classify_text("fasting fasting FASTING", "en");
        assert_eq!(ctx.keywords, vec!["fasting"]);
    }

    #[tokio::test]
    async fn trait_impl_matches_sync_path() {
        let c = classifier();
        let ctx = c.classify("zakat nisab", "en").await.expect("classify");
        assert_eq!(ctx, c.classify_text("zakat nisab", "en"));
    }
}
