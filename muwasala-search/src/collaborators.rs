//! External collaborators the aggregator calls but does not implement:
//! query classification and answer synthesis.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::QueryContext;

/// Turns raw query text into a [`QueryContext`].
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    /// Classify `text` written in `language`.
    ///
    /// # Errors
    ///
    /// Any failure. The aggregator falls back to
    /// [`QueryContext::from_raw`].
    async fn classify(&self, text: &str, language: &str) -> Result<QueryContext>;
}

/// Produces prose from a prompt, typically a language model.
#[async_trait]
pub trait TextSynthesizer: Send + Sync {
    /// Generate text for `prompt` using `model`.
    ///
    /// # Errors
    ///
    /// Any failure. The aggregator answers with a canned apology instead.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Classifier that does no classification: keywords come from the raw
/// text and no topics are tagged, so every source is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawClassifier;

#[async_trait]
impl QueryClassifier for RawClassifier {
    async fn classify(&self, text: &str, language: &str) -> Result<QueryContext> {
        Ok(QueryContext::from_raw(text, language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raw_classifier_tags_no_topics() {
        let ctx = RawClassifier.classify("Zakat on gold", "en").await.expect("classify");
        assert!(ctx.topics.is_empty());
        assert_eq!(ctx.keywords, vec!["zakat", "on", "gold"]);
    }
}
