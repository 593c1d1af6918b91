//! Application configuration, stored as TOML.
//!
//! Every section has defaults, so a missing file or a partial file works:
//!
//! ```toml
//! [synthesizer]
//! base_url = "http://localhost:11434"
//!
//! [search.timeouts]
//! fanout_secs = 20
//!
//! [classifier.topics]
//! prayer = ["pray", "prayer", "salah", "fajr"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use muwasala_search::AggregatorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Query classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Words never used as keywords.
    pub stopwords: Vec<String>,
    /// Topic tag → words that mark a query as being about it.
    pub topics: BTreeMap<String, Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let stopwords = [
            "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how", "i",
            "in", "is", "it", "me", "my", "of", "on", "or", "should", "the", "to", "what", "when", "where",
            "which", "who", "why", "with", "you",
        ];
        let topics: [(&str, &[&str]); 7] = [
            ("prayer", &["pray", "prayer", "prayers", "salah", "salat", "fajr", "dhuhr", "asr", "maghrib", "isha", "witr", "صلاة"]),
            ("fasting", &["fast", "fasting", "ramadan", "sawm", "suhoor", "iftar", "صوم", "رمضان"]),
            ("zakat", &["zakat", "zakah", "charity", "sadaqah", "nisab", "زكاة"]),
            ("hajj", &["hajj", "umrah", "pilgrimage", "ihram", "tawaf", "حج"]),
            ("quran", &["quran", "verse", "ayah", "surah", "tafsir", "قرآن"]),
            ("hadith", &["hadith", "sunnah", "narrated", "bukhari", "muslim", "حديث"]),
            ("family", &["marriage", "divorce", "nikah", "wife", "husband", "parents", "inheritance"]),
        ];
        Self {
            stopwords: stopwords.iter().map(|s| (*s).to_owned()).collect(),
            topics: topics
                .iter()
                .map(|(topic, words)| {
                    (
                        (*topic).to_owned(),
                        words.iter().map(|w| (*w).to_owned()).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// Answer synthesizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Whether answers are synthesised at all.
    pub enabled: bool,
    /// Base URL of an Ollama-compatible server.
    pub base_url: String,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".into(),
        }
    }
}

/// Search history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether completed searches are recorded.
    pub enabled: bool,
    /// JSON-lines file to append to. Defaults to
    /// [`crate::paths::history_file`].
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl HistoryConfig {
    /// The file records go to.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(crate::paths::history_file)
    }
}

/// Everything the application reads from its config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Aggregator settings: sources, routing, deadlines, fallback content.
    pub search: AggregatorConfig,
    /// Query classification.
    pub classifier: ClassifierConfig,
    /// Answer synthesis.
    pub synthesizer: SynthesizerConfig,
    /// Search history.
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }

    /// Load from `path` if given, else from the default path when that file
    /// exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_config_path();
                if default.is_file() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.search
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.synthesizer.enabled && self.synthesizer.base_url.trim().is_empty() {
            return Err(AppError::Config(
                "synthesizer.base_url must not be empty".into(),
            ));
        }
        if let Some(topic) = self.classifier.topics.keys().find(|t| t.trim().is_empty()) {
            return Err(AppError::Config(format!(
                "classifier topic name must not be empty (got {topic:?})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.synthesizer.enabled);
        assert!(config.classifier.topics.contains_key("prayer"));
        assert!(config.classifier.stopwords.iter().any(|w| w == "the"));
    }

    #[test]
    fn classifier_topics_cover_routing_table() {
        let config = AppConfig::default();
        for topic in config.search.routing.keys() {
            assert!(
                config.classifier.topics.contains_key(topic),
                "no trigger words for routed topic {topic}"
            );
        }
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [synthesizer]
            enabled = false

            [search.timeouts]
            fanout_secs = 20
            "#,
        )
        .expect("parse");
        assert!(!config.synthesizer.enabled);
        assert_eq!(config.search.timeouts.fanout_secs, 20);
        assert_eq!(config.search.timeouts.search_secs, 30);
        assert_eq!(config.search.sources.len(), 4);
    }

    #[test]
    fn empty_synthesizer_url_rejected() {
        let mut config = AppConfig::default();
        config.synthesizer.base_url = " ".into();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
        config.synthesizer.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_search_section_rejected() {
        let mut config = AppConfig::default();
        config.search.timeouts.search_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search_secs"));
    }

    #[test]
    fn history_path_defaults_to_data_dir() {
        let config = HistoryConfig::default();
        assert_eq!(config.resolved_path(), crate::paths::history_file());
        let custom = HistoryConfig {
            path: Some(PathBuf::from("/var/log/muwasala.jsonl")),
            ..HistoryConfig::default()
        };
        assert_eq!(custom.resolved_path(), PathBuf::from("/var/log/muwasala.jsonl"));
    }
}
