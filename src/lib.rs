//! Muwasala: one question, many Islamic knowledge sources, one ranked answer.
//!
//! The search core lives in the `muwasala-search` crate. This crate is the
//! application around it:
//!
//! - **Config**: TOML file with defaults for every section
//! - **Classifier**: stopword and trigger-word query tagging
//! - **Synthesizer**: answer generation through a local LLM server
//! - **History**: completed searches appended to a JSON-lines file
//! - **Service**: builds the aggregator from all of the above

pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod paths;
pub mod service;
pub mod synthesizer;

pub use classifier::KeywordClassifier;
pub use config::{AppConfig, ClassifierConfig, HistoryConfig, SynthesizerConfig};
pub use error::{AppError, Result};
pub use history::JsonlHistorySink;
pub use service::build_aggregator;
pub use synthesizer::HttpSynthesizer;
