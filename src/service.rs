//! Wires configuration into a running [`Aggregator`].

use std::sync::Arc;

use muwasala_search::{Aggregator, HistoryQueue, HistorySink};

use crate::classifier::KeywordClassifier;
use crate::config::AppConfig;
use crate::error::Result;
use crate::history::JsonlHistorySink;
use crate::synthesizer::HttpSynthesizer;

/// Build the aggregator described by `config`.
///
/// Spawns the history writer when history is enabled, so this must run
/// inside a tokio runtime.
///
/// # Errors
///
/// Returns [`crate::AppError::Config`] for invalid configuration and
/// [`crate::AppError::Search`] if the aggregator cannot be assembled.
pub fn build_aggregator(config: &AppConfig) -> Result<Aggregator> {
    config.validate()?;

    let mut builder = Aggregator::builder(config.search.clone())
        .classifier(Arc::new(KeywordClassifier::new(&config.classifier)));

    if config.synthesizer.enabled {
        builder = builder.synthesizer(Arc::new(HttpSynthesizer::new(
            config.synthesizer.base_url.clone(),
            config.search.timeouts.synthesis(),
        )));
    }

    if config.history.enabled {
        let path = config.history.resolved_path();
        tracing::debug!(path = %path.display(), "recording search history");
        let sink: Arc<dyn HistorySink> = Arc::new(JsonlHistorySink::new(path));
        builder = builder.history(HistoryQueue::spawn(sink, config.search.history_capacity));
    }

    Ok(builder.build()?)
}
