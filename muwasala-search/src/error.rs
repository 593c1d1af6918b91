//! Error types for the muwasala-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. Source failures are recorded against that
//! source's circuit and never reach the caller of
//! [`crate::Aggregator::search`]; the only errors a caller sees are its own
//! cancellation and configuration problems found before any work starts.

/// Errors that can occur during a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The caller cancelled the search.
    #[error("search cancelled")]
    Cancelled,

    /// An operation exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP request to a source failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A source response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration or request.
    #[error("config error: {0}")]
    Config(String),

    /// A source reported a failure of its own.
    #[error("source {source_name} failed: {message}")]
    SourceFailed {
        /// Name of the failing source.
        source_name: String,
        /// What went wrong.
        message: String,
    },

    /// The text synthesizer failed.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// The query classifier failed.
    #[error("classifier error: {0}")]
    Classifier(String),
}

/// Convenience type alias for muwasala-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_cancelled() {
        assert_eq!(SearchError::Cancelled.to_string(), "search cancelled");
    }

    #[test]
    fn display_timeout() {
        let err = SearchError::Timeout("source quran exceeded 10s".into());
        assert_eq!(err.to_string(), "timed out: source quran exceeded 10s");
    }

    #[test]
    fn display_http() {
        let err = SearchError::Http("connection refused".into());
        assert_eq!(err.to_string(), "HTTP error: connection refused");
    }

    #[test]
    fn display_source_failed() {
        let err = SearchError::SourceFailed {
            source_name: "hadith".into(),
            message: "status 503".into(),
        };
        assert_eq!(err.to_string(), "source hadith failed: status 503");
    }

    #[test]
    fn display_config() {
        let err = SearchError::Config("page_size must be > 0".into());
        assert_eq!(err.to_string(), "config error: page_size must be > 0");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
    }
}
