//! Shared HTTP client construction for source adapters.
//!
//! Every adapter gets its own [`reqwest::Client`] so that the per-source
//! timeout is enforced by the transport as well as by the circuit breaker.

use crate::error::SearchError;
use rand::seq::SliceRandom;
use std::time::Duration;

/// Browser-like User-Agent strings, rotated per client. Some sources
/// (HTML listing pages especially) reject obvious bot agents.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a client with `timeout`, compression, limited redirects and either
/// the configured User-Agent or a rotated one.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(timeout: Duration, user_agent: Option<&str>) -> Result<reqwest::Client, SearchError> {
    let ua = user_agent.unwrap_or_else(|| random_user_agent());

    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Pick a User-Agent from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Map a transport error into a [`SearchError`], keeping timeouts distinct.
pub(crate) fn map_reqwest_error(source: &str, err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout(format!("{source} request timed out"))
    } else if let Some(status) = err.status() {
        SearchError::Http(format!("{source} returned status {status}"))
    } else {
        SearchError::Http(format!("{source} request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_comes_from_list() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn builds_with_rotated_agent() {
        assert!(build_client(Duration::from_secs(10), None).is_ok());
    }

    #[test]
    fn builds_with_custom_agent() {
        assert!(build_client(Duration::from_secs(1), Some("Muwasala/0.1")).is_ok());
    }

    #[test]
    fn builds_with_borrowed_configured_agent() {
        let configured = format!("Muwasala/{}", env!("CARGO_PKG_VERSION"));
        assert!(build_client(Duration::from_secs(1), Some(configured.as_str())).is_ok());
    }
}
