//! Answer synthesis against an Ollama-compatible `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use muwasala_search::{Result, SearchError, TextSynthesizer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Non-streaming text generation over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    /// Synthesizer for the server at `base_url`. `timeout` bounds each
    /// request at the transport level; the aggregator applies its own
    /// deadline on top.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextSynthesizer for HttpSynthesizer {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout("synthesizer request timed out".into())
                } else {
                    SearchError::Synthesis(format!("request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(SearchError::Synthesis(format!("HTTP {}: {detail}", status.as_u16())));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Synthesis(format!("malformed response: {e}")))?;
        tracing::debug!(model, chars = parsed.response.len(), "answer generated");
        Ok(parsed.response)
    }
}
