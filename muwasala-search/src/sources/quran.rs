//! Quran verse search against an alquran.cloud-compatible API.
//!
//! The API searches one keyword at a time: `GET {endpoint}/{keyword}/all/{edition}`.
//! The longest query keyword is used, since it is usually the most
//! selective. A 404 means "no matches" on this API, not a broken endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Result, SearchError};
use crate::http::{build_client, map_reqwest_error};
use crate::source::{finalize_candidates, until_cancelled, SourceAdapter};
use crate::types::{AdapterKind, CandidateResult, ContentKind, QueryContext, SourceDescriptor};

/// Where verse links point.
const VERSE_LINK_BASE: &str = "https://quran.com";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    matches: Vec<VerseMatch>,
}

#[derive(Debug, Deserialize)]
struct VerseMatch {
    text: String,
    surah: SurahInfo,
    #[serde(rename = "numberInSurah")]
    number_in_surah: u32,
}

#[derive(Debug, Deserialize)]
struct SurahInfo {
    number: u32,
    #[serde(rename = "englishName")]
    english_name: String,
}

/// Verse search source.
pub struct QuranApiSource {
    descriptor: SourceDescriptor,
    client: reqwest::Client,
    base: Url,
    edition: String,
}

impl QuranApiSource {
    /// Build the adapter from a descriptor whose adapter kind is
    /// [`AdapterKind::QuranApi`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for the wrong adapter kind or a bad
    /// endpoint, and [`SearchError::Http`] if the client cannot be built.
    pub fn new(descriptor: SourceDescriptor, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let AdapterKind::QuranApi { edition } = &descriptor.adapter else {
            return Err(SearchError::Config(format!(
                "source {} is not a quran api source",
                descriptor.name
            )));
        };
        let base = Url::parse(&descriptor.endpoint)
            .map_err(|e| SearchError::Config(format!("source {} endpoint: {e}", descriptor.name)))?;
        if base.cannot_be_a_base() {
            return Err(SearchError::Config(format!(
                "source {} endpoint cannot take a path",
                descriptor.name
            )));
        }
        let edition = edition.clone();
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            descriptor,
            base,
            edition,
        })
    }

    fn request_url(&self, keyword: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([keyword, "all", self.edition.as_str()]);
        }
        url
    }

    async fn request(&self, keyword: &str) -> Result<Vec<CandidateResult>> {
        let name = &self.descriptor.name;
        tracing::trace!(source = %name, keyword, "verse search request");
        let response = self
            .client
            .get(self.request_url(keyword))
            .send()
            .await
            .map_err(|e| map_reqwest_error(name, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(source = %name, "no verse matches");
            return Ok(Vec::new());
        }

        let envelope: SearchEnvelope = response
            .error_for_status()
            .map_err(|e| map_reqwest_error(name, e))?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("{name} returned unexpected JSON: {e}")))?;
        Ok(envelope.data.matches.into_iter().map(verse_candidate).collect())
    }
}

#[async_trait]
impl SourceAdapter for QuranApiSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>> {
        let Some(keyword) = search_keyword(ctx) else {
            return Ok(Vec::new());
        };
        let raw = until_cancelled(cancel, self.request(keyword)).await?;
        tracing::debug!(source = %self.descriptor.name, count = raw.len(), "verses found");
        Ok(finalize_candidates(&self.descriptor, ctx, raw))
    }
}

/// The longest keyword; the first one wins ties.
fn search_keyword(ctx: &QueryContext) -> Option<&str> {
    ctx.keywords
        .iter()
        .map(String::as_str)
        .reduce(|best, k| if k.chars().count() > best.chars().count() { k } else { best })
}

fn verse_candidate(m: VerseMatch) -> CandidateResult {
    let surah = m.surah.number;
    let ayah = m.number_in_surah;
    let mut candidate = CandidateResult::new(
        format!("{} {surah}:{ayah}", m.surah.english_name),
        m.text,
        format!("{VERSE_LINK_BASE}/{surah}/{ayah}"),
        "",
        ContentKind::Verse { surah, ayah },
    );
    candidate
        .metadata
        .insert("surah_name".into(), m.surah.english_name);
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(endpoint: &str) -> SourceDescriptor {
        SourceDescriptor {
            name: "quran".into(),
            endpoint: endpoint.into(),
            topics: vec![],
            languages: vec![],
            priority: 0,
            rate_limit_group: "default".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        }
    }

    #[test]
    fn picks_longest_keyword() {
        let ctx = QueryContext::from_raw("rules of fasting in dhul hijjah", "en");
        assert_eq!(search_keyword(&ctx), Some("fasting"));
        assert_eq!(search_keyword(&QueryContext::from_raw("?", "en")), None);
    }

    #[test]
    fn first_keyword_wins_length_ties() {
        let ctx = QueryContext::from_raw("rules of fasting in ramadan", "en");
        assert_eq!(search_keyword(&ctx), Some("fasting"));
    }

    #[test]
    fn request_url_appends_segments() {
        let source =
            QuranApiSource::new(descriptor("https://api.alquran.cloud/v1/search/"), Duration::from_secs(5), None)
                .expect("source");
        assert_eq!(
            source.request_url("fasting").as_str(),
            "https://api.alquran.cloud/v1/search/fasting/all/en.sahih"
        );
    }

    #[test]
    fn matches_map_to_verses() {
        let body = r#"{"code":200,"status":"OK","data":{"count":1,"matches":[
            {"number":190,"text":"O you who have believed, decreed upon you is fasting",
             "edition":{"identifier":"en.sahih"},
             "surah":{"number":2,"name":"سُورَةُ البَقَرَةِ","englishName":"Al-Baqara"},
             "numberInSurah":183}
        ]}}"#;
        let envelope: SearchEnvelope = serde_json::from_str(body).expect("parse");
        let candidates: Vec<_> = envelope.data.matches.into_iter().map(verse_candidate).collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Al-Baqara 2:183");
        assert_eq!(candidates[0].url, "https://quran.com/2/183");
        assert_eq!(candidates[0].content, ContentKind::Verse { surah: 2, ayah: 183 });
    }

    #[tokio::test]
    async fn no_keywords_means_no_request() {
        // Unroutable endpoint: a request would fail, an early return succeeds.
        let source = QuranApiSource::new(descriptor("http://127.0.0.1:9/v1/search"), Duration::from_secs(1), None)
            .expect("source");
        let ctx = QueryContext::from_raw("!", "en");
        let out = source.fetch(&ctx, &CancellationToken::new()).await.expect("fetch");
        assert!(out.is_empty());
    }
}
