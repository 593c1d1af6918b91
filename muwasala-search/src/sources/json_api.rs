//! Generic JSON search API source.
//!
//! Covers the common shape of self-hosted hadith indexes and article
//! aggregators: `GET {endpoint}?q=…&lang=…` answering with an array of
//! items somewhere in the body. Each item needs `title` and `url`; the
//! snippet is read from `snippet`, `text` or `body`, whichever is present.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Result, SearchError};
use crate::http::{build_client, map_reqwest_error};
use crate::source::{finalize_candidates, until_cancelled, SourceAdapter};
use crate::types::{AdapterKind, CandidateResult, ContentKind, QueryContext, SourceDescriptor};

/// Keys tried in order for the snippet text.
const SNIPPET_KEYS: &[&str] = &["snippet", "text", "body"];

/// Keys copied verbatim into candidate metadata when present.
const METADATA_KEYS: &[&str] = &["reference", "grade", "narrator", "author", "book"];

/// A JSON search API.
pub struct JsonApiSource {
    descriptor: SourceDescriptor,
    client: reqwest::Client,
    base: Url,
    query_param: String,
    language_param: Option<String>,
    results_pointer: String,
    content: ContentKind,
}

impl JsonApiSource {
    /// Build the adapter from a descriptor whose adapter kind is
    /// [`AdapterKind::JsonApi`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for the wrong adapter kind or a bad
    /// endpoint, and [`SearchError::Http`] if the client cannot be built.
    pub fn new(descriptor: SourceDescriptor, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let AdapterKind::JsonApi {
            query_param,
            language_param,
            results_pointer,
            content,
        } = &descriptor.adapter
        else {
            return Err(SearchError::Config(format!(
                "source {} is not a json api source",
                descriptor.name
            )));
        };
        let base = Url::parse(&descriptor.endpoint)
            .map_err(|e| SearchError::Config(format!("source {} endpoint: {e}", descriptor.name)))?;
        let (query_param, language_param, results_pointer, content) = (
            query_param.clone(),
            language_param.clone(),
            results_pointer.clone(),
            content.clone(),
        );
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            descriptor,
            base,
            query_param,
            language_param,
            results_pointer,
            content,
        })
    }

    fn request_url(&self, ctx: &QueryContext) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(&self.query_param, &ctx.text);
            if let Some(lang) = &self.language_param {
                pairs.append_pair(lang, &ctx.language);
            }
        }
        url
    }

    async fn request(&self, ctx: &QueryContext) -> Result<Value> {
        let name = &self.descriptor.name;
        tracing::trace!(source = %name, query = %ctx.text, "json api request");
        self.client
            .get(self.request_url(ctx))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| map_reqwest_error(name, e))?
            .error_for_status()
            .map_err(|e| map_reqwest_error(name, e))?
            .json::<Value>()
            .await
            .map_err(|e| SearchError::Parse(format!("{name} returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl SourceAdapter for JsonApiSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>> {
        let body = until_cancelled(cancel, self.request(ctx)).await?;
        let raw = parse_json_results(&body, &self.results_pointer, &self.content)?;
        tracing::debug!(source = %self.descriptor.name, count = raw.len(), "json results parsed");
        Ok(finalize_candidates(&self.descriptor, ctx, raw))
    }
}

/// Map the item array at `pointer` into candidates.
///
/// Items missing `title` or `url` are skipped. For hadith sources, per-item
/// `collection` and `number` fields refine the configured content kind.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if `pointer` does not name an array.
pub(crate) fn parse_json_results(body: &Value, pointer: &str, content: &ContentKind) -> Result<Vec<CandidateResult>> {
    let items = body
        .pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Parse(format!("no result array at {pointer}")))?;

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        let (Some(title), Some(url)) = (str_field(item, "title"), str_field(item, "url")) else {
            continue;
        };
        let snippet = SNIPPET_KEYS
            .iter()
            .find_map(|k| str_field(item, k))
            .unwrap_or_default();

        let mut candidate = CandidateResult::new(title, snippet, url, "", item_content(item, content));
        candidate.published_date = str_field(item, "published")
            .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok());
        for key in METADATA_KEYS {
            if let Some(value) = scalar_field(item, key) {
                candidate.metadata.insert((*key).to_owned(), value);
            }
        }
        results.push(candidate);
    }
    Ok(results)
}

fn item_content(item: &Value, configured: &ContentKind) -> ContentKind {
    match configured {
        ContentKind::Hadith { collection, number } => ContentKind::Hadith {
            collection: str_field(item, "collection")
                .map(str::to_owned)
                .unwrap_or_else(|| collection.clone()),
            number: scalar_field(item, "number").or_else(|| number.clone()),
        },
        other => other.clone(),
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// A string or number field rendered as text.
fn scalar_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hadith_kind() -> ContentKind {
        ContentKind::Hadith {
            collection: "unknown".into(),
            number: None,
        }
    }

    #[test]
    fn parses_items_with_fallback_snippet_keys() {
        let body = json!({
            "results": [
                {"title": "Fasting is a shield", "url": "https://sunnah.com/bukhari:1894",
                 "text": "The Prophet said fasting is a shield.", "collection": "bukhari",
                 "number": 1894, "grade": "sahih", "published": "2019-04-01T00:00:00Z"},
                {"title": "No url"},
                {"title": "Intentions", "url": "https://sunnah.com/bukhari:1", "body": "Actions are by intentions."}
            ]
        });
        let results = parse_json_results(&body, "/results", &hadith_kind()).expect("parse");
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.snippet, "The Prophet said fasting is a shield.");
        assert_eq!(
            first.content,
            ContentKind::Hadith {
                collection: "bukhari".into(),
                number: Some("1894".into())
            }
        );
        assert_eq!(first.metadata.get("grade").map(String::as_str), Some("sahih"));
        assert_eq!(first.published_date, NaiveDate::from_ymd_opt(2019, 4, 1));

        assert_eq!(
            results[1].content,
            ContentKind::Hadith {
                collection: "unknown".into(),
                number: None
            }
        );
        assert_eq!(results[1].snippet, "Actions are by intentions.");
    }

    #[test]
    fn nested_pointer() {
        let body = json!({"data": {"hits": [{"title": "T", "url": "https://x.org"}]}});
        let results = parse_json_results(&body, "/data/hits", &ContentKind::Article).expect("parse");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, ContentKind::Article);
    }

    #[test]
    fn missing_array_is_parse_error() {
        let body = json!({"results": {"not": "an array"}});
        let err = parse_json_results(&body, "/results", &ContentKind::Article).unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }

    #[test]
    fn request_url_carries_query_and_language() {
        let descriptor = SourceDescriptor {
            name: "hadith".into(),
            endpoint: "http://localhost:8081/hadith/search".into(),
            topics: vec![],
            languages: vec![],
            priority: 1,
            rate_limit_group: "default".into(),
            trust_weight: 0.9,
            timeout_seconds: None,
            adapter: AdapterKind::JsonApi {
                query_param: "q".into(),
                language_param: Some("lang".into()),
                results_pointer: "/results".into(),
                content: hadith_kind(),
            },
        };
        let source = JsonApiSource::new(descriptor, Duration::from_secs(5), None).expect("source");
        let url = source.request_url(&QueryContext::from_raw("night prayer", "ar"));
        assert_eq!(url.as_str(), "http://localhost:8081/hadith/search?q=night+prayer&lang=ar");
    }

    #[test]
    fn wrong_adapter_kind_is_rejected() {
        let descriptor = SourceDescriptor {
            name: "quran".into(),
            endpoint: "https://api.alquran.cloud/v1/search".into(),
            topics: vec![],
            languages: vec![],
            priority: 0,
            rate_limit_group: "default".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        };
        assert!(JsonApiSource::new(descriptor, Duration::from_secs(5), None).is_err());
    }
}
