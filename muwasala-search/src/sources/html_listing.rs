//! HTML listing-page source, for sites that publish search results only as
//! HTML (fatwa archives, for example).
//!
//! The search page is fetched with the query in a query-string parameter
//! and parsed with the CSS selectors from the source descriptor.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Result, SearchError};
use crate::http::{build_client, map_reqwest_error};
use crate::source::{finalize_candidates, until_cancelled, SourceAdapter, MAX_CANDIDATES_PER_SOURCE};
use crate::types::{AdapterKind, CandidateResult, ContentKind, QueryContext, SourceDescriptor};

/// CSS selectors for one listing page layout.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    result: Selector,
    title: Selector,
    snippet: Selector,
}

impl ListingSelectors {
    /// Compile the three selectors.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] naming the selector that did not parse.
    pub fn parse(result: &str, title: &str, snippet: &str) -> Result<Self> {
        let compile = |what: &str, css: &str| {
            Selector::parse(css).map_err(|e| SearchError::Config(format!("invalid {what} selector {css:?}: {e:?}")))
        };
        Ok(Self {
            result: compile("result", result)?,
            title: compile("title", title)?,
            snippet: compile("snippet", snippet)?,
        })
    }
}

/// Scrapes a search results page with configured selectors.
pub struct HtmlListingSource {
    descriptor: SourceDescriptor,
    client: reqwest::Client,
    base: Url,
    query_param: String,
    selectors: ListingSelectors,
    content: ContentKind,
}

impl HtmlListingSource {
    /// Build the adapter from a descriptor whose adapter kind is
    /// [`AdapterKind::HtmlListing`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for the wrong adapter kind, a bad
    /// endpoint or a bad selector, and [`SearchError::Http`] if the client
    /// cannot be built.
    pub fn new(descriptor: SourceDescriptor, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let AdapterKind::HtmlListing {
            query_param,
            result_selector,
            title_selector,
            snippet_selector,
            content,
        } = &descriptor.adapter
        else {
            return Err(SearchError::Config(format!(
                "source {} is not an html listing source",
                descriptor.name
            )));
        };
        let base = Url::parse(&descriptor.endpoint)
            .map_err(|e| SearchError::Config(format!("source {} endpoint: {e}", descriptor.name)))?;
        let selectors = ListingSelectors::parse(result_selector, title_selector, snippet_selector)?;
        let query_param = query_param.clone();
        let content = content.clone();
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            descriptor,
            base,
            query_param,
            selectors,
            content,
        })
    }

    async fn request(&self, ctx: &QueryContext) -> Result<String> {
        let name = &self.descriptor.name;
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair(&self.query_param, &ctx.text);

        tracing::trace!(source = %name, query = %ctx.text, "html listing request");
        let response = self
            .client
            .get(url)
            .header("Accept-Language", format!("{},en;q=0.8", ctx.language))
            .send()
            .await
            .map_err(|e| map_reqwest_error(name, e))?
            .error_for_status()
            .map_err(|e| map_reqwest_error(name, e))?;
        response.text().await.map_err(|e| map_reqwest_error(name, e))
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(&self, ctx: &QueryContext, cancel: &CancellationToken) -> Result<Vec<CandidateResult>> {
        let html = until_cancelled(cancel, self.request(ctx)).await?;
        let raw = parse_listing_html(&html, &self.base, &self.selectors, &self.content);
        tracing::debug!(source = %self.descriptor.name, count = raw.len(), "listing parsed");
        Ok(finalize_candidates(&self.descriptor, ctx, raw))
    }
}

/// Extract candidates from a listing page.
///
/// Result blocks without a title or link are skipped. Relative links are
/// resolved against `base`.
pub(crate) fn parse_listing_html(
    html: &str,
    base: &Url,
    selectors: &ListingSelectors,
    content: &ContentKind,
) -> Vec<CandidateResult> {
    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for element in document.select(&selectors.result) {
        let Some(title_el) = element.select(&selectors.title).next() else {
            continue;
        };
        let title = title_el.text().collect::<String>();
        if title.trim().is_empty() {
            continue;
        }

        let href = title_el.value().attr("href").or_else(|| {
            title_el
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
        });
        let Some(url) = href.and_then(|h| base.join(h).ok()) else {
            continue;
        };

        let snippet = element
            .select(&selectors.snippet)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        let kind = match content {
            ContentKind::Fatwa { .. } => ContentKind::Fatwa {
                question_id: question_id_from_url(&url),
            },
            other => other.clone(),
        };
        results.push(CandidateResult::new(title, snippet, url.to_string(), "", kind));

        if results.len() >= MAX_CANDIDATES_PER_SOURCE {
            break;
        }
    }
    results
}

/// The last purely numeric path segment, which fatwa archives use as the
/// question number (`/en/answers/12345/title-slug`).
fn question_id_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_owned)
}
