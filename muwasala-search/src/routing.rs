//! Topic routing: which sources a query is sent to.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::source::SourceAdapter;
use crate::types::QueryContext;

/// Why a source was left out of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No topic of the query routes to it.
    Topic,
    /// It does not serve the query language.
    Language,
    /// Its circuit is open. Set by the fan-out coordinator, not the router.
    CircuitOpen,
}

/// Outcome of routing one query.
pub struct RouteSelection {
    /// Sources to invoke, in registration order.
    pub selected: Vec<Arc<dyn SourceAdapter>>,
    /// Sources left out, with the reason.
    pub skipped: Vec<(String, SkipReason)>,
}

impl RouteSelection {
    /// Names of the selected sources.
    pub fn selected_names(&self) -> Vec<String> {
        self.selected.iter().map(|a| a.name().to_owned()).collect()
    }
}

/// Maps topic tags to the sources worth asking about them.
///
/// A query whose topics match no entry (or that has no topics) goes to
/// every source. The language filter applies either way.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    table: BTreeMap<String, Vec<String>>,
}

impl TopicRouter {
    /// Build a router from a topic → source names table. Topic keys are
    /// matched case-insensitively.
    pub fn new(table: BTreeMap<String, Vec<String>>) -> Self {
        let table = table
            .into_iter()
            .map(|(topic, sources)| (topic.to_lowercase(), sources))
            .collect();
        Self { table }
    }

    /// Sources routed for `topic`, if the topic is known.
    pub fn sources_for(&self, topic: &str) -> Option<&[String]> {
        self.table.get(&topic.to_lowercase()).map(Vec::as_slice)
    }

    /// The routing table.
    pub fn table(&self) -> &BTreeMap<String, Vec<String>> {
        &self.table
    }

    /// Choose the sources for `ctx` out of `sources`.
    pub fn select(&self, ctx: &QueryContext, sources: &[Arc<dyn SourceAdapter>]) -> RouteSelection {
        let routed: HashSet<&str> = ctx
            .topics
            .iter()
            .filter_map(|t| self.sources_for(t))
            .flatten()
            .map(String::as_str)
            .collect();
        let route_all = routed.is_empty();

        let mut selection = RouteSelection {
            selected: Vec::new(),
            skipped: Vec::new(),
        };
        for adapter in sources {
            let name = adapter.name();
            if !route_all && !routed.contains(name) {
                selection.skipped.push((name.to_owned(), SkipReason::Topic));
            } else if !adapter.descriptor().supports_language(&ctx.language) {
                selection.skipped.push((name.to_owned(), SkipReason::Language));
            } else {
                selection.selected.push(Arc::clone(adapter));
            }
        }
        tracing::debug!(
            topics = ?ctx.topics,
            selected = ?selection.selected_names(),
            skipped = selection.skipped.len(),
            "sources routed"
        );
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{AdapterKind, CandidateResult, SourceDescriptor};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Named(SourceDescriptor);

    #[async_trait]
    impl SourceAdapter for Named {
        fn descriptor(&self) -> &SourceDescriptor {
            &self.0
        }

        async fn fetch(&self, _ctx: &QueryContext, _cancel: &CancellationToken) -> Result<Vec<CandidateResult>> {
            Ok(vec![])
        }
    }

    fn adapter(name: &str, languages: &[&str]) -> Arc<dyn SourceAdapter> {
        Arc::new(Named(SourceDescriptor {
            name: name.into(),
            endpoint: "https://example.org".into(),
            topics: vec![],
            languages: languages.iter().map(|l| (*l).to_owned()).collect(),
            priority: 0,
            rate_limit_group: "default".into(),
            trust_weight: 1.0,
            timeout_seconds: None,
            adapter: AdapterKind::QuranApi {
                edition: "en.sahih".into(),
            },
        }))
    }

    fn sources() -> Vec<Arc<dyn SourceAdapter>> {
        vec![
            adapter("quran", &[]),
            adapter("hadith", &[]),
            adapter("islamqa", &["en", "ar"]),
        ]
    }

    fn router() -> TopicRouter {
        let mut table = BTreeMap::new();
        table.insert("Prayer".to_owned(), vec!["quran".to_owned(), "islamqa".to_owned()]);
        table.insert("hadith".to_owned(), vec!["hadith".to_owned()]);
        TopicRouter::new(table)
    }

    fn ctx(topics: &[&str], language: &str) -> QueryContext {
        QueryContext {
            text: "q".into(),
            language: language.into(),
            topics: topics.iter().map(|t| (*t).to_owned()).collect(),
            keywords: vec![],
        }
    }

    #[test]
    fn prayer_never_routes_to_hadith() {
        let selection = router().select(&ctx(&["prayer"], "en"), &sources());
        assert_eq!(selection.selected_names(), vec!["quran", "islamqa"]);
        assert_eq!(selection.skipped, vec![("hadith".to_owned(), SkipReason::Topic)]);
    }

    #[test]
    fn unknown_topics_route_everywhere() {
        let selection = router().select(&ctx(&["astronomy"], "en"), &sources());
        assert_eq!(selection.selected.len(), 3);
        let selection = router().select(&ctx(&[], "en"), &sources());
        assert_eq!(selection.selected.len(), 3);
    }

    #[test]
    fn topics_union() {
        let selection = router().select(&ctx(&["prayer", "hadith"], "en"), &sources());
        assert_eq!(selection.selected.len(), 3);
    }

    #[test]
    fn language_filter_applies_to_routed_sources() {
        let selection = router().select(&ctx(&["prayer"], "ur"), &sources());
        assert_eq!(selection.selected_names(), vec!["quran"]);
        assert!(selection
            .skipped
            .contains(&("islamqa".to_owned(), SkipReason::Language)));
    }
}
