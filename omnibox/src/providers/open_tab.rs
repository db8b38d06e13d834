//! Open tab provider: offers switching to an already open tab.

use std::sync::Arc;
use std::time::Duration;

use super::{call_collaborator, AutocompleteProvider, InFlight, ResultSink};
use crate::collaborators::TabRegistry;
use crate::config::OpenTabProviderConfig;
use crate::input::AutocompleteInput;
use crate::interface::{AutocompleteMatch, MatchType, ProviderKind, ScoringSignals};
use crate::models::OpenTab;
use crate::ranking::{conjunctive_quality, open_tab_relevance};
use crate::runtime;
use crate::tokenizer::tokenize;

pub struct OpenTabProvider {
    tabs: Arc<dyn TabRegistry>,
    config: OpenTabProviderConfig,
    timeout: Duration,
    in_flight: InFlight,
}

impl OpenTabProvider {
    pub fn new(tabs: Arc<dyn TabRegistry>, config: OpenTabProviderConfig, timeout: Duration) -> Self {
        Self {
            tabs,
            config,
            timeout,
            in_flight: InFlight::default(),
        }
    }
}

impl AutocompleteProvider for OpenTabProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenTab
    }

    fn start(&self, input: Arc<AutocompleteInput>, sink: ResultSink) {
        let token = self.in_flight.begin(sink.token());
        let sink = sink.with_token(token.clone());
        if input.terms.is_empty() {
            sink.emit(Vec::new(), false);
            return;
        }

        let tabs = Arc::clone(&self.tabs);
        let timeout = self.timeout;
        let max_results = self.config.max_results;
        runtime::handle().spawn(async move {
            let fetch = tabs.open_tabs_in_space();
            let open = call_collaborator(ProviderKind::OpenTab, "open_tabs_in_space", timeout, &token, fetch)
                .await
                .unwrap_or_default();
            sink.emit(match_tabs(&open, &input, max_results), false);
        });
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}

/// Tabs whose title or url tokens cover every input term, best first.
pub fn match_tabs(tabs: &[OpenTab], input: &AutocompleteInput, max_results: usize) -> Vec<AutocompleteMatch> {
    let literal = input.trimmed.to_lowercase();
    let mut matches: Vec<AutocompleteMatch> = tabs
        .iter()
        .filter_map(|tab| {
            let quality = conjunctive_quality(&input.terms, &tokenize(&tab.title), &tokenize(&tab.url))?;
            let relevance = open_tab_relevance(quality, tab.url.to_lowercase().contains(&literal));
            let contents = if tab.title.is_empty() { tab.url.clone() } else { tab.title.clone() };
            let mut m = AutocompleteMatch::new(ProviderKind::OpenTab, MatchType::OpenTab, relevance, contents, tab.url.clone())
                .with_description("Switch to tab")
                .with_signals(ScoringSignals {
                    match_quality_score: quality,
                    has_open_tab_match: true,
                    url_length: tab.url.len(),
                    ..ScoringSignals::default()
                });
            m.tab_id = Some(tab.id);
            Some(m)
        })
        .collect();
    matches.sort_by(|a, b| {
        b.relevance
            .cmp(&a.relevance)
            .then_with(|| a.destination_url.cmp(&b.destination_url))
    });
    matches.truncate(max_results);
    matches
}
