//! Zero suggest provider: what to show on focus before anything is typed.
//!
//! Open tabs go out first as their own batch; most visited and recent history
//! follow once the history store answers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::{call_collaborator, AutocompleteProvider, InFlight, ResultSink};
use crate::collaborators::{Clock, HistoryStore, TabRegistry};
use crate::config::ZeroSuggestConfig;
use crate::frecency::calculate_simple_frecency;
use crate::input::AutocompleteInput;
use crate::interface::{AutocompleteMatch, MatchType, ProviderKind, ScoringSignals};
use crate::models::{HistoryRow, OpenTab};
use crate::runtime;
use crate::url_normalizer::{normalize_url_for_dedup, strip_scheme_and_www};

pub const TAB_RELEVANCE_START: i32 = 800;
pub const TAB_RELEVANCE_STEP: i32 = 50;
pub const MOST_VISITED_RELEVANCE_START: i32 = 700;
pub const RECENT_RELEVANCE_START: i32 = 500;
pub const HISTORY_RELEVANCE_STEP: i32 = 40;

pub struct ZeroSuggestProvider {
    tabs: Arc<dyn TabRegistry>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    config: ZeroSuggestConfig,
    timeout: Duration,
    in_flight: InFlight,
}

impl ZeroSuggestProvider {
    pub fn new(
        tabs: Arc<dyn TabRegistry>,
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        config: ZeroSuggestConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            tabs,
            history,
            clock,
            config,
            timeout,
            in_flight: InFlight::default(),
        }
    }
}

impl AutocompleteProvider for ZeroSuggestProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ZeroSuggest
    }

    fn start(&self, input: Arc<AutocompleteInput>, sink: ResultSink) {
        let token = self.in_flight.begin(sink.token());
        let sink = sink.with_token(token.clone());
        if !input.is_empty() {
            sink.emit(Vec::new(), false);
            return;
        }

        let tabs = Arc::clone(&self.tabs);
        let history = Arc::clone(&self.history);
        let config = self.config.clone();
        let timeout = self.timeout;
        let now = self.clock.now_unix();
        runtime::handle().spawn(async move {
            let kind = ProviderKind::ZeroSuggest;

            let open = call_collaborator(kind, "open_tabs_in_space", timeout, &token, tabs.open_tabs_in_space())
                .await
                .unwrap_or_default();
            if !sink.emit(tab_matches(&open, config.max_tabs), true) {
                return;
            }

            // Over-fetch so dedup and frecency re-ranking still leave enough
            let fetch = config.max_history * 2;
            let most_visited = call_collaborator(kind, "most_visited_history", timeout, &token, history.most_visited_history(fetch))
                .await
                .unwrap_or_default();
            let recent = call_collaborator(kind, "recent_history", timeout, &token, history.recent_history(fetch))
                .await
                .unwrap_or_default();
            sink.emit(history_matches(most_visited, &recent, &config, now), false);
        });
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}

pub fn tab_matches(tabs: &[OpenTab], max_tabs: usize) -> Vec<AutocompleteMatch> {
    tabs.iter()
        .take(max_tabs)
        .enumerate()
        .map(|(rank, tab)| {
            let relevance = TAB_RELEVANCE_START - TAB_RELEVANCE_STEP * rank as i32;
            let contents = if tab.title.is_empty() { tab.url.clone() } else { tab.title.clone() };
            let mut m = AutocompleteMatch::new(ProviderKind::ZeroSuggest, MatchType::ZeroSuggest, relevance, contents, tab.url.clone())
                .with_description("Switch to tab")
                .with_signals(ScoringSignals {
                    has_open_tab_match: true,
                    url_length: tab.url.len(),
                    ..ScoringSignals::default()
                });
            m.tab_id = Some(tab.id);
            m
        })
        .collect()
}

/// Most visited by simple frecency, then recent rows to fill up to `max_history`.
pub fn history_matches(
    mut most_visited: Vec<HistoryRow>,
    recent: &[HistoryRow],
    config: &ZeroSuggestConfig,
    now: i64,
) -> Vec<AutocompleteMatch> {
    most_visited.sort_by(|a, b| {
        calculate_simple_frecency(b.visit_count, b.last_visit_time, now)
            .total_cmp(&calculate_simple_frecency(a.visit_count, a.last_visit_time, now))
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut matches = Vec::with_capacity(config.max_history);

    let top = most_visited
        .iter()
        .filter(|row| seen.insert(normalize_url_for_dedup(&row.url)))
        .take(config.max_most_visited.min(config.max_history));
    for (rank, row) in top.enumerate() {
        let relevance = MOST_VISITED_RELEVANCE_START - HISTORY_RELEVANCE_STEP * rank as i32;
        matches.push(history_match(row, relevance, now));
    }

    let backfill = config.max_history.saturating_sub(matches.len());
    let fill = recent
        .iter()
        .filter(|row| seen.insert(normalize_url_for_dedup(&row.url)))
        .take(backfill);
    for (rank, row) in fill.enumerate() {
        let relevance = RECENT_RELEVANCE_START - HISTORY_RELEVANCE_STEP * rank as i32;
        matches.push(history_match(row, relevance, now));
    }
    matches
}

fn history_match(row: &HistoryRow, relevance: i32, now: i64) -> AutocompleteMatch {
    let contents = if row.title.is_empty() { strip_scheme_and_www(&row.url) } else { row.title.clone() };
    AutocompleteMatch::new(ProviderKind::ZeroSuggest, MatchType::ZeroSuggest, relevance, contents, row.url.clone())
        .with_description(strip_scheme_and_www(&row.url))
        .with_signals(ScoringSignals {
            typed_count: row.typed_count,
            visit_count: row.visit_count,
            elapsed_time_since_last_visit: (now - row.last_visit_time).max(0),
            frecency: calculate_simple_frecency(row.visit_count, row.last_visit_time, now),
            url_length: row.url.len(),
            ..ScoringSignals::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::InputReason;
    use crate::memory::{InMemoryHistoryStore, ManualClock, StaticTabRegistry};
    use crate::models::test_row;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn tab(id: i64) -> OpenTab {
        OpenTab {
            id,
            title: format!("Tab {}", id),
            url: format!("https://tab{}.com", id),
            space_id: "default".to_string(),
        }
    }

    #[test]
    fn test_tab_relevance_descends() {
        let tabs: Vec<OpenTab> = (0..7).map(tab).collect();
        let matches = tab_matches(&tabs, 5);
        let relevances: Vec<i32> = matches.iter().map(|m| m.relevance).collect();
        assert_eq!(relevances, [800, 750, 700, 650, 600]);
        assert_eq!(matches[2].tab_id, Some(2));
    }

    #[test]
    fn test_most_visited_then_recent_backfill() {
        let most_visited = vec![
            test_row(1, "https://old-favourite.com", "", 50, 0, NOW - 200 * DAY),
            test_row(2, "https://daily.com", "", 30, 0, NOW - DAY),
            test_row(3, "https://www.daily.com/", "", 20, 0, NOW - DAY),
        ];
        let recent = vec![
            test_row(4, "https://news.com", "", 1, 0, NOW - 60),
            test_row(5, "http://daily.com", "", 30, 0, NOW - DAY),
            test_row(6, "https://blog.com", "", 1, 0, NOW - 120),
        ];
        let config = ZeroSuggestConfig::default();
        let matches = history_matches(most_visited, &recent, &config, NOW);

        let urls: Vec<&str> = matches.iter().map(|m| m.destination_url.as_str()).collect();
        // Recent high counts beat a stale favourite; www/scheme variants dedupe
        assert_eq!(urls, ["https://daily.com", "https://old-favourite.com", "https://news.com", "https://blog.com"]);
        let relevances: Vec<i32> = matches.iter().map(|m| m.relevance).collect();
        assert_eq!(relevances, [700, 660, 500, 460]);
    }

    #[test]
    fn test_history_capped_at_max() {
        let most_visited: Vec<HistoryRow> =
            (0..10).map(|i| test_row(i, &format!("https://mv{}.com", i), "", 10, 0, NOW)).collect();
        let recent: Vec<HistoryRow> =
            (10..20).map(|i| test_row(i, &format!("https://r{}.com", i), "", 1, 0, NOW)).collect();
        let matches = history_matches(most_visited, &recent, &ZeroSuggestConfig::default(), NOW);
        assert_eq!(matches.len(), 8);
        assert_eq!(matches.iter().filter(|m| m.relevance >= 540).count(), 5);
    }

    #[tokio::test]
    async fn test_tabs_batch_precedes_history_batch() {
        let clock = Arc::new(ManualClock::new(NOW));
        let provider = ZeroSuggestProvider::new(
            Arc::new(StaticTabRegistry::new(vec![tab(1)])),
            Arc::new(InMemoryHistoryStore::new(vec![test_row(9, "https://a.com", "A", 3, 0, NOW)], clock.clone())),
            clock,
            ZeroSuggestConfig::default(),
            Duration::from_secs(1),
        );
        let (tx, mut rx) = unbounded_channel();
        let input = Arc::new(AutocompleteInput::new("", 1, InputReason::Focus));
        provider.start(input, ResultSink::new(ProviderKind::ZeroSuggest, 1, CancellationToken::new(), tx));

        let tabs = rx.recv().await.unwrap();
        assert!(tabs.has_more);
        assert_eq!(tabs.matches[0].tab_id, Some(1));
        let history = rx.recv().await.unwrap();
        assert!(!history.has_more);
        assert_eq!(history.matches[0].destination_url, "https://a.com");
    }

    #[tokio::test]
    async fn test_non_empty_input_yields_nothing() {
        let clock = Arc::new(ManualClock::new(NOW));
        let provider = ZeroSuggestProvider::new(
            Arc::new(StaticTabRegistry::new(vec![tab(1)])),
            Arc::new(InMemoryHistoryStore::new(Vec::new(), clock.clone())),
            clock,
            ZeroSuggestConfig::default(),
            Duration::from_secs(1),
        );
        let (tx, mut rx) = unbounded_channel();
        let input = Arc::new(AutocompleteInput::new("git", 1, InputReason::Keystroke));
        provider.start(input, ResultSink::new(ProviderKind::ZeroSuggest, 1, CancellationToken::new(), tx));
        let batch = rx.try_recv().unwrap();
        assert!(batch.matches.is_empty() && !batch.has_more);
    }
}
