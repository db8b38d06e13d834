//! History URL provider
//!
//! Two phases per query:
//! 1. Sync: a "what you typed" match when the input parses as a URL.
//! 2. Async: IMUI lookup scored in parallel on the blocking pool, topped up
//!    from the history store's substring search when the index under-delivers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{call_collaborator, AutocompleteProvider, InFlight, ResultSink};
use crate::candidate::IndexCandidate;
use crate::collaborators::{Clock, HistoryStore};
use crate::config::HistoryProviderConfig;
use crate::frecency::normalize_frecency;
use crate::indexer::InMemoryUrlIndex;
use crate::input::AutocompleteInput;
use crate::interface::{AutocompleteMatch, InputType, MatchType, ProviderKind, ScoringSignals};
use crate::models::HistoryRow;
use crate::ranking::{
    fallback_relevance, history_relevance, inline_completion, score_url_match, UrlMatchQuality, FRECENCY_PIVOT,
};
use crate::runtime;
use crate::tokenizer::tokenize;
use crate::url_normalizer::{fixup_url, has_explicit_scheme, normalize_url_for_dedup, split_host_and_path, strip_scheme_and_www};

/// What-you-typed relevance when the input carries its own scheme
pub const WHAT_YOU_TYPED_SCHEME_RELEVANCE: i32 = 1200;
pub const WHAT_YOU_TYPED_RELEVANCE: i32 = 1150;

pub struct HistoryUrlProvider {
    index: Arc<InMemoryUrlIndex>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    config: HistoryProviderConfig,
    timeout: Duration,
    in_flight: InFlight,
}

impl HistoryUrlProvider {
    pub fn new(
        index: Arc<InMemoryUrlIndex>,
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        config: HistoryProviderConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            index,
            history,
            clock,
            config,
            timeout,
            in_flight: InFlight::default(),
        }
    }
}

impl AutocompleteProvider for HistoryUrlProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HistoryUrl
    }

    fn start(&self, input: Arc<AutocompleteInput>, sink: ResultSink) {
        let token = self.in_flight.begin(sink.token());
        let sink = sink.with_token(token.clone());

        if input.is_forced_query() || input.terms.is_empty() {
            sink.emit(Vec::new(), false);
            return;
        }

        if let Some(m) = what_you_typed_match(&input) {
            sink.emit(vec![m], true);
        }

        let query = HistoryQuery {
            index: Arc::clone(&self.index),
            history: Arc::clone(&self.history),
            now: self.clock.now_unix(),
            config: self.config.clone(),
            timeout: self.timeout,
            input,
            token,
        };
        runtime::handle().spawn(async move {
            let matches = query.run().await;
            sink.emit(matches, false);
        });
    }

    fn stop(&self) {
        self.in_flight.cancel();
    }
}

/// Sync match for URL-like input, navigating to the fixed-up URL.
pub fn what_you_typed_match(input: &AutocompleteInput) -> Option<AutocompleteMatch> {
    if input.input_type != InputType::Url {
        return None;
    }
    let url = fixup_url(&input.trimmed)?;
    let relevance = if has_explicit_scheme(&input.trimmed) {
        WHAT_YOU_TYPED_SCHEME_RELEVANCE
    } else {
        WHAT_YOU_TYPED_RELEVANCE
    };
    let mut m = AutocompleteMatch::new(
        ProviderKind::HistoryUrl,
        MatchType::UrlWhatYouTyped,
        relevance,
        input.trimmed.clone(),
        url.clone(),
    );
    m.allowed_to_be_default = true;
    m.scoring_signals = Some(ScoringSignals {
        url_length: url.len(),
        ..ScoringSignals::default()
    });
    Some(m)
}

/// Everything the async phase needs, moved into the spawned task
struct HistoryQuery {
    index: Arc<InMemoryUrlIndex>,
    history: Arc<dyn HistoryStore>,
    now: i64,
    config: HistoryProviderConfig,
    timeout: Duration,
    input: Arc<AutocompleteInput>,
    token: CancellationToken,
}

impl HistoryQuery {
    async fn run(self) -> Vec<AutocompleteMatch> {
        let kind = ProviderKind::HistoryUrl;

        // Throttled and detached: a newer keystroke stops the wait, not the rebuild.
        // A failure leaves the previous index in place.
        let _ = call_collaborator(kind, "populate", self.timeout, &self.token, self.index.populate_detached()).await;
        if self.token.is_cancelled() {
            return Vec::new();
        }

        let candidates = self.index.query(&self.input.terms);
        let mut matches = {
            let input = Arc::clone(&self.input);
            let token = self.token.clone();
            let now = self.now;
            runtime::handle()
                .spawn_blocking(move || score_candidates(&candidates, &input, now, &token))
                .await
                .unwrap_or_default()
        };
        if self.token.is_cancelled() {
            return Vec::new();
        }

        if matches.len() < self.config.fallback_min_results && self.input.len() >= self.config.fallback_min_input_len {
            let search = self.history.search_history(&self.input.trimmed, self.config.fallback_search_limit);
            if let Some(rows) = call_collaborator(kind, "search_history", self.timeout, &self.token, search).await {
                let mut seen: HashSet<String> =
                    matches.iter().map(|m| normalize_url_for_dedup(&m.destination_url)).collect();
                let before = matches.len();
                for row in rows {
                    if seen.insert(normalize_url_for_dedup(&row.url)) {
                        matches.push(fallback_match(&row, &self.input, self.now));
                    }
                }
                debug!(added = matches.len() - before, "history fallback search merged");
            }
        }

        matches.sort_by(|a, b| {
            b.relevance
                .cmp(&a.relevance)
                .then_with(|| a.destination_url.cmp(&b.destination_url))
        });
        matches.truncate(self.config.max_results);
        matches
    }
}

/// Score index candidates in parallel, bailing out once cancelled.
/// Output order is not the candidate order.
fn score_candidates(
    candidates: &[IndexCandidate],
    input: &AutocompleteInput,
    now: i64,
    token: &CancellationToken,
) -> Vec<AutocompleteMatch> {
    candidates
        .par_iter()
        .take_any_while(|_| !token.is_cancelled())
        .map(|candidate| {
            let entry = &candidate.entry;
            let quality = score_url_match(
                &input.terms,
                candidate.host_tokens(),
                candidate.path_tokens(),
                &entry.title_tokens,
            );
            let relevance = history_relevance(
                normalize_frecency(entry.frecency, FRECENCY_PIVOT),
                quality.score(),
                input.len(),
                entry.typed_count,
            );
            let signals = signals_for(
                &entry.url,
                entry.visit_count,
                entry.typed_count,
                entry.last_visit_time,
                entry.frecency,
                &quality,
                candidate.is_host_only(),
                now,
            );
            history_match(&entry.url, &entry.title, relevance, &input.trimmed, signals)
        })
        .collect()
}

fn fallback_match(row: &HistoryRow, input: &AutocompleteInput, now: i64) -> AutocompleteMatch {
    let (host, path) = split_host_and_path(&row.url);
    let (host_tokens, path_tokens) = (tokenize(&host), tokenize(&path));
    let quality = score_url_match(&input.terms, &host_tokens, &path_tokens, &tokenize(&row.title));
    let frecency = row.frecency(now);
    let relevance = fallback_relevance(normalize_frecency(frecency, FRECENCY_PIVOT), quality.score(), input.len());
    let signals = signals_for(
        &row.url,
        row.visit_count,
        row.typed_count,
        row.last_visit_time,
        frecency,
        &quality,
        path_tokens.is_empty(),
        now,
    );
    history_match(&row.url, &row.title, relevance, &input.trimmed, signals)
}

#[allow(clippy::too_many_arguments)]
fn signals_for(
    url: &str,
    visit_count: u32,
    typed_count: u32,
    last_visit_time: i64,
    frecency: f64,
    quality: &UrlMatchQuality,
    is_host_only: bool,
    now: i64,
) -> ScoringSignals {
    ScoringSignals {
        typed_count,
        visit_count,
        elapsed_time_since_last_visit: (now - last_visit_time).max(0),
        frecency,
        match_quality_score: quality.score(),
        host_match_at_word_boundary: quality.host_match_at_word_boundary,
        has_non_scheme_www_match: quality.has_non_scheme_www_match,
        is_host_only,
        is_bookmarked: false,
        has_open_tab_match: false,
        url_length: url.len(),
    }
}

fn history_match(url: &str, title: &str, relevance: i32, typed: &str, signals: ScoringSignals) -> AutocompleteMatch {
    let contents = if title.trim().is_empty() { strip_scheme_and_www(url) } else { title.to_string() };
    let mut m = AutocompleteMatch::new(ProviderKind::HistoryUrl, MatchType::HistoryUrl, relevance, contents, url)
        .with_description(strip_scheme_and_www(url))
        .with_signals(signals);
    m.inline_completion = inline_completion(typed, url);
    m.allowed_to_be_default = m.inline_completion.is_some();
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::interface::InputReason;
    use crate::memory::{InMemoryHistoryStore, ManualClock};
    use crate::models::test_row;
    use crate::providers::ProviderBatch;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn provider(rows: Vec<HistoryRow>) -> HistoryUrlProvider {
        let clock = Arc::new(ManualClock::new(NOW));
        let store: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new(rows, clock.clone()));
        let index = Arc::new(InMemoryUrlIndex::new(store.clone(), clock.clone(), IndexConfig::default()));
        HistoryUrlProvider::new(index, store, clock, HistoryProviderConfig::default(), Duration::from_secs(3))
    }

    fn start(p: &HistoryUrlProvider, text: &str) -> UnboundedReceiver<ProviderBatch> {
        let (tx, rx) = unbounded_channel();
        let input = Arc::new(AutocompleteInput::new(text, 1, InputReason::Keystroke));
        p.start(input, ResultSink::new(ProviderKind::HistoryUrl, 1, CancellationToken::new(), tx));
        rx
    }

    async fn final_batch(rx: &mut UnboundedReceiver<ProviderBatch>) -> ProviderBatch {
        loop {
            let batch = rx.recv().await.unwrap();
            if !batch.has_more {
                return batch;
            }
        }
    }

    #[test]
    fn test_what_you_typed_relevance() {
        let explicit = AutocompleteInput::new("https://foo.com", 1, InputReason::Keystroke);
        let m = what_you_typed_match(&explicit).unwrap();
        assert_eq!(m.match_type, MatchType::UrlWhatYouTyped);
        assert_eq!(m.relevance, 1200);
        assert!(m.allowed_to_be_default);

        let bare = AutocompleteInput::new("foo.com", 1, InputReason::Keystroke);
        let m = what_you_typed_match(&bare).unwrap();
        assert_eq!(m.relevance, 1150);
        assert!(m.destination_url.starts_with("https://foo.com"));

        let words = AutocompleteInput::new("foo bar", 1, InputReason::Keystroke);
        assert!(what_you_typed_match(&words).is_none());
    }

    #[tokio::test]
    async fn test_what_you_typed_is_first_batch() {
        let p = provider(Vec::new());
        let mut rx = start(&p, "https://foo.com");
        let first = rx.try_recv().unwrap();
        assert!(first.has_more);
        assert_eq!(first.matches[0].match_type, MatchType::UrlWhatYouTyped);
        assert!(!final_batch(&mut rx).await.has_more);
    }

    #[tokio::test]
    async fn test_frecent_typed_entry_ranks_first() {
        let p = provider(vec![
            test_row(1, "https://github.com/foo", "Foo Repo", 10, 3, NOW),
            test_row(2, "https://github.com/bar", "Bar", 1, 0, NOW - 30 * DAY),
        ]);
        let mut rx = start(&p, "git");
        let batch = final_batch(&mut rx).await;
        let urls: Vec<&str> = batch.matches.iter().map(|m| m.destination_url.as_str()).collect();
        assert_eq!(urls, ["https://github.com/foo", "https://github.com/bar"]);
        assert!(batch.matches[0].relevance > batch.matches[1].relevance);
        assert!(batch.matches.iter().all(|m| (900..=1400).contains(&m.relevance)));
        // The stale row is not significant; it came from the fallback search
        assert!(batch.matches[1].relevance <= 1300);
    }

    #[tokio::test]
    async fn test_inline_completion_and_signals() {
        let p = provider(vec![test_row(1, "https://example.com", "Example Domain", 5, 1, NOW - DAY)]);
        let mut rx = start(&p, "exa");
        let batch = final_batch(&mut rx).await;
        let m = &batch.matches[0];
        assert_eq!(m.inline_completion.as_deref(), Some("mple.com"));
        assert!(m.allowed_to_be_default);
        let signals = m.scoring_signals.as_ref().unwrap();
        assert_eq!(signals.typed_count, 1);
        assert_eq!(signals.elapsed_time_since_last_visit, DAY);
        assert!(signals.host_match_at_word_boundary);
        assert!(signals.is_host_only);
    }

    #[tokio::test]
    async fn test_results_capped_at_five() {
        let rows = (0..12)
            .map(|i| test_row(i, &format!("https://docs{}.rs", i), "Docs", 5, 0, NOW))
            .collect();
        let p = provider(rows);
        let mut rx = start(&p, "docs");
        assert_eq!(final_batch(&mut rx).await.matches.len(), 5);
    }

    #[tokio::test]
    async fn test_forced_query_and_empty_input_short_circuit() {
        let p = provider(vec![test_row(1, "https://example.com", "Example", 5, 1, NOW)]);
        for text in ["?example", ""] {
            let mut rx = start(&p, text);
            let batch = rx.try_recv().unwrap();
            assert!(batch.matches.is_empty());
            assert!(!batch.has_more);
        }
    }

    #[tokio::test]
    async fn test_stop_suppresses_async_batch() {
        let p = provider(vec![test_row(1, "https://example.com", "Example", 5, 1, NOW)]);
        let mut rx = start(&p, "example");
        p.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
