//! Omnibox orchestrator
//!
//! Owns the query lifecycle: `Idle → Querying → {Completed | Superseded}`.
//!
//! Concurrency model:
//! - Each `handle_input` gets a fresh query id, a cancellation token and a channel.
//!   Providers deliver `ProviderBatch`es into the channel; a pump task drains it.
//! - Every batch is checked against the current query id under the state lock
//!   before it touches the aggregator, and the listener runs under that same
//!   lock. A newer `handle_input` takes the lock to swap state, so nothing from
//!   a superseded query can reach the listener afterwards.
//! - The previous query's token is cancelled and its providers stopped before
//!   the new one starts; that is advisory, the id check is what guarantees it.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{BookmarkStore, Clock, HistoryStore, Navigator, ResultsListener, TabRegistry};
use crate::config::OmniboxConfig;
use crate::indexer::{InMemoryUrlIndex, PopulateOutcome};
use crate::input::AutocompleteInput;
use crate::interface::{
    AutocompleteMatch, InputReason, MatchType, OmniboxError, OpenDisposition, ProviderKind, ResultsUpdate,
};
use crate::models::HistoryRow;
use crate::providers::{
    AutocompleteProvider, BookmarkProvider, HistoryUrlProvider, OpenTabProvider, ProviderBatch, ResultSink,
    ZeroSuggestProvider,
};
use crate::result::AutocompleteResult;
use crate::runtime;

/// Where the current query is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Querying,
    Completed,
    Superseded,
}

/// Everything the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn HistoryStore>,
    pub tabs: Arc<dyn TabRegistry>,
    pub bookmarks: Option<Arc<dyn BookmarkStore>>,
    pub clock: Arc<dyn Clock>,
    pub listener: Arc<dyn ResultsListener>,
    pub navigator: Option<Arc<dyn Navigator>>,
}

struct QueryState {
    query_id: u64,
    phase: QueryPhase,
    token: CancellationToken,
    pending: HashSet<ProviderKind>,
    result: AutocompleteResult,
    last_emitted: Vec<AutocompleteMatch>,
}

impl QueryState {
    fn idle() -> Self {
        Self {
            query_id: 0,
            phase: QueryPhase::Idle,
            token: CancellationToken::new(),
            pending: HashSet::new(),
            result: AutocompleteResult::new(),
            last_emitted: Vec::new(),
        }
    }
}

struct Inner {
    config: OmniboxConfig,
    index: Arc<InMemoryUrlIndex>,
    providers: Vec<Arc<dyn AutocompleteProvider>>,
    bookmarks: Arc<BookmarkProvider>,
    listener: Arc<dyn ResultsListener>,
    navigator: Option<Arc<dyn Navigator>>,
    state: Mutex<QueryState>,
}

/// The address-bar autocomplete engine
#[derive(Clone)]
pub struct Omnibox {
    inner: Arc<Inner>,
}

impl Omnibox {
    pub fn new(collaborators: Collaborators, config: OmniboxConfig) -> Result<Self, OmniboxError> {
        config.validate()?;
        runtime::init_rayon();

        let Collaborators {
            history,
            tabs,
            bookmarks,
            clock,
            listener,
            navigator,
        } = collaborators;
        let timeout = config.provider_timeout();

        let index = Arc::new(InMemoryUrlIndex::new(
            Arc::clone(&history),
            Arc::clone(&clock),
            config.index.clone(),
        ));
        let bookmark_provider = Arc::new(BookmarkProvider::new(bookmarks, config.bookmark.clone()));

        let mut providers: Vec<Arc<dyn AutocompleteProvider>> = Vec::new();
        for kind in ProviderKind::ALL.into_iter().filter(|k| config.is_enabled(*k)) {
            let provider: Arc<dyn AutocompleteProvider> = match kind {
                ProviderKind::HistoryUrl => Arc::new(HistoryUrlProvider::new(
                    Arc::clone(&index),
                    Arc::clone(&history),
                    Arc::clone(&clock),
                    config.history.clone(),
                    timeout,
                )),
                ProviderKind::OpenTab => {
                    Arc::new(OpenTabProvider::new(Arc::clone(&tabs), config.open_tab.clone(), timeout))
                }
                ProviderKind::ZeroSuggest => Arc::new(ZeroSuggestProvider::new(
                    Arc::clone(&tabs),
                    Arc::clone(&history),
                    Arc::clone(&clock),
                    config.zero_suggest.clone(),
                    timeout,
                )),
                ProviderKind::Bookmark => bookmark_provider.clone(),
            };
            providers.push(provider);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                index,
                providers,
                bookmarks: bookmark_provider,
                listener,
                navigator,
                state: Mutex::new(QueryState::idle()),
            }),
        })
    }

    pub fn config(&self) -> &OmniboxConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<InMemoryUrlIndex> {
        &self.inner.index
    }

    /// Start a query for `text`, superseding any query in flight. Returns the new query id.
    pub fn handle_input(&self, text: &str, reason: InputReason) -> u64 {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        state.token.cancel();
        for provider in &inner.providers {
            provider.stop();
        }
        if state.phase == QueryPhase::Querying {
            state.phase = QueryPhase::Superseded;
            debug!(superseded = state.query_id, "query superseded");
        }

        let query_id = state.query_id + 1;
        let input = Arc::new(AutocompleteInput::new(text, query_id, reason));
        let token = CancellationToken::new();
        let (tx, rx) = unbounded_channel();
        *state = QueryState {
            query_id,
            phase: QueryPhase::Querying,
            token: token.clone(),
            pending: inner.providers.iter().map(|p| p.kind()).collect(),
            result: AutocompleteResult::new(),
            last_emitted: Vec::new(),
        };

        // Started under the lock so concurrent callers cannot interleave
        // their providers' in-flight tokens. Providers never take this lock.
        runtime::handle().spawn(pump(Arc::clone(inner), query_id, token.clone(), rx));
        for provider in &inner.providers {
            provider.start(Arc::clone(&input), ResultSink::new(provider.kind(), query_id, token.clone(), tx.clone()));
        }
        query_id
    }

    /// The user dismissed the dropdown: stop everything, emit nothing more.
    pub fn stop_query(&self) {
        let mut state = self.inner.state.lock();
        if state.phase != QueryPhase::Querying {
            return;
        }
        state.token.cancel();
        for provider in &self.inner.providers {
            provider.stop();
        }
        state.pending.clear();
        state.phase = QueryPhase::Completed;
        debug!(query_id = state.query_id, "query stopped");
    }

    /// Act on a chosen match. Open-tab matches opened in place switch to the tab.
    pub fn open_match(&self, m: &AutocompleteMatch, disposition: OpenDisposition) -> Result<(), OmniboxError> {
        if m.destination_url.trim().is_empty() {
            return Err(OmniboxError::InvalidInput("match has no destination".into()));
        }
        self.stop_query();

        let Some(navigator) = &self.inner.navigator else {
            warn!(url = %m.destination_url, "no navigator attached, ignoring open request");
            return Ok(());
        };

        let is_tab = matches!(m.match_type, MatchType::OpenTab | MatchType::ZeroSuggest);
        match (m.tab_id, disposition) {
            (Some(tab_id), OpenDisposition::Current) if is_tab => {
                info!(tab_id, "switching to open tab");
                navigator.switch_to_tab(tab_id);
            }
            _ => {
                info!(url = %m.destination_url, ?disposition, "navigating");
                navigator.navigate(&m.destination_url, disposition);
            }
        }
        Ok(())
    }

    /// A page was visited: refresh its index entry.
    pub fn on_url_visited(&self, row: &HistoryRow) {
        self.inner.index.add_or_update(row);
    }

    /// A history row was deleted: drop it from the index.
    pub fn on_url_deleted(&self, history_id: i64) {
        self.inner.index.remove(history_id);
    }

    /// Rebuild the index now instead of waiting for the throttle.
    pub async fn refresh_index(&self) -> Result<PopulateOutcome, OmniboxError> {
        self.inner.index.force_refresh().await
    }

    pub fn current_query_id(&self) -> u64 {
        self.inner.state.lock().query_id
    }

    pub fn phase(&self) -> QueryPhase {
        self.inner.state.lock().phase
    }

    /// The list most recently handed to the listener
    pub fn current_matches(&self) -> Vec<AutocompleteMatch> {
        self.inner.state.lock().last_emitted.clone()
    }
}

/// Drain one query's channel until it closes or the query is cancelled.
async fn pump(inner: Arc<Inner>, query_id: u64, token: CancellationToken, mut rx: UnboundedReceiver<ProviderBatch>) {
    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            batch = rx.recv() => batch,
        };
        match batch {
            Some(batch) => inner.accept_batch(batch),
            None => break,
        }
    }
    // Every sender is gone; a provider that died without a final batch must
    // not leave the query hanging.
    inner.finish(query_id);
}

impl Inner {
    fn accept_batch(&self, batch: ProviderBatch) {
        let mut state = self.state.lock();
        if batch.query_id != state.query_id || state.phase != QueryPhase::Querying {
            debug!(
                batch_query = batch.query_id,
                current_query = state.query_id,
                provider = batch.provider.name(),
                "dropping stale batch"
            );
            return;
        }

        let mut matches = batch.matches;
        for m in matches.iter_mut() {
            self.apply_bookmark_bonus(m);
        }
        state.result.add_matches(matches);
        if !batch.has_more {
            state.pending.remove(&batch.provider);
        }
        self.publish(&mut state);
    }

    fn finish(&self, query_id: u64) {
        let mut state = self.state.lock();
        if state.query_id != query_id || state.phase != QueryPhase::Querying {
            return;
        }
        if !state.pending.is_empty() {
            warn!(query_id, pending = state.pending.len(), "providers ended without a final batch");
            state.pending.clear();
        }
        self.publish(&mut state);
    }

    /// Bookmarked destinations get the same bonus whichever provider found them.
    fn apply_bookmark_bonus(&self, m: &mut AutocompleteMatch) {
        if self.bookmarks.is_url_bookmarked(&m.destination_url) {
            m.signals_mut().is_bookmarked = true;
            m.relevance += self.config.bookmark_relevance_bonus;
        }
    }

    fn publish(&self, state: &mut QueryState) {
        state.result.deduplicate();
        state.result.sort();
        let matches = state.result.get_top_matches(self.config.max_matches);
        let done = state.pending.is_empty();
        if done {
            state.phase = QueryPhase::Completed;
        }

        let update = ResultsUpdate {
            query_id: state.query_id,
            matches,
            done,
        };
        self.listener.on_results(&update);
        state.last_emitted = update.matches;
    }
}
