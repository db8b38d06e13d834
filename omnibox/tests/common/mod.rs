//! Shared collaborators for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use omnibox::frecency::VisitType;
use omnibox::memory::{InMemoryBookmarkStore, InMemoryHistoryStore, ManualClock, StaticTabRegistry};
use omnibox::{
    Bookmark, Collaborators, HistoryRow, HistoryStore, Navigator, Omnibox, OmniboxConfig, OmniboxError,
    OpenDisposition, OpenTab, ResultsListener, ResultsUpdate, TabRegistry,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const NOW: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;

pub fn row(id: i64, url: &str, title: &str, visits: u32, typed: u32, last_visit: i64) -> HistoryRow {
    HistoryRow {
        id,
        url: url.to_string(),
        title: title.to_string(),
        visit_count: visits,
        typed_count: typed,
        last_visit_time: last_visit,
        last_visit_type: if typed > 0 { VisitType::Typed } else { VisitType::Link },
        first_visit_time: last_visit,
    }
}

pub fn tab(id: i64, title: &str, url: &str) -> OpenTab {
    OpenTab {
        id,
        title: title.to_string(),
        url: url.to_string(),
        space_id: "default".to_string(),
    }
}

/// History store that sleeps before answering
pub struct LatencyHistory {
    inner: InMemoryHistoryStore,
    delay: Duration,
}

impl LatencyHistory {
    pub fn new(rows: Vec<HistoryRow>, clock: Arc<ManualClock>, delay: Duration) -> Self {
        Self {
            inner: InMemoryHistoryStore::new(rows, clock),
            delay,
        }
    }
}

#[async_trait::async_trait]
impl HistoryStore for LatencyHistory {
    async fn significant_history(&self) -> Result<Vec<HistoryRow>, OmniboxError> {
        tokio::time::sleep(self.delay).await;
        self.inner.significant_history().await
    }

    async fn search_history(&self, query: &str, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        tokio::time::sleep(self.delay).await;
        self.inner.search_history(query, limit).await
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        tokio::time::sleep(self.delay).await;
        self.inner.recent_history(limit).await
    }

    async fn most_visited_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        tokio::time::sleep(self.delay).await;
        self.inner.most_visited_history(limit).await
    }
}

/// History store whose every call fails
pub struct FailingHistory;

#[async_trait::async_trait]
impl HistoryStore for FailingHistory {
    async fn significant_history(&self) -> Result<Vec<HistoryRow>, OmniboxError> {
        Err(OmniboxError::Collaborator("history unavailable".into()))
    }

    async fn search_history(&self, _query: &str, _limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        Err(OmniboxError::Collaborator("history unavailable".into()))
    }

    async fn recent_history(&self, _limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        Err(OmniboxError::Collaborator("history unavailable".into()))
    }

    async fn most_visited_history(&self, _limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        Err(OmniboxError::Collaborator("history unavailable".into()))
    }
}

/// Tab registry that never answers
pub struct HangingTabs;

#[async_trait::async_trait]
impl TabRegistry for HangingTabs {
    async fn open_tabs_in_space(&self) -> Result<Vec<OpenTab>, OmniboxError> {
        std::future::pending().await
    }
}

/// Forwards every update into a channel
pub struct ChannelListener {
    tx: UnboundedSender<ResultsUpdate>,
}

impl ChannelListener {
    pub fn new(tx: UnboundedSender<ResultsUpdate>) -> Self {
        Self { tx }
    }
}

impl ResultsListener for ChannelListener {
    fn on_results(&self, update: &ResultsUpdate) {
        let _ = self.tx.send(update.clone());
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub calls: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str, disposition: OpenDisposition) {
        self.calls.lock().push(format!("navigate {} {:?}", url, disposition));
    }

    fn switch_to_tab(&self, tab_id: i64) {
        self.calls.lock().push(format!("switch {}", tab_id));
    }
}

pub struct Harness {
    pub omnibox: Omnibox,
    pub updates: UnboundedReceiver<ResultsUpdate>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    /// Collect updates until `query_id` reports done (or the timeout hits).
    pub async fn collect_until_done(&mut self, query_id: u64) -> Vec<ResultsUpdate> {
        let mut seen = Vec::new();
        let deadline = tokio::time::sleep(Duration::from_secs(5));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => panic!("query {} did not complete; got {:?}", query_id, seen),
                update = self.updates.recv() => {
                    let update = update.expect("listener channel closed");
                    let done = update.query_id == query_id && update.done;
                    seen.push(update);
                    if done {
                        return seen;
                    }
                }
            }
        }
    }

    /// Drain whatever arrives within `wait`
    pub async fn drain_for(&mut self, wait: Duration) -> Vec<ResultsUpdate> {
        let mut seen = Vec::new();
        let _ = tokio::time::timeout(wait, async {
            while let Some(update) = self.updates.recv().await {
                seen.push(update);
            }
        })
        .await;
        seen
    }
}

pub struct HarnessBuilder {
    pub history: Option<Arc<dyn HistoryStore>>,
    pub rows: Vec<HistoryRow>,
    pub tabs: Option<Arc<dyn TabRegistry>>,
    pub bookmarks: Vec<Bookmark>,
    pub config: OmniboxConfig,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            history: None,
            rows: Vec::new(),
            tabs: None,
            bookmarks: Vec::new(),
            config: OmniboxConfig::default(),
        }
    }
}

impl HarnessBuilder {
    pub fn rows(mut self, rows: Vec<HistoryRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn tabs(mut self, tabs: Arc<dyn TabRegistry>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    pub fn open_tabs(self, tabs: Vec<OpenTab>) -> Self {
        self.tabs(Arc::new(StaticTabRegistry::new(tabs)))
    }

    pub fn bookmarks(mut self, bookmarks: Vec<Bookmark>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    pub fn config(mut self, config: OmniboxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(NOW));
        let (tx, updates) = unbounded_channel();
        let navigator = Arc::new(RecordingNavigator::default());

        let history = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::new(self.rows, clock.clone())));
        let tabs = self.tabs.unwrap_or_else(|| Arc::new(StaticTabRegistry::default()));

        let omnibox = Omnibox::new(
            Collaborators {
                history,
                tabs,
                bookmarks: Some(Arc::new(InMemoryBookmarkStore::new(self.bookmarks))),
                clock: clock.clone(),
                listener: Arc::new(ChannelListener::new(tx)),
                navigator: Some(navigator.clone()),
            },
            self.config,
        )
        .expect("valid config");

        Harness {
            omnibox,
            updates,
            clock,
            navigator,
        }
    }
}
