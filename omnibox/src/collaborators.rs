//! Interfaces the engine consumes (history, tabs, bookmarks, time) and the
//! outbound interfaces it drives (result listener, navigator).

use crate::interface::{OmniboxError, OpenDisposition, ResultsUpdate};
use crate::models::{Bookmark, HistoryRow, OpenTab};

/// Browsing history source. Calls may be slow; providers wrap them in timeouts.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Rows that are typed, frequently visited, or recently visited
    async fn significant_history(&self) -> Result<Vec<HistoryRow>, OmniboxError>;

    /// Substring search over url and title
    async fn search_history(&self, query: &str, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError>;

    /// Most recently visited first
    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError>;

    /// Highest visit count first
    async fn most_visited_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError>;
}

/// Registry of tabs open in the active browsing context
#[async_trait::async_trait]
pub trait TabRegistry: Send + Sync {
    async fn open_tabs_in_space(&self) -> Result<Vec<OpenTab>, OmniboxError>;
}

/// In-memory bookmark cache. Both calls must be cheap enough to run inline.
pub trait BookmarkStore: Send + Sync {
    fn is_url_bookmarked(&self, url: &str) -> bool;

    /// Bookmarks whose url or title contains every term
    fn search_bookmarks(&self, terms: &[String], limit: usize) -> Vec<Bookmark>;
}

/// Source of "now" in unix seconds, injectable for tests
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Receives every aggregation pass for the current query.
///
/// Called while the orchestrator holds its state lock: implementations must
/// not call back into the `Omnibox`.
pub trait ResultsListener: Send + Sync {
    fn on_results(&self, update: &ResultsUpdate);
}

/// Carries out navigation requested through `Omnibox::open_match`
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str, disposition: OpenDisposition);

    fn switch_to_tab(&self, tab_id: i64);
}
