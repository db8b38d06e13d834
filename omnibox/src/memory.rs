//! In-memory collaborators.
//!
//! Useful for embedding the engine without a database and for tests. All of
//! them are cheap to clone behind an `Arc` and safe to mutate while queries run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collaborators::{BookmarkStore, Clock, HistoryStore, TabRegistry};
use crate::interface::OmniboxError;
use crate::models::{Bookmark, HistoryRow, OpenTab};
use crate::tokenizer::tokenize;
use crate::url_normalizer::normalize_url_for_dedup;

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// History kept in a vector
pub struct InMemoryHistoryStore {
    rows: RwLock<Vec<HistoryRow>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryHistoryStore {
    pub fn new(rows: Vec<HistoryRow>, clock: Arc<dyn Clock>) -> Self {
        Self { rows: RwLock::new(rows), clock }
    }

    /// Insert or replace the row with the same id
    pub fn upsert(&self, row: HistoryRow) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    pub fn remove(&self, id: i64) {
        self.rows.write().retain(|r| r.id != id);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn significant_history(&self) -> Result<Vec<HistoryRow>, OmniboxError> {
        let now = self.clock.now_unix();
        Ok(self.rows.read().iter().filter(|r| r.is_significant(now)).cloned().collect())
    }

    async fn search_history(&self, query: &str, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<HistoryRow> = self
            .rows
            .read()
            .iter()
            .filter(|r| r.url.to_lowercase().contains(&needle) || r.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.visit_count.cmp(&a.visit_count).then_with(|| b.last_visit_time.cmp(&a.last_visit_time)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        let mut rows = self.rows.read().clone();
        rows.sort_by(|a, b| b.last_visit_time.cmp(&a.last_visit_time));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn most_visited_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        let mut rows = self.rows.read().clone();
        rows.sort_by(|a, b| b.visit_count.cmp(&a.visit_count).then_with(|| b.last_visit_time.cmp(&a.last_visit_time)));
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Fixed set of open tabs
#[derive(Default)]
pub struct StaticTabRegistry {
    tabs: RwLock<Vec<OpenTab>>,
}

impl StaticTabRegistry {
    pub fn new(tabs: Vec<OpenTab>) -> Self {
        Self { tabs: RwLock::new(tabs) }
    }

    pub fn set_tabs(&self, tabs: Vec<OpenTab>) {
        *self.tabs.write() = tabs;
    }
}

#[async_trait::async_trait]
impl TabRegistry for StaticTabRegistry {
    async fn open_tabs_in_space(&self) -> Result<Vec<OpenTab>, OmniboxError> {
        Ok(self.tabs.read().clone())
    }
}

/// Bookmarks with a normalized-URL lookup set
#[derive(Default)]
pub struct InMemoryBookmarkStore {
    bookmarks: RwLock<Vec<Bookmark>>,
    keys: RwLock<HashSet<String>>,
}

impl InMemoryBookmarkStore {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        let store = Self::default();
        for bookmark in bookmarks {
            store.add(bookmark);
        }
        store
    }

    pub fn add(&self, bookmark: Bookmark) {
        self.keys.write().insert(normalize_url_for_dedup(&bookmark.url));
        self.bookmarks.write().push(bookmark);
    }
}

impl BookmarkStore for InMemoryBookmarkStore {
    fn is_url_bookmarked(&self, url: &str) -> bool {
        self.keys.read().contains(&normalize_url_for_dedup(url))
    }

    fn search_bookmarks(&self, terms: &[String], limit: usize) -> Vec<Bookmark> {
        if terms.is_empty() {
            return Vec::new();
        }
        self.bookmarks
            .read()
            .iter()
            .filter(|b| {
                let mut tokens = tokenize(&b.url);
                tokens.extend(tokenize(&b.title));
                terms.iter().all(|term| tokens.iter().any(|t| t.contains(term.as_str())))
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_row;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_history_queries() {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = InMemoryHistoryStore::new(
            vec![
                test_row(1, "https://a.com", "Alpha", 10, 0, NOW - 100),
                test_row(2, "https://b.com", "Beta", 1, 0, NOW - 10),
                test_row(3, "https://c.com", "Gamma", 1, 0, NOW - 30 * 86_400),
            ],
            clock,
        );
        let ids = |rows: Vec<HistoryRow>| rows.iter().map(|r| r.id).collect::<Vec<_>>();

        assert_eq!(ids(store.recent_history(2).await.unwrap()), vec![2, 1]);
        assert_eq!(ids(store.most_visited_history(1).await.unwrap()), vec![1]);
        assert_eq!(ids(store.search_history("gam", 10).await.unwrap()), vec![3]);
        let mut significant = ids(store.significant_history().await.unwrap());
        significant.sort();
        assert_eq!(significant, vec![1, 2]);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let store = InMemoryHistoryStore::new(Vec::new(), Arc::new(ManualClock::new(NOW)));
        store.upsert(test_row(1, "https://a.com", "Old", 1, 0, NOW));
        store.upsert(test_row(1, "https://a.com", "New", 2, 0, NOW));
        assert_eq!(store.len(), 1);
        store.remove(1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_bookmark_lookup_is_normalized() {
        let store = InMemoryBookmarkStore::new(vec![Bookmark {
            id: 1,
            url: "https://www.rust-lang.org/".to_string(),
            title: "Rust".to_string(),
        }]);
        assert!(store.is_url_bookmarked("http://rust-lang.org"));
        assert!(!store.is_url_bookmarked("https://crates.io"));
        assert_eq!(store.search_bookmarks(&["rust".to_string()], 3).len(), 1);
        assert!(store.search_bookmarks(&["rust".to_string(), "python".to_string()], 3).is_empty());
    }
}
