//! SQLite-backed history store
//!
//! One `urls` table keyed by URL. Uses an r2d2 connection pool; WAL mode lets
//! the index rebuild read while a visit is being recorded. The async
//! `HistoryStore` calls run the blocking queries on the runtime's blocking pool.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;

use crate::collaborators::{Clock, HistoryStore, SystemClock};
use crate::frecency::VisitType;
use crate::interface::OmniboxError;
use crate::models::{HistoryRow, SIGNIFICANT_RECENCY_SECS, SIGNIFICANT_VISIT_COUNT};
use crate::runtime;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const ROW_COLUMNS: &str =
    "id, url, title, visitCount, typedCount, lastVisitTime, lastVisitType, firstVisitTime";

/// Thread-safe history database. Clones share the pool.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: Pool<SqliteConnectionManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteHistoryStore {
    /// Open or create a history database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA cache_size=-16000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(4).build(manager)?;
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.setup_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (tests, demos)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(SqliteConnectionManager::memory())?;
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.setup_schema()?;
        Ok(store)
    }

    /// Use `clock` for "now" in significance checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL DEFAULT '',
                visitCount INTEGER NOT NULL DEFAULT 0,
                typedCount INTEGER NOT NULL DEFAULT 0,
                lastVisitTime INTEGER NOT NULL,
                lastVisitType INTEGER NOT NULL DEFAULT 0,
                firstVisitTime INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_urls_last_visit ON urls(lastVisitTime DESC);
            CREATE INDEX IF NOT EXISTS idx_urls_visit_count ON urls(visitCount DESC);
        "#,
        )?;
        Ok(())
    }

    fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<HistoryRow> {
        Ok(HistoryRow {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            visit_count: row.get(3)?,
            typed_count: row.get(4)?,
            last_visit_time: row.get(5)?,
            last_visit_type: VisitType::from_code(row.get(6)?),
            first_visit_time: row.get(7)?,
        })
    }

    fn query_rows(&self, sql: &str, params: impl rusqlite::Params) -> DatabaseResult<Vec<HistoryRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::row_to_history)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record one visit, creating the row on first sight. An empty title
    /// keeps the stored one; a visit older than the stored last visit leaves
    /// the last-visit fields alone. Returns the updated row.
    pub fn record_visit(&self, url: &str, title: &str, visit_type: VisitType, at: i64) -> DatabaseResult<HistoryRow> {
        let conn = self.get_conn()?;
        let typed = i64::from(visit_type == VisitType::Typed);
        conn.execute(
            r#"INSERT INTO urls (url, title, visitCount, typedCount, lastVisitTime, lastVisitType, firstVisitTime)
               VALUES (?1, ?2, 1, ?3, ?4, ?5, ?4)
               ON CONFLICT(url) DO UPDATE SET
                   title = CASE WHEN excluded.title = '' THEN title ELSE excluded.title END,
                   visitCount = visitCount + 1,
                   typedCount = typedCount + excluded.typedCount,
                   lastVisitType = CASE WHEN excluded.lastVisitTime >= lastVisitTime
                                        THEN excluded.lastVisitType ELSE lastVisitType END,
                   lastVisitTime = MAX(lastVisitTime, excluded.lastVisitTime),
                   firstVisitTime = MIN(firstVisitTime, excluded.firstVisitTime)"#,
            params![url, title, typed, at, visit_type.code()],
        )?;
        let row = conn.query_row(
            &format!("SELECT {} FROM urls WHERE url = ?1", ROW_COLUMNS),
            [url],
            Self::row_to_history,
        )?;
        Ok(row)
    }

    /// Insert a full row as-is (imports, demo data). Replaces any row with the same url.
    pub fn insert_row(&self, row: &HistoryRow) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO urls (url, title, visitCount, typedCount, lastVisitTime, lastVisitType, firstVisitTime)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                row.url,
                row.title,
                row.visit_count,
                row.typed_count,
                row.last_visit_time,
                row.last_visit_type.code(),
                row.first_visit_time,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns whether a row was deleted
    pub fn delete_url(&self, id: i64) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM urls WHERE id = ?1", [id])? > 0)
    }

    pub fn get_row(&self, id: i64) -> DatabaseResult<Option<HistoryRow>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE id = ?1", ROW_COLUMNS),
                [id],
                Self::row_to_history,
            )
            .optional()?;
        Ok(row)
    }

    pub fn count_urls(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM urls", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn significant_rows(&self, now: i64) -> DatabaseResult<Vec<HistoryRow>> {
        self.query_rows(
            &format!(
                "SELECT {} FROM urls WHERE typedCount >= 1 OR visitCount >= ?1 OR lastVisitTime >= ?2 ORDER BY lastVisitTime DESC",
                ROW_COLUMNS
            ),
            params![SIGNIFICANT_VISIT_COUNT, now - SIGNIFICANT_RECENCY_SECS],
        )
    }

    /// Case-insensitive substring match on url or title
    pub fn search_rows(&self, query: &str, limit: usize) -> DatabaseResult<Vec<HistoryRow>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{}%", escaped);
        self.query_rows(
            &format!(
                r#"SELECT {} FROM urls
                   WHERE url LIKE ?1 ESCAPE '\' COLLATE NOCASE OR title LIKE ?1 ESCAPE '\' COLLATE NOCASE
                   ORDER BY visitCount DESC, lastVisitTime DESC
                   LIMIT ?2"#,
                ROW_COLUMNS
            ),
            params![pattern, limit as i64],
        )
    }

    pub fn recent_rows(&self, limit: usize) -> DatabaseResult<Vec<HistoryRow>> {
        self.query_rows(
            &format!("SELECT {} FROM urls ORDER BY lastVisitTime DESC LIMIT ?1", ROW_COLUMNS),
            [limit as i64],
        )
    }

    pub fn most_visited_rows(&self, limit: usize) -> DatabaseResult<Vec<HistoryRow>> {
        self.query_rows(
            &format!(
                "SELECT {} FROM urls ORDER BY visitCount DESC, lastVisitTime DESC LIMIT ?1",
                ROW_COLUMNS
            ),
            [limit as i64],
        )
    }

    /// Run a blocking query off the async executor
    async fn blocking<T, F>(&self, f: F) -> Result<T, OmniboxError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteHistoryStore) -> DatabaseResult<T> + Send + 'static,
    {
        let store = self.clone();
        runtime::handle()
            .spawn_blocking(move || f(&store))
            .await
            .map_err(|e| OmniboxError::Database(format!("blocking task failed: {}", e)))?
            .map_err(OmniboxError::from)
    }
}

#[async_trait::async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn significant_history(&self) -> Result<Vec<HistoryRow>, OmniboxError> {
        let now = self.clock.now_unix();
        self.blocking(move |db| db.significant_rows(now)).await
    }

    async fn search_history(&self, query: &str, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        let query = query.to_string();
        self.blocking(move |db| db.search_rows(&query, limit)).await
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        self.blocking(move |db| db.recent_rows(limit)).await
    }

    async fn most_visited_history(&self, limit: usize) -> Result<Vec<HistoryRow>, OmniboxError> {
        self.blocking(move |db| db.most_visited_rows(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ManualClock;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn store() -> SqliteHistoryStore {
        SqliteHistoryStore::open_in_memory()
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(NOW)))
    }

    #[test]
    fn test_record_visit_upserts() {
        let db = store();
        let first = db.record_visit("https://example.com", "Example", VisitType::Typed, NOW - DAY).unwrap();
        assert_eq!(first.visit_count, 1);
        assert_eq!(first.typed_count, 1);
        assert_eq!(first.first_visit_time, NOW - DAY);

        let second = db.record_visit("https://example.com", "", VisitType::Link, NOW).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.visit_count, 2);
        assert_eq!(second.typed_count, 1);
        assert_eq!(second.title, "Example");
        assert_eq!(second.last_visit_time, NOW);
        assert_eq!(second.last_visit_type, VisitType::Link);
        assert_eq!(second.first_visit_time, NOW - DAY);
        assert_eq!(db.count_urls().unwrap(), 1);
    }

    #[test]
    fn test_older_visit_keeps_latest_visit_type() {
        let db = store();
        db.record_visit("https://example.com", "Example", VisitType::Typed, NOW).unwrap();
        let row = db.record_visit("https://example.com", "", VisitType::Redirect, NOW - DAY).unwrap();

        assert_eq!(row.visit_count, 2);
        assert_eq!(row.last_visit_time, NOW);
        assert_eq!(row.last_visit_type, VisitType::Typed);
        assert_eq!(row.first_visit_time, NOW - DAY);
    }

    #[tokio::test]
    async fn test_significant_history_filter() {
        let db = store();
        db.record_visit("https://typed.com", "", VisitType::Typed, NOW - 90 * DAY).unwrap();
        db.record_visit("https://recent.com", "", VisitType::Link, NOW - DAY).unwrap();
        db.record_visit("https://stale.com", "", VisitType::Link, NOW - 90 * DAY).unwrap();
        for _ in 0..4 {
            db.record_visit("https://frequent.com", "", VisitType::Link, NOW - 90 * DAY).unwrap();
        }

        let mut urls: Vec<String> = db.significant_history().await.unwrap().into_iter().map(|r| r.url).collect();
        urls.sort();
        assert_eq!(urls, ["https://frequent.com", "https://recent.com", "https://typed.com"]);
    }

    #[tokio::test]
    async fn test_search_escapes_like_wildcards() {
        let db = store();
        db.record_visit("https://example.com/100%_done", "Progress", VisitType::Link, NOW).unwrap();
        db.record_visit("https://example.com/1000", "Other", VisitType::Link, NOW).unwrap();

        let hits = db.search_history("100%", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(db.search_history("PROGRESS", 10).await.unwrap().len(), 1);
        assert!(db.search_history("  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_and_most_visited_order() {
        let db = store();
        db.record_visit("https://a.com", "", VisitType::Link, NOW - 10).unwrap();
        db.record_visit("https://b.com", "", VisitType::Link, NOW).unwrap();
        db.record_visit("https://a.com", "", VisitType::Link, NOW - 20).unwrap();

        let recent = db.recent_history(1).await.unwrap();
        assert_eq!(recent[0].url, "https://b.com");
        let most = db.most_visited_history(1).await.unwrap();
        assert_eq!(most[0].url, "https://a.com");
        // An older visit does not move lastVisitTime backwards
        assert_eq!(most[0].last_visit_time, NOW - 10);
    }

    #[test]
    fn test_delete_and_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite");
        let id = {
            let db = SqliteHistoryStore::open(&path).unwrap();
            db.record_visit("https://keep.com", "Keep", VisitType::Link, NOW).unwrap();
            db.record_visit("https://drop.com", "Drop", VisitType::Link, NOW).unwrap().id
        };

        let db = SqliteHistoryStore::open(&path).unwrap();
        assert_eq!(db.count_urls().unwrap(), 2);
        assert!(db.delete_url(id).unwrap());
        assert!(!db.delete_url(id).unwrap());
        assert!(db.get_row(id).unwrap().is_none());
    }
}
