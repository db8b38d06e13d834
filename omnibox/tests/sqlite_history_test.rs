//! The SQLite history store driving real queries

mod common;

use std::sync::Arc;

use common::{ChannelListener, DAY, NOW};
use omnibox::frecency::VisitType;
use omnibox::memory::{ManualClock, StaticTabRegistry};
use omnibox::{Collaborators, HistoryStore, InputReason, Omnibox, OmniboxConfig, ResultsUpdate, SqliteHistoryStore};
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn open_store(dir: &TempDir, clock: Arc<ManualClock>) -> SqliteHistoryStore {
    SqliteHistoryStore::open(dir.path().join("history.sqlite"))
        .unwrap()
        .with_clock(clock)
}

fn build(store: SqliteHistoryStore, clock: Arc<ManualClock>) -> (Omnibox, UnboundedReceiver<ResultsUpdate>) {
    let (tx, rx) = unbounded_channel();
    let omnibox = Omnibox::new(
        Collaborators {
            history: Arc::new(store),
            tabs: Arc::new(StaticTabRegistry::default()),
            bookmarks: None,
            clock,
            listener: Arc::new(ChannelListener::new(tx)),
            navigator: None,
        },
        OmniboxConfig::default(),
    )
    .unwrap();
    (omnibox, rx)
}

async fn final_update(rx: &mut UnboundedReceiver<ResultsUpdate>, query_id: u64) -> ResultsUpdate {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let update = rx.recv().await.expect("listener channel closed");
            if update.query_id == query_id && update.done {
                return update;
            }
        }
    })
    .await
    .expect("query did not complete")
}

#[tokio::test]
async fn test_recorded_visits_are_suggested_by_frecency() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    let store = open_store(&dir, clock.clone());

    for _ in 0..5 {
        store.record_visit("https://docs.rs/tokio", "tokio - Rust", VisitType::Typed, NOW - 60).unwrap();
    }
    store.record_visit("https://docs.rs/serde", "serde - Rust", VisitType::Link, NOW - 3600).unwrap();

    let (omnibox, mut rx) = build(store, clock);
    let id = omnibox.handle_input("docs", InputReason::Keystroke);
    let last = final_update(&mut rx, id).await;

    let urls: Vec<&str> = last.matches.iter().map(|m| m.destination_url.as_str()).collect();
    assert_eq!(urls, ["https://docs.rs/tokio", "https://docs.rs/serde"]);
}

#[tokio::test]
async fn test_insignificant_row_found_through_fallback_search() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    let store = open_store(&dir, clock.clone());
    store.record_visit("https://old.example.org/archive", "Old Archive", VisitType::Link, NOW - 30 * DAY).unwrap();

    let significant = store.significant_history().await.unwrap();
    assert!(significant.is_empty());

    let (omnibox, mut rx) = build(store, clock);
    let id = omnibox.handle_input("archive", InputReason::Keystroke);
    let last = final_update(&mut rx, id).await;
    assert!(last.matches.iter().any(|m| m.destination_url == "https://old.example.org/archive"));
    assert_eq!(omnibox.index().len(), 0);
}

#[tokio::test]
async fn test_visits_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    {
        let store = open_store(&dir, clock.clone());
        store.record_visit("https://zed.dev", "Zed", VisitType::Typed, NOW - 10).unwrap();
        store.record_visit("https://zed.dev", "", VisitType::Link, NOW).unwrap();
    }

    let store = open_store(&dir, clock.clone());
    assert_eq!(store.count_urls().unwrap(), 1);
    let rows = store.significant_history().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Zed");
    assert_eq!(rows[0].visit_count, 2);
    assert_eq!(rows[0].typed_count, 1);

    let (omnibox, mut rx) = build(store, clock);
    let id = omnibox.handle_input("zed", InputReason::Keystroke);
    let last = final_update(&mut rx, id).await;
    assert_eq!(last.matches[0].destination_url, "https://zed.dev");
    assert_eq!(last.matches[0].inline_completion.as_deref(), Some(".dev"));
}
