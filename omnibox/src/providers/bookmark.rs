//! Bookmark provider.
//!
//! Without a store this is an empty stub. With one, matching is synchronous
//! against the store's in-memory cache.

use std::sync::Arc;

use super::{AutocompleteProvider, ResultSink};
use crate::collaborators::BookmarkStore;
use crate::config::BookmarkProviderConfig;
use crate::input::AutocompleteInput;
use crate::interface::{AutocompleteMatch, MatchType, ProviderKind, ScoringSignals};
use crate::ranking::{bookmark_relevance, conjunctive_quality, inline_completion};
use crate::tokenizer::tokenize;

pub struct BookmarkProvider {
    store: Option<Arc<dyn BookmarkStore>>,
    config: BookmarkProviderConfig,
}

impl BookmarkProvider {
    pub fn new(store: Option<Arc<dyn BookmarkStore>>, config: BookmarkProviderConfig) -> Self {
        Self { store, config }
    }

    /// Cheap lookup consulted for every accepted match
    pub fn is_url_bookmarked(&self, url: &str) -> bool {
        self.store.as_ref().map_or(false, |s| s.is_url_bookmarked(url))
    }

    pub fn matches_for(&self, input: &AutocompleteInput) -> Vec<AutocompleteMatch> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        if input.terms.is_empty() || input.is_forced_query() {
            return Vec::new();
        }

        // Search wider than we show so relevance, not store order, picks the top
        let found = store.search_bookmarks(&input.terms, self.config.max_results * 4);
        let mut matches: Vec<AutocompleteMatch> = found
            .iter()
            .filter_map(|bookmark| {
                let quality = conjunctive_quality(&input.terms, &tokenize(&bookmark.title), &tokenize(&bookmark.url))?;
                let contents = if bookmark.title.is_empty() { bookmark.url.clone() } else { bookmark.title.clone() };
                let mut m = AutocompleteMatch::new(
                    ProviderKind::Bookmark,
                    MatchType::Bookmark,
                    bookmark_relevance(quality),
                    contents,
                    bookmark.url.clone(),
                )
                .with_signals(ScoringSignals {
                    match_quality_score: quality,
                    is_bookmarked: true,
                    url_length: bookmark.url.len(),
                    ..ScoringSignals::default()
                });
                m.inline_completion = inline_completion(&input.trimmed, &bookmark.url);
                m.allowed_to_be_default = m.inline_completion.is_some();
                Some(m)
            })
            .collect();
        matches.sort_by(|a, b| {
            b.relevance
                .cmp(&a.relevance)
                .then_with(|| a.destination_url.cmp(&b.destination_url))
        });
        matches.truncate(self.config.max_results);
        matches
    }
}

impl AutocompleteProvider for BookmarkProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bookmark
    }

    fn start(&self, input: Arc<AutocompleteInput>, sink: ResultSink) {
        sink.emit(self.matches_for(&input), false);
    }

    /// Nothing runs asynchronously
    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::InputReason;
    use crate::memory::InMemoryBookmarkStore;
    use crate::models::Bookmark;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    fn bookmark(id: i64, url: &str, title: &str) -> Bookmark {
        Bookmark {
            id,
            url: url.to_string(),
            title: title.to_string(),
        }
    }

    fn input(text: &str) -> AutocompleteInput {
        AutocompleteInput::new(text, 1, InputReason::Keystroke)
    }

    #[test]
    fn test_stub_without_store() {
        let provider = BookmarkProvider::new(None, BookmarkProviderConfig::default());
        assert!(provider.matches_for(&input("rust")).is_empty());
        assert!(!provider.is_url_bookmarked("https://rust-lang.org"));

        let (tx, mut rx) = unbounded_channel();
        provider.start(
            Arc::new(input("rust")),
            ResultSink::new(ProviderKind::Bookmark, 1, CancellationToken::new(), tx),
        );
        let batch = rx.try_recv().unwrap();
        assert!(batch.matches.is_empty());
        assert!(!batch.has_more);
    }

    #[test]
    fn test_matches_with_store() {
        let store = Arc::new(InMemoryBookmarkStore::new(vec![
            bookmark(1, "https://www.rust-lang.org/", "Rust Programming Language"),
            bookmark(2, "https://crates.io", "crates.io: Rust Package Registry"),
            bookmark(3, "https://rustup.rs", "rustup"),
            bookmark(4, "https://this-week-in-rust.org", "This Week in Rust"),
            bookmark(5, "https://python.org", "Python"),
        ]));
        let provider = BookmarkProvider::new(Some(store), BookmarkProviderConfig::default());

        let matches = provider.matches_for(&input("rust"));
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|m| (900..=1350).contains(&m.relevance)));
        assert!(matches.iter().all(|m| m.is_bookmarked()));
        assert!(matches.windows(2).all(|w| w[0].relevance >= w[1].relevance));

        assert!(provider.is_url_bookmarked("https://rust-lang.org"));
        assert!(provider.matches_for(&input("?rust")).is_empty());
    }
}
