//! Omnibox - address-bar autocomplete engine
//!
//! Turns partial input into a ranked list of navigation suggestions drawn from
//! browsing history, open tabs, bookmarks and zero-input suggestions. History
//! lookups go through an in-memory inverted index (IMUI); providers run
//! concurrently and stream partial results through the `Omnibox` orchestrator.

pub(crate) mod candidate;
pub mod collaborators;
pub mod config;
mod controller;
pub mod database;
pub mod frecency;
pub mod indexer;
pub mod input;
pub mod interface;
pub mod logging;
pub mod memory;
pub mod models;
pub mod providers;
pub mod ranking;
pub mod result;
pub mod runtime;
pub mod tokenizer;
pub mod url_normalizer;

pub use candidate::IndexCandidate;
pub use collaborators::{BookmarkStore, Clock, HistoryStore, Navigator, ResultsListener, SystemClock, TabRegistry};
pub use config::OmniboxConfig;
pub use controller::{Collaborators, Omnibox, QueryPhase};
pub use database::SqliteHistoryStore;
pub use indexer::{InMemoryUrlIndex, PopulateOutcome};
pub use input::AutocompleteInput;
pub use interface::*;
pub use models::{Bookmark, HistoryRow, ImuiEntry, OpenTab};
pub use result::AutocompleteResult;
