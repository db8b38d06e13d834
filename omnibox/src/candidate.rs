//! Index candidate with memoized derived state.
//!
//! The entry is shared with the index snapshot and never mutated, so the
//! `OnceLock` caches can never go stale.

use std::sync::{Arc, OnceLock};

use crate::models::ImuiEntry;
use crate::ranking::TermMatchKind;
use crate::tokenizer::tokenize;
use crate::url_normalizer::split_host_and_path;

/// A history entry returned by `InMemoryUrlIndex::query`, with the best match
/// kind of each query term against its url and title tokens (same order as
/// the terms).
#[derive(Debug, Clone)]
pub struct IndexCandidate {
    pub entry: Arc<ImuiEntry>,
    pub url_term_matches: Vec<TermMatchKind>,
    pub title_term_matches: Vec<TermMatchKind>,
    host_and_path_tokens: OnceLock<(Vec<String>, Vec<String>)>,
}

impl IndexCandidate {
    pub fn new(
        entry: Arc<ImuiEntry>,
        url_term_matches: Vec<TermMatchKind>,
        title_term_matches: Vec<TermMatchKind>,
    ) -> Self {
        Self {
            entry,
            url_term_matches,
            title_term_matches,
            host_and_path_tokens: OnceLock::new(),
        }
    }

    fn split_tokens(&self) -> &(Vec<String>, Vec<String>) {
        self.host_and_path_tokens.get_or_init(|| {
            let (host, path) = split_host_and_path(&self.entry.url);
            (tokenize(&host), tokenize(&path))
        })
    }

    /// Tokens of the host, without `www`
    pub fn host_tokens(&self) -> &[String] {
        &self.split_tokens().0
    }

    /// Tokens of everything after the host
    pub fn path_tokens(&self) -> &[String] {
        &self.split_tokens().1
    }

    /// True when the url has no path or query beyond the root
    pub fn is_host_only(&self) -> bool {
        self.path_tokens().is_empty()
    }
}
