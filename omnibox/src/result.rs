//! Per-query match aggregation: dedupe, merge, sort, truncate.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::interface::{AutocompleteMatch, MatchType};
use crate::url_normalizer::normalize_url_for_dedup;

/// Default display limit for `get_top_matches`
pub const DEFAULT_MAX_MATCHES: usize = 8;

/// Relevance descending, then matches allowed to be default first, then by
/// destination so equal scores come out the same way every run
fn display_order(a: &AutocompleteMatch, b: &AutocompleteMatch) -> Ordering {
    b.relevance
        .cmp(&a.relevance)
        .then_with(|| b.allowed_to_be_default.cmp(&a.allowed_to_be_default))
        .then_with(|| a.destination_url.cmp(&b.destination_url))
}

fn dedup_key(m: &AutocompleteMatch) -> String {
    match &m.dedup_key {
        Some(key) => key.clone(),
        None => normalize_url_for_dedup(&m.destination_url),
    }
}

/// Fold a losing duplicate's metadata into the retained match.
fn merge_into(winner: &mut AutocompleteMatch, duplicate: &AutocompleteMatch) {
    if winner.match_type == MatchType::Bookmark
        || duplicate.match_type == MatchType::Bookmark
        || duplicate.is_bookmarked()
    {
        winner.signals_mut().is_bookmarked = true;
    }
    let duplicate_has_tab = duplicate
        .scoring_signals
        .as_ref()
        .map_or(false, |signals| signals.has_open_tab_match);
    if duplicate.match_type == MatchType::OpenTab || duplicate_has_tab {
        winner.signals_mut().has_open_tab_match = true;
        if winner.tab_id.is_none() {
            winner.tab_id = duplicate.tab_id;
        }
    }
    if winner.inline_completion.is_none() && duplicate.inline_completion.is_some() {
        winner.inline_completion = duplicate.inline_completion.clone();
    }
    if duplicate.allowed_to_be_default && !winner.allowed_to_be_default {
        winner.allowed_to_be_default = true;
    }
    if winner.description.is_none() && duplicate.description.is_some() {
        winner.description = duplicate.description.clone();
    }
}

/// Matches collected for one query. Call `deduplicate()` before
/// `sort()`/`get_top_matches()`.
#[derive(Debug, Clone, Default)]
pub struct AutocompleteResult {
    matches: Vec<AutocompleteMatch>,
}

impl AutocompleteResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_match(&mut self, m: AutocompleteMatch) {
        self.matches.push(m);
    }

    pub fn add_matches(&mut self, matches: impl IntoIterator<Item = AutocompleteMatch>) {
        self.matches.extend(matches);
    }

    pub fn clear(&mut self) {
        self.matches.clear();
    }

    pub fn matches(&self) -> &[AutocompleteMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Collapse matches sharing a dedup key into the highest-relevance one,
    /// carrying over bookmark state, inline completion, default eligibility
    /// and description from the duplicates.
    pub fn deduplicate(&mut self) {
        self.sort();

        let mut retained: Vec<AutocompleteMatch> = Vec::with_capacity(self.matches.len());
        let mut slot_by_key: HashMap<String, usize> = HashMap::new();

        for m in self.matches.drain(..) {
            let key = dedup_key(&m);
            match slot_by_key.get(&key) {
                Some(&slot) => merge_into(&mut retained[slot], &m),
                None => {
                    slot_by_key.insert(key, retained.len());
                    retained.push(m);
                }
            }
        }

        // A lone bookmark match still reports itself as bookmarked
        for m in retained.iter_mut().filter(|m| m.match_type == MatchType::Bookmark) {
            m.signals_mut().is_bookmarked = true;
        }
        self.matches = retained;
    }

    /// Relevance descending; ties prefer `allowed_to_be_default`, then destination URL.
    pub fn sort(&mut self) {
        self.matches.sort_by(display_order);
    }

    /// Up to `limit` matches in display order. The first is marked default
    /// when it is allowed to be.
    pub fn get_top_matches(&self, limit: usize) -> Vec<AutocompleteMatch> {
        let mut top: Vec<AutocompleteMatch> = self.matches.iter().take(limit).cloned().collect();
        for m in top.iter_mut() {
            m.is_default = false;
        }
        if let Some(first) = top.first_mut() {
            first.is_default = first.allowed_to_be_default;
        }
        top
    }
}
