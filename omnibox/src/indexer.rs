//! In-Memory URL Index (IMUI)
//!
//! Tokenized inverted index over significant history. Lookup for a term runs a
//! three-tier cascade: exact word → prefix (via 2-char prefix buckets) →
//! substring scan over the vocabulary. The substring tier is O(vocabulary), so
//! it only runs when the cheap tiers found few ids and the term is long enough
//! to be selective. Term id-sets are intersected; a result larger than
//! `max_candidates` is treated as too vague and comes back empty.
//!
//! Readers take an `Arc` snapshot of the maps. `populate()` builds fresh maps
//! and swaps the `Arc`; `add_or_update()` goes through `Arc::make_mut`, so a
//! snapshot held by a running query never sees a half-applied change.
//! Incremental updates that land while a rebuild awaits the history store are
//! logged and replayed onto the fresh maps before the swap.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::candidate::IndexCandidate;
use crate::collaborators::{Clock, HistoryStore};
use crate::config::IndexConfig;
use crate::interface::OmniboxError;
use crate::models::{HistoryRow, ImuiEntry};
use crate::ranking::best_term_match;
use crate::runtime;

/// Characters per prefix bucket key
const PREFIX_KEY_CHARS: usize = 2;

fn prefix_key(word: &str) -> String {
    word.chars().take(PREFIX_KEY_CHARS).collect()
}

/// What a call to `populate()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateOutcome {
    /// Index rebuilt with this many entries
    Rebuilt(usize),
    /// Skipped: the last rebuild is younger than the populate interval
    Throttled,
}

/// The three index structures. Only `InMemoryUrlIndex` mutates them.
#[derive(Debug, Clone, Default)]
pub struct IndexMaps {
    entries: HashMap<i64, Arc<ImuiEntry>>,
    word_to_ids: HashMap<String, HashSet<i64>>,
    prefix_to_words: HashMap<String, HashSet<String>>,
}

impl IndexMaps {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, history_id: i64) -> Option<&Arc<ImuiEntry>> {
        self.entries.get(&history_id)
    }

    /// Ids posted under `word`
    pub fn posting(&self, word: &str) -> Option<&HashSet<i64>> {
        self.word_to_ids.get(word)
    }

    /// Words sharing a prefix bucket
    pub fn prefix_bucket(&self, key: &str) -> Option<&HashSet<String>> {
        self.prefix_to_words.get(key)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.word_to_ids.len()
    }

    /// Index an entry, first dropping any postings of the same id.
    fn insert(&mut self, entry: ImuiEntry) {
        let id = entry.history_id;
        self.remove(id);
        for token in entry.all_tokens() {
            self.word_to_ids.entry(token.clone()).or_default().insert(id);
            self.prefix_to_words
                .entry(prefix_key(token))
                .or_default()
                .insert(token.clone());
        }
        self.entries.insert(id, Arc::new(entry));
    }

    /// Drop an entry and its postings; empty postings and buckets are removed.
    fn remove(&mut self, history_id: i64) -> Option<Arc<ImuiEntry>> {
        let entry = self.entries.remove(&history_id)?;
        for token in entry.all_tokens() {
            let Some(ids) = self.word_to_ids.get_mut(token) else {
                continue;
            };
            ids.remove(&history_id);
            if !ids.is_empty() {
                continue;
            }
            self.word_to_ids.remove(token);
            let key = prefix_key(token);
            if let Some(words) = self.prefix_to_words.get_mut(&key) {
                words.remove(token);
                if words.is_empty() {
                    self.prefix_to_words.remove(&key);
                }
            }
        }
        Some(entry)
    }

    /// Insert unless the maps are full and `entry` scores below every resident.
    /// At capacity the lowest-frecency entry makes room.
    fn insert_bounded(&mut self, entry: ImuiEntry, max_entries: usize) -> bool {
        if self.entry(entry.history_id).is_none() && self.len() >= max_entries {
            match self.lowest_frecency_id() {
                Some((victim, frecency)) if frecency < entry.frecency => {
                    self.remove(victim);
                }
                _ => return false,
            }
        }
        self.insert(entry);
        true
    }

    fn lowest_frecency_id(&self) -> Option<(i64, f64)> {
        self.entries
            .values()
            .min_by(|a, b| a.frecency.total_cmp(&b.frecency))
            .map(|e| (e.history_id, e.frecency))
    }

    /// Candidate ids for one term via the exact → prefix → substring cascade.
    fn ids_for_term(&self, term: &str, config: &IndexConfig) -> HashSet<i64> {
        let mut ids: HashSet<i64> = self.word_to_ids.get(term).cloned().unwrap_or_default();
        let term_len = term.chars().count();

        let add_word = |ids: &mut HashSet<i64>, word: &str| {
            if let Some(word_ids) = self.word_to_ids.get(word) {
                ids.extend(word_ids.iter().copied());
            }
        };

        if term_len >= PREFIX_KEY_CHARS {
            if let Some(words) = self.prefix_to_words.get(&prefix_key(term)) {
                for word in words.iter().filter(|w| w.as_str() != term && w.starts_with(term)) {
                    add_word(&mut ids, word);
                }
            }
        } else {
            // One-character term: every bucket whose key starts with it
            for (key, words) in &self.prefix_to_words {
                if !key.starts_with(term) {
                    continue;
                }
                for word in words.iter().filter(|w| w.as_str() != term) {
                    add_word(&mut ids, word);
                }
            }
        }

        if ids.len() < config.substring_fallback_max_ids && term_len >= config.substring_min_term_len {
            for (word, word_ids) in &self.word_to_ids {
                if word.contains(term) && !word.starts_with(term) {
                    ids.extend(word_ids.iter().copied());
                }
            }
        }
        ids
    }

    /// Conjunctive lookup over all terms. Empty when any term misses or when
    /// more than `max_candidates` entries survive.
    pub fn query(&self, terms: &[String], config: &IndexConfig, max_candidates: usize) -> Vec<IndexCandidate> {
        if terms.is_empty() || self.entries.is_empty() {
            return Vec::new();
        }

        let mut matched: Option<HashSet<i64>> = None;
        for term in terms {
            let ids = self.ids_for_term(term, config);
            let next = match matched {
                None => ids,
                Some(prev) => prev.intersection(&ids).copied().collect(),
            };
            if next.is_empty() {
                return Vec::new();
            }
            matched = Some(next);
        }

        let ids = matched.unwrap_or_default();
        if ids.len() > max_candidates {
            debug!(matched = ids.len(), max_candidates, "query too vague, returning no candidates");
            return Vec::new();
        }

        let mut candidates: Vec<IndexCandidate> = ids
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| {
                let url_matches = terms.iter().map(|t| best_term_match(t, &entry.url_tokens)).collect();
                let title_matches = terms.iter().map(|t| best_term_match(t, &entry.title_tokens)).collect();
                IndexCandidate::new(Arc::clone(entry), url_matches, title_matches)
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.entry
                .frecency
                .total_cmp(&a.entry.frecency)
                .then_with(|| a.entry.history_id.cmp(&b.entry.history_id))
        });
        candidates
    }
}

/// An incremental change recorded while a rebuild is in flight
#[derive(Debug, Clone)]
enum IndexUpdate {
    Upsert(ImuiEntry),
    Remove(i64),
}

/// The index plus its population lifecycle
pub struct InMemoryUrlIndex {
    maps: RwLock<Arc<IndexMaps>>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    config: IndexConfig,
    last_populated: Mutex<Option<i64>>,
    populate_lock: tokio::sync::Mutex<()>,
    /// `Some` while a rebuild is fetching rows. Only touched with `maps` write-locked.
    pending_updates: Mutex<Option<Vec<IndexUpdate>>>,
}

/// Stops update recording if a rebuild ends early (error or dropped future)
struct RecordingGuard<'a> {
    pending: &'a Mutex<Option<Vec<IndexUpdate>>>,
}

impl Drop for RecordingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().take();
    }
}

impl InMemoryUrlIndex {
    /// Create an empty index. Call `populate()` to fill it.
    pub fn new(history: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>, config: IndexConfig) -> Self {
        Self {
            maps: RwLock::new(Arc::new(IndexMaps::default())),
            history,
            clock,
            config,
            last_populated: Mutex::new(None),
            populate_lock: tokio::sync::Mutex::new(()),
            pending_updates: Mutex::new(None),
        }
    }

    /// Current maps; never observed mid-rebuild
    pub fn snapshot(&self) -> Arc<IndexMaps> {
        Arc::clone(&self.maps.read())
    }

    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Rebuild from significant history unless rebuilt within the populate interval.
    pub async fn populate(&self) -> Result<PopulateOutcome, OmniboxError> {
        self.populate_inner(false).await
    }

    /// Rebuild now, ignoring the throttle.
    pub async fn force_refresh(&self) -> Result<PopulateOutcome, OmniboxError> {
        self.populate_inner(true).await
    }

    /// `populate()` on its own task. Dropping the returned future (a cancelled
    /// query, a timeout) does not stop the rebuild.
    pub fn populate_detached(self: &Arc<Self>) -> impl Future<Output = Result<PopulateOutcome, OmniboxError>> {
        let index = Arc::clone(self);
        let task = runtime::handle().spawn(async move { index.populate().await });
        async move {
            task.await
                .map_err(|e| OmniboxError::Collaborator(format!("index population task failed: {}", e)))?
        }
    }

    async fn populate_inner(&self, force: bool) -> Result<PopulateOutcome, OmniboxError> {
        let _serialized = self.populate_lock.lock().await;
        let now = self.clock.now_unix();

        if !force {
            if let Some(last) = *self.last_populated.lock() {
                if now - last < self.config.populate_interval_secs {
                    debug!(age_secs = now - last, "index population throttled");
                    return Ok(PopulateOutcome::Throttled);
                }
            }
        }

        {
            let _maps = self.maps.write();
            *self.pending_updates.lock() = Some(Vec::new());
        }
        let _recording = RecordingGuard {
            pending: &self.pending_updates,
        };

        let rows = match self.history.significant_history().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "index population failed, keeping previous index");
                return Err(e);
            }
        };

        let mut maps = Self::build_maps(rows, now, self.config.max_entries);
        let count = {
            let mut current = self.maps.write();
            let updates = self.pending_updates.lock().take().unwrap_or_default();
            if !updates.is_empty() {
                debug!(updates = updates.len(), "replaying updates made during rebuild");
            }
            for update in updates {
                match update {
                    IndexUpdate::Upsert(entry) => {
                        maps.insert_bounded(entry, self.config.max_entries);
                    }
                    IndexUpdate::Remove(id) => {
                        maps.remove(id);
                    }
                }
            }
            let count = maps.len();
            *current = Arc::new(maps);
            count
        };
        *self.last_populated.lock() = Some(now);
        info!(entries = count, "rebuilt in-memory URL index");
        Ok(PopulateOutcome::Rebuilt(count))
    }

    /// Fresh maps from rows, keeping the `max_entries` highest-frecency significant rows.
    fn build_maps(rows: Vec<HistoryRow>, now: i64, max_entries: usize) -> IndexMaps {
        let mut entries: Vec<ImuiEntry> = rows
            .iter()
            .filter(|row| row.is_significant(now))
            .map(|row| ImuiEntry::from_row(row, now))
            .collect();
        entries.sort_by(|a, b| b.frecency.total_cmp(&a.frecency));
        entries.truncate(max_entries);

        let mut maps = IndexMaps::default();
        for entry in entries {
            maps.insert(entry);
        }
        maps
    }

    /// Re-index one row. Stale postings for the same id are purged first.
    /// At capacity, a new row replaces the lowest-frecency entry only if it
    /// scores higher.
    pub fn add_or_update(&self, row: &HistoryRow) {
        let entry = ImuiEntry::from_row(row, self.clock.now_unix());
        let mut guard = self.maps.write();
        self.record(|| IndexUpdate::Upsert(entry.clone()));
        if !Arc::make_mut(&mut guard).insert_bounded(entry, self.config.max_entries) {
            debug!(history_id = row.id, "index full, row not added");
        }
    }

    /// Log an update for an in-flight rebuild. Callers hold the `maps` write lock.
    fn record(&self, update: impl FnOnce() -> IndexUpdate) {
        if let Some(pending) = self.pending_updates.lock().as_mut() {
            pending.push(update());
        }
    }

    /// Drop a row (e.g. deleted from history). Returns whether it was indexed.
    pub fn remove(&self, history_id: i64) -> bool {
        let mut guard = self.maps.write();
        self.record(|| IndexUpdate::Remove(history_id));
        if guard.entry(history_id).is_none() {
            return false;
        }
        Arc::make_mut(&mut guard).remove(history_id).is_some()
    }

    /// Candidates for `terms` using the configured `max_candidates`.
    pub fn query(&self, terms: &[String]) -> Vec<IndexCandidate> {
        self.query_with_limit(terms, self.config.max_candidates)
    }

    pub fn query_with_limit(&self, terms: &[String], max_candidates: usize) -> Vec<IndexCandidate> {
        #[cfg(feature = "perf-log")]
        let t0 = std::time::Instant::now();

        let candidates = self.snapshot().query(terms, &self.config, max_candidates);

        #[cfg(feature = "perf-log")]
        debug!(
            elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0,
            candidates = candidates.len(),
            "[perf] imui query"
        );
        candidates
    }
}
