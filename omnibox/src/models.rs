//! Core data models
//!
//! Rows handed to us by collaborators, and the indexed form of a history row.

use serde::{Deserialize, Serialize};

use crate::frecency::{calculate_frecency, VisitType};
use crate::tokenizer::tokenize_unique;

/// Rows visited within this window count as significant regardless of counts.
pub const SIGNIFICANT_RECENCY_SECS: i64 = 72 * 60 * 60;

/// Visit count at which a row becomes significant on frequency alone.
pub const SIGNIFICANT_VISIT_COUNT: u32 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// COLLABORATOR ROWS
// ─────────────────────────────────────────────────────────────────────────────

/// One history row as returned by the history store. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub visit_count: u32,
    pub typed_count: u32,
    pub last_visit_time: i64,
    pub last_visit_type: VisitType,
    pub first_visit_time: i64,
}

impl HistoryRow {
    /// Typed at least once, visited often, or visited recently
    pub fn is_significant(&self, now: i64) -> bool {
        self.typed_count >= 1
            || self.visit_count >= SIGNIFICANT_VISIT_COUNT
            || now - self.last_visit_time <= SIGNIFICANT_RECENCY_SECS
    }

    pub fn frecency(&self, now: i64) -> f64 {
        calculate_frecency(
            self.visit_count,
            self.typed_count,
            self.last_visit_time,
            self.last_visit_type,
            now,
        )
    }
}

/// An open tab in the active browsing context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTab {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub space_id: String,
}

/// A bookmarked page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// INDEXED ENTRY
// ─────────────────────────────────────────────────────────────────────────────

/// A history row as held by the in-memory URL index.
///
/// Tokens and frecency are derived from the row at (re)index time; the index
/// drops the old postings before inserting a rebuilt entry for the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuiEntry {
    pub history_id: i64,
    pub url: String,
    pub title: String,
    pub visit_count: u32,
    pub typed_count: u32,
    pub last_visit_time: i64,
    pub last_visit_type: VisitType,
    pub first_visit_time: i64,
    pub frecency: f64,
    pub url_tokens: Vec<String>,
    pub title_tokens: Vec<String>,
}

impl ImuiEntry {
    pub fn from_row(row: &HistoryRow, now: i64) -> Self {
        Self {
            history_id: row.id,
            url: row.url.clone(),
            title: row.title.clone(),
            visit_count: row.visit_count,
            typed_count: row.typed_count,
            last_visit_time: row.last_visit_time,
            last_visit_type: row.last_visit_type,
            first_visit_time: row.first_visit_time,
            frecency: row.frecency(now),
            url_tokens: tokenize_unique(&row.url),
            title_tokens: tokenize_unique(&row.title),
        }
    }

    /// Every distinct token from url and title
    pub fn all_tokens(&self) -> impl Iterator<Item = &String> {
        self.url_tokens
            .iter()
            .chain(self.title_tokens.iter().filter(move |t| !self.url_tokens.contains(*t)))
    }
}

#[cfg(test)]
pub(crate) fn test_row(id: i64, url: &str, title: &str, visits: u32, typed: u32, last_visit: i64) -> HistoryRow {
    HistoryRow {
        id,
        url: url.to_string(),
        title: title.to_string(),
        visit_count: visits,
        typed_count: typed,
        last_visit_time: last_visit,
        last_visit_type: VisitType::Link,
        first_visit_time: last_visit,
    }
}
