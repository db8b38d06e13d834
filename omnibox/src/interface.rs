//! Omnibox Interface Definition
//!
//! Value types shared between the engine and the presentation layer.
//! Everything here is plain data: matches are produced by providers, merged by
//! the aggregator, and handed out as clones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// What kind of suggestion a match represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    SearchQuery,
    Verbatim,
    HistoryUrl,
    UrlWhatYouTyped,
    OpenTab,
    ZeroSuggest,
    Bookmark,
    Pedal,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::SearchQuery => "search-query",
            MatchType::Verbatim => "verbatim",
            MatchType::HistoryUrl => "history-url",
            MatchType::UrlWhatYouTyped => "url-what-you-typed",
            MatchType::OpenTab => "open-tab",
            MatchType::ZeroSuggest => "zero-suggest",
            MatchType::Bookmark => "bookmark",
            MatchType::Pedal => "pedal",
        }
    }
}

/// Suggestion sources known to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    HistoryUrl,
    OpenTab,
    ZeroSuggest,
    Bookmark,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::HistoryUrl,
        ProviderKind::OpenTab,
        ProviderKind::ZeroSuggest,
        ProviderKind::Bookmark,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::HistoryUrl => "HistoryURLProvider",
            ProviderKind::OpenTab => "OpenTabProvider",
            ProviderKind::ZeroSuggest => "ZeroSuggestProvider",
            ProviderKind::Bookmark => "BookmarkProvider",
        }
    }
}

/// Classification of the raw input text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    Url,
    Query,
    ForcedQuery,
    Unknown,
}

/// Why the presentation layer sent an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputReason {
    Focus,
    Keystroke,
}

/// Where a chosen match should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenDisposition {
    Current,
    NewTab,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw ranking inputs kept alongside a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSignals {
    pub typed_count: u32,
    pub visit_count: u32,
    /// Seconds since the last visit, clamped at zero
    pub elapsed_time_since_last_visit: i64,
    pub frecency: f64,
    pub match_quality_score: f64,
    pub host_match_at_word_boundary: bool,
    pub has_non_scheme_www_match: bool,
    pub is_host_only: bool,
    pub is_bookmarked: bool,
    pub has_open_tab_match: bool,
    pub url_length: usize,
}

/// A single suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteMatch {
    pub provider: ProviderKind,
    pub relevance: i32,
    /// Title or display text
    pub contents: String,
    pub description: Option<String>,
    pub destination_url: String,
    #[serde(rename = "type")]
    pub match_type: MatchType,
    /// Suffix appended after the typed text to complete the URL inline
    pub inline_completion: Option<String>,
    pub is_default: bool,
    pub allowed_to_be_default: bool,
    /// Overrides the normalized destination URL when deduplicating
    pub dedup_key: Option<String>,
    pub scoring_signals: Option<ScoringSignals>,
    /// Set on open-tab matches so choosing one can switch to the tab
    pub tab_id: Option<i64>,
}

impl AutocompleteMatch {
    pub fn new(
        provider: ProviderKind,
        match_type: MatchType,
        relevance: i32,
        contents: impl Into<String>,
        destination_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            relevance,
            contents: contents.into(),
            description: None,
            destination_url: destination_url.into(),
            match_type,
            inline_completion: None,
            is_default: false,
            allowed_to_be_default: false,
            dedup_key: None,
            scoring_signals: None,
            tab_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.is_empty() { None } else { Some(description) };
        self
    }

    pub fn with_signals(mut self, signals: ScoringSignals) -> Self {
        self.scoring_signals = Some(signals);
        self
    }

    /// Signals, creating an empty record on first access
    pub fn signals_mut(&mut self) -> &mut ScoringSignals {
        self.scoring_signals.get_or_insert_with(ScoringSignals::default)
    }

    pub fn is_bookmarked(&self) -> bool {
        self.scoring_signals.as_ref().map_or(false, |s| s.is_bookmarked)
    }
}

/// One streamed update for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsUpdate {
    pub query_id: u64,
    pub matches: Vec<AutocompleteMatch>,
    /// True once every provider has finished for this query
    pub done: bool,
}

/// Error type for omnibox operations
#[derive(Debug, Error)]
pub enum OmniboxError {
    #[error("Collaborator error: {0}")]
    Collaborator(String),
    #[error("{provider} timed out after {millis}ms")]
    Timeout { provider: &'static str, millis: u64 },
    #[error("Database error: {0}")]
    Database(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<crate::database::DatabaseError> for OmniboxError {
    fn from(e: crate::database::DatabaseError) -> Self {
        OmniboxError::Database(e.to_string())
    }
}
