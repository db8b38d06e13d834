//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! max_matches = 6
//!
//! [index]
//! substring_fallback_max_ids = 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::interface::{OmniboxError, ProviderKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmniboxConfig {
    /// Matches shown to the presentation layer per update
    pub max_matches: usize,
    /// Upper bound for any single collaborator call
    pub provider_timeout_ms: u64,
    /// Added once to matches whose URL is bookmarked
    pub bookmark_relevance_bonus: i32,
    pub enabled_providers: Vec<ProviderKind>,
    pub index: IndexConfig,
    pub history: HistoryProviderConfig,
    pub open_tab: OpenTabProviderConfig,
    pub zero_suggest: ZeroSuggestConfig,
    pub bookmark: BookmarkProviderConfig,
}

impl Default for OmniboxConfig {
    fn default() -> Self {
        Self {
            max_matches: 8,
            provider_timeout_ms: 3_000,
            bookmark_relevance_bonus: 25,
            enabled_providers: ProviderKind::ALL.to_vec(),
            index: IndexConfig::default(),
            history: HistoryProviderConfig::default(),
            open_tab: OpenTabProviderConfig::default(),
            zero_suggest: ZeroSuggestConfig::default(),
            bookmark: BookmarkProviderConfig::default(),
        }
    }
}

/// In-memory URL index tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub max_entries: usize,
    /// Minimum spacing between non-forced rebuilds
    pub populate_interval_secs: i64,
    /// Queries matching more entries than this return nothing
    pub max_candidates: usize,
    /// Substring scan only runs when exact+prefix found fewer ids than this
    pub substring_fallback_max_ids: usize,
    /// and the term has at least this many characters
    pub substring_min_term_len: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_entries: 2_000,
            populate_interval_secs: 5 * 60,
            max_candidates: 500,
            substring_fallback_max_ids: 10,
            substring_min_term_len: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryProviderConfig {
    pub max_results: usize,
    /// Below this many index hits, also search the full history store
    pub fallback_min_results: usize,
    pub fallback_min_input_len: usize,
    pub fallback_search_limit: usize,
}

impl Default for HistoryProviderConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            fallback_min_results: 5,
            fallback_min_input_len: 2,
            fallback_search_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenTabProviderConfig {
    pub max_results: usize,
}

impl Default for OpenTabProviderConfig {
    fn default() -> Self {
        Self { max_results: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroSuggestConfig {
    pub max_tabs: usize,
    pub max_most_visited: usize,
    /// Total history-derived suggestions (most visited + recent backfill)
    pub max_history: usize,
}

impl Default for ZeroSuggestConfig {
    fn default() -> Self {
        Self {
            max_tabs: 5,
            max_most_visited: 5,
            max_history: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkProviderConfig {
    pub max_results: usize,
}

impl Default for BookmarkProviderConfig {
    fn default() -> Self {
        Self { max_results: 3 }
    }
}

impl OmniboxConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OmniboxError> {
        let config: Self = toml::from_str(text).map_err(|e| OmniboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, OmniboxError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| OmniboxError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), OmniboxError> {
        if self.max_matches == 0 {
            return Err(OmniboxError::Config("max_matches must be at least 1".into()));
        }
        if self.index.max_entries == 0 {
            return Err(OmniboxError::Config("index.max_entries must be at least 1".into()));
        }
        if self.index.max_candidates == 0 {
            return Err(OmniboxError::Config("index.max_candidates must be at least 1".into()));
        }
        if self.provider_timeout_ms == 0 {
            return Err(OmniboxError::Config("provider_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.enabled_providers.contains(&kind)
    }
}
