//! Per-query input snapshot

use crate::interface::{InputReason, InputType};
use crate::tokenizer::tokenize;
use crate::url_normalizer::looks_like_url;

/// Immutable view of one input event, shared by every provider for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteInput {
    pub text: String,
    /// `text` without surrounding whitespace (and without the `?` of a forced query)
    pub trimmed: String,
    /// Lowercase tokens in input order
    pub terms: Vec<String>,
    pub input_type: InputType,
    pub query_id: u64,
    pub reason: InputReason,
}

impl AutocompleteInput {
    pub fn new(text: &str, query_id: u64, reason: InputReason) -> Self {
        let input_type = classify(text);
        let trimmed = match input_type {
            InputType::ForcedQuery => text.trim_start().trim_start_matches('?').trim(),
            _ => text.trim(),
        }
        .to_string();

        Self {
            text: text.to_string(),
            terms: tokenize(&trimmed),
            trimmed,
            input_type,
            query_id,
            reason,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed.is_empty()
    }

    /// Length of the trimmed text in characters
    pub fn len(&self) -> usize {
        self.trimmed.chars().count()
    }

    pub fn is_forced_query(&self) -> bool {
        self.input_type == InputType::ForcedQuery
    }
}

/// Classify raw input text.
pub fn classify(text: &str) -> InputType {
    let trimmed = text.trim();
    if trimmed.starts_with('?') {
        InputType::ForcedQuery
    } else if trimmed.is_empty() {
        InputType::Unknown
    } else if looks_like_url(trimmed) {
        InputType::Url
    } else if trimmed.contains(char::is_whitespace) {
        InputType::Query
    } else {
        InputType::Unknown
    }
}
