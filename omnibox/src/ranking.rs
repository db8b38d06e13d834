//! Term matching and relevance scoring.
//!
//! A query term matches a token exactly, as a prefix, or as a substring; the
//! derived `Ord` ranks those kinds so the best match per term is a `max()`.
//! Providers turn per-term matches into a match-quality score in [0, 1] and map
//! it (blended with frecency for history) into their relevance band.

use crate::url_normalizer::strip_scheme_and_www;

/// Weight of the host component in URL match quality
pub const HOST_MATCH_WEIGHT: f64 = 0.4;
pub const PATH_MATCH_WEIGHT: f64 = 0.15;
pub const TITLE_MATCH_WEIGHT: f64 = 0.15;
/// Bonus scaled by the fraction of terms that matched anywhere
pub const TERM_COVERAGE_WEIGHT: f64 = 0.2;

/// Frecency that maps to 0.5 after normalization (≈ five fresh link visits).
pub const FRECENCY_PIVOT: f64 = 500.0;

pub const HISTORY_RELEVANCE_MIN: i32 = 900;
pub const HISTORY_RELEVANCE_MAX: i32 = 1400;
pub const HISTORY_FALLBACK_RELEVANCE_MAX: i32 = 1300;
pub const TYPED_URL_BONUS: i32 = 20;

pub const OPEN_TAB_RELEVANCE_MIN: i32 = 1100;
pub const OPEN_TAB_RELEVANCE_MAX: i32 = 1500;
/// Ceiling for tabs whose URL does not literally contain the input
pub const OPEN_TAB_NON_LITERAL_CAP: i32 = 1200;

pub const BOOKMARK_RELEVANCE_MIN: i32 = 900;
pub const BOOKMARK_RELEVANCE_MAX: i32 = 1350;

/// Match-quality weight for one-character input; rises with input length.
const MIN_QUALITY_WEIGHT: f64 = 0.3;
const MAX_QUALITY_WEIGHT: f64 = 0.8;
const QUALITY_WEIGHT_PER_CHAR: f64 = 0.05;

/// Tokens that every URL shares and that say nothing about the destination.
const SCHEME_AND_WWW_TOKENS: &[&str] = &["http", "https", "www"];

/// Result of matching a query term against a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TermMatchKind {
    #[default]
    None,
    Substring,
    Prefix,
    Exact,
}

impl TermMatchKind {
    pub fn score(self) -> f64 {
        match self {
            TermMatchKind::Exact => 1.0,
            TermMatchKind::Prefix => 0.7,
            TermMatchKind::Substring => 0.4,
            TermMatchKind::None => 0.0,
        }
    }

    pub fn is_match(self) -> bool {
        self != TermMatchKind::None
    }

    /// Exact or prefix: the term starts at a token boundary
    pub fn is_word_boundary(self) -> bool {
        matches!(self, TermMatchKind::Exact | TermMatchKind::Prefix)
    }
}

/// Classify a lowercase term against a lowercase token.
pub fn match_term(term: &str, token: &str) -> TermMatchKind {
    if term.is_empty() {
        return TermMatchKind::None;
    }
    if token == term {
        TermMatchKind::Exact
    } else if token.starts_with(term) {
        TermMatchKind::Prefix
    } else if token.contains(term) {
        TermMatchKind::Substring
    } else {
        TermMatchKind::None
    }
}

/// Best match of `term` over `tokens`, stopping early on an exact hit.
pub fn best_term_match<'a>(term: &str, tokens: impl IntoIterator<Item = &'a String>) -> TermMatchKind {
    let mut best = TermMatchKind::None;
    for token in tokens {
        let kind = match_term(term, token);
        if kind == TermMatchKind::Exact {
            return kind;
        }
        best = best.max(kind);
    }
    best
}

/// Per-component match quality of a URL + title against the query terms
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UrlMatchQuality {
    pub host: f64,
    pub path: f64,
    pub title: f64,
    /// Fraction of terms matched anywhere
    pub coverage: f64,
    pub host_match_at_word_boundary: bool,
    pub has_non_scheme_www_match: bool,
}

impl UrlMatchQuality {
    pub fn score(&self) -> f64 {
        HOST_MATCH_WEIGHT * self.host
            + PATH_MATCH_WEIGHT * self.path
            + TITLE_MATCH_WEIGHT * self.title
            + TERM_COVERAGE_WEIGHT * self.coverage
    }
}

/// Score host > path > title matches for `terms`.
/// Components are averaged over terms so longer queries are not inflated.
pub fn score_url_match(
    terms: &[String],
    host_tokens: &[String],
    path_tokens: &[String],
    title_tokens: &[String],
) -> UrlMatchQuality {
    if terms.is_empty() {
        return UrlMatchQuality::default();
    }

    let mut quality = UrlMatchQuality::default();
    let mut covered = 0usize;
    for term in terms {
        let host = best_term_match(term, host_tokens);
        let path = best_term_match(term, path_tokens);
        let title = best_term_match(term, title_tokens);

        quality.host += host.score();
        quality.path += path.score();
        quality.title += title.score();
        if host.is_match() || path.is_match() || title.is_match() {
            covered += 1;
        }
        if host.is_word_boundary() {
            quality.host_match_at_word_boundary = true;
        }
        let meaningful_hit = host_tokens
            .iter()
            .chain(path_tokens)
            .filter(|t| !SCHEME_AND_WWW_TOKENS.contains(&t.as_str()))
            .any(|t| match_term(term, t).is_match());
        if meaningful_hit || title.is_match() {
            quality.has_non_scheme_www_match = true;
        }
    }

    let n = terms.len() as f64;
    quality.host /= n;
    quality.path /= n;
    quality.title /= n;
    quality.coverage = covered as f64 / n;
    quality
}

/// Share of the blended score given to match quality for an input of `input_len` chars.
pub fn match_quality_weight(input_len: usize) -> f64 {
    let extra = input_len.saturating_sub(1) as f64 * QUALITY_WEIGHT_PER_CHAR;
    (MIN_QUALITY_WEIGHT + extra).clamp(MIN_QUALITY_WEIGHT, MAX_QUALITY_WEIGHT)
}

fn blend(normalized_frecency: f64, match_quality: f64, input_len: usize) -> f64 {
    let w = match_quality_weight(input_len);
    ((1.0 - w) * normalized_frecency + w * match_quality).clamp(0.0, 1.0)
}

/// Relevance for an index-backed history match, in 900..=1400.
pub fn history_relevance(normalized_frecency: f64, match_quality: f64, input_len: usize, typed_count: u32) -> i32 {
    let span = (HISTORY_RELEVANCE_MAX - HISTORY_RELEVANCE_MIN) as f64;
    let mut relevance = HISTORY_RELEVANCE_MIN + (blend(normalized_frecency, match_quality, input_len) * span).round() as i32;
    if typed_count > 0 {
        relevance += TYPED_URL_BONUS;
    }
    relevance.min(HISTORY_RELEVANCE_MAX)
}

/// Relevance for a match found by the history-store substring fallback, in 900..=1300.
pub fn fallback_relevance(normalized_frecency: f64, match_quality: f64, input_len: usize) -> i32 {
    let span = (HISTORY_FALLBACK_RELEVANCE_MAX - HISTORY_RELEVANCE_MIN) as f64;
    HISTORY_RELEVANCE_MIN + (blend(normalized_frecency, match_quality, input_len) * span).round() as i32
}

/// Conjunctive token match for tabs and bookmarks: every term must match a
/// title or url token. Returns the mean best-match score, or `None`.
pub fn conjunctive_quality(terms: &[String], title_tokens: &[String], url_tokens: &[String]) -> Option<f64> {
    if terms.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for term in terms {
        let best = best_term_match(term, title_tokens).max(best_term_match(term, url_tokens));
        if !best.is_match() {
            return None;
        }
        total += best.score();
    }
    Some(total / terms.len() as f64)
}

pub fn open_tab_relevance(quality: f64, url_contains_input: bool) -> i32 {
    let span = (OPEN_TAB_RELEVANCE_MAX - OPEN_TAB_RELEVANCE_MIN) as f64;
    let relevance = OPEN_TAB_RELEVANCE_MIN + (quality.clamp(0.0, 1.0) * span).round() as i32;
    if url_contains_input {
        relevance
    } else {
        relevance.min(OPEN_TAB_NON_LITERAL_CAP)
    }
}

pub fn bookmark_relevance(quality: f64) -> i32 {
    let span = (BOOKMARK_RELEVANCE_MAX - BOOKMARK_RELEVANCE_MIN) as f64;
    BOOKMARK_RELEVANCE_MIN + (quality.clamp(0.0, 1.0) * span).round() as i32
}

/// Suffix that completes `input` into `url`, if the url (with or without its
/// scheme and `www.`) starts with the input. A bare root slash is not offered.
pub fn inline_completion(input: &str, url: &str) -> Option<String> {
    let typed = input.trim();
    if typed.is_empty() || typed.contains(char::is_whitespace) {
        return None;
    }
    let typed_lower = typed.to_lowercase();
    let typed_chars = typed.chars().count();

    let without_scheme = url.find("://").map_or(url, |pos| &url[pos + 3..]);
    let forms = [strip_scheme_and_www(url), without_scheme.to_string(), url.to_string()];
    forms.iter().find_map(|form| {
        let form = match form.strip_suffix('/') {
            Some(root) if !root.contains('/') => root,
            _ => form.as_str(),
        };
        if !form.to_lowercase().starts_with(&typed_lower) {
            return None;
        }
        let rest: String = form.chars().skip(typed_chars).collect();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    })
}
