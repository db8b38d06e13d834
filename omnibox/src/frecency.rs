//! Frecency scoring for history rows.
//!
//! Frecency blends how often a URL was visited with how recently. Recency uses
//! exponential decay:
//!
//! ```text
//! score = (visits + TYPED_WEIGHT × typed) × visit_type_weight × e^(-λ × age_days) × SCALE
//! λ = ln(2) / HALF_LIFE_DAYS
//! ```
//!
//! With a 14-day half-life a visit two weeks old counts half as much as one
//! made today. Every factor is non-negative, so the score is monotonically
//! non-decreasing in visit and typed counts and non-increasing in age.

use serde::{Deserialize, Serialize};

/// Half-life in days for the exponential decay function.
const HALF_LIFE_DAYS: f64 = 14.0;

/// Decay constant: λ = ln(2) / half_life
const LAMBDA: f64 = std::f64::consts::LN_2 / HALF_LIFE_DAYS;

/// Extra weight for each visit the user typed into the address bar.
const TYPED_VISIT_WEIGHT: f64 = 2.0;

/// Brings scores into a readable range (a single fresh link visit = 100).
const SCALE: f64 = 100.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How the user arrived at a page on their last visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    #[default]
    Link,
    Typed,
    AutoBookmark,
    Generated,
    Reload,
    Redirect,
    Other,
}

impl VisitType {
    /// Multiplier applied to frecency for this visit type
    pub fn weight(&self) -> f64 {
        match self {
            VisitType::Typed => 2.0,
            VisitType::AutoBookmark => 1.4,
            VisitType::Link | VisitType::Other => 1.0,
            VisitType::Generated => 0.8,
            VisitType::Reload => 0.5,
            VisitType::Redirect => 0.25,
        }
    }

    /// Stable integer code used by the SQLite store
    pub fn code(&self) -> i64 {
        match self {
            VisitType::Link => 0,
            VisitType::Typed => 1,
            VisitType::AutoBookmark => 2,
            VisitType::Generated => 3,
            VisitType::Reload => 4,
            VisitType::Redirect => 5,
            VisitType::Other => 6,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => VisitType::Link,
            1 => VisitType::Typed,
            2 => VisitType::AutoBookmark,
            3 => VisitType::Generated,
            4 => VisitType::Reload,
            5 => VisitType::Redirect,
            _ => VisitType::Other,
        }
    }
}

/// Exponential recency factor in (0, 1] for a visit at `last_visit_time`.
/// Visits in the future (clock skew) count as brand new.
fn decay_factor(last_visit_time: i64, now: i64) -> f64 {
    let age_days = (now - last_visit_time).max(0) as f64 / SECONDS_PER_DAY;
    (-LAMBDA * age_days).exp()
}

/// Full frecency score. Times are unix seconds.
pub fn calculate_frecency(
    visit_count: u32,
    typed_count: u32,
    last_visit_time: i64,
    last_visit_type: VisitType,
    now: i64,
) -> f64 {
    let frequency = visit_count as f64 + TYPED_VISIT_WEIGHT * typed_count as f64;
    frequency * last_visit_type.weight() * decay_factor(last_visit_time, now) * SCALE
}

/// Frecency without typed or visit-type signals (zero-suggest path).
pub fn calculate_simple_frecency(visit_count: u32, last_visit_time: i64, now: i64) -> f64 {
    visit_count as f64 * decay_factor(last_visit_time, now) * SCALE
}

/// Squash a frecency score into [0, 1) so it can be blended with match quality.
/// `pivot` is the score that maps to 0.5.
pub fn normalize_frecency(frecency: f64, pivot: f64) -> f64 {
    if frecency <= 0.0 || pivot <= 0.0 {
        return 0.0;
    }
    frecency / (frecency + pivot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    #[test]
    fn test_zero_visits_is_zero() {
        assert_eq!(calculate_frecency(0, 0, NOW, VisitType::Link, NOW), 0.0);
        assert_eq!(calculate_simple_frecency(0, NOW, NOW), 0.0);
    }

    #[test]
    fn test_monotonic_in_visit_count() {
        let mut prev = -1.0;
        for visits in 0..50 {
            let score = calculate_frecency(visits, 2, NOW - 3 * DAY, VisitType::Typed, NOW);
            assert!(score >= prev, "visits={} score={} prev={}", visits, score, prev);
            prev = score;
        }
    }

    #[test]
    fn test_monotonic_in_typed_count() {
        let mut prev = -1.0;
        for typed in 0..20 {
            let score = calculate_frecency(5, typed, NOW - DAY, VisitType::Link, NOW);
            assert!(score >= prev);
            prev = score;
        }
    }

    #[test]
    fn test_more_recent_never_scores_lower() {
        let mut prev = f64::MAX;
        for days_ago in 0..120 {
            let score = calculate_frecency(10, 1, NOW - days_ago * DAY, VisitType::Link, NOW);
            assert!(score <= prev, "days_ago={}", days_ago);
            prev = score;
        }
    }

    #[test]
    fn test_half_life() {
        let fresh = calculate_simple_frecency(4, NOW, NOW);
        let old = calculate_simple_frecency(4, NOW - 14 * DAY, NOW);
        assert!((old / fresh - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_future_visit_treated_as_now() {
        let future = calculate_simple_frecency(3, NOW + DAY, NOW);
        let now = calculate_simple_frecency(3, NOW, NOW);
        assert_eq!(future, now);
    }

    #[test]
    fn test_typed_visit_type_outweighs_redirect() {
        let typed = calculate_frecency(3, 0, NOW, VisitType::Typed, NOW);
        let redirect = calculate_frecency(3, 0, NOW, VisitType::Redirect, NOW);
        assert!(typed > redirect);
    }

    #[test]
    fn test_visit_type_code_roundtrip_and_unknown() {
        assert_eq!(VisitType::from_code(VisitType::Reload.code()), VisitType::Reload);
        assert_eq!(VisitType::from_code(99), VisitType::Other);
    }

    #[test]
    fn test_normalize_frecency_bounds() {
        assert_eq!(normalize_frecency(0.0, 100.0), 0.0);
        assert_eq!(normalize_frecency(100.0, 100.0), 0.5);
        assert!(normalize_frecency(1e9, 100.0) < 1.0);
    }
}
