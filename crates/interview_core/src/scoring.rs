//! crates/interview_core/src/scoring.rs
//!
//! Turns a sequence of per-turn sub-scores into per-dimension and overall
//! session aggregates.

use crate::domain::SubScores;
use serde::Serialize;

/// Lower bound of the scoring scale.
pub const SCORE_MIN: f64 = 0.0;
/// Upper bound of the scoring scale.
pub const SCORE_MAX: f64 = 5.0;
/// Substituted for any dimension the oracle failed to supply. Mid-range
/// rather than zero, so one malformed response does not crater an average.
pub const NEUTRAL_SCORE: f64 = 3.0;

/// Neutral sub-scores on every dimension, used when scoring output is
/// entirely unusable.
pub fn neutral_sub_scores() -> SubScores {
    SubScores {
        tech: NEUTRAL_SCORE,
        logic: NEUTRAL_SCORE,
        clarity: NEUTRAL_SCORE,
        depth: NEUTRAL_SCORE,
    }
}

/// Clamps an oracle-supplied value into the scoring scale; missing values
/// become the neutral default.
pub fn clamp_score(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(SCORE_MIN, SCORE_MAX),
        _ => NEUTRAL_SCORE,
    }
}

/// Mean of a turn's four dimensions, used as that turn's single score when
/// updating a bank record's running average.
pub fn turn_score(scores: &SubScores) -> f64 {
    (scores.tech + scores.logic + scores.clarity + scores.depth) / 4.0
}

/// Per-dimension and overall aggregates for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionAggregate {
    pub tech: f64,
    pub logic: f64,
    pub clarity: f64,
    pub depth: f64,
    /// Mean of the four dimension means, NOT a flat mean over all raw
    /// sub-scores, so sparse dimensions are not skewed by turn count.
    pub total: f64,
}

/// Aggregates all scored turns of a session. Zero scored turns yields
/// all-zero aggregates rather than an error.
pub fn aggregate_session(scores: &[SubScores]) -> SessionAggregate {
    if scores.is_empty() {
        return SessionAggregate {
            tech: 0.0,
            logic: 0.0,
            clarity: 0.0,
            depth: 0.0,
            total: 0.0,
        };
    }
    let n = scores.len() as f64;
    let tech = scores.iter().map(|s| s.tech).sum::<f64>() / n;
    let logic = scores.iter().map(|s| s.logic).sum::<f64>() / n;
    let clarity = scores.iter().map(|s| s.clarity).sum::<f64>() / n;
    let depth = scores.iter().map(|s| s.depth).sum::<f64>() / n;
    SessionAggregate {
        tech,
        logic,
        clarity,
        depth,
        total: (tech + logic + clarity + depth) / 4.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(tech: f64, logic: f64, clarity: f64, depth: f64) -> SubScores {
        SubScores {
            tech,
            logic,
            clarity,
            depth,
        }
    }

    #[test]
    fn zero_turns_yields_all_zero() {
        let agg = aggregate_session(&[]);
        assert_eq!(agg.total, 0.0);
        assert_eq!(agg.tech, 0.0);
    }

    #[test]
    fn single_turn_aggregate_equals_the_turn() {
        let agg = aggregate_session(&[scores(4.0, 3.0, 2.0, 5.0)]);
        assert_eq!(agg.tech, 4.0);
        assert_eq!(agg.logic, 3.0);
        assert_eq!(agg.clarity, 2.0);
        assert_eq!(agg.depth, 5.0);
        assert_eq!(agg.total, 3.5);
    }

    #[test]
    fn total_is_mean_of_dimension_means() {
        let agg = aggregate_session(&[scores(4.0, 2.0, 4.0, 2.0), scores(2.0, 4.0, 2.0, 4.0)]);
        assert_eq!(agg.tech, 3.0);
        assert_eq!(agg.logic, 3.0);
        assert_eq!(agg.total, 3.0);
    }

    #[test]
    fn missing_values_default_to_neutral_not_zero() {
        assert_eq!(clamp_score(None), NEUTRAL_SCORE);
        assert_eq!(clamp_score(Some(f64::NAN)), NEUTRAL_SCORE);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(clamp_score(Some(99.0)), SCORE_MAX);
        assert_eq!(clamp_score(Some(-3.0)), SCORE_MIN);
    }

    #[test]
    fn turn_score_is_mean_of_dimensions() {
        assert_eq!(turn_score(&scores(4.0, 3.0, 2.0, 3.0)), 3.0);
    }
}
