//! services/api/src/engine/parse.rs
//!
//! Defensive parsing of oracle output. The oracle gives no format
//! guarantees, so every field falls back independently: a half-usable
//! response degrades to defaults field by field instead of being dropped.

use interview_core::domain::{DepthLevel, SubScores};
use interview_core::scoring;
use serde_json::Value;

/// Pulls the first JSON object out of free-form oracle text. Tolerates
/// markdown fences and prose around the object; returns `None` when no
/// parseable object exists.
pub fn extract_json(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list_field(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A usable question out of the oracle's generation response.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub key_points: Vec<String>,
    pub depth: Option<DepthLevel>,
    pub skill_tag: Option<String>,
}

/// `None` when the response carries no non-empty question text; the caller
/// then falls back to the bank or the generic closing question.
pub fn parse_question_response(raw: &str) -> Option<GeneratedQuestion> {
    let value = extract_json(raw)?;
    let question_text = string_field(&value, "question")?;
    Some(GeneratedQuestion {
        question_text,
        key_points: string_list_field(&value, "key_points"),
        depth: string_field(&value, "depth").and_then(|d| DepthLevel::parse(&d)),
        skill_tag: string_field(&value, "skill"),
    })
}

/// Scoring outcome with every field already defaulted.
#[derive(Debug, Clone)]
pub struct ScoreResponse {
    pub sub_scores: SubScores,
    pub feedback: String,
    pub matched_points: Vec<String>,
    pub stop_reason: Option<String>,
}

impl Default for ScoreResponse {
    fn default() -> Self {
        Self {
            sub_scores: scoring::neutral_sub_scores(),
            feedback: "The answer could not be evaluated this round; a neutral score was \
                       recorded."
                .to_string(),
            matched_points: Vec::new(),
            stop_reason: None,
        }
    }
}

/// Never fails: a completely unusable response yields the neutral default,
/// and each present field is taken independently.
pub fn parse_score_response(raw: &str) -> ScoreResponse {
    let Some(value) = extract_json(raw) else {
        return ScoreResponse::default();
    };
    let score = |key: &str| scoring::clamp_score(value.get(key).and_then(Value::as_f64));
    let mut parsed = ScoreResponse {
        sub_scores: SubScores {
            tech: score("tech"),
            logic: score("logic"),
            clarity: score("clarity"),
            depth: score("depth"),
        },
        matched_points: string_list_field(&value, "matched_points"),
        stop_reason: string_field(&value, "stop_reason"),
        ..ScoreResponse::default()
    };
    if let Some(feedback) = string_field(&value, "feedback") {
        parsed.feedback = feedback;
    }
    parsed
}
