//! crates/interview_core/src/domain.rs
//!
//! Defines the pure, core data structures for the interview engine.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Lifecycle state of an interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Finished,
}

/// How deep the interviewer is currently probing. The ordering matters:
/// a session's depth never moves backwards once advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthLevel {
    Usage,
    Implementation,
    Principle,
    Design,
    Summary,
}

impl DepthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepthLevel::Usage => "usage",
            DepthLevel::Implementation => "implementation",
            DepthLevel::Principle => "principle",
            DepthLevel::Design => "design",
            DepthLevel::Summary => "summary",
        }
    }

    /// Parses an oracle-supplied depth label. Unknown labels yield `None`
    /// so the caller can keep the session's current level.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "usage" => Some(DepthLevel::Usage),
            "implementation" => Some(DepthLevel::Implementation),
            "principle" => Some(DepthLevel::Principle),
            "design" => Some(DepthLevel::Design),
            "summary" => Some(DepthLevel::Summary),
            _ => None,
        }
    }
}

/// One interview attempt by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub resume_ref: String,
    pub job_type_ref: String,
    /// Interviewer style tag, e.g. "strict" or "friendly".
    pub persona: String,
    pub status: SessionStatus,
    pub session_seconds_total: u64,
    /// Decremented by each answer's duration; floored at zero.
    pub session_seconds_remaining: u64,
    pub question_count: u32,
    pub consecutive_low_score_count: u32,
    pub used_tech_items: HashSet<String>,
    pub used_project_points: HashSet<String>,
    pub current_depth_level: DepthLevel,
    pub stop_reason: Option<String>,
    pub total_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// The four independent dimensions each answer is graded on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub tech: f64,
    pub logic: f64,
    pub clarity: f64,
    pub depth: f64,
}

/// One question/answer round within a session.
///
/// A turn is appended unanswered, then filled in exactly once by answer
/// submission. The final turn of an abandoned session may stay unanswered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based, strictly increasing within a session.
    pub round_number: u32,
    pub question_text: String,
    pub depth_level: DepthLevel,
    pub expected_key_points: Vec<String>,
    pub answer_text: Option<String>,
    pub answer_duration_seconds: u64,
    pub sub_scores: Option<SubScores>,
    pub feedback_text: Option<String>,
    pub matched_points: Vec<String>,
    /// Fingerprint of the bank record this question came from (or was
    /// admitted under), used to update that record's running average.
    /// Internal bookkeeping, never serialized into API payloads.
    #[serde(skip)]
    pub bank_fingerprint: Option<String>,
}

impl Turn {
    pub fn is_answered(&self) -> bool {
        self.answer_text.is_some()
    }
}

/// A reusable question-bank entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_text: String,
    pub skill_tag: String,
    pub depth_level: DepthLevel,
    /// `None` means the question is generic across job types.
    pub job_type_ref: Option<String>,
    /// Content hash over the normalized question text; unique per record.
    pub dedup_fingerprint: String,
    pub usage_count: u64,
    pub average_score: f64,
    pub ai_generated: bool,
}

/// Lifecycle state of an asynchronous report job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Generating,
    Completed,
    Failed,
}

/// One ordered piece of report content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportChunk {
    pub index: usize,
    pub content: String,
}

/// One asynchronous report job and its accumulated content.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub report_id: Uuid,
    pub status: ReportStatus,
    /// Append-only; indices are contiguous starting at 0. Frozen once the
    /// status is terminal.
    pub chunks: Vec<ReportChunk>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Parsed view of a candidate's resume, produced by the external resume
/// collaborator. The item lists feed prompt exclusions and the heuristic
/// used-item marking; they are best-effort, not authoritative.
#[derive(Debug, Clone, Default)]
pub struct ResumeProfile {
    pub raw_text: String,
    pub tech_items: Vec<String>,
    pub project_points: Vec<String>,
}

/// A job-type directory entry, used only to enrich prompts and reports.
#[derive(Debug, Clone)]
pub struct JobType {
    pub name: String,
}
