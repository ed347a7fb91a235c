//! crates/interview_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{DepthLevel, JobType, QuestionRecord, ResumeProfile, Session, Turn};

//=========================================================================================
// Engine Error and Result Types
//=========================================================================================

/// The error taxonomy shared by the engine and all ports.
///
/// `OracleUnavailable` is mostly absorbed inside the engine (scoring and
/// question generation fall back to degraded defaults); it only surfaces to
/// callers on paths where no fallback exists.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad caller input, rejected before any state mutation.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Unknown session or report id; never silently fabricated.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The text oracle returned an error or unusable output.
    #[error("Text oracle unavailable: {0}")]
    OracleUnavailable(String),
    /// A mutation raced against the session's current state, e.g. an answer
    /// submitted against a finished session or a non-current turn.
    #[error("State conflict: {0}")]
    StateConflict(String),
    /// A storage adapter failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The generative-text oracle: prompt in, unstructured text out.
///
/// No retry or availability guarantees; it may return an empty string or
/// non-JSON text, and callers must parse defensively with field-level
/// fallbacks.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> EngineResult<String>;
}

/// Durable storage for sessions, turns, and the shared question bank.
/// Assumed to provide at least read-your-writes consistency in one process.
#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn persist_session(&self, session: &Session) -> EngineResult<()>;

    /// Upserts a turn by `(session_id, round_number)`.
    async fn persist_turn(&self, session_id: Uuid, turn: &Turn) -> EngineResult<()>;

    /// Inserts a new bank record. Fails with `StateConflict` if a record with
    /// the same dedup fingerprint already exists (the bank is append-only and
    /// fingerprints are unique).
    async fn insert_question_record(&self, record: &QuestionRecord) -> EngineResult<()>;

    /// Lists bank records for `(skill_tag, depth_level)`: all generic records
    /// plus, when `job_type_ref` is given, the records specific to that job
    /// type.
    async fn list_question_records(
        &self,
        skill_tag: &str,
        depth_level: DepthLevel,
        job_type_ref: Option<&str>,
    ) -> EngineResult<Vec<QuestionRecord>>;

    /// Folds one more turn score into the record's online running average
    /// and bumps its usage count.
    async fn update_question_usage(&self, fingerprint: &str, turn_score: f64)
        -> EngineResult<()>;
}

/// Resume storage and parsing, an external collaborator.
#[async_trait]
pub trait ResumeService: Send + Sync {
    async fn lookup_resume(&self, resume_ref: &str) -> EngineResult<ResumeProfile>;
}

/// Job-type lookup, used only to enrich prompts and reports. Failures must
/// never gate control flow.
#[async_trait]
pub trait JobTypeDirectory: Send + Sync {
    async fn lookup_job_type(&self, job_type_ref: &str) -> EngineResult<JobType>;
}
