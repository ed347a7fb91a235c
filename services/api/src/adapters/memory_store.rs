//! services/api/src/adapters/memory_store.rs
//!
//! In-process implementation of the `InterviewStore` port. Durable SQL
//! storage is an external collaborator of this subsystem; the engine only
//! needs read-your-writes within one process, which this adapter provides.

use async_trait::async_trait;
use interview_core::domain::{DepthLevel, QuestionRecord, Session, Turn};
use interview_core::ports::{EngineError, EngineResult, InterviewStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store keyed the same way the engine queries.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    turns: RwLock<HashMap<Uuid, Vec<Turn>>>,
    /// Keyed by dedup fingerprint, which is unique across the bank.
    questions: RwLock<HashMap<String, QuestionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a persisted session, mainly for tests and diagnostics.
    pub async fn session(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Snapshot of a session's persisted turns in round order.
    pub async fn turns(&self, session_id: Uuid) -> Vec<Turn> {
        self.turns
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of a banked record by fingerprint.
    pub async fn question(&self, fingerprint: &str) -> Option<QuestionRecord> {
        self.questions.read().await.get(fingerprint).cloned()
    }
}

#[async_trait]
impl InterviewStore for InMemoryStore {
    async fn persist_session(&self, session: &Session) -> EngineResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn persist_turn(&self, session_id: Uuid, turn: &Turn) -> EngineResult<()> {
        let mut turns = self.turns.write().await;
        let rounds = turns.entry(session_id).or_default();
        match rounds
            .iter_mut()
            .find(|t| t.round_number == turn.round_number)
        {
            Some(existing) => *existing = turn.clone(),
            None => {
                rounds.push(turn.clone());
                rounds.sort_by_key(|t| t.round_number);
            }
        }
        Ok(())
    }

    async fn insert_question_record(&self, record: &QuestionRecord) -> EngineResult<()> {
        let mut questions = self.questions.write().await;
        if questions.contains_key(&record.dedup_fingerprint) {
            return Err(EngineError::StateConflict(format!(
                "Question record with fingerprint {} already exists",
                record.dedup_fingerprint
            )));
        }
        questions.insert(record.dedup_fingerprint.clone(), record.clone());
        Ok(())
    }

    async fn list_question_records(
        &self,
        skill_tag: &str,
        depth_level: DepthLevel,
        job_type_ref: Option<&str>,
    ) -> EngineResult<Vec<QuestionRecord>> {
        let questions = self.questions.read().await;
        let matches = questions
            .values()
            .filter(|r| r.skill_tag == skill_tag && r.depth_level == depth_level)
            .filter(|r| match (&r.job_type_ref, job_type_ref) {
                (None, _) => true,
                (Some(rec_job), Some(query_job)) => rec_job == query_job,
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn update_question_usage(
        &self,
        fingerprint: &str,
        turn_score: f64,
    ) -> EngineResult<()> {
        let mut questions = self.questions.write().await;
        let record = questions.get_mut(fingerprint).ok_or_else(|| {
            EngineError::NotFound(format!("Question record {} not found", fingerprint))
        })?;
        let n = record.usage_count as f64;
        record.average_score = (record.average_score * n + turn_score) / (n + 1.0);
        record.usage_count += 1;
        Ok(())
    }
}
