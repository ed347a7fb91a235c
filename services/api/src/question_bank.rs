//! services/api/src/question_bank.rs
//!
//! Admission control and per-key replenishment guards for the shared
//! question bank. Storage itself lives behind the `InterviewStore` port;
//! this component decides what gets in.

use interview_core::domain::{DepthLevel, QuestionRecord};
use interview_core::ports::{EngineError, EngineResult, InterviewStore};
use interview_core::similarity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Candidates at or above this Jaccard similarity to an existing entry are
/// rejected as near-duplicates.
pub const SIMILARITY_REJECT_THRESHOLD: f64 = 0.75;

/// The bank's partition key. Replenishment is serialized per key so two
/// sessions touching the same skill never batch-generate concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BankKey {
    pub skill_tag: String,
    pub depth_level: DepthLevel,
    pub job_type_ref: Option<String>,
}

pub struct QuestionBank {
    store: Arc<dyn InterviewStore>,
    /// Serializes the list-then-insert of admission per (skill, depth).
    /// Kept separate from `replenish_guards`: replenishment holds its guard
    /// across many admissions of the same key.
    admission_guards: Mutex<HashMap<(String, DepthLevel), Arc<Mutex<()>>>>,
    replenish_guards: Mutex<HashMap<BankKey, Arc<Mutex<()>>>>,
}

impl QuestionBank {
    pub fn new(store: Arc<dyn InterviewStore>) -> Self {
        Self {
            store,
            admission_guards: Mutex::new(HashMap::new()),
            replenish_guards: Mutex::new(HashMap::new()),
        }
    }

    /// Runs admission control for a freshly generated question and persists
    /// it when it passes. Returns `Ok(false)` when the candidate is rejected:
    /// similarity at/above the threshold against any entry sharing the skill
    /// tag and depth level (job-specific entries included), or a fingerprint
    /// already banked anywhere. A rejected candidate is still fine to use
    /// for the live turn; it just never enters the shared bank.
    ///
    /// The check and the insert run as one step under a per-(skill, depth)
    /// lock, so two concurrent near-duplicate admissions cannot both land.
    pub async fn try_admit(&self, candidate: &QuestionRecord) -> EngineResult<bool> {
        let guard = {
            let mut guards = self.admission_guards.lock().await;
            guards
                .entry((candidate.skill_tag.clone(), candidate.depth_level))
                .or_default()
                .clone()
        };
        let _held = guard.lock().await;

        let existing = self
            .store
            .list_question_records(
                &candidate.skill_tag,
                candidate.depth_level,
                candidate.job_type_ref.as_deref(),
            )
            .await?;

        for record in &existing {
            if record.dedup_fingerprint == candidate.dedup_fingerprint {
                debug!(
                    skill = %candidate.skill_tag,
                    "Bank candidate rejected: fingerprint collision."
                );
                return Ok(false);
            }
            let score = similarity::similarity(&record.question_text, &candidate.question_text);
            if score >= SIMILARITY_REJECT_THRESHOLD {
                debug!(
                    skill = %candidate.skill_tag,
                    similarity = score,
                    "Bank candidate rejected: near-duplicate."
                );
                return Ok(false);
            }
        }

        match self.store.insert_question_record(candidate).await {
            Ok(()) => Ok(true),
            // The listing is scoped to (skill, depth); the same text banked
            // under another depth or skill still collides on the global
            // fingerprint at insert time.
            Err(EngineError::StateConflict(_)) => {
                debug!(
                    skill = %candidate.skill_tag,
                    "Bank candidate rejected: fingerprint banked under another key."
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of records currently banked for the key.
    pub async fn count(&self, key: &BankKey) -> EngineResult<usize> {
        let records = self
            .store
            .list_question_records(&key.skill_tag, key.depth_level, key.job_type_ref.as_deref())
            .await?;
        Ok(records.len())
    }

    /// The least-used record for the key, used as a fallback question when
    /// the oracle is unavailable.
    pub async fn least_used(&self, key: &BankKey) -> EngineResult<Option<QuestionRecord>> {
        let mut records = self
            .store
            .list_question_records(&key.skill_tag, key.depth_level, key.job_type_ref.as_deref())
            .await?;
        records.sort_by_key(|r| r.usage_count);
        Ok(records.into_iter().next())
    }

    /// Folds a turn's score into the referenced record's running average.
    pub async fn record_usage(&self, fingerprint: &str, turn_score: f64) -> EngineResult<()> {
        self.store.update_question_usage(fingerprint, turn_score).await
    }

    /// Claims the replenishment guard for a key without waiting. `None`
    /// means another task is already replenishing this key; the caller
    /// should skip rather than queue up redundant batch generation.
    pub async fn begin_replenish(&self, key: &BankKey) -> Option<OwnedMutexGuard<()>> {
        let guard = {
            let mut guards = self.replenish_guards.lock().await;
            guards.entry(key.clone()).or_default().clone()
        };
        guard.try_lock_owned().ok()
    }
}
