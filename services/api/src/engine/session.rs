//! services/api/src/engine/session.rs
//!
//! Session lifecycle orchestration: creation, the current-question slot,
//! answer submission with stop-condition evaluation, and completion.

use crate::engine::parse::{self, ScoreResponse};
use crate::engine::prompts;
use crate::question_bank::QuestionBank;
use crate::report_cache::ReportStreamCache;
use chrono::Utc;
use interview_core::domain::{
    DepthLevel, ResumeProfile, Session, SessionStatus, Turn,
};
use interview_core::ports::{
    EngineError, EngineResult, InterviewStore, JobTypeDirectory, ResumeService, TextOracle,
};
use interview_core::scoring;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// A session stops when its remaining budget drops to this many seconds
/// or fewer.
pub const STOP_TIME_THRESHOLD_SECS: u64 = 60;
/// Tech sub-scores below this count as "low" for the consecutive-low stop.
pub const LOW_TECH_SCORE: f64 = 3.0;
/// Number of consecutive low-tech turns that ends the session.
pub const LOW_SCORE_STOP_COUNT: u32 = 2;

pub const STOP_REASON_TIME_UP: &str = "time_up";
pub const STOP_REASON_NO_MORE_FOLLOWUPS: &str = "no_more_followups";

/// Engine tuning knobs, carried from `Config` at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum admissible bank records per (skill, depth, job type).
    /// Zero disables replenishment entirely.
    pub question_bank_floor: usize,
}

/// Everything the engine owns for one live session. Mutated only under its
/// mutex, always read-modify-write as one atomic step per submission.
pub(crate) struct SessionState {
    pub session: Session,
    pub turns: Vec<Turn>,
    pub profile: ResumeProfile,
    pub job_type_name: String,
    /// Skill tag of the most recent question, used to pick a bank fallback
    /// when the oracle cannot produce the next one.
    pub last_skill_tag: Option<String>,
}

/// Result of one answer submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub scored_turn: Turn,
    /// The freshly appended unanswered turn; `None` when the session
    /// completed instead.
    pub next_turn: Option<Turn>,
    pub completed: bool,
    pub stop_reason: Option<String>,
}

/// The stateful orchestrator for all live interview sessions.
pub struct InterviewEngine {
    pub(crate) oracle: Arc<dyn TextOracle>,
    pub(crate) store: Arc<dyn InterviewStore>,
    pub(crate) bank: QuestionBank,
    pub(crate) resumes: Arc<dyn ResumeService>,
    pub(crate) job_types: Arc<dyn JobTypeDirectory>,
    pub(crate) reports: Arc<ReportStreamCache>,
    pub(crate) sessions: RwLock<HashMap<Uuid, Arc<Mutex<SessionState>>>>,
    pub(crate) config: EngineConfig,
}

impl InterviewEngine {
    pub fn new(
        oracle: Arc<dyn TextOracle>,
        store: Arc<dyn InterviewStore>,
        resumes: Arc<dyn ResumeService>,
        job_types: Arc<dyn JobTypeDirectory>,
        reports: Arc<ReportStreamCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            bank: QuestionBank::new(store.clone()),
            store,
            resumes,
            job_types,
            reports,
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates an ACTIVE session and schedules first-question generation in
    /// the background. Returns immediately; the caller must poll
    /// `get_current_question` because the first question is not guaranteed
    /// ready at return time.
    pub async fn start_session(
        self: &Arc<Self>,
        user_id: Uuid,
        resume_ref: &str,
        job_type_ref: &str,
        persona: &str,
        session_seconds: i64,
    ) -> EngineResult<Uuid> {
        if session_seconds <= 0 {
            return Err(EngineError::Validation(format!(
                "session_seconds must be positive, got {}",
                session_seconds
            )));
        }

        // Resume and job-type lookups enrich prompts only; their failures
        // must not block session creation.
        let profile = match self.resumes.lookup_resume(resume_ref).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Resume lookup failed for {}: {}. Using empty profile.", resume_ref, e);
                ResumeProfile::default()
            }
        };
        let job_type_name = match self.job_types.lookup_job_type(job_type_ref).await {
            Ok(job_type) => job_type.name,
            Err(_) => job_type_ref.to_string(),
        };

        let session_id = Uuid::new_v4();
        let session = Session {
            session_id,
            user_id,
            resume_ref: resume_ref.to_string(),
            job_type_ref: job_type_ref.to_string(),
            persona: persona.to_string(),
            status: SessionStatus::Active,
            session_seconds_total: session_seconds as u64,
            session_seconds_remaining: session_seconds as u64,
            question_count: 0,
            consecutive_low_score_count: 0,
            used_tech_items: HashSet::new(),
            used_project_points: HashSet::new(),
            current_depth_level: DepthLevel::Usage,
            stop_reason: None,
            total_score: None,
            created_at: Utc::now(),
        };
        self.persist_session_best_effort(&session).await;

        let state = SessionState {
            session,
            turns: Vec::new(),
            profile,
            job_type_name,
            last_skill_tag: None,
        };
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::new(Mutex::new(state)));

        // First-question generation runs as a fire-and-forget task so this
        // call returns immediately.
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.generate_and_install(session_id, 1).await;
        });

        info!("Started session {} for user {}.", session_id, user_id);
        Ok(session_id)
    }

    /// Returns the latest unanswered turn. If background generation has not
    /// finished, generation is run synchronously right here instead of
    /// blocking on the in-flight task; duplicate oracle work is tolerated
    /// and resolved by last-write-wins on the current-turn slot.
    pub async fn get_current_question(self: &Arc<Self>, session_id: Uuid) -> EngineResult<Turn> {
        let state_arc = self.session_state(session_id).await?;
        let pending_round = {
            let state = state_arc.lock().await;
            if state.session.status == SessionStatus::Finished {
                return Err(EngineError::StateConflict(format!(
                    "Session {} is already finished",
                    session_id
                )));
            }
            match state.turns.last() {
                Some(turn) if !turn.is_answered() => return Ok(turn.clone()),
                _ => state.turns.len() as u32 + 1,
            }
        };

        let (turn, candidate) = self.generate_turn(session_id, pending_round).await?;
        let skill_tag = candidate.as_ref().map(|c| c.skill_tag.clone());
        let installed = self.install_turn(session_id, turn, skill_tag).await?;
        if let Some(candidate) = candidate {
            self.spawn_admission(candidate);
        }
        Ok(installed)
    }

    /// Scores the outstanding turn, updates the session budget and stop
    /// counters, and either finishes the session or appends the next turn.
    ///
    /// Oracle failures during scoring or generation are absorbed with
    /// neutral defaults; the session always makes forward progress.
    pub async fn submit_answer(
        self: &Arc<Self>,
        session_id: Uuid,
        answer_text: &str,
        answer_duration_seconds: u64,
        persona_override: Option<&str>,
    ) -> EngineResult<SubmitOutcome> {
        let state_arc = self.session_state(session_id).await?;
        let mut state = state_arc.lock().await;

        if state.session.status == SessionStatus::Finished {
            return Err(EngineError::StateConflict(format!(
                "Session {} is already finished",
                session_id
            )));
        }
        let has_outstanding = state.turns.last().map(|t| !t.is_answered()).unwrap_or(false);
        if !has_outstanding {
            return Err(EngineError::StateConflict(
                "No outstanding question to answer; the current turn was already scored"
                    .to_string(),
            ));
        }

        // 1. Score synchronously. The session mutex stays held across the
        // oracle call: this is what guarantees a session never has two turns
        // being scored concurrently.
        let persona = persona_override
            .map(str::to_string)
            .unwrap_or_else(|| state.session.persona.clone());
        let outstanding = state.turns.last().unwrap().clone();
        let prompt = prompts::build_scoring_prompt(&persona, &outstanding, answer_text);
        let score = match self.oracle.generate_text(&prompt).await {
            Ok(raw) => parse::parse_score_response(&raw),
            Err(e) => {
                warn!(
                    "Scoring oracle failed for session {}: {}. Applying neutral defaults.",
                    session_id, e
                );
                ScoreResponse::default()
            }
        };

        let turn = state.turns.last_mut().unwrap();
        turn.answer_text = Some(answer_text.to_string());
        turn.answer_duration_seconds = answer_duration_seconds;
        turn.sub_scores = Some(score.sub_scores);
        turn.feedback_text = Some(score.feedback.clone());
        turn.matched_points = score.matched_points.clone();
        let scored_turn = turn.clone();
        let bank_fingerprint = turn.bank_fingerprint.clone();

        // 2. Time accounting: never negative.
        state.session.session_seconds_remaining = state
            .session
            .session_seconds_remaining
            .saturating_sub(answer_duration_seconds);

        // Consecutive-low bookkeeping resets on any turn at or above the bar.
        if score.sub_scores.tech < LOW_TECH_SCORE {
            state.session.consecutive_low_score_count += 1;
        } else {
            state.session.consecutive_low_score_count = 0;
        }

        // 3. Stop conditions, in priority order.
        let stop_reason = if state.session.session_seconds_remaining <= STOP_TIME_THRESHOLD_SECS {
            Some(STOP_REASON_TIME_UP.to_string())
        } else if state.session.consecutive_low_score_count >= LOW_SCORE_STOP_COUNT {
            Some(STOP_REASON_NO_MORE_FOLLOWUPS.to_string())
        } else {
            score.stop_reason.clone()
        };

        self.persist_turn_best_effort(session_id, &scored_turn).await;

        // Feed the turn's score back into the bank's running average. The
        // record may have been rejected at admission; that's fine.
        if let Some(fingerprint) = bank_fingerprint {
            let turn_score = scoring::turn_score(&score.sub_scores);
            if let Err(e) = self.bank.record_usage(&fingerprint, turn_score).await {
                tracing::debug!("Bank usage update skipped: {}", e);
            }
        }

        if let Some(reason) = stop_reason {
            // 4a. Completion: aggregate over all scored turns.
            let sub_scores: Vec<_> = state.turns.iter().filter_map(|t| t.sub_scores).collect();
            let aggregate = scoring::aggregate_session(&sub_scores);
            state.session.status = SessionStatus::Finished;
            state.session.stop_reason = Some(reason.clone());
            state.session.total_score = Some(aggregate.total);
            let session_snapshot = state.session.clone();
            drop(state);
            self.persist_session_best_effort(&session_snapshot).await;
            info!("Session {} finished: {}.", session_id, reason);
            return Ok(SubmitOutcome {
                scored_turn,
                next_turn: None,
                completed: true,
                stop_reason: Some(reason),
            });
        }

        // 4b. Not stopping: append the next unanswered turn. The lock is
        // released first; a concurrent poll may generate the same round and
        // lose the install race, which is harmless duplicate work.
        let next_round = state.turns.len() as u32 + 1;
        let session_snapshot = state.session.clone();
        drop(state);
        self.persist_session_best_effort(&session_snapshot).await;

        let (next, candidate) = self.generate_turn(session_id, next_round).await?;
        let skill_tag = candidate.as_ref().map(|c| c.skill_tag.clone());
        let installed = self.install_turn(session_id, next, skill_tag).await?;
        if let Some(candidate) = candidate {
            self.spawn_admission(candidate);
        }

        Ok(SubmitOutcome {
            scored_turn,
            next_turn: Some(installed),
            completed: false,
            stop_reason: None,
        })
    }

    /// Read-only snapshot of a session, primarily for the HTTP layer.
    pub async fn session_snapshot(&self, session_id: Uuid) -> EngineResult<Session> {
        let state_arc = self.session_state(session_id).await?;
        let state = state_arc.lock().await;
        Ok(state.session.clone())
    }

    pub(crate) async fn session_state(
        &self,
        session_id: Uuid,
    ) -> EngineResult<Arc<Mutex<SessionState>>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Session {} not found", session_id)))
    }

    pub(crate) async fn persist_session_best_effort(&self, session: &Session) {
        if let Err(e) = self.store.persist_session(session).await {
            warn!("Failed to persist session {}: {}", session.session_id, e);
        }
    }

    pub(crate) async fn persist_turn_best_effort(&self, session_id: Uuid, turn: &Turn) {
        if let Err(e) = self.store.persist_turn(session_id, turn).await {
            warn!(
                "Failed to persist turn {} of session {}: {}",
                turn.round_number, session_id, e
            );
        }
    }
}
