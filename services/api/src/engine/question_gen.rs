//! services/api/src/engine/question_gen.rs
//!
//! Question selection and generation: oracle-driven generation with
//! degraded fallbacks, last-write-wins installation into the session's
//! current-turn slot, heuristic used-item marking, and bank admission plus
//! floor replenishment.

use crate::engine::prompts::{self, QuestionContext};
use crate::engine::parse;
use crate::engine::session::{InterviewEngine, SessionState};
use crate::question_bank::BankKey;
use interview_core::domain::{QuestionRecord, SessionStatus, Turn};
use interview_core::ports::{EngineError, EngineResult};
use interview_core::similarity::dedup_fingerprint;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Skill tag used when the oracle does not name one.
const DEFAULT_SKILL_TAG: &str = "general";

impl InterviewEngine {
    /// Background path: generate a question for `round` and install it.
    /// Any failure is logged and swallowed; a foreground poll will fall
    /// back to synchronous generation.
    pub(crate) async fn generate_and_install(self: &Arc<Self>, session_id: Uuid, round: u32) {
        match self.generate_turn(session_id, round).await {
            Ok((turn, candidate)) => {
                let skill_tag = candidate.as_ref().map(|c| c.skill_tag.clone());
                if let Err(e) = self.install_turn(session_id, turn, skill_tag).await {
                    debug!(
                        "Background install for session {} round {} discarded: {}",
                        session_id, round, e
                    );
                }
                if let Some(candidate) = candidate {
                    self.spawn_admission(candidate);
                }
            }
            Err(e) => warn!(
                "Background question generation for session {} failed: {}",
                session_id, e
            ),
        }
    }

    /// Generates the question for `round`. Oracle failure or unusable
    /// output degrades to a bank question for the session's last skill, and
    /// failing that, to the generic closing question; the caller is never
    /// blocked by a missing oracle.
    ///
    /// The second tuple element is the bank-admission candidate, when the
    /// question is fresh oracle output worth banking.
    pub(crate) async fn generate_turn(
        self: &Arc<Self>,
        session_id: Uuid,
        round: u32,
    ) -> EngineResult<(Turn, Option<QuestionRecord>)> {
        let state_arc = self.session_state(session_id).await?;
        let (ctx, job_type_ref, fallback_key) = {
            let state = state_arc.lock().await;
            let ctx = QuestionContext {
                resume_text: state.profile.raw_text.clone(),
                job_type_name: state.job_type_name.clone(),
                persona: state.session.persona.clone(),
                depth: state.session.current_depth_level,
                remaining_seconds: state.session.session_seconds_remaining,
                round_number: round,
                used_tech_items: state.session.used_tech_items.iter().cloned().collect(),
                used_project_points: state.session.used_project_points.iter().cloned().collect(),
            };
            let fallback_key = BankKey {
                skill_tag: state
                    .last_skill_tag
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SKILL_TAG.to_string()),
                depth_level: state.session.current_depth_level,
                job_type_ref: Some(state.session.job_type_ref.clone()),
            };
            (ctx, state.session.job_type_ref.clone(), fallback_key)
        };

        let prompt = prompts::build_question_prompt(&ctx);
        let generated = match self.oracle.generate_text(&prompt).await {
            Ok(raw) => parse::parse_question_response(&raw),
            Err(e) => {
                warn!(
                    "Question oracle failed for session {} round {}: {}",
                    session_id, round, e
                );
                None
            }
        };

        let (turn, candidate) = match generated {
            Some(generated) => {
                // Depth is monotonic-or-equal: the oracle may hold or
                // advance it, never downgrade.
                let depth = generated.depth.map_or(ctx.depth, |d| d.max(ctx.depth));
                let skill_tag = generated
                    .skill_tag
                    .unwrap_or_else(|| DEFAULT_SKILL_TAG.to_string());
                let fingerprint = dedup_fingerprint(&generated.question_text);
                let candidate = QuestionRecord {
                    question_text: generated.question_text.clone(),
                    skill_tag,
                    depth_level: depth,
                    job_type_ref: Some(job_type_ref),
                    dedup_fingerprint: fingerprint.clone(),
                    usage_count: 0,
                    average_score: 0.0,
                    ai_generated: true,
                };
                let turn = Turn {
                    round_number: round,
                    question_text: generated.question_text,
                    depth_level: depth,
                    expected_key_points: generated.key_points,
                    answer_text: None,
                    answer_duration_seconds: 0,
                    sub_scores: None,
                    feedback_text: None,
                    matched_points: Vec::new(),
                    bank_fingerprint: Some(fingerprint),
                };
                (turn, Some(candidate))
            }
            None => (self.fallback_turn(round, &fallback_key).await, None),
        };
        Ok((turn, candidate))
    }

    /// Degraded default when the oracle yields nothing usable: reuse the
    /// least-worn bank question for the session's current track, or fall
    /// all the way back to the generic closing question.
    async fn fallback_turn(&self, round: u32, key: &BankKey) -> Turn {
        let banked = self.bank.least_used(key).await.ok().flatten();
        match banked {
            Some(record) => {
                info!(
                    "Serving bank fallback question for skill '{}' at round {}.",
                    record.skill_tag, round
                );
                Turn {
                    round_number: round,
                    question_text: record.question_text,
                    depth_level: record.depth_level,
                    expected_key_points: Vec::new(),
                    answer_text: None,
                    answer_duration_seconds: 0,
                    sub_scores: None,
                    feedback_text: None,
                    matched_points: Vec::new(),
                    bank_fingerprint: Some(record.dedup_fingerprint),
                }
            }
            None => Turn {
                round_number: round,
                question_text: prompts::FALLBACK_CLOSING_QUESTION.to_string(),
                depth_level: key.depth_level,
                expected_key_points: Vec::new(),
                answer_text: None,
                answer_duration_seconds: 0,
                sub_scores: None,
                feedback_text: None,
                matched_points: Vec::new(),
                bank_fingerprint: None,
            },
        }
    }

    /// Race-tolerant upsert into the session's current-turn slot.
    ///
    /// Rules: a turn for the next round is appended; a turn for the current
    /// round replaces the occupant only while it is unanswered (last writer
    /// wins); anything else is a stale duplicate and is discarded in favor
    /// of whatever currently occupies the slot.
    pub(crate) async fn install_turn(
        &self,
        session_id: Uuid,
        turn: Turn,
        skill_tag: Option<String>,
    ) -> EngineResult<Turn> {
        let state_arc = self.session_state(session_id).await?;
        let mut state = state_arc.lock().await;
        if state.session.status == SessionStatus::Finished {
            return Err(EngineError::StateConflict(format!(
                "Session {} finished before the question could be installed",
                session_id
            )));
        }

        let next_round = state.turns.len() as u32 + 1;
        let installed = if turn.round_number == next_round {
            state.turns.push(turn);
            state.turns.last().unwrap().clone()
        } else if turn.round_number == state.turns.len() as u32
            && state.turns.last().is_some_and(|t| !t.is_answered())
        {
            let slot = state.turns.last_mut().unwrap();
            *slot = turn;
            slot.clone()
        } else {
            // Stale duplicate from a lost race; hand back the live slot.
            debug!(
                "Discarding stale turn {} for session {}.",
                turn.round_number, session_id
            );
            match state.turns.last() {
                Some(current) if !current.is_answered() => current.clone(),
                _ => {
                    return Err(EngineError::StateConflict(format!(
                        "Round {} of session {} is no longer current",
                        turn.round_number, session_id
                    )))
                }
            }
        };

        state.session.question_count = state.turns.len() as u32;
        state.session.current_depth_level = state
            .session
            .current_depth_level
            .max(installed.depth_level);
        mark_used_item(&mut state, &installed.question_text);
        if skill_tag.is_some() {
            // Remember the track for oracle-outage fallbacks.
            state.last_skill_tag = skill_tag;
        }
        let session_snapshot = state.session.clone();
        let turn_snapshot = installed.clone();
        drop(state);

        self.persist_turn_best_effort(session_id, &turn_snapshot).await;
        self.persist_session_best_effort(&session_snapshot).await;
        Ok(installed)
    }

    /// Fires the admission + replenishment pass for a fresh candidate. Runs
    /// in the background so the dedup check never delays the live turn.
    pub(crate) fn spawn_admission(self: &Arc<Self>, candidate: QuestionRecord) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let key = BankKey {
                skill_tag: candidate.skill_tag.clone(),
                depth_level: candidate.depth_level,
                job_type_ref: candidate.job_type_ref.clone(),
            };
            match engine.bank.try_admit(&candidate).await {
                Ok(true) => debug!(
                    "Admitted question to bank for skill '{}' ({}).",
                    key.skill_tag,
                    key.depth_level.as_str()
                ),
                Ok(false) => debug!(
                    "Question rejected from bank for skill '{}' (near-duplicate).",
                    key.skill_tag
                ),
                Err(e) => warn!("Bank admission failed: {}", e),
            }
            engine.replenish_bank(key).await;
        });
    }

    /// Batch-generates candidates until the key's floor is met or attempts
    /// exhaust. One oracle call per missing slot, each candidate through
    /// the same admission control. Serialized per key: if another task is
    /// already replenishing this key, this pass is skipped.
    pub(crate) async fn replenish_bank(self: &Arc<Self>, key: BankKey) {
        let floor = self.config.question_bank_floor;
        if floor == 0 {
            return;
        }
        let Some(_guard) = self.bank.begin_replenish(&key).await else {
            debug!(
                "Replenishment already in flight for skill '{}'; skipping.",
                key.skill_tag
            );
            return;
        };

        let current = match self.bank.count(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Bank count failed for skill '{}': {}", key.skill_tag, e);
                return;
            }
        };
        if current >= floor {
            return;
        }

        let job_type_name = match &key.job_type_ref {
            Some(job_ref) => self
                .job_types
                .lookup_job_type(job_ref)
                .await
                .map(|jt| jt.name)
                .unwrap_or_else(|_| job_ref.clone()),
            None => "any".to_string(),
        };

        let mut missing = floor - current;
        // Generation attempts exhaust at twice the shortfall so a run of
        // rejected near-duplicates cannot spin forever.
        let mut attempts = missing * 2;
        info!(
            "Replenishing question bank for skill '{}' ({} below floor).",
            key.skill_tag, missing
        );
        while missing > 0 && attempts > 0 {
            attempts -= 1;
            let existing = match self
                .store
                .list_question_records(&key.skill_tag, key.depth_level, key.job_type_ref.as_deref())
                .await
            {
                Ok(records) => records.into_iter().map(|r| r.question_text).collect(),
                Err(_) => Vec::new(),
            };
            let prompt = prompts::build_bank_candidate_prompt(
                &key.skill_tag,
                key.depth_level,
                &job_type_name,
                &existing,
            );
            let raw = match self.oracle.generate_text(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        "Replenishment oracle call failed for skill '{}': {}",
                        key.skill_tag, e
                    );
                    return;
                }
            };
            let Some(generated) = parse::parse_question_response(&raw) else {
                continue;
            };
            let candidate = QuestionRecord {
                dedup_fingerprint: dedup_fingerprint(&generated.question_text),
                question_text: generated.question_text,
                skill_tag: key.skill_tag.clone(),
                depth_level: key.depth_level,
                job_type_ref: key.job_type_ref.clone(),
                usage_count: 0,
                average_score: 0.0,
                ai_generated: true,
            };
            match self.bank.try_admit(&candidate).await {
                Ok(true) => missing -= 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Replenishment admission failed: {}", e);
                    return;
                }
            }
        }
    }
}

/// Best-effort used-item tagging: if the question text names a known tech
/// item or project point not yet used, the first match is marked. At most
/// one item per question, so coverage is never over-claimed. False
/// negatives are acceptable degradation, not a bug.
fn mark_used_item(state: &mut SessionState, question_text: &str) {
    let question = question_text.to_lowercase();
    let tech_hit = state
        .profile
        .tech_items
        .iter()
        .find(|item| {
            !state.session.used_tech_items.contains(*item)
                && question.contains(&item.to_lowercase())
        })
        .cloned();
    if let Some(item) = tech_hit {
        state.session.used_tech_items.insert(item);
        return;
    }
    let project_hit = state
        .profile
        .project_points
        .iter()
        .find(|point| {
            !state.session.used_project_points.contains(*point)
                && question.contains(&point.to_lowercase())
        })
        .cloned();
    if let Some(point) = project_hit {
        state.session.used_project_points.insert(point);
    }
}
