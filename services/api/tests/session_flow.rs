//! services/api/tests/session_flow.rs
//!
//! End-to-end engine tests driven through a scripted oracle double and the
//! in-memory adapters.

use api_lib::adapters::{InMemoryJobTypeDirectory, InMemoryResumeService, InMemoryStore};
use api_lib::engine::prompts::FALLBACK_CLOSING_QUESTION;
use api_lib::engine::{EngineConfig, InterviewEngine};
use api_lib::report_cache::ReportStreamCache;
use async_trait::async_trait;
use interview_core::domain::{ReportStatus, ResumeProfile, SessionStatus};
use interview_core::ports::{EngineError, EngineResult, InterviewStore, TextOracle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Oracle double that routes each prompt by the marker phrases the engine's
/// templates contain, popping scripted responses or falling back to stable
/// defaults. `fail_all` simulates a full oracle outage.
#[derive(Default)]
struct MockOracle {
    question_responses: Mutex<VecDeque<String>>,
    score_responses: Mutex<VecDeque<String>>,
    report_responses: Mutex<VecDeque<String>>,
    bank_counter: AtomicUsize,
    fail_all: AtomicBool,
}

impl MockOracle {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn push_score(&self, tech: f64) {
        self.score_responses.lock().await.push_back(format!(
            r#"{{"tech": {t}, "logic": 4.0, "clarity": 4.0, "depth": 4.0,
                "feedback": "noted", "matched_points": [], "stop_reason": null}}"#,
            t = tech
        ));
    }

    async fn push_score_raw(&self, raw: &str) {
        self.score_responses.lock().await.push_back(raw.to_string());
    }

    fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextOracle for MockOracle {
    async fn generate_text(&self, prompt: &str) -> EngineResult<String> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(EngineError::OracleUnavailable("scripted outage".to_string()));
        }
        if prompt.contains("Grade the candidate's answer") {
            return Ok(self
                .score_responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| {
                    r#"{"tech": 4.0, "logic": 4.0, "clarity": 4.0, "depth": 4.0,
                        "feedback": "fine", "matched_points": [], "stop_reason": null}"#
                        .to_string()
                }));
        }
        if prompt.contains("growth report") {
            return Ok(self
                .report_responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| "A report section.".to_string()));
        }
        if prompt.contains("reusable interview question") {
            // Repeat the counter through several tokens so successive
            // candidates stay well below the near-duplicate threshold.
            let n = self.bank_counter.fetch_add(1, Ordering::SeqCst);
            return Ok(format!(
                r#"{{"question": "Walk through failure mode number {n} covering scenario{n} and mitigation{n}.",
                    "key_points": ["tradeoffs"]}}"#,
            ));
        }
        Ok(self
            .question_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                r#"{"question": "Tell me about your experience with Rust services.",
                    "key_points": ["ownership"], "depth": "usage", "skill": "rust"}"#
                    .to_string()
            }))
    }
}

struct Harness {
    engine: Arc<InterviewEngine>,
    oracle: Arc<MockOracle>,
    store: Arc<InMemoryStore>,
}

async fn harness_with_floor(question_bank_floor: usize) -> Harness {
    let oracle = MockOracle::new();
    let store = Arc::new(InMemoryStore::new());
    let resumes = Arc::new(InMemoryResumeService::new());
    resumes
        .insert_profile(
            "resume-1",
            ResumeProfile {
                raw_text: "Built Rust services and Kafka pipelines.".to_string(),
                tech_items: vec!["Rust".to_string(), "Kafka".to_string()],
                project_points: vec!["billing migration".to_string()],
            },
        )
        .await;
    let job_types = Arc::new(InMemoryJobTypeDirectory::new());
    job_types.insert("backend", "Backend Engineer").await;
    let reports = Arc::new(ReportStreamCache::new(Duration::from_secs(3600)));
    let engine = Arc::new(InterviewEngine::new(
        oracle.clone(),
        store.clone(),
        resumes,
        job_types,
        reports,
        EngineConfig { question_bank_floor },
    ));
    Harness {
        engine,
        oracle,
        store,
    }
}

async fn harness() -> Harness {
    // Floor 0 keeps background replenishment quiet for deterministic runs.
    harness_with_floor(0).await
}

async fn start(h: &Harness, seconds: i64) -> Uuid {
    h.engine
        .start_session(Uuid::new_v4(), "resume-1", "backend", "neutral", seconds)
        .await
        .unwrap()
}

#[tokio::test]
async fn rejects_non_positive_session_seconds() {
    let h = harness().await;
    let err = h
        .engine
        .start_session(Uuid::new_v4(), "resume-1", "backend", "neutral", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness().await;
    let err = h.engine.get_current_question(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn question_is_available_immediately_via_synchronous_fallback() {
    let h = harness().await;
    let session_id = start(&h, 3600).await;
    // No waiting on the background task: the poll generates synchronously
    // if needed.
    let turn = h.engine.get_current_question(session_id).await.unwrap();
    assert_eq!(turn.round_number, 1);
    assert!(!turn.is_answered());
}

#[tokio::test]
async fn rounds_are_contiguous_and_time_is_non_increasing() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;

    let mut last_remaining = u64::MAX;
    for expected_round in 1..=4u32 {
        let turn = h.engine.get_current_question(session_id).await.unwrap();
        assert_eq!(turn.round_number, expected_round);
        let outcome = h
            .engine
            .submit_answer(session_id, "an answer", 30, None)
            .await
            .unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.scored_turn.round_number, expected_round);

        let session = h.engine.session_snapshot(session_id).await.unwrap();
        assert!(session.session_seconds_remaining < last_remaining);
        last_remaining = session.session_seconds_remaining;
    }

    // Persisted turns carry exactly rounds 1..=question_count, no gaps.
    let turns = h.store.turns(session_id).await;
    let rounds: Vec<u32> = turns.iter().map(|t| t.round_number).collect();
    assert_eq!(rounds, vec![1, 2, 3, 4, 5]);
    let session = h.engine.session_snapshot(session_id).await.unwrap();
    assert_eq!(session.question_count, 5);
}

#[tokio::test]
async fn answer_duration_longer_than_budget_floors_at_zero() {
    let h = harness().await;
    let session_id = start(&h, 100).await;
    h.engine.get_current_question(session_id).await.unwrap();
    let outcome = h
        .engine
        .submit_answer(session_id, "slow answer", 500, None)
        .await
        .unwrap();
    assert!(outcome.completed);
    let session = h.engine.session_snapshot(session_id).await.unwrap();
    assert_eq!(session.session_seconds_remaining, 0);
}

#[tokio::test]
async fn time_up_fires_once_remaining_drops_to_sixty_or_less() {
    let h = harness().await;
    let session_id = start(&h, 120).await;
    h.engine.get_current_question(session_id).await.unwrap();

    let outcome = h
        .engine
        .submit_answer(session_id, "a long answer", 70, None)
        .await
        .unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.stop_reason.as_deref(), Some("time_up"));
    assert!(outcome.next_turn.is_none());

    let session = h.engine.session_snapshot(session_id).await.unwrap();
    assert_eq!(session.session_seconds_remaining, 50);
    assert_eq!(session.status, SessionStatus::Finished);
    assert!(session.total_score.is_some());
    assert_eq!(session.stop_reason.as_deref(), Some("time_up"));
}

#[tokio::test]
async fn two_consecutive_low_tech_scores_stop_the_session() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;

    h.oracle.push_score(2.0).await;
    h.oracle.push_score(2.5).await;

    h.engine.get_current_question(session_id).await.unwrap();
    let first = h
        .engine
        .submit_answer(session_id, "weak answer", 10, None)
        .await
        .unwrap();
    assert!(!first.completed);

    let second = h
        .engine
        .submit_answer(session_id, "weak again", 10, None)
        .await
        .unwrap();
    assert!(second.completed);
    assert_eq!(second.stop_reason.as_deref(), Some("no_more_followups"));
}

#[tokio::test]
async fn a_strong_turn_resets_the_consecutive_low_counter() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;

    h.oracle.push_score(2.0).await;
    h.oracle.push_score(5.0).await;
    h.oracle.push_score(2.0).await;
    h.oracle.push_score(2.9).await;

    h.engine.get_current_question(session_id).await.unwrap();
    for expected_completed in [false, false, false, true] {
        let outcome = h
            .engine
            .submit_answer(session_id, "answer", 10, None)
            .await
            .unwrap();
        assert_eq!(outcome.completed, expected_completed);
    }
}

#[tokio::test]
async fn oracle_signalled_stop_reason_is_honored_verbatim() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;
    h.oracle
        .push_score_raw(
            r#"{"tech": 4.5, "logic": 4.0, "clarity": 4.0, "depth": 4.0,
                "feedback": "done here", "stop_reason": "interviewer_closed"}"#,
        )
        .await;

    h.engine.get_current_question(session_id).await.unwrap();
    let outcome = h
        .engine
        .submit_answer(session_id, "final answer", 10, None)
        .await
        .unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.stop_reason.as_deref(), Some("interviewer_closed"));
}

#[tokio::test]
async fn oracle_outage_degrades_instead_of_erroring() {
    let h = harness().await;
    // Full outage from the very start: nothing reaches the bank, so every
    // fallback is the generic closing question.
    h.oracle.set_failing(true);
    let session_id = start(&h, 100_000).await;

    let first = h.engine.get_current_question(session_id).await.unwrap();
    assert_eq!(first.question_text, FALLBACK_CLOSING_QUESTION);

    let outcome = h
        .engine
        .submit_answer(session_id, "an answer", 10, None)
        .await
        .unwrap();

    // Neutral mid-range scoring, not zero and not an error.
    let scores = outcome.scored_turn.sub_scores.unwrap();
    assert_eq!(scores.tech, 3.0);
    assert_eq!(scores.depth, 3.0);
    assert!(!outcome.completed);

    let next = outcome.next_turn.unwrap();
    assert_eq!(next.question_text, FALLBACK_CLOSING_QUESTION);
}

#[tokio::test]
async fn finished_sessions_reject_further_mutation() {
    let h = harness().await;
    let session_id = start(&h, 120).await;
    h.engine.get_current_question(session_id).await.unwrap();
    h.engine
        .submit_answer(session_id, "answer", 70, None)
        .await
        .unwrap();

    let submit_err = h
        .engine
        .submit_answer(session_id, "too late", 10, None)
        .await
        .unwrap_err();
    assert!(matches!(submit_err, EngineError::StateConflict(_)));

    let question_err = h.engine.get_current_question(session_id).await.unwrap_err();
    assert!(matches!(question_err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn used_tech_items_are_marked_at_most_one_per_question() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;
    // The default generated question mentions both profile items in
    // principle, but contains "Rust" only.
    h.engine.get_current_question(session_id).await.unwrap();

    let session = h.engine.session_snapshot(session_id).await.unwrap();
    assert!(session.used_tech_items.contains("Rust"));
    assert!(!session.used_tech_items.contains("Kafka"));
}

#[tokio::test]
async fn turn_payloads_do_not_expose_bank_bookkeeping() {
    let h = harness().await;
    let session_id = start(&h, 3600).await;
    let turn = h.engine.get_current_question(session_id).await.unwrap();
    assert!(turn.bank_fingerprint.is_some());

    let json = serde_json::to_value(&turn).unwrap();
    assert!(json.get("bank_fingerprint").is_none());
}

#[tokio::test]
async fn depth_never_downgrades_once_advanced() {
    let h = harness().await;
    let session_id = start(&h, 100_000).await;
    {
        let mut questions = h.oracle.question_responses.lock().await;
        questions.push_back(
            r#"{"question": "How would you design the storage layer?",
                "depth": "design", "skill": "storage"}"#
                .to_string(),
        );
        // Oracle tries to fall back to usage; the engine must hold design.
        questions.push_back(
            r#"{"question": "What CLI flags does cargo take?",
                "depth": "usage", "skill": "tooling"}"#
                .to_string(),
        );
    }

    let first = h.engine.get_current_question(session_id).await.unwrap();
    let advanced = first.depth_level;
    h.engine
        .submit_answer(session_id, "detailed answer", 10, None)
        .await
        .unwrap();
    let second = h.engine.get_current_question(session_id).await.unwrap();
    assert!(second.depth_level >= advanced);
}

#[tokio::test]
async fn bank_replenishes_to_the_floor_for_the_active_key() {
    let h = harness_with_floor(3).await;
    let session_id = start(&h, 100_000).await;
    h.engine.get_current_question(session_id).await.unwrap();
    h.engine
        .submit_answer(session_id, "an answer", 10, None)
        .await
        .unwrap();

    // Admission and replenishment run in the background; poll the store.
    let mut banked = 0;
    for _ in 0..100 {
        banked = h
            .store
            .list_question_records("rust", interview_core::domain::DepthLevel::Usage, Some("backend"))
            .await
            .unwrap()
            .len();
        if banked >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(banked >= 3, "bank only reached {} records", banked);
}

/// Polls the report until it leaves GENERATING, accumulating chunks from the
/// cursor the way a real client would.
async fn poll_report_to_terminal(
    h: &Harness,
    report_id: Uuid,
) -> (Vec<String>, ReportStatus, Option<String>) {
    let mut cursor: i64 = -1;
    let mut contents = Vec::new();
    for _ in 0..200 {
        let view = h.engine.read_report(report_id, cursor).await.unwrap();
        for chunk in view.chunks {
            assert_eq!(chunk.index as i64, cursor + 1);
            cursor = chunk.index as i64;
            contents.push(chunk.content);
        }
        if view.status != ReportStatus::Generating {
            return (contents, view.status, view.error_message);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("report {} never reached a terminal status", report_id);
}

#[tokio::test]
async fn report_completes_with_one_chunk_per_section() {
    let h = harness().await;
    let session_id = start(&h, 120).await;
    h.engine.get_current_question(session_id).await.unwrap();
    h.engine
        .submit_answer(session_id, "an answer", 70, None)
        .await
        .unwrap();

    for section in ["summary text", "dimension text", "review text", "plan text"] {
        h.oracle
            .report_responses
            .lock()
            .await
            .push_back(section.to_string());
    }

    let report_id = h.engine.start_report(session_id).await.unwrap();
    let (contents, status, error) = poll_report_to_terminal(&h, report_id).await;
    assert_eq!(status, ReportStatus::Completed);
    assert!(error.is_none());
    assert_eq!(
        contents,
        vec!["summary text", "dimension text", "review text", "plan text"]
    );
}

#[tokio::test]
async fn report_oracle_failure_is_terminal_and_user_visible() {
    let h = harness().await;
    let session_id = start(&h, 120).await;
    h.engine.get_current_question(session_id).await.unwrap();
    h.engine
        .submit_answer(session_id, "an answer", 70, None)
        .await
        .unwrap();

    h.oracle.set_failing(true);
    let report_id = h.engine.start_report(session_id).await.unwrap();
    let (contents, status, error) = poll_report_to_terminal(&h, report_id).await;
    assert_eq!(status, ReportStatus::Failed);
    assert!(contents.is_empty());
    assert!(error.is_some());
}

#[tokio::test]
async fn report_for_unknown_session_is_not_found() {
    let h = harness().await;
    let err = h.engine.start_report(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
