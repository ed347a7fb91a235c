//! services/api/src/engine/report.rs
//!
//! Asynchronous growth-report production. `start_report` returns
//! immediately with a report id while a background task writes section
//! chunks into the `ReportStreamCache`; clients poll incrementally via
//! `read_report`.

use crate::engine::prompts;
use crate::engine::session::InterviewEngine;
use crate::report_cache::ReportReadView;
use interview_core::domain::Turn;
use interview_core::ports::EngineResult;
use interview_core::scoring::{self, SessionAggregate};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

impl InterviewEngine {
    /// Creates a GENERATING report record and spawns its producer task.
    /// Fails with `NotFound` for an unknown session.
    pub async fn start_report(self: &Arc<Self>, session_id: Uuid) -> EngineResult<Uuid> {
        let state_arc = self.session_state(session_id).await?;
        let (turns, aggregate, job_type_name) = {
            let state = state_arc.lock().await;
            let sub_scores: Vec<_> = state.turns.iter().filter_map(|t| t.sub_scores).collect();
            (
                state.turns.clone(),
                scoring::aggregate_session(&sub_scores),
                state.job_type_name.clone(),
            )
        };

        let report_id = Uuid::new_v4();
        self.reports.create_record(report_id).await;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine
                .produce_report(report_id, turns, aggregate, job_type_name)
                .await;
        });
        info!("Started report {} for session {}.", report_id, session_id);
        Ok(report_id)
    }

    /// Incremental, idempotent read; side-effect-free except for the TTL
    /// refresh inside the cache.
    pub async fn read_report(
        &self,
        report_id: Uuid,
        last_index: i64,
    ) -> EngineResult<ReportReadView> {
        self.reports.read_since(report_id, last_index).await
    }

    /// The producer: one oracle call and one appended chunk per report
    /// section. Unlike the scoring path there is no degraded default here;
    /// an oracle failure is terminal and user-visible as FAILED.
    async fn produce_report(
        self: Arc<Self>,
        report_id: Uuid,
        turns: Vec<Turn>,
        aggregate: SessionAggregate,
        job_type_name: String,
    ) {
        for &section in prompts::REPORT_SECTIONS {
            let prompt =
                prompts::build_report_section_prompt(section, &job_type_name, &aggregate, &turns);
            let content = match self.oracle.generate_text(&prompt).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    error!(
                        "Report {} section '{}' came back empty; marking failed.",
                        report_id, section
                    );
                    let _ = self
                        .reports
                        .fail(report_id, format!("Empty oracle output for '{}'", section))
                        .await;
                    return;
                }
                Err(e) => {
                    error!("Report {} section '{}' failed: {}", report_id, section, e);
                    let _ = self.reports.fail(report_id, e.to_string()).await;
                    return;
                }
            };
            if let Err(e) = self.reports.append_chunk(report_id, content).await {
                // Swept mid-production or raced to terminal; nothing left to do.
                warn!("Appending to report {} stopped: {}", report_id, e);
                return;
            }
        }
        if let Err(e) = self.reports.complete(report_id).await {
            warn!("Completing report {} failed: {}", report_id, e);
        } else {
            info!("Report {} completed.", report_id);
        }
    }
}
