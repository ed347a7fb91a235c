//! services/api/src/report_cache.rs
//!
//! In-memory, TTL-swept store of report-generation records. A producer task
//! appends ordered content chunks while clients poll incrementally with
//! "give me everything after index N" reads. A periodic sweep reclaims
//! records nobody has read for longer than the expiry window, regardless of
//! their status.

use chrono::{DateTime, Utc};
use interview_core::domain::{ReportChunk, ReportRecord, ReportStatus};
use interview_core::ports::{EngineError, EngineResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// The view returned by an incremental read.
#[derive(Debug, Clone)]
pub struct ReportReadView {
    /// All chunks with `index > last_index`, in index order. Empty while the
    /// producer has not written anything new yet.
    pub chunks: Vec<ReportChunk>,
    pub completed: bool,
    pub status: ReportStatus,
    pub error_message: Option<String>,
}

/// TTL-bounded, per-report chunk cache.
pub struct ReportStreamCache {
    records: RwLock<HashMap<Uuid, ReportRecord>>,
    expiry: Duration,
}

impl ReportStreamCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            expiry,
        }
    }

    /// Inserts a fresh record in `Generating` state. The caller is expected
    /// to own a producer task that appends chunks and eventually calls
    /// `complete` or `fail`.
    pub async fn create_record(&self, report_id: Uuid) -> ReportRecord {
        let now = Utc::now();
        let record = ReportRecord {
            report_id,
            status: ReportStatus::Generating,
            chunks: Vec::new(),
            created_at: now,
            last_accessed_at: now,
            error_message: None,
        };
        self.records.write().await.insert(report_id, record.clone());
        record
    }

    /// Appends the next chunk; its index is the current chunk count, so the
    /// owning producer must serialize its appends. Fails with
    /// `StateConflict` once the record is terminal.
    pub async fn append_chunk(&self, report_id: Uuid, content: String) -> EngineResult<usize> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&report_id)
            .ok_or_else(|| EngineError::NotFound(format!("Report {} not found", report_id)))?;
        if record.status != ReportStatus::Generating {
            return Err(EngineError::StateConflict(format!(
                "Report {} is no longer generating",
                report_id
            )));
        }
        let index = record.chunks.len();
        record.chunks.push(ReportChunk { index, content });
        Ok(index)
    }

    /// Marks the record completed. No further chunks may be appended.
    pub async fn complete(&self, report_id: Uuid) -> EngineResult<()> {
        self.finish(report_id, ReportStatus::Completed, None).await
    }

    /// Marks the record failed with a user-visible message. Terminal.
    pub async fn fail(&self, report_id: Uuid, error_message: String) -> EngineResult<()> {
        self.finish(report_id, ReportStatus::Failed, Some(error_message))
            .await
    }

    async fn finish(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        error_message: Option<String>,
    ) -> EngineResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&report_id)
            .ok_or_else(|| EngineError::NotFound(format!("Report {} not found", report_id)))?;
        record.status = status;
        record.error_message = error_message;
        Ok(())
    }

    /// Returns all chunks with `index > last_index` and refreshes the
    /// record's `last_accessed_at`; the refresh is what keeps an
    /// actively-polled record alive past the TTL. `NotFound` means the
    /// record was swept or never existed, which callers must treat as
    /// "unknown / expired", not as a generation failure.
    pub async fn read_since(&self, report_id: Uuid, last_index: i64) -> EngineResult<ReportReadView> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&report_id)
            .ok_or_else(|| EngineError::NotFound(format!("Report {} not found", report_id)))?;
        record.last_accessed_at = Utc::now();
        let chunks: Vec<ReportChunk> = record
            .chunks
            .iter()
            .filter(|c| (c.index as i64) > last_index)
            .cloned()
            .collect();
        Ok(ReportReadView {
            chunks,
            completed: record.status == ReportStatus::Completed,
            status: record.status,
            error_message: record.error_message.clone(),
        })
    }

    /// Removes every record whose last access is older than the expiry
    /// window, independent of status. Returns the number of records
    /// reclaimed. Exposed separately from the background loop so it can be
    /// driven directly in tests.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expiry = chrono::Duration::from_std(self.expiry).unwrap_or(chrono::Duration::hours(1));
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| now - record.last_accessed_at <= expiry);
        let removed = before - records.len();
        if removed > 0 {
            debug!("Report sweep reclaimed {} expired record(s).", removed);
        }
        removed
    }

    /// Runs the periodic sweep until the token is cancelled.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh start does
        // not race record creation.
        ticker.tick().await;
        info!(
            "Report sweep task started (interval {:?}, expiry {:?}).",
            interval, self.expiry
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Report sweep task shutting down.");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_expired(Utc::now()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ReportStreamCache {
        ReportStreamCache::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn read_since_minus_one_returns_all_chunks_in_order() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        cache.append_chunk(id, "a".to_string()).await.unwrap();
        cache.append_chunk(id, "b".to_string()).await.unwrap();

        let view = cache.read_since(id, -1).await.unwrap();
        assert_eq!(
            view.chunks,
            vec![
                ReportChunk { index: 0, content: "a".to_string() },
                ReportChunk { index: 1, content: "b".to_string() },
            ]
        );
        assert!(!view.completed);
        assert_eq!(view.status, ReportStatus::Generating);
    }

    #[tokio::test]
    async fn read_since_never_returns_indices_at_or_below_cursor() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        for content in ["a", "b", "c"] {
            cache.append_chunk(id, content.to_string()).await.unwrap();
        }

        let view = cache.read_since(id, 1).await.unwrap();
        assert!(view.chunks.iter().all(|c| c.index as i64 > 1));
        assert_eq!(view.chunks.len(), 1);
        assert_eq!(view.chunks[0].content, "c");
    }

    #[tokio::test]
    async fn read_since_is_idempotent_between_appends() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        cache.append_chunk(id, "a".to_string()).await.unwrap();

        let first = cache.read_since(id, -1).await.unwrap();
        let second = cache.read_since(id, -1).await.unwrap();
        assert_eq!(first.chunks, second.chunks);
    }

    #[tokio::test]
    async fn chunk_indices_are_contiguous_from_zero() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        for i in 0..5 {
            let idx = cache.append_chunk(id, format!("c{}", i)).await.unwrap();
            assert_eq!(idx, i);
        }
    }

    #[tokio::test]
    async fn terminal_records_reject_further_appends() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        cache.append_chunk(id, "a".to_string()).await.unwrap();
        cache.complete(id).await.unwrap();

        let err = cache.append_chunk(id, "b".to_string()).await.unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));

        let view = cache.read_since(id, -1).await.unwrap();
        assert!(view.completed);
        assert_eq!(view.chunks.len(), 1);
    }

    #[tokio::test]
    async fn failed_records_expose_the_error_message() {
        let cache = cache();
        let id = Uuid::new_v4();
        cache.create_record(id).await;
        cache.fail(id, "oracle gave up".to_string()).await.unwrap();

        let view = cache.read_since(id, -1).await.unwrap();
        assert_eq!(view.status, ReportStatus::Failed);
        assert!(!view.completed);
        assert_eq!(view.error_message.as_deref(), Some("oracle gave up"));
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let cache = cache();
        let err = cache.read_since(Uuid::new_v4(), -1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn sweep_reclaims_stale_records_regardless_of_status() {
        let cache = ReportStreamCache::new(Duration::from_secs(3600));
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        cache.create_record(stale).await;
        cache.complete(stale).await.unwrap();
        cache.create_record(fresh).await;

        // A completed record that nobody reads again is still reclaimed.
        let removed = cache
            .sweep_expired(Utc::now() + chrono::Duration::hours(2))
            .await;
        assert_eq!(removed, 2);

        let err = cache.read_since(stale, -1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn polling_keeps_a_record_alive_past_the_ttl() {
        let cache = ReportStreamCache::new(Duration::from_secs(3600));
        let id = Uuid::new_v4();
        cache.create_record(id).await;

        // The read refreshes last_accessed_at, so a sweep for "now" keeps it.
        cache.read_since(id, -1).await.unwrap();
        let removed = cache.sweep_expired(Utc::now()).await;
        assert_eq!(removed, 0);
        assert!(cache.read_since(id, -1).await.is_ok());
    }
}
