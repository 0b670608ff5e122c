//! In-memory registry of ingestion jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{IngestionJob, JobProgress, JobReport, JobStage, JobStatus};

/// Errors raised by the tracker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// No job has this id.
    #[error("job not found: {0}")]
    NotFound(Uuid),
    /// The state machine forbids the transition.
    #[error("job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Job id.
        id: Uuid,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },
}

impl From<TrackerError> for ServiceError {
    fn from(error: TrackerError) -> Self {
        match error {
            TrackerError::NotFound(id) => ServiceError::NotFound {
                resource: "job",
                id: id.to_string(),
            },
            TrackerError::InvalidTransition { .. } => ServiceError::Conflict {
                message: error.to_string(),
            },
        }
    }
}

/// The processed workbook produced by a completed job.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Download filename.
    pub filename: String,
    /// Workbook bytes.
    pub bytes: Bytes,
}

#[derive(Debug)]
struct JobEntry {
    job: IngestionJob,
    output: Option<ProcessedFile>,
}

/// Shared, synchronized map from job id to job state.
///
/// Cloning shares the same registry. Every read returns a snapshot copied
/// under the lock, so callers never observe a half-applied update.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    inner: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
}

impl JobTracker {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a Pending job with a fresh id.
    pub async fn create(&self, filename: &str, sheet_name: &str) -> IngestionJob {
        let mut jobs = self.inner.write().await;
        let mut id = Uuid::new_v4();
        while jobs.contains_key(&id) {
            id = Uuid::new_v4();
        }
        let job = IngestionJob::new(id, filename, sheet_name);
        jobs.insert(
            id,
            JobEntry {
                job: job.clone(),
                output: None,
            },
        );
        debug!(job_id = %id, "Job registered");
        job
    }

    async fn with_job<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut JobEntry) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let mut jobs = self.inner.write().await;
        let entry = jobs.get_mut(&id).ok_or(TrackerError::NotFound(id))?;
        f(entry)
    }

    fn transition(entry: &mut JobEntry, to: JobStatus) -> Result<(), TrackerError> {
        let from = entry.job.status;
        if !from.can_transition_to(to) {
            return Err(TrackerError::InvalidTransition {
                id: entry.job.id,
                from,
                to,
            });
        }
        entry.job.status = to;
        Ok(())
    }

    fn ensure_running(entry: &JobEntry, to: JobStatus) -> Result<(), TrackerError> {
        if entry.job.status != JobStatus::Running {
            return Err(TrackerError::InvalidTransition {
                id: entry.job.id,
                from: entry.job.status,
                to,
            });
        }
        Ok(())
    }

    /// Moves a Pending job to Running.
    pub async fn start(&self, id: Uuid) -> Result<(), TrackerError> {
        self.with_job(id, |entry| {
            Self::transition(entry, JobStatus::Running)?;
            entry.job.stage = JobStage::Reading;
            entry.job.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Records the phase of a Running job.
    pub async fn set_stage(&self, id: Uuid, stage: JobStage) -> Result<(), TrackerError> {
        self.with_job(id, |entry| {
            Self::ensure_running(entry, JobStatus::Running)?;
            entry.job.stage = stage;
            Ok(())
        })
        .await
    }

    /// Merges progress counters of a Running job; counters never decrease.
    pub async fn record_progress(&self, id: Uuid, progress: JobProgress) -> Result<(), TrackerError> {
        self.with_job(id, |entry| {
            Self::ensure_running(entry, JobStatus::Running)?;
            entry.job.progress.absorb(progress);
            Ok(())
        })
        .await
    }

    /// Moves a Running job to Completed with its report and workbook.
    pub async fn complete(
        &self,
        id: Uuid,
        report: JobReport,
        output: ProcessedFile,
    ) -> Result<(), TrackerError> {
        self.with_job(id, |entry| {
            Self::transition(entry, JobStatus::Completed)?;
            entry.job.stage = JobStage::Done;
            entry.job.report = Some(report);
            entry.job.finished_at = Some(Utc::now());
            entry.output = Some(output);
            Ok(())
        })
        .await
    }

    /// Moves a Pending or Running job to Failed.
    pub async fn fail(&self, id: Uuid, error: impl Into<String>) -> Result<(), TrackerError> {
        let error = error.into();
        self.with_job(id, |entry| {
            Self::transition(entry, JobStatus::Failed)?;
            entry.job.stage = JobStage::Done;
            entry.job.error = Some(error);
            entry.job.finished_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Returns a snapshot of a job.
    pub async fn get(&self, id: Uuid) -> Option<IngestionJob> {
        self.inner.read().await.get(&id).map(|entry| entry.job.clone())
    }

    /// Returns the processed workbook of a completed job.
    pub async fn output(&self, id: Uuid) -> Option<ProcessedFile> {
        self.inner
            .read()
            .await
            .get(&id)
            .and_then(|entry| entry.output.clone())
    }

    /// Drops terminal jobs that finished more than `retention` ago.
    ///
    /// Returns how many jobs were removed.
    pub async fn prune_finished(&self, retention: Duration) -> usize {
        let retention =
            chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = Utc::now().checked_sub_signed(retention);
        let mut jobs = self.inner.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| match (entry.job.finished_at, cutoff) {
            (Some(finished), Some(cutoff)) => finished > cutoff,
            _ => true,
        });
        before - jobs.len()
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns true if no jobs are tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> ProcessedFile {
        ProcessedFile {
            filename: "processed_fees.xlsx".to_string(),
            bytes: Bytes::from_static(b"xlsx"),
        }
    }

    fn progress(processed: u64) -> JobProgress {
        JobProgress {
            rows_total: 10,
            rows_processed: processed,
            rows_succeeded: processed,
            rows_failed: 0,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let tracker = JobTracker::new();
        let a = tracker.create("a.xlsx", "Sheet1").await;
        let b = tracker.create("b.xlsx", "Sheet1").await;
        assert_ne!(a.id, b.id);
        assert_eq!(tracker.len().await, 2);
        assert_eq!(tracker.get(a.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let tracker = JobTracker::new();
        let job = tracker.create("fees.xlsx", "Sheet1").await;

        tracker.start(job.id).await.unwrap();
        let running = tracker.get(job.id).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());

        tracker.record_progress(job.id, progress(4)).await.unwrap();
        tracker.set_stage(job.id, JobStage::Writing).await.unwrap();
        tracker
            .complete(job.id, JobReport::default(), output())
            .await
            .unwrap();

        let done = tracker.get(job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.stage, JobStage::Done);
        assert_eq!(done.progress.rows_processed, 4);
        assert!(done.report.is_some());
        assert_eq!(tracker.output(job.id).await.unwrap().filename, "processed_fees.xlsx");
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let tracker = JobTracker::new();
        let job = tracker.create("fees.xlsx", "Sheet1").await;
        tracker.start(job.id).await.unwrap();
        tracker.record_progress(job.id, progress(7)).await.unwrap();
        tracker.record_progress(job.id, progress(3)).await.unwrap();
        assert_eq!(tracker.get(job.id).await.unwrap().progress.rows_processed, 7);
    }

    #[tokio::test]
    async fn test_cannot_complete_pending_job() {
        let tracker = JobTracker::new();
        let job = tracker.create("fees.xlsx", "Sheet1").await;
        let err = tracker
            .complete(job.id, JobReport::default(), output())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TrackerError::InvalidTransition {
                id: job.id,
                from: JobStatus::Pending,
                to: JobStatus::Completed,
            }
        );
        assert!(tracker.output(job.id).await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_further_updates() {
        let tracker = JobTracker::new();
        let job = tracker.create("fees.xlsx", "Sheet1").await;
        tracker.start(job.id).await.unwrap();
        tracker.fail(job.id, "boom").await.unwrap();

        assert!(tracker.fail(job.id, "again").await.is_err());
        assert!(tracker.start(job.id).await.is_err());
        assert!(tracker.record_progress(job.id, progress(9)).await.is_err());
        assert!(tracker.set_stage(job.id, JobStage::Matching).await.is_err());

        let failed = tracker.get(job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.progress.rows_processed, 0);
    }

    #[tokio::test]
    async fn test_pending_job_can_fail() {
        let tracker = JobTracker::new();
        let job = tracker.create("fees.xlsx", "Sheet1").await;
        tracker.fail(job.id, "shutdown").await.unwrap();
        assert_eq!(tracker.get(job.id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let tracker = JobTracker::new();
        let id = Uuid::new_v4();
        assert!(tracker.get(id).await.is_none());
        assert_eq!(tracker.start(id).await, Err(TrackerError::NotFound(id)));
        let error: ServiceError = TrackerError::NotFound(id).into();
        assert!(matches!(error, ServiceError::NotFound { resource: "job", .. }));
    }

    #[tokio::test]
    async fn test_prune_only_removes_old_terminal_jobs() {
        let tracker = JobTracker::new();
        let pending = tracker.create("a.xlsx", "Sheet1").await;
        let failed = tracker.create("b.xlsx", "Sheet1").await;
        tracker.fail(failed.id, "bad").await.unwrap();

        assert_eq!(tracker.prune_finished(Duration::from_secs(3600)).await, 0);
        assert_eq!(tracker.prune_finished(Duration::ZERO).await, 1);
        assert!(tracker.get(pending.id).await.is_some());
        assert!(tracker.get(failed.id).await.is_none());
    }
}
