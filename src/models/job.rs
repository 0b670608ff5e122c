//! Ingestion job models.
//!
//! An [`IngestionJob`] represents one spreadsheet upload being processed in
//! the background. Its status follows the state machine
//! `Pending -> Running -> {Completed, Failed}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RowError;

/// Lifecycle status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet picked up by its task.
    Pending,
    /// The ingestion task is executing.
    Running,
    /// Finished; a report and processed workbook are available.
    Completed,
    /// Finished with a job-level error.
    Failed,
}

impl JobStatus {
    /// Returns true for Completed and Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    ///
    /// # Examples
    ///
    /// ```
    /// use exam_data_manager::models::JobStatus;
    ///
    /// assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
    /// assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
    /// assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    /// assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
    /// ```
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

/// The phase a running job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Waiting for the task to start.
    Queued,
    /// Parsing spreadsheet rows.
    Reading,
    /// Matching rows to stored employees.
    Matching,
    /// Computing missing fees.
    Estimating,
    /// Rendering the processed workbook.
    Writing,
    /// Terminal.
    Done,
}

/// Row counters for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Data rows in the sheet (blank rows excluded once known).
    pub rows_total: u64,
    /// Rows parsed so far.
    pub rows_processed: u64,
    /// Rows that parsed into a valid record.
    pub rows_succeeded: u64,
    /// Rows rejected with a row-level error.
    pub rows_failed: u64,
}

impl JobProgress {
    /// Merges an update so that no counter ever decreases.
    ///
    /// # Examples
    ///
    /// ```
    /// use exam_data_manager::models::JobProgress;
    ///
    /// let mut progress = JobProgress { rows_total: 10, rows_processed: 5, rows_succeeded: 4, rows_failed: 1 };
    /// progress.absorb(JobProgress { rows_total: 10, rows_processed: 3, rows_succeeded: 3, rows_failed: 0 });
    /// assert_eq!(progress.rows_processed, 5);
    /// assert_eq!(progress.rows_failed, 1);
    /// ```
    pub fn absorb(&mut self, update: JobProgress) {
        self.rows_total = self.rows_total.max(update.rows_total);
        self.rows_processed = self.rows_processed.max(update.rows_processed);
        self.rows_succeeded = self.rows_succeeded.max(update.rows_succeeded);
        self.rows_failed = self.rows_failed.max(update.rows_failed);
    }

    /// Percentage of rows processed, 0.0 when the total is unknown.
    pub fn percent(&self) -> f64 {
        if self.rows_total == 0 {
            return 0.0;
        }
        (self.rows_processed as f64 / self.rows_total as f64 * 100.0).min(100.0)
    }
}

/// Summary produced by a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    /// Rows that produced a fee record.
    pub rows_succeeded: u64,
    /// Rows rejected during parsing.
    pub rows_failed: u64,
    /// One entry per rejected row, in sheet order.
    pub row_errors: Vec<RowError>,
    /// Rows matched to exactly one employee.
    pub matched: u64,
    /// Rows whose name matched several employees.
    pub duplicates: u64,
    /// Rows whose name matched no employee.
    pub unmatched: u64,
    /// Fees taken from the sheet as-is.
    pub fees_from_sheet: u64,
    /// Fees computed by the estimator.
    pub fees_estimated: u64,
    /// Fees the estimator failed to compute.
    pub fee_failures: u64,
    /// Download filename of the processed workbook.
    pub output_filename: String,
}

/// One spreadsheet upload being ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    /// Unique job identifier.
    pub id: Uuid,
    /// Name of the uploaded file.
    pub filename: String,
    /// Worksheet being processed.
    pub sheet_name: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Current phase.
    pub stage: JobStage,
    /// Row counters.
    pub progress: JobProgress,
    /// Present once Completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<JobReport>,
    /// Present once Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the upload was accepted.
    pub created_at: DateTime<Utc>,
    /// When the task started running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionJob {
    /// Creates a Pending job.
    pub fn new(id: Uuid, filename: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        IngestionJob {
            id,
            filename: filename.into(),
            sheet_name: sheet_name.into(),
            status: JobStatus::Pending,
            stage: JobStage::Queued,
            progress: JobProgress::default(),
            report: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns true once the job is Completed or Failed.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
