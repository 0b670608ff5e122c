//! The background ingestion task.
//!
//! [`IngestionPipeline::submit`] registers a job and returns immediately; a
//! spawned task then reads the sheet, matches rows to employees, estimates
//! missing fees and renders the processed workbook, publishing progress to
//! the [`JobTracker`] as it goes.

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::tracker::{JobTracker, ProcessedFile};
use crate::config::IngestionConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::fee::FeeService;
use crate::ingest::{open_sheet, write_report};
use crate::models::{
    FeeRecord, IngestionJob, JobProgress, JobReport, JobStage, MatchStatus, RowOutcome,
};
use crate::repository::EmployeeRepository;

/// An uploaded workbook waiting to be processed.
#[derive(Debug, Clone)]
pub struct UploadedWorkbook {
    /// Client-side filename.
    pub filename: String,
    /// Worksheet to process.
    pub sheet_name: String,
    /// Raw file contents.
    pub bytes: Bytes,
}

/// Runs ingestion jobs in the background.
#[derive(Clone)]
pub struct IngestionPipeline {
    tracker: JobTracker,
    repository: EmployeeRepository,
    fees: FeeService,
    policy: IngestionConfig,
    shutdown: CancellationToken,
}

fn cancelled() -> ServiceError {
    ServiceError::ServiceUnavailable {
        service: "ingestion",
        message: "job cancelled by shutdown".to_string(),
    }
}

/// `processed_<stem>.xlsx`; the output is always `.xlsx`.
fn output_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    format!("processed_{}.xlsx", stem)
}

impl IngestionPipeline {
    /// Creates a pipeline. Cancelling `shutdown` stops every running job.
    pub fn new(
        tracker: JobTracker,
        repository: EmployeeRepository,
        fees: FeeService,
        policy: IngestionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            repository,
            fees,
            policy,
            shutdown,
        }
    }

    /// Returns true if missing fees will be estimated.
    pub fn fees_enabled(&self) -> bool {
        self.fees.is_enabled()
    }

    /// The job registry this pipeline reports to.
    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Registers a Pending job and starts processing it in the background.
    ///
    /// Returns the job as registered, before any processing happens.
    pub async fn submit(&self, upload: UploadedWorkbook) -> IngestionJob {
        let job = self.tracker.create(&upload.filename, &upload.sheet_name).await;
        let id = job.id;
        info!(
            job_id = %id,
            filename = %upload.filename,
            sheet = %upload.sheet_name,
            size_bytes = upload.bytes.len(),
            "Ingestion job accepted"
        );

        let pipeline = self.clone();
        let cancel = self.shutdown.child_token();
        let worker = tokio::spawn(async move { pipeline.process(id, upload, cancel).await });

        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            let failure = match worker.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => {
                    warn!(job_id = %id, error = %e, "Ingestion job failed");
                    e.to_string()
                }
                Err(join_error) => {
                    error!(job_id = %id, error = %join_error, "Ingestion task aborted");
                    if join_error.is_panic() {
                        "ingestion task panicked".to_string()
                    } else {
                        "ingestion task was cancelled".to_string()
                    }
                }
            };
            if let Err(e) = tracker.fail(id, failure).await {
                debug!(job_id = %id, error = %e, "Job already terminal");
            }
        });

        job
    }

    async fn process(
        &self,
        id: Uuid,
        upload: UploadedWorkbook,
        cancel: CancellationToken,
    ) -> ServiceResult<()> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let started = Instant::now();
        self.tracker.start(id).await?;

        let UploadedWorkbook {
            filename,
            sheet_name,
            bytes,
        } = upload;

        // Reading
        let sheet = {
            let sheet_name = sheet_name.clone();
            tokio::task::spawn_blocking(move || open_sheet(&bytes, &sheet_name))
                .await
                .map_err(|e| ServiceError::internal(format!("sheet reader failed: {}", e)))??
        };

        let mut progress = JobProgress {
            rows_total: sheet.total_rows() as u64,
            ..JobProgress::default()
        };
        self.tracker.record_progress(id, progress).await?;
        info!(job_id = %id, rows_total = progress.rows_total, "Reading rows");

        let interval = self.policy.progress_interval.max(1) as u64;
        let mut parsed = Vec::new();
        let mut row_errors = Vec::new();
        for outcome in sheet.rows() {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            match outcome {
                RowOutcome::Parsed(row) => {
                    progress.rows_succeeded += 1;
                    parsed.push(row);
                }
                RowOutcome::Invalid(row_error) => {
                    debug!(job_id = %id, row = row_error.row, reason = %row_error.reason, "Row rejected");
                    progress.rows_failed += 1;
                    row_errors.push(row_error);
                }
            }
            progress.rows_processed += 1;
            if progress.rows_processed % interval == 0 {
                self.tracker.record_progress(id, progress).await?;
                tokio::task::yield_now().await;
            }
        }
        self.tracker.record_progress(id, progress).await?;

        if let Some(max_ratio) = self.policy.max_row_error_ratio {
            if progress.rows_processed > 0 {
                let ratio = progress.rows_failed as f64 / progress.rows_processed as f64;
                if ratio > max_ratio {
                    return Err(ServiceError::validation(
                        "file",
                        format!(
                            "{} of {} rows failed validation (row error ratio {:.2} exceeds {:.2})",
                            progress.rows_failed, progress.rows_processed, ratio, max_ratio
                        ),
                    ));
                }
            }
        }

        // Matching
        self.tracker.set_stage(id, JobStage::Matching).await?;
        let names: Vec<String> = parsed.iter().map(|row| row.name.clone()).collect();
        let employees = self.repository.find_by_names(&names).await?;

        let mut report = JobReport {
            rows_succeeded: progress.rows_succeeded,
            rows_failed: progress.rows_failed,
            output_filename: output_filename(&filename),
            ..JobReport::default()
        };
        let mut records = Vec::with_capacity(parsed.len());
        for row in &parsed {
            match employees.get(&row.name).map(Vec::as_slice) {
                Some([employee]) => {
                    report.matched += 1;
                    records.push(FeeRecord::from_row(row, Some(employee), MatchStatus::Matched));
                }
                Some(candidates) if !candidates.is_empty() => {
                    report.duplicates += 1;
                    records.extend(candidates.iter().map(|employee| {
                        FeeRecord::from_row(row, Some(employee), MatchStatus::Duplicate)
                    }));
                }
                _ => {
                    report.unmatched += 1;
                    records.push(FeeRecord::from_row(row, None, MatchStatus::Unmatched));
                }
            }
        }

        // Estimating
        self.tracker.set_stage(id, JobStage::Estimating).await?;
        let summary = tokio::select! {
            summary = self.fees.apply(&mut records) => summary,
            _ = cancel.cancelled() => return Err(cancelled()),
        };
        report.fees_from_sheet = summary.from_sheet;
        report.fees_estimated = summary.estimated;
        report.fee_failures = summary.failed;

        // Writing
        self.tracker.set_stage(id, JobStage::Writing).await?;
        let workbook = {
            let row_errors = row_errors.clone();
            tokio::task::spawn_blocking(move || write_report(&sheet_name, &records, &row_errors))
                .await
                .map_err(|e| ServiceError::internal(format!("report writer failed: {}", e)))??
        };
        report.row_errors = row_errors;

        let output = ProcessedFile {
            filename: report.output_filename.clone(),
            bytes: Bytes::from(workbook),
        };
        info!(
            job_id = %id,
            rows_succeeded = report.rows_succeeded,
            rows_failed = report.rows_failed,
            matched = report.matched,
            duplicates = report.duplicates,
            unmatched = report.unmatched,
            fees_estimated = report.fees_estimated,
            duration_ms = started.elapsed().as_millis() as u64,
            "Ingestion job completed"
        );
        self.tracker.complete(id, report, output).await?;
        Ok(())
    }
}
