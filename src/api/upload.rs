//! Spreadsheet upload, job status and download handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;

use super::handlers::reject;
use super::request::{UploadedFile, multipart_rejection};
use super::response::{ApiErrorResponse, ApiResponse, JobStatusResponse, UploadAccepted};
use super::state::AppState;
use crate::error::ServiceError;
use crate::ingest::{ACCEPTED_EXTENSIONS, is_spreadsheet};
use crate::jobs::UploadedWorkbook;
use crate::models::JobStatus;

/// MIME type of the processed workbook.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn parse_task_id(task_id: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(task_id)
        .map_err(|_| ServiceError::validation("task_id", format!("invalid task id: {}", task_id)))
}

/// RFC 5987 encoding for the `filename*` parameter.
fn encode_filename(filename: &str) -> String {
    let mut encoded = String::with_capacity(filename.len());
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        encode_filename(filename)
    )
}

/// Handler for POST /api/excel/upload/{sheet_name}.
///
/// Accepts the workbook, registers a job and answers 202 immediately.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(sheet_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UploadAccepted>>), ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, sheet = %sheet_name, "Processing upload request");

    let multipart =
        multipart.map_err(|rejection| reject(correlation_id, multipart_rejection(rejection.body_text())))?;
    let file = UploadedFile::from_multipart(multipart)
        .await
        .map_err(|e| reject(correlation_id, e))?;

    let sheet_name = sheet_name.trim().to_string();
    if sheet_name.is_empty() {
        return Err(reject(
            correlation_id,
            ServiceError::validation("sheet_name", "sheet name must not be empty"),
        ));
    }
    if !is_spreadsheet(&file.filename) {
        return Err(reject(
            correlation_id,
            ServiceError::validation(
                "file",
                format!(
                    "unsupported file type '{}'; expected one of: {}",
                    file.filename,
                    ACCEPTED_EXTENSIONS.join(", ")
                ),
            ),
        ));
    }
    if file.bytes.is_empty() {
        return Err(reject(
            correlation_id,
            ServiceError::validation("file", "uploaded file is empty"),
        ));
    }

    let job = state
        .pipeline()
        .submit(UploadedWorkbook {
            filename: file.filename,
            sheet_name,
            bytes: file.bytes,
        })
        .await;

    info!(correlation_id = %correlation_id, job_id = %job.id, "Upload accepted");
    let accepted = UploadAccepted {
        task_id: job.id.to_string(),
        status: "pending".to_string(),
        status_url: format!("/api/excel/task/{}", job.id),
        download_url: format!("/api/excel/download/{}", job.id),
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok("File accepted for processing", accepted)),
    ))
}

/// Handler for GET /api/excel/task/{task_id}.
pub async fn task_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<JobStatusResponse>>, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    let id = parse_task_id(&task_id).map_err(|e| reject(correlation_id, e))?;
    let job = state.tracker().get(id).await.ok_or_else(|| {
        reject(
            correlation_id,
            ServiceError::NotFound {
                resource: "task",
                id: task_id.clone(),
            },
        )
    })?;
    Ok(Json(ApiResponse::ok("Task status", job.into())))
}

/// Handler for GET /api/excel/download/{task_id}.
///
/// Answers 409 until the job has completed.
pub async fn download_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let correlation_id = Uuid::new_v4();
    let id = parse_task_id(&task_id).map_err(|e| reject(correlation_id, e))?;
    let not_found = || ServiceError::NotFound {
        resource: "task",
        id: task_id.clone(),
    };

    let job = state
        .tracker()
        .get(id)
        .await
        .ok_or_else(|| reject(correlation_id, not_found()))?;
    match job.status {
        JobStatus::Completed => {}
        JobStatus::Failed => {
            return Err(reject(
                correlation_id,
                ServiceError::Conflict {
                    message: format!(
                        "task {} failed: {}",
                        task_id,
                        job.error.unwrap_or_default()
                    ),
                },
            ));
        }
        JobStatus::Pending | JobStatus::Running => {
            return Err(reject(
                correlation_id,
                ServiceError::Conflict {
                    message: format!("task {} is not finished yet", task_id),
                },
            ));
        }
    }

    let file = state
        .tracker()
        .output(id)
        .await
        .ok_or_else(|| reject(correlation_id, not_found()))?;
    info!(
        correlation_id = %correlation_id,
        job_id = %id,
        size_bytes = file.bytes.len(),
        "Serving processed workbook"
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.filename)),
        ],
        file.bytes,
    )
        .into_response())
}
