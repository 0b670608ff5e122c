//! Request types for the Exam Data Manager API.
//!
//! This module defines the JSON bodies accepted by the employee endpoints
//! and the multipart upload form.

use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::response::{ApiError, ApiErrorResponse};
use crate::error::ServiceError;
use crate::models::{EmployeePatch, NewEmployee};

/// Request body for `POST /api/employees`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployeeRequest {
    /// The employee's name.
    pub name: String,
    /// National identity card number.
    #[serde(default)]
    pub id_card: Option<String>,
    /// Bank card number.
    #[serde(default)]
    pub bank_card: Option<String>,
    /// Bank name.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Department or branch campus.
    #[serde(default)]
    pub department: Option<String>,
    /// Payroll number.
    #[serde(default)]
    pub salary_id: Option<String>,
    /// Exam duty role.
    #[serde(default)]
    pub role: Option<String>,
    /// Assigned exam venue.
    #[serde(default)]
    pub venue: Option<String>,
    /// Free-form remark.
    #[serde(default)]
    pub remark: Option<String>,
}

impl From<CreateEmployeeRequest> for NewEmployee {
    fn from(req: CreateEmployeeRequest) -> Self {
        NewEmployee {
            name: req.name,
            id_card: req.id_card,
            bank_card: req.bank_card,
            bank_name: req.bank_name,
            phone: req.phone,
            department: req.department,
            salary_id: req.salary_id,
            role: req.role,
            venue: req.venue,
            remark: req.remark,
        }
    }
}

/// Request body for `PUT /api/employees/{employee_id}`.
///
/// Every field is optional; at least one must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEmployeeRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New identity card number.
    #[serde(default)]
    pub id_card: Option<String>,
    /// New bank card number.
    #[serde(default)]
    pub bank_card: Option<String>,
    /// New bank name.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// New phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// New department.
    #[serde(default)]
    pub department: Option<String>,
    /// New payroll number.
    #[serde(default)]
    pub salary_id: Option<String>,
    /// New duty role.
    #[serde(default)]
    pub role: Option<String>,
    /// New venue.
    #[serde(default)]
    pub venue: Option<String>,
    /// New remark.
    #[serde(default)]
    pub remark: Option<String>,
}

impl From<UpdateEmployeeRequest> for EmployeePatch {
    fn from(req: UpdateEmployeeRequest) -> Self {
        EmployeePatch {
            name: req.name,
            id_card: req.id_card,
            bank_card: req.bank_card,
            bank_name: req.bank_name,
            phone: req.phone,
            department: req.department,
            salary_id: req.salary_id,
            role: req.role,
            venue: req.venue,
            remark: req.remark,
        }
    }
}

/// The `file` part of an upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side filename.
    pub filename: String,
    /// File contents.
    pub bytes: Bytes,
}

/// Name of the multipart field carrying the workbook.
pub const FILE_FIELD: &str = "file";

impl UploadedFile {
    /// Reads the `file` field from a multipart body, skipping other fields.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiErrorResponse> {
        let invalid = |err: axum::extract::multipart::MultipartError| {
            ApiErrorResponse::new(
                err.status(),
                ApiError::new("INVALID_MULTIPART", err.body_text()),
            )
        };

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(invalid)?;
            return Ok(UploadedFile { filename, bytes });
        }

        Err(ServiceError::validation(
            FILE_FIELD,
            format!("multipart field '{}' is required", FILE_FIELD),
        )
        .into())
    }
}

/// Maps a multipart extractor rejection to a 400 response.
pub fn multipart_rejection(message: String) -> ApiErrorResponse {
    ApiErrorResponse::new(
        StatusCode::BAD_REQUEST,
        ApiError::new("INVALID_MULTIPART", message),
    )
}
