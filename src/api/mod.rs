//! HTTP API module for the Exam Data Manager.
//!
//! This module provides the REST endpoints for employee records and
//! spreadsheet ingestion jobs.

mod handlers;
mod request;
mod response;
mod state;
mod upload;

pub use handlers::create_router;
pub use request::{CreateEmployeeRequest, FILE_FIELD, UpdateEmployeeRequest, UploadedFile};
pub use response::{
    ApiError, ApiErrorResponse, ApiResponse, JobStatusResponse, ListResponse, UploadAccepted,
};
pub use state::AppState;
pub use upload::XLSX_CONTENT_TYPE;
