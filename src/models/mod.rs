//! Core data models for the Exam Data Manager.
//!
//! This module contains the domain models shared by the repository, the
//! ingestion pipeline and the HTTP API.

mod employee;
mod fee_record;
mod job;
mod sheet_row;

pub use employee::{Employee, EmployeePatch, NewEmployee, normalize_name};
pub use fee_record::{FeeRecord, FeeSource, MatchStatus};
pub use job::{IngestionJob, JobProgress, JobReport, JobStage, JobStatus};
pub use sheet_row::{RowError, RowOutcome, SheetRow};
