//! Background ingestion jobs.
//!
//! The [`JobTracker`] is the single shared registry of job state; the
//! [`IngestionPipeline`] spawns one task per upload and reports into it.

mod pipeline;
mod tracker;

pub use pipeline::{IngestionPipeline, UploadedWorkbook};
pub use tracker::{JobTracker, ProcessedFile, TrackerError};
