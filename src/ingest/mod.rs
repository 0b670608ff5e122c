//! Spreadsheet ingestion.
//!
//! This module reads fee sheets into typed rows and renders the processed
//! workbook handed back to clients.
//!
//! # Example
//!
//! ```no_run
//! use exam_data_manager::ingest::open_sheet;
//! use exam_data_manager::models::RowOutcome;
//!
//! let bytes = std::fs::read("fees.xlsx").unwrap();
//! let sheet = open_sheet(&bytes, "Sheet1").unwrap();
//! for outcome in sheet.rows() {
//!     match outcome {
//!         RowOutcome::Parsed(row) => println!("{}: {}", row.row, row.name),
//!         RowOutcome::Invalid(error) => println!("{}: {}", error.row, error.reason),
//!     }
//! }
//! ```

mod reader;
mod schema;
mod writer;

pub use reader::{ParsedSheet, open_sheet};
pub use schema::{Column, HeaderMap, parse_amount};
pub use writer::write_report;

/// File extensions accepted for upload.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

/// Returns true if `filename` has an accepted spreadsheet extension.
///
/// # Examples
///
/// ```
/// use exam_data_manager::ingest::is_spreadsheet;
///
/// assert!(is_spreadsheet("fees.XLSX"));
/// assert!(is_spreadsheet("old.xls"));
/// assert!(!is_spreadsheet("fees.csv"));
/// assert!(!is_spreadsheet("xlsx"));
/// ```
pub fn is_spreadsheet(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}
