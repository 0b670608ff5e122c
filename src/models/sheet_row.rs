//! Parsed spreadsheet rows.
//!
//! Each data row of an uploaded sheet becomes a [`RowOutcome`]: either a typed
//! [`SheetRow`] or a [`RowError`] explaining why the row was rejected.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fee sheet row that passed schema validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based row number in the worksheet.
    pub row: usize,
    /// Serial number column (编号).
    pub serial: Option<String>,
    /// Normalized name (姓名), never empty.
    pub name: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Identity card number.
    pub id_card: Option<String>,
    /// Bank card number.
    pub bank_card: Option<String>,
    /// Bank name.
    pub bank_name: Option<String>,
    /// Remark.
    pub remark: Option<String>,
    /// Payment detail description (发放明细).
    pub detail: Option<String>,
    /// Sessions or hours worked, e.g. "8场（1.5*8）" (次数（小时）).
    pub sessions: Option<String>,
    /// Fee standard, e.g. "2小时以内150，每增加半小时25元" (标准).
    pub standard: Option<String>,
    /// Other project (其他项目).
    pub other_project: Option<String>,
    /// Payroll number (工资编号).
    pub salary_id: Option<String>,
    /// Department / branch (分院).
    pub department: Option<String>,
    /// Amount already filled in on the sheet (金额).
    pub amount: Option<Decimal>,
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based row number in the worksheet.
    pub row: usize,
    /// Human-readable reason.
    pub reason: String,
}

/// The result of validating one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The row matched the schema.
    Parsed(SheetRow),
    /// The row was rejected; the batch continues.
    Invalid(RowError),
}

impl RowOutcome {
    /// The worksheet row number this outcome refers to.
    pub fn row(&self) -> usize {
        match self {
            RowOutcome::Parsed(row) => row.row,
            RowOutcome::Invalid(error) => error.row,
        }
    }
}
