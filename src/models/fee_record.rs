//! Fee record model.
//!
//! A [`FeeRecord`] is a sheet row enriched with the matched employee's payment
//! details and a fee amount. Records are not persisted; they are rendered into
//! the job's processed workbook.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Employee, SheetRow};

/// How a sheet row's name resolved against stored employees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Exactly one employee has this name.
    Matched,
    /// Several employees share this name; one record is emitted per candidate.
    Duplicate,
    /// No employee has this name.
    Unmatched,
}

/// Where a record's fee came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    /// The amount column was already filled in.
    Sheet,
    /// Computed by the fee estimator.
    Estimated,
    /// No amount is available.
    Missing,
}

/// A sheet row merged with employee data and a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecord {
    /// Source row number in the uploaded sheet.
    pub row: usize,
    /// Matched employee, if any.
    pub employee_id: Option<Uuid>,
    /// Match outcome.
    pub match_status: MatchStatus,
    /// Serial number from the sheet.
    pub serial: Option<String>,
    /// Employee name.
    pub name: String,
    /// Identity card number.
    pub id_card: Option<String>,
    /// Bank card number.
    pub bank_card: Option<String>,
    /// Bank name.
    pub bank_name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Payment detail description.
    pub detail: Option<String>,
    /// Sessions or hours worked.
    pub sessions: Option<String>,
    /// Fee standard.
    pub standard: Option<String>,
    /// Other project.
    pub other_project: Option<String>,
    /// Payroll number.
    pub salary_id: Option<String>,
    /// Department / branch.
    pub department: Option<String>,
    /// Remark.
    pub remark: Option<String>,
    /// Fee amount.
    pub fee: Option<Decimal>,
    /// Origin of `fee`.
    pub fee_source: FeeSource,
    /// Why the estimator could not produce a fee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_error: Option<String>,
}

impl FeeRecord {
    /// Builds a record from a sheet row and the employee it matched.
    ///
    /// Stored employee payment details win over values typed on the sheet;
    /// sheet values are kept where the employee record has none.
    pub fn from_row(row: &SheetRow, employee: Option<&Employee>, match_status: MatchStatus) -> Self {
        let pick = |stored: Option<&Option<String>>, sheet: &Option<String>| {
            stored.and_then(|value| value.clone()).or_else(|| sheet.clone())
        };
        let (fee, fee_source) = match row.amount {
            Some(amount) => (Some(amount), FeeSource::Sheet),
            None => (None, FeeSource::Missing),
        };

        FeeRecord {
            row: row.row,
            employee_id: employee.map(|e| e.id),
            match_status,
            serial: row.serial.clone(),
            name: employee.map_or_else(|| row.name.clone(), |e| e.name.clone()),
            id_card: pick(employee.map(|e| &e.id_card), &row.id_card),
            bank_card: pick(employee.map(|e| &e.bank_card), &row.bank_card),
            bank_name: pick(employee.map(|e| &e.bank_name), &row.bank_name),
            phone: pick(employee.map(|e| &e.phone), &row.phone),
            detail: row.detail.clone(),
            sessions: row.sessions.clone(),
            standard: row.standard.clone(),
            other_project: row.other_project.clone(),
            salary_id: pick(employee.map(|e| &e.salary_id), &row.salary_id),
            department: pick(employee.map(|e| &e.department), &row.department),
            remark: row.remark.clone(),
            fee,
            fee_source,
            fee_error: None,
        }
    }

    /// Returns true if the estimator should be asked for this record's fee.
    pub fn needs_estimate(&self) -> bool {
        self.fee.is_none() && self.sessions.is_some() && self.standard.is_some()
    }
}
