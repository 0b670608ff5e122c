//! Processed workbook rendering with `rust_xlsxwriter`.

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};

use super::schema::Column;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{FeeRecord, MatchStatus, RowError};

const DUPLICATE_FILL: u32 = 0xFF0000;
const UNMATCHED_FILL: u32 = 0xFFFF00;
const ERRORS_SHEET: &str = "错误行";

/// Extra columns appended after the fee sheet columns.
const STATUS_HEADER: &str = "匹配状态";
const NOTE_HEADER: &str = "说明";

/// Makes `name` acceptable as an Excel worksheet name.
fn worksheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
        .take(31)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() { "Sheet1".to_string() } else { cleaned }
}

/// Name for the row-error sheet that cannot collide with the data sheet.
fn errors_sheet_name(data_sheet: &str) -> String {
    if data_sheet.to_lowercase() == ERRORS_SHEET.to_lowercase() {
        format!("{}(1)", ERRORS_SHEET)
    } else {
        ERRORS_SHEET.to_string()
    }
}

fn status_text(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Matched => "已匹配",
        MatchStatus::Duplicate => "重名",
        MatchStatus::Unmatched => "未匹配",
    }
}

fn text_for(record: &FeeRecord, column: Column) -> Option<&str> {
    let value = match column {
        Column::Serial => &record.serial,
        Column::Name => return Some(record.name.as_str()),
        Column::Phone => &record.phone,
        Column::IdCard => &record.id_card,
        Column::BankCard => &record.bank_card,
        Column::BankName => &record.bank_name,
        Column::Remark => &record.remark,
        Column::Detail => &record.detail,
        Column::Sessions => &record.sessions,
        Column::Standard => &record.standard,
        Column::OtherProject => &record.other_project,
        Column::SalaryId => &record.salary_id,
        Column::Department => &record.department,
        Column::Amount => return None,
    };
    value.as_deref()
}

fn write_records(
    worksheet: &mut Worksheet,
    records: &[FeeRecord],
    header_format: &Format,
) -> Result<(), XlsxError> {
    let mut headers: Vec<&str> = Column::ALL.iter().map(|c| c.header()).collect();
    headers.push(STATUS_HEADER);
    headers.push(NOTE_HEADER);
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, header_format)?;
        worksheet.set_column_width(col as u16, 14)?;
    }

    let plain = Format::new();
    let duplicate = Format::new().set_background_color(Color::RGB(DUPLICATE_FILL));
    let unmatched = Format::new().set_background_color(Color::RGB(UNMATCHED_FILL));

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        let fill = match record.match_status {
            MatchStatus::Matched => &plain,
            MatchStatus::Duplicate => &duplicate,
            MatchStatus::Unmatched => &unmatched,
        };
        let amount_format = fill.clone().set_num_format("0.00");

        for (col, column) in Column::ALL.iter().enumerate() {
            let col = col as u16;
            if *column == Column::Amount {
                match record.fee.and_then(|fee| fee.to_f64()) {
                    Some(fee) => worksheet.write_number_with_format(row, col, fee, &amount_format)?,
                    None => worksheet.write_blank(row, col, fill)?,
                };
                continue;
            }
            match text_for(record, *column) {
                Some(text) => worksheet.write_string_with_format(row, col, text, fill)?,
                None => worksheet.write_blank(row, col, fill)?,
            };
        }

        let status_col = Column::ALL.len() as u16;
        worksheet.write_string_with_format(row, status_col, status_text(record.match_status), fill)?;
        match &record.fee_error {
            Some(note) => worksheet.write_string_with_format(row, status_col + 1, note, fill)?,
            None => worksheet.write_blank(row, status_col + 1, fill)?,
        };
    }
    Ok(())
}

fn write_errors(
    worksheet: &mut Worksheet,
    name: &str,
    row_errors: &[RowError],
    header_format: &Format,
) -> Result<(), XlsxError> {
    worksheet.set_name(name)?;
    worksheet.write_string_with_format(0, 0, "行号", header_format)?;
    worksheet.write_string_with_format(0, 1, "原因", header_format)?;
    worksheet.set_column_width(1, 40)?;
    for (index, error) in row_errors.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_number(row, 0, error.row as f64)?;
        worksheet.write_string(row, 1, &error.reason)?;
    }
    Ok(())
}

/// Renders fee records (and any rejected rows) into an `.xlsx` workbook.
///
/// The first worksheet is named after the source sheet. Rows whose name
/// matched several employees are filled red, unmatched rows yellow. When
/// `row_errors` is non-empty a second worksheet lists them.
///
/// # Errors
///
/// Returns `Internal` if the workbook cannot be rendered.
pub fn write_report(
    sheet_name: &str,
    records: &[FeeRecord],
    row_errors: &[RowError],
) -> ServiceResult<Vec<u8>> {
    let render = || -> Result<Vec<u8>, XlsxError> {
        let header_format = Format::new().set_bold().set_align(FormatAlign::Center);
        let mut workbook = Workbook::new();

        let data_sheet = worksheet_name(sheet_name);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&data_sheet)?;
        write_records(worksheet, records, &header_format)?;

        if !row_errors.is_empty() {
            let errors_sheet = errors_sheet_name(&data_sheet);
            write_errors(workbook.add_worksheet(), &errors_sheet, row_errors, &header_format)?;
        }
        workbook.save_to_buffer()
    };
    render().map_err(|e| ServiceError::internal(format!("failed to render workbook: {}", e)))
}
