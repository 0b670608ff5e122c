//! Workbook reading with `calamine`.

use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use tracing::debug;

use super::schema::{Column, HeaderMap};
use crate::error::{ServiceError, ServiceResult};
use crate::models::RowOutcome;

/// One worksheet with a resolved header row.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    header: HeaderMap,
    range: Range<Data>,
    first_row: usize,
}

/// Renders a cell as trimmed text, `None` when empty.
///
/// Whole-number floats lose their fractional part so that phone and card
/// numbers typed as numbers come out as digits.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn row_texts(cells: &[Data]) -> Vec<Option<String>> {
    cells.iter().map(cell_text).collect()
}

/// Opens `sheet_name` from an `.xls` or `.xlsx` workbook.
///
/// # Errors
///
/// `Validation` when the bytes are not a workbook, the sheet does not exist,
/// the sheet is empty or the header row has no name column.
pub fn open_sheet(bytes: &[u8], sheet_name: &str) -> ServiceResult<ParsedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ServiceError::validation("file", format!("not a readable workbook: {}", e)))?;

    let sheets = workbook.sheet_names();
    if !sheets.iter().any(|s| s == sheet_name) {
        return Err(ServiceError::validation(
            "sheet_name",
            format!("sheet '{}' not found; available: {}", sheet_name, sheets.join(", ")),
        ));
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| ServiceError::validation("sheet_name", format!("cannot read sheet: {}", e)))?;

    let Some((start_row, _)) = range.start() else {
        return Err(ServiceError::validation("file", format!("sheet '{}' is empty", sheet_name)));
    };
    let Some(header_cells) = range.rows().next() else {
        return Err(ServiceError::validation("file", format!("sheet '{}' is empty", sheet_name)));
    };

    let header = HeaderMap::from_cells(&row_texts(header_cells));
    if !header.contains(Column::Name) {
        return Err(ServiceError::validation(
            "file",
            format!("header row has no {} column", Column::Name.header()),
        ));
    }

    debug!(
        sheet = %sheet_name,
        height = range.height(),
        width = range.width(),
        "Opened worksheet"
    );

    Ok(ParsedSheet {
        header,
        first_row: start_row as usize + 1,
        range,
    })
}

impl ParsedSheet {
    /// Number of non-blank data rows.
    pub fn total_rows(&self) -> usize {
        self.range
            .rows()
            .skip(1)
            .filter(|cells| cells.iter().any(|c| cell_text(c).is_some()))
            .count()
    }

    /// Validated data rows in sheet order; blank rows are skipped.
    ///
    /// Each outcome carries its 1-based worksheet row number.
    pub fn rows(&self) -> impl Iterator<Item = RowOutcome> + '_ {
        self.range
            .rows()
            .enumerate()
            .skip(1)
            .filter_map(|(offset, cells)| {
                self.header
                    .parse_row(self.first_row + offset, &row_texts(cells))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_rows_in_order_with_row_numbers() {
        let bytes = workbook(
            "考务费",
            &[
                &["编号", "姓名", "金额"],
                &["1", "张三", "100"],
                &["2", "", "200"],
                &["3", "李四", ""],
            ],
        );
        let sheet = open_sheet(&bytes, "考务费").unwrap();
        assert_eq!(sheet.total_rows(), 3);

        let outcomes: Vec<RowOutcome> = sheet.rows().collect();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().map(RowOutcome::row).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(matches!(&outcomes[0], RowOutcome::Parsed(row) if row.name == "张三"));
        assert!(matches!(&outcomes[1], RowOutcome::Invalid(e) if e.row == 3));
        assert!(matches!(&outcomes[2], RowOutcome::Parsed(row) if row.amount.is_none()));
    }

    #[test]
    fn test_blank_rows_are_not_counted() {
        let bytes = workbook(
            "Sheet1",
            &[&["姓名"], &["张三"], &[""], &["李四"]],
        );
        let sheet = open_sheet(&bytes, "Sheet1").unwrap();
        assert_eq!(sheet.total_rows(), 2);
        let rows: Vec<usize> = sheet.rows().map(|o| o.row()).collect();
        assert_eq!(rows, vec![2, 4]);
    }

    #[test]
    fn test_numeric_cells_render_as_digits() {
        let mut book = Workbook::new();
        let worksheet = book.add_worksheet();
        worksheet.write_string(0, 0, "姓名").unwrap();
        worksheet.write_string(0, 1, "电话").unwrap();
        worksheet.write_string(0, 2, "金额").unwrap();
        worksheet.write_string(1, 0, "张三").unwrap();
        worksheet.write_number(1, 1, 13800138000.0).unwrap();
        worksheet.write_number(1, 2, 1650.5).unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let sheet = open_sheet(&bytes, "Sheet1").unwrap();
        let RowOutcome::Parsed(row) = sheet.rows().next().unwrap() else {
            panic!("expected parsed row");
        };
        assert_eq!(row.phone.as_deref(), Some("13800138000"));
        assert_eq!(row.amount, Some(rust_decimal::Decimal::new(16505, 1)));
    }

    #[test]
    fn test_missing_sheet_is_validation_error() {
        let bytes = workbook("Sheet1", &[&["姓名"], &["张三"]]);
        let err = open_sheet(&bytes, "Other").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field, .. } if field == "sheet_name"));
    }

    #[test]
    fn test_sheet_without_name_column_is_rejected() {
        let bytes = workbook("Sheet1", &[&["编号", "金额"], &["1", "100"]]);
        assert!(matches!(
            open_sheet(&bytes, "Sheet1"),
            Err(ServiceError::Validation { .. })
        ));
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        let mut book = Workbook::new();
        book.add_worksheet();
        let bytes = book.save_to_buffer().unwrap();
        assert!(open_sheet(&bytes, "Sheet1").is_err());
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = open_sheet(b"definitely not a spreadsheet", "Sheet1").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field, .. } if field == "file"));
    }
}
