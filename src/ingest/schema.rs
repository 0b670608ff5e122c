//! Fee sheet column schema.
//!
//! Maps header cells to [`Column`]s and turns a row of cell texts into a
//! [`RowOutcome`].

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::models::{RowError, RowOutcome, SheetRow, normalize_name};

/// A column the ingestor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// 编号
    Serial,
    /// 姓名
    Name,
    /// 电话
    Phone,
    /// 身份证号
    IdCard,
    /// 银行卡号
    BankCard,
    /// 开户行
    BankName,
    /// 备注
    Remark,
    /// 发放明细
    Detail,
    /// 次数（小时）
    Sessions,
    /// 标准
    Standard,
    /// 其他项目
    OtherProject,
    /// 工资编号
    SalaryId,
    /// 分院
    Department,
    /// 金额
    Amount,
}

impl Column {
    /// Every column, in the order used for the processed workbook.
    pub const ALL: [Column; 14] = [
        Column::Serial,
        Column::Name,
        Column::Phone,
        Column::IdCard,
        Column::BankCard,
        Column::BankName,
        Column::Department,
        Column::SalaryId,
        Column::Detail,
        Column::Sessions,
        Column::Standard,
        Column::OtherProject,
        Column::Amount,
        Column::Remark,
    ];

    /// Resolves a header cell, accepting Chinese and English aliases.
    ///
    /// Whitespace is ignored, full-width parentheses match ASCII ones and
    /// English aliases are case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use exam_data_manager::ingest::Column;
    ///
    /// assert_eq!(Column::from_header("姓 名"), Some(Column::Name));
    /// assert_eq!(Column::from_header("次数(小时)"), Some(Column::Sessions));
    /// assert_eq!(Column::from_header("Bank_Card"), Some(Column::BankCard));
    /// assert_eq!(Column::from_header("签字"), None);
    /// ```
    pub fn from_header(header: &str) -> Option<Column> {
        let key: String = normalize_name(header)
            .replace('（', "(")
            .replace('）', ")")
            .to_lowercase();
        let column = match key.as_str() {
            "编号" | "序号" | "serial" => Column::Serial,
            "姓名" | "name" => Column::Name,
            "电话" | "电话号码" | "手机号" | "phone" => Column::Phone,
            "身份证号" | "收款账号身份证号" | "id_card" => Column::IdCard,
            "银行卡号" | "收款账号" | "bank_card" => Column::BankCard,
            "开户行" | "收款账号开户行" | "bank_name" => Column::BankName,
            "备注" | "remark" => Column::Remark,
            "发放明细" | "detail" => Column::Detail,
            "次数(小时)" | "次数" | "sessions" => Column::Sessions,
            "标准" | "standard" => Column::Standard,
            "其他项目" | "other_project" => Column::OtherProject,
            "工资编号" | "salary_id" => Column::SalaryId,
            "分院" | "department" => Column::Department,
            "金额" | "amount" => Column::Amount,
            _ => return None,
        };
        Some(column)
    }

    /// Canonical header text.
    pub fn header(self) -> &'static str {
        match self {
            Column::Serial => "编号",
            Column::Name => "姓名",
            Column::Phone => "电话",
            Column::IdCard => "身份证号",
            Column::BankCard => "银行卡号",
            Column::BankName => "开户行",
            Column::Remark => "备注",
            Column::Detail => "发放明细",
            Column::Sessions => "次数（小时）",
            Column::Standard => "标准",
            Column::OtherProject => "其他项目",
            Column::SalaryId => "工资编号",
            Column::Department => "分院",
            Column::Amount => "金额",
        }
    }
}

/// Parses an amount cell such as `"1,600.00元"` or `"¥ 350"`.
pub fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '元' | ',' | '，' | '¥' | '￥'))
        .collect();
    let amount = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| format!("invalid amount '{}'", raw))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("amount must not be negative: '{}'", raw));
    }
    Ok(amount)
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    columns: Vec<Option<Column>>,
}

impl HeaderMap {
    /// Resolves a header row. The first occurrence of a column wins.
    pub fn from_cells(cells: &[Option<String>]) -> Self {
        let mut seen = Vec::new();
        let columns = cells
            .iter()
            .map(|cell| {
                let column = cell.as_deref().and_then(Column::from_header)?;
                if seen.contains(&column) {
                    return None;
                }
                seen.push(column);
                Some(column)
            })
            .collect();
        HeaderMap { columns }
    }

    /// Returns true if the header row contains `column`.
    pub fn contains(&self, column: Column) -> bool {
        self.columns.contains(&Some(column))
    }

    /// Validates one data row.
    ///
    /// Returns `None` for a row whose cells are all empty.
    pub fn parse_row(&self, row: usize, cells: &[Option<String>]) -> Option<RowOutcome> {
        if cells.iter().all(Option::is_none) {
            return None;
        }

        let mut parsed = SheetRow {
            row,
            ..SheetRow::default()
        };
        for (column, cell) in self.columns.iter().zip(cells) {
            let (Some(column), Some(value)) = (column, cell) else {
                continue;
            };
            let value = Some(value.clone());
            match column {
                Column::Serial => parsed.serial = value,
                Column::Name => parsed.name = value.map(|v| normalize_name(&v)).unwrap_or_default(),
                Column::Phone => parsed.phone = value,
                Column::IdCard => parsed.id_card = value,
                Column::BankCard => parsed.bank_card = value,
                Column::BankName => parsed.bank_name = value,
                Column::Remark => parsed.remark = value,
                Column::Detail => parsed.detail = value,
                Column::Sessions => parsed.sessions = value,
                Column::Standard => parsed.standard = value,
                Column::OtherProject => parsed.other_project = value,
                Column::SalaryId => parsed.salary_id = value,
                Column::Department => parsed.department = value,
                Column::Amount => match parse_amount(value.as_deref().unwrap_or_default()) {
                    Ok(amount) => parsed.amount = Some(amount),
                    Err(reason) => return Some(RowOutcome::Invalid(RowError { row, reason })),
                },
            }
        }

        if parsed.name.is_empty() {
            return Some(RowOutcome::Invalid(RowError {
                row,
                reason: format!("missing required field {}", Column::Name.header()),
            }));
        }
        Some(RowOutcome::Parsed(parsed))
    }
}
