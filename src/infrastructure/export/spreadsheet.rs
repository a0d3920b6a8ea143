// Spreadsheet renderer - One workbook with overview, breakdown, trends and raw sheets
use super::ExportError;
use crate::domain::report::{ReportDocument, Row};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::Value;
use std::collections::HashSet;

const MAX_SHEET_NAME: usize = 31;
const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Tabular content of one worksheet before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub fn build_sheets(doc: &ReportDocument) -> Vec<SheetData> {
    let mut taken = HashSet::new();
    let mut sheets = Vec::new();

    sheets.push(SheetData {
        name: sheet_name("Overview", &mut taken),
        headers: vec!["Metric".to_string(), "Value".to_string()],
        rows: doc
            .overview
            .iter()
            .map(|(label, value)| vec![Value::String(label.clone()), value.clone()])
            .collect(),
    });

    for (category, entries) in &doc.breakdown {
        let rows: Vec<Row> = entries
            .iter()
            .map(|(item, value)| {
                let mut row = Row::new();
                row.insert("Item".to_string(), Value::String(item.clone()));
                match value {
                    Value::Object(fields) => {
                        row.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())))
                    }
                    other => {
                        row.insert("Value".to_string(), other.clone());
                    }
                }
                row
            })
            .collect();
        sheets.push(rows_sheet(sheet_name(category, &mut taken), &rows));
    }

    sheets.push(rows_sheet(sheet_name("Trends", &mut taken), &doc.trends));
    sheets.push(rows_sheet(sheet_name("Raw Data", &mut taken), doc.raw.rows()));
    sheets
}

pub fn render(doc: &ReportDocument) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();

    for sheet in build_sheets(doc) {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, header)?;
        }
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                write_cell(&mut worksheet, row_idx as u32 + 1, col as u16, value)?;
            }
        }

        workbook.push_worksheet(worksheet);
    }

    Ok(workbook.save_to_buffer()?)
}

/// Headers are the union of row keys in first-seen order.
fn rows_sheet(name: String, rows: &[Row]) -> SheetData {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    SheetData { name, headers, rows }
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(number) => {
                worksheet.write_number(row, col, number)?;
            }
            None => {
                worksheet.write_string(row, col, &n.to_string())?;
            }
        },
        Value::String(s) => {
            worksheet.write_string(row, col, s)?;
        }
        nested => {
            worksheet.write_string(row, col, &nested.to_string())?;
        }
    }
    Ok(())
}

/// Excel sheet names: no `[]:*?/\`, at most 31 characters, unique ignoring case.
fn sheet_name(raw: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !INVALID_SHEET_CHARS.contains(c))
        .collect();
    let truncated: String = cleaned
        .trim()
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME)
        .collect();
    // Truncation can expose a trailing quote or space again.
    let trimmed = truncated.trim_end_matches(|c: char| c == '\'' || c.is_whitespace());
    let base = if trimmed.is_empty() {
        "Sheet".to_string()
    } else {
        trimmed.to_string()
    };

    let mut candidate = base.clone();
    let mut counter = 2;
    while !taken.insert(candidate.to_lowercase()) {
        let suffix = format!(" ({})", counter);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        counter += 1;
    }
    candidate
}
