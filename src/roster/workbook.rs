use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use super::{date_from_serial, CellValue, RawRow};

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("failed to open workbook: {0}")]
    Open(String),
    #[error("failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
}

/// Exact sheet name first, then the first sheet whose name contains `wanted`
/// case-insensitively.
pub fn find_sheet<'a>(names: &'a [String], wanted: &str) -> Option<&'a str> {
    if let Some(exact) = names.iter().find(|n| n.as_str() == wanted) {
        return Some(exact.as_str());
    }
    let wanted_lower = wanted.to_lowercase();
    names
        .iter()
        .find(|n| n.to_lowercase().contains(&wanted_lower))
        .map(String::as_str)
}

/// Opens the sheet matching `wanted` in a workbook payload (xlsx, xls, xlsb, ods).
///
/// `Ok(None)` means the workbook was readable but had no matching sheet.
pub fn open_sheet_rows(bytes: &[u8], wanted: &str) -> Result<Option<SheetRows>, WorkbookError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| WorkbookError::Open(e.to_string()))?;

    let names = workbook.sheet_names();
    let Some(sheet_name) = find_sheet(&names, wanted).map(str::to_string) else {
        tracing::info!(wanted, sheets = ?names, "no matching sheet in workbook");
        return Ok(None);
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| WorkbookError::Sheet {
            sheet: sheet_name.clone(),
            message: e.to_string(),
        })?;

    Ok(Some(SheetRows::new(sheet_name, range)))
}

/// Data rows of one sheet, read lazily. The first row of the used range is the header row.
pub struct SheetRows {
    sheet_name: String,
    range: Range<Data>,
    headers: Vec<String>,
    first_line: usize,
    next_row: usize,
    height: usize,
}

impl SheetRows {
    fn new(sheet_name: String, range: Range<Data>) -> Self {
        let (height, width) = range.get_size();
        let first_line = range.start().map(|(r, _)| r as usize + 1).unwrap_or(1);
        let raw_headers: Vec<String> = (0..width)
            .map(|col| {
                range
                    .get((0, col))
                    .map(|d| cell_value(d).as_text().trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        Self {
            sheet_name,
            headers: dedupe_headers(raw_headers),
            range,
            first_line,
            next_row: 1,
            height,
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }
}

impl Iterator for SheetRows {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        if self.next_row >= self.height {
            return None;
        }
        let r = self.next_row;
        self.next_row += 1;

        let mut row = RawRow::new(self.first_line + r);
        for (col, header) in self.headers.iter().enumerate() {
            let value = self
                .range
                .get((r, col))
                .map(cell_value)
                .unwrap_or_else(CellValue::empty);
            row.push(header.clone(), value);
        }
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.height.saturating_sub(self.next_row);
        (left, Some(left))
    }
}

/// Blank headers become `__EMPTY`, `__EMPTY_1`, ...; repeats get `_1`, `_2`, ... so that
/// no column silently shadows another with the exact same text.
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .map(|h| {
            let base = if h.is_empty() { "__EMPTY".to_string() } else { h };
            let n = seen.entry(base.clone()).or_insert(0);
            let out = if *n == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, n)
            };
            *n += 1;
            out
        })
        .collect()
}

fn cell_value(d: &Data) -> CellValue {
    match d {
        Data::Empty => CellValue::empty(),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "true" } else { "false" }.to_string()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match date_from_serial(serial) {
                Some(v) => CellValue::Date(v),
                None => CellValue::Number(serial),
            }
        }
        Data::DateTimeIso(s) => parse_iso(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
