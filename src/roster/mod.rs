//! Roster ingestion: spreadsheet workbooks in, validated teacher/student records out.
//!
//! The pipeline is `workbook` (sheet selection, raw rows) -> `header` (alias
//! resolution) -> `teacher` / `student` (per-row normalization). Every row yields
//! either a record or a [`RowRejection`]; nothing in here touches storage.

mod header;
mod student;
mod teacher;
mod workbook;

pub use student::{normalize_student_row_with, DobStyle};
pub use teacher::normalize_teacher_row;
pub use workbook::{open_sheet_rows, WorkbookError};

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const TEACHERS_SHEET: &str = "Teachers";
pub const STUDENTS_SHEET: &str = "Students";

/// A single spreadsheet cell, loosely typed the way the sheet stored it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// Text rendering used by header resolution. Integral numbers print without
    /// decimals so that a PIN typed as `9999` reads back as `"9999"`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Date(dt) => {
                if dt.time().num_seconds_from_midnight() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d.and_time(NaiveTime::default()))
    }
}

/// Serial of 9999-12-31, the last day spreadsheets can display.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Converts a spreadsheet serial day number (1900 date system) to a timestamp.
pub fn date_from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..MAX_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let days = serial.floor();
    let secs = ((serial - days) * 86_400.0).round() as i64;
    // Serials below 61 predate the phantom 1900-02-29 and are anchored one day later.
    let epoch = if days < 61.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(ChronoDuration::try_days(days as i64)?)?
        .checked_add_signed(ChronoDuration::try_seconds(secs)?)
}

/// One data row of a sheet: header text paired with the cell under it, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    line: usize,
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            cells: Vec::new(),
        }
    }

    pub fn from_pairs<H, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (H, V)>,
        H: Into<String>,
        V: Into<CellValue>,
    {
        let mut row = RawRow::new(0);
        for (h, v) in pairs {
            row.push(h, v);
        }
        row
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((header.into(), value.into()));
    }

    /// 1-based line number in the source sheet (0 when built by hand).
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrete: Option<String>,
}

impl TeacherRecord {
    /// Class labels this teacher posts to: `"{grade} {section}"` per section, or the bare grade.
    pub fn assigned(&self) -> Vec<AssignedClass> {
        let grade = self.grade.clone().unwrap_or_default();
        match self.sections.as_deref() {
            Some(sections) if !sections.is_empty() => sections
                .iter()
                .map(|s| AssignedClass {
                    grade: grade.clone(),
                    section: Some(s.clone()),
                })
                .collect(),
            _ if !grade.is_empty() => vec![AssignedClass {
                grade,
                section: None,
            }],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub roll_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dob: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedClass {
    pub grade: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl AssignedClass {
    pub fn label(&self) -> String {
        match self.section.as_deref() {
            Some(s) if !s.is_empty() => format!("{} {}", self.grade, s),
            _ => self.grade.clone(),
        }
    }
}

/// Why a row produced no record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowRejection {
    #[error("teacher id is required")]
    MissingId,
    #[error("pin is required")]
    MissingPin,
    #[error("roll number is required")]
    MissingRollNumber,
    #[error("date of birth is required")]
    MissingDob,
    #[error("date of birth '{0}' is not a recognizable date")]
    UnparseableDob(String),
    #[error("class is required")]
    MissingClass,
    #[error("section is required")]
    MissingSection,
}

impl RowRejection {
    pub fn code(&self) -> &'static str {
        match self {
            RowRejection::MissingId => "missing_id",
            RowRejection::MissingPin => "missing_pin",
            RowRejection::MissingRollNumber => "missing_roll_number",
            RowRejection::MissingDob => "missing_dob",
            RowRejection::UnparseableDob(_) => "unparseable_dob",
            RowRejection::MissingClass => "missing_class",
            RowRejection::MissingSection => "missing_section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    #[serde(rename = "reason")]
    pub code: &'static str,
    pub message: String,
}

impl RejectedRow {
    pub fn new(line: usize, reason: &RowRejection) -> Self {
        Self {
            line,
            code: reason.code(),
            message: reason.to_string(),
        }
    }
}

/// Outcome of one sheet import: what was accepted, and which lines were dropped and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport<T> {
    pub sheet_name: Option<String>,
    pub rows_total: usize,
    pub accepted: Vec<T>,
    pub rejected: Vec<RejectedRow>,
}

impl<T> ImportReport<T> {
    pub fn no_sheet() -> Self {
        Self {
            sheet_name: None,
            rows_total: 0,
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn sheet_found(&self) -> bool {
        self.sheet_name.is_some()
    }
}

/// Runs `normalize` over every row, splitting the results into accepted and rejected.
pub fn normalize_rows<T, I, F>(sheet_name: Option<String>, rows: I, normalize: F) -> ImportReport<T>
where
    I: IntoIterator<Item = RawRow>,
    F: Fn(&RawRow) -> Result<T, RowRejection>,
{
    let mut report = ImportReport {
        sheet_name,
        rows_total: 0,
        accepted: Vec::new(),
        rejected: Vec::new(),
    };
    for row in rows {
        report.rows_total += 1;
        match normalize(&row) {
            Ok(rec) => report.accepted.push(rec),
            Err(reason) => {
                tracing::debug!(line = row.line(), code = reason.code(), "roster row rejected");
                report.rejected.push(RejectedRow::new(row.line(), &reason));
            }
        }
    }
    report
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    pub teacher_sheet: String,
    pub student_sheet: String,
    pub dob_style: DobStyle,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            teacher_sheet: TEACHERS_SHEET.to_string(),
            student_sheet: STUDENTS_SHEET.to_string(),
            dob_style: DobStyle::default(),
        }
    }
}

/// Parses the teachers sheet of a workbook payload.
pub fn parse_teachers(
    bytes: &[u8],
    opts: &ImportOptions,
) -> Result<ImportReport<TeacherRecord>, WorkbookError> {
    let Some(rows) = open_sheet_rows(bytes, &opts.teacher_sheet)? else {
        return Ok(ImportReport::no_sheet());
    };
    let sheet_name = rows.sheet_name().to_string();
    Ok(normalize_rows(Some(sheet_name), rows, normalize_teacher_row))
}

/// Parses the students sheet of a workbook payload.
pub fn parse_students(
    bytes: &[u8],
    opts: &ImportOptions,
) -> Result<ImportReport<StudentRecord>, WorkbookError> {
    let Some(rows) = open_sheet_rows(bytes, &opts.student_sheet)? else {
        return Ok(ImportReport::no_sheet());
    };
    let sheet_name = rows.sheet_name().to_string();
    let style = opts.dob_style;
    Ok(normalize_rows(Some(sheet_name), rows, |r| {
        normalize_student_row_with(r, style)
    }))
}
