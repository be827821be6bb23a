use chrono::{Datelike, NaiveDate};

use super::header::{CanonicalField, HeaderIndex};
use super::{date_from_serial, CellValue, RawRow, RowRejection, StudentRecord};

/// How a parsed date of birth is written back out.
///
/// Stored rosters were produced by a formatter that printed the day of month
/// plus one (zero-padded, no month roll-over). `LegacyPlusOneDay` reproduces that
/// so re-uploads keep matching existing logins; `Exact` writes the real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DobStyle {
    #[default]
    LegacyPlusOneDay,
    Exact,
}

impl DobStyle {
    pub fn from_day_offset(offset: i64) -> Self {
        if offset == 0 {
            DobStyle::Exact
        } else {
            DobStyle::LegacyPlusOneDay
        }
    }

    pub fn day_offset(self) -> u32 {
        match self {
            DobStyle::LegacyPlusOneDay => 1,
            DobStyle::Exact => 0,
        }
    }
}

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

const TEXT_DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

fn parse_text_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    for fmt in TEXT_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d);
        }
    }

    // ISO timestamps: "2015-03-10T00:00:00.000Z", "2015-03-10 08:30".
    if let Some(prefix) = t.get(..10) {
        if t.len() > 10 && matches!(t.as_bytes()[10], b'T' | b' ') {
            if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }

    // Stringified JS dates: "Tue Mar 10 2015 00:00:00 GMT+0530 (India Standard Time)".
    let mut tokens: Vec<&str> = t.split_whitespace().collect();
    if let Some(first) = tokens.first() {
        let lower = first.trim_end_matches(',').to_ascii_lowercase();
        if lower.len() >= 3
            && lower.chars().all(|c| c.is_ascii_alphabetic())
            && WEEKDAYS.contains(&&lower[..3])
        {
            tokens.remove(0);
        }
    }
    if tokens.len() < 3 {
        return None;
    }
    let head = tokens[..3].join(" ");
    ["%b %d %Y", "%b %d, %Y", "%B %d %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&head, fmt).ok())
}

/// Reads a date of birth from a date cell, a serial number, or common text layouts.
pub fn parse_dob(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Number(n) => date_from_serial(*n).map(|dt| dt.date()),
        CellValue::Text(s) => parse_text_date(s),
    }
}

pub fn format_dob(date: NaiveDate, style: DobStyle) -> String {
    format!(
        "{}-{:02}-{:02}",
        date.year(),
        date.month(),
        date.day() + style.day_offset()
    )
}

/// Splits the raw class/section pair into `(className, section)`.
///
/// The section is the first token of the section cell. With no token there, a
/// trailing single letter of the class cell is taken instead: `"Grade 4 A"` gives
/// `("Grade 4", "A")`.
pub fn derive_class_and_section(class_raw: &str, section_raw: &str) -> (Option<String>, Option<String>) {
    let token = section_raw
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '|' | '/'))
        .find(|t| !t.is_empty());
    let class_name = if class_raw.is_empty() {
        None
    } else {
        Some(class_raw.to_string())
    };
    if let Some(tok) = token {
        return (class_name, Some(tok.to_string()));
    }
    if class_raw.is_empty() {
        return (None, None);
    }

    let (base, letter) = split_trailing_letter(class_raw);
    let base = base.trim();
    let class_name = if base.is_empty() { class_raw } else { base };
    (Some(class_name.to_string()), letter.map(|c| c.to_string()))
}

/// `"Grade 4 A"` -> `("Grade 4", Some('A'))`; anything else is returned whole.
fn split_trailing_letter(s: &str) -> (&str, Option<char>) {
    let mut rev = s.char_indices().rev();
    let Some((last_idx, last)) = rev.next() else {
        return (s, None);
    };
    if !last.is_ascii_alphabetic() {
        return (s, None);
    }
    match rev.next() {
        Some((_, prev)) if prev.is_whitespace() => {
            let head = s[..last_idx].trim_end();
            (head, Some(last))
        }
        _ => (s, None),
    }
}

/// Builds a student from one sheet row. Roll number, date of birth, class and
/// section must all be present.
pub fn normalize_student_row_with(row: &RawRow, style: DobStyle) -> Result<StudentRecord, RowRejection> {
    let idx = HeaderIndex::new(row);

    let roll_number = idx.field(CanonicalField::RollNumber);
    if roll_number.is_empty() {
        return Err(RowRejection::MissingRollNumber);
    }
    let name = idx.field(CanonicalField::StudentName);

    let dob_cell = idx.cell(CanonicalField::Dob.aliases());
    let dob_text = idx.field(CanonicalField::Dob);
    if dob_text.is_empty() {
        return Err(RowRejection::MissingDob);
    }
    let Some(dob) = dob_cell.and_then(parse_dob) else {
        return Err(RowRejection::UnparseableDob(dob_text));
    };

    let class_raw = idx.field(CanonicalField::ClassName);
    let section_raw = idx.field(CanonicalField::Section);
    if class_raw.is_empty() {
        return Err(RowRejection::MissingClass);
    }
    if section_raw.is_empty() {
        return Err(RowRejection::MissingSection);
    }

    let (class_name, section) = derive_class_and_section(&class_raw, &section_raw);
    Ok(StudentRecord {
        roll_number,
        name: if name.is_empty() { None } else { Some(name) },
        dob: format_dob(dob, style),
        class_name,
        section,
    })
}
