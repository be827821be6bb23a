use super::header::{CanonicalField, HeaderIndex};
use super::{RawRow, RowRejection, TeacherRecord};

/// Splits a raw sections cell on commas and semicolons, dropping blank tokens.
pub fn split_sections(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Builds a teacher from one sheet row. `id` and `pin` are the only hard requirements.
pub fn normalize_teacher_row(row: &RawRow) -> Result<TeacherRecord, RowRejection> {
    let idx = HeaderIndex::new(row);
    let id = idx.field(CanonicalField::TeacherId);
    let name = idx.field(CanonicalField::TeacherName);
    let pin = idx.field(CanonicalField::Pin);
    let class_raw = idx.field(CanonicalField::Grade);
    let section_raw = idx.field(CanonicalField::Section);
    let secrete = idx.field(CanonicalField::Secrete);

    if id.is_empty() {
        return Err(RowRejection::MissingId);
    }
    if pin.is_empty() {
        return Err(RowRejection::MissingPin);
    }

    let sections = split_sections(&section_raw);
    Ok(TeacherRecord {
        name: if name.is_empty() { id.clone() } else { name },
        id,
        pin,
        grade: non_empty(class_raw),
        sections: if sections.is_empty() {
            None
        } else {
            Some(sections)
        },
        secrete: non_empty(secrete),
    })
}
