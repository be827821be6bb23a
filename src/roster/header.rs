use std::collections::HashMap;

use super::{CellValue, RawRow};

/// Logical fields a roster sheet can carry, each with the header spellings seen in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    TeacherId,
    TeacherName,
    Pin,
    Grade,
    Section,
    Secrete,
    RollNumber,
    StudentName,
    Dob,
    ClassName,
}

impl CanonicalField {
    /// Aliases in priority order; the first one present in a row wins.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::TeacherId => &["ID", "Id", "id", "Teacher ID", "teacher id"],
            CanonicalField::TeacherName => &["Name", "name"],
            CanonicalField::Pin => &["PIN", "Pin", "pin"],
            CanonicalField::Grade => &["Class", "Classes", "class", "classes"],
            CanonicalField::Section => &[
                "Section",
                "Sections",
                "section",
                "sections",
                "Sec",
                "Sec.",
                "Section Name",
                "SectionName",
                "Class Section",
                "ClassSection",
            ],
            CanonicalField::Secrete => &[
                "Assigned ID",
                "assigned id",
                "assigned_id",
                "assignedId",
                "AssignedID",
                "secret",
                "secretId",
            ],
            CanonicalField::RollNumber => &[
                "Roll",
                "Roll No",
                "RollNo",
                "Roll Number",
                "RollNumber",
                "Student ID",
                "StudentId",
                "ID",
                "Id",
            ],
            CanonicalField::StudentName => &["Name", "Student Name", "Full Name", "name"],
            CanonicalField::Dob => &[
                "DOB",
                "Date of Birth",
                "DateOfBirth",
                "Birthdate",
                "DoB",
                "dob",
                "DOB (YYYY-MM-DD)",
            ],
            CanonicalField::ClassName => &["Class", "Class Name", "Grade", "class", "grade"],
        }
    }
}

/// Lower-cases and drops every whitespace character: `" R o l l N o "` -> `"rollno"`.
pub fn normalize_header(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A row's cells keyed by normalized header.
///
/// When two headers normalize to the same key the later column replaces the
/// earlier one, so column order decides precedence.
pub struct HeaderIndex<'a> {
    by_key: HashMap<String, &'a CellValue>,
}

impl<'a> HeaderIndex<'a> {
    pub fn new(row: &'a RawRow) -> Self {
        let mut by_key = HashMap::new();
        for (header, value) in row.cells() {
            by_key.insert(normalize_header(header), value);
        }
        Self { by_key }
    }

    /// Cell under the first alias whose normalized form is present, blank or not.
    pub fn cell(&self, aliases: &[&str]) -> Option<&'a CellValue> {
        aliases
            .iter()
            .find_map(|alias| self.by_key.get(&normalize_header(alias)).copied())
    }

    /// Trimmed text of [`HeaderIndex::cell`], or `""` when no alias matches. A
    /// present but blank header stops the search.
    pub fn resolve(&self, aliases: &[&str]) -> String {
        self.cell(aliases)
            .map(|v| v.as_text().trim().to_string())
            .unwrap_or_default()
    }

    pub fn field(&self, field: CanonicalField) -> String {
        self.resolve(field.aliases())
    }
}
