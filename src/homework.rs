use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roster::AssignedClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeworkStatus {
    Pending,
    Completed,
}

impl HomeworkStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub id: String,
    pub class_name: String,
    pub subject: String,
    pub description: String,
    /// Due date, `YYYY-MM-DD`.
    pub date: String,
    pub status: HomeworkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
}

/// Fields a teacher fills in when posting homework.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkDraft {
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial edit of an existing homework; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkPatch {
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HomeworkError {
    #[error("Please fill all required fields.")]
    MissingFields,
    #[error("Due date must be a YYYY-MM-DD date.")]
    BadDate,
    #[error("Due date cannot be in the past.")]
    PastDueDate,
    #[error("No changes detected.")]
    NoChanges,
}

impl HomeworkError {
    pub fn code(&self) -> &'static str {
        match self {
            HomeworkError::NoChanges => "no_changes",
            _ => "bad_params",
        }
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl HomeworkDraft {
    fn trimmed(&self) -> HomeworkDraft {
        HomeworkDraft {
            class_name: self.class_name.trim().to_string(),
            subject: self.subject.trim().to_string(),
            description: self.description.trim().to_string(),
            date: self.date.trim().to_string(),
            notes: self
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Required fields first, then the due date itself.
    pub fn validate(&self, today: NaiveDate, allow_past: bool) -> Result<(), HomeworkError> {
        if self.class_name.trim().is_empty()
            || self.subject.trim().is_empty()
            || self.description.trim().is_empty()
            || self.date.trim().is_empty()
        {
            return Err(HomeworkError::MissingFields);
        }
        let due = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| HomeworkError::BadDate)?;
        if !allow_past && due < today {
            return Err(HomeworkError::PastDueDate);
        }
        Ok(())
    }
}

/// Validates `draft` and builds a fresh pending homework with a new id.
pub fn create_homework(
    draft: &HomeworkDraft,
    teacher: Option<String>,
    today: NaiveDate,
    allow_past: bool,
) -> Result<Homework, HomeworkError> {
    draft.validate(today, allow_past)?;
    let d = draft.trimmed();
    Ok(Homework {
        id: Uuid::new_v4().to_string(),
        class_name: d.class_name,
        subject: d.subject,
        description: d.description,
        date: d.date,
        status: HomeworkStatus::Pending,
        notes: d.notes,
        teacher,
    })
}

/// Merges `patch` onto `existing`. The editing teacher's name replaces the stored one
/// when known. A patch that leaves every field as it was is refused.
pub fn apply_patch(
    existing: &Homework,
    patch: &HomeworkPatch,
    teacher: Option<&str>,
    today: NaiveDate,
    allow_past: bool,
) -> Result<Homework, HomeworkError> {
    let merged = HomeworkDraft {
        class_name: patch.class_name.clone().unwrap_or_else(|| existing.class_name.clone()),
        subject: patch.subject.clone().unwrap_or_else(|| existing.subject.clone()),
        description: patch
            .description
            .clone()
            .unwrap_or_else(|| existing.description.clone()),
        date: patch.date.clone().unwrap_or_else(|| existing.date.clone()),
        notes: patch.notes.clone().or_else(|| existing.notes.clone()),
    };
    merged.validate(today, allow_past)?;
    let d = merged.trimmed();

    if d.class_name == existing.class_name
        && d.subject == existing.subject
        && d.description == existing.description
        && d.date == existing.date
        && d.notes == existing.notes
    {
        return Err(HomeworkError::NoChanges);
    }

    Ok(Homework {
        id: existing.id.clone(),
        class_name: d.class_name,
        subject: d.subject,
        description: d.description,
        date: d.date,
        status: existing.status,
        notes: d.notes,
        teacher: teacher.map(str::to_string).or_else(|| existing.teacher.clone()),
    })
}

/// Keeps only homework posted to one of the assigned classes. An empty assignment
/// list means no restriction.
pub fn filter_for_assigned(homeworks: Vec<Homework>, assigned: &[AssignedClass]) -> Vec<Homework> {
    if assigned.is_empty() {
        return homeworks;
    }
    let labels: Vec<String> = assigned.iter().map(AssignedClass::label).collect();
    homeworks
        .into_iter()
        .filter(|h| labels.iter().any(|l| *l == h.class_name))
        .collect()
}
