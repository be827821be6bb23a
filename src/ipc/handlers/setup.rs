use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{DobStyle, ImportOptions};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
    Admin,
    Homework,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Import, Self::Admin, Self::Homework];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            "admin" => Some(Self::Admin),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Admin => "admin",
            Self::Homework => "homework",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
            Self::Admin => "setup.admin",
            Self::Homework => "setup.homework",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => json!({
            "teacherSheet": crate::roster::TEACHERS_SHEET,
            "studentSheet": crate::roster::STUDENTS_SHEET,
            "dobDayOffset": 1,
            "defaultMode": "upsert"
        }),
        SetupSection::Admin => json!({
            "minPasswordLength": 4
        }),
        SetupSection::Homework => json!({
            "allowPastDueDates": false
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "teacherSheet" | "studentSheet" => {
                    let s = parse_string_max(v, k, 31)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "dobDayOffset" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 1)?));
                }
                "defaultMode" => {
                    let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                    if ImportMode::parse(&s).is_none() {
                        return Err("defaultMode must be one of: upsert, replace".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
            SetupSection::Admin => match k.as_str() {
                "minPasswordLength" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 4, 64)?));
                }
                _ => return Err(format!("unknown admin field: {}", k)),
            },
            SetupSection::Homework => match k.as_str() {
                "allowPastDueDates" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown homework field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(
    conn: &rusqlite::Connection,
    section: SetupSection,
) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// How an upload treats records already in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Upsert,
    Replace,
}

impl ImportMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upsert" => Some(Self::Upsert),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

pub fn import_options(conn: &rusqlite::Connection) -> anyhow::Result<ImportOptions> {
    let v = load_section(conn, SetupSection::Import)?;
    let defaults = ImportOptions::default();
    Ok(ImportOptions {
        teacher_sheet: v["teacherSheet"]
            .as_str()
            .map(str::to_string)
            .unwrap_or(defaults.teacher_sheet),
        student_sheet: v["studentSheet"]
            .as_str()
            .map(str::to_string)
            .unwrap_or(defaults.student_sheet),
        dob_style: DobStyle::from_day_offset(v["dobDayOffset"].as_i64().unwrap_or(1)),
    })
}

pub fn default_import_mode(conn: &rusqlite::Connection) -> anyhow::Result<ImportMode> {
    let v = load_section(conn, SetupSection::Import)?;
    Ok(v["defaultMode"]
        .as_str()
        .and_then(ImportMode::parse)
        .unwrap_or(ImportMode::Upsert))
}

pub fn admin_min_password_length(conn: &rusqlite::Connection) -> anyhow::Result<usize> {
    let v = load_section(conn, SetupSection::Admin)?;
    Ok(v["minPasswordLength"].as_u64().unwrap_or(4) as usize)
}

pub fn allow_past_due_dates(conn: &rusqlite::Connection) -> anyhow::Result<bool> {
    let v = load_section(conn, SetupSection::Homework)?;
    Ok(v["allowPastDueDates"].as_bool().unwrap_or(false))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn import_patch_validates_ranges_and_modes() {
        let mut cur = default_section(SetupSection::Import);
        merge_section_patch(
            SetupSection::Import,
            &mut cur,
            &patch(json!({ "dobDayOffset": 0, "defaultMode": "REPLACE" })),
        )
        .expect("valid patch");
        assert_eq!(cur["dobDayOffset"], 0);
        assert_eq!(cur["defaultMode"], "replace");

        let e = merge_section_patch(SetupSection::Import, &mut cur, &patch(json!({ "dobDayOffset": 2 })))
            .unwrap_err();
        assert!(e.contains("0..=1"), "{}", e);
        assert!(merge_section_patch(SetupSection::Import, &mut cur, &patch(json!({ "defaultMode": "merge" }))).is_err());
        assert!(merge_section_patch(SetupSection::Import, &mut cur, &patch(json!({ "teacherSheet": "  " }))).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected_per_section() {
        let mut cur = default_section(SetupSection::Admin);
        let e = merge_section_patch(SetupSection::Admin, &mut cur, &patch(json!({ "pin": 1 }))).unwrap_err();
        assert_eq!(e, "unknown admin field: pin");
    }
}
