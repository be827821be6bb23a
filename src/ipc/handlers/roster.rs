use crate::db;
use crate::ipc::error::ok;
use crate::ipc::handlers::setup::{self, ImportMode};
use crate::ipc::helpers::{optional_str, query_err, require_admin, require_db, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, ImportOptions, ImportReport, StudentRecord, TeacherRecord};
use rusqlite::Connection;
use serde_json::json;

#[derive(Clone, Copy)]
enum RosterKind {
    Teachers,
    Students,
}

impl RosterKind {
    fn noun(self) -> &'static str {
        match self {
            RosterKind::Teachers => "teachers",
            RosterKind::Students => "students",
        }
    }
}

fn read_payload(params: &serde_json::Value) -> Result<Vec<u8>, HandlerErr> {
    let path = required_str(params, "path")?;
    std::fs::read(&path).map_err(|e| {
        HandlerErr::new("workbook_open_failed", format!("failed to read {}: {}", path, e))
            .with_details(json!({ "path": path }))
    })
}

fn resolve_mode(conn: &Connection, params: &serde_json::Value) -> Result<ImportMode, HandlerErr> {
    match optional_str(params, "mode") {
        Some(raw) => ImportMode::parse(&raw)
            .ok_or_else(|| HandlerErr::new("bad_params", "mode must be one of: upsert, replace")),
        None => setup::default_import_mode(conn).map_err(query_err),
    }
}

fn report_json<T>(kind: RosterKind, report: &ImportReport<T>, imported: usize) -> serde_json::Value {
    let mut out = json!({
        "sheetFound": report.sheet_found(),
        "rowsTotal": report.rows_total,
        "imported": imported,
        "rejected": report.rejected,
        "notice": format!("Uploaded {} {}", imported, kind.noun()),
    });
    if let Some(name) = &report.sheet_name {
        out["sheetName"] = json!(name);
    }
    out
}

fn parse_teachers(bytes: &[u8], opts: &ImportOptions) -> Result<ImportReport<TeacherRecord>, HandlerErr> {
    roster::parse_teachers(bytes, opts).map_err(|e| HandlerErr::new("workbook_open_failed", e.to_string()))
}

fn parse_students(bytes: &[u8], opts: &ImportOptions) -> Result<ImportReport<StudentRecord>, HandlerErr> {
    roster::parse_students(bytes, opts).map_err(|e| HandlerErr::new("workbook_open_failed", e.to_string()))
}

fn import(state: &AppState, params: &serde_json::Value, kind: RosterKind) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state)?;
    let conn = require_db(state)?;
    let bytes = read_payload(params)?;
    let mode = resolve_mode(conn, params)?;
    let opts = setup::import_options(conn).map_err(query_err)?;
    let replace = mode == ImportMode::Replace;

    let out = match kind {
        RosterKind::Teachers => {
            let report = parse_teachers(&bytes, &opts)?;
            let imported = if report.accepted.is_empty() {
                0
            } else {
                db::upsert_teachers(conn, &report.accepted, replace).map_err(|e| {
                    tracing::warn!(error = %e, "teacher upload failed");
                    HandlerErr::new("db_tx_failed", e.to_string())
                })?
            };
            log_summary(kind, &report, imported);
            report_json(kind, &report, imported)
        }
        RosterKind::Students => {
            let report = parse_students(&bytes, &opts)?;
            let imported = if report.accepted.is_empty() {
                0
            } else {
                db::upsert_students(conn, &report.accepted, replace).map_err(|e| {
                    tracing::warn!(error = %e, "student upload failed");
                    HandlerErr::new("db_tx_failed", e.to_string())
                })?
            };
            log_summary(kind, &report, imported);
            report_json(kind, &report, imported)
        }
    };
    Ok(out)
}

fn log_summary<T>(kind: RosterKind, report: &ImportReport<T>, imported: usize) {
    tracing::info!(
        roster = kind.noun(),
        sheet = report.sheet_name.as_deref().unwrap_or("-"),
        rows = report.rows_total,
        imported,
        rejected = report.rejected.len(),
        "roster upload"
    );
}

fn preview(state: &AppState, params: &serde_json::Value, kind: RosterKind) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let bytes = read_payload(params)?;
    let opts = setup::import_options(conn).map_err(query_err)?;
    let out = match kind {
        RosterKind::Teachers => {
            let report = parse_teachers(&bytes, &opts)?;
            let mut out = report_json(kind, &report, 0);
            out["records"] = json!(report.accepted);
            out
        }
        RosterKind::Students => {
            let report = parse_students(&bytes, &opts)?;
            let mut out = report_json(kind, &report, 0);
            out["records"] = json!(report.accepted);
            out
        }
    };
    Ok(out)
}

fn teachers_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let teachers = db::list_teachers(conn).map_err(query_err)?;
    Ok(json!({ "teachers": teachers }))
}

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_name = optional_str(params, "className");
    let students = db::list_students(conn, class_name.as_deref()).map_err(query_err)?;
    Ok(json!({ "students": students }))
}

fn students_classes(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let classes = db::student_classes(conn).map_err(query_err)?;
    Ok(json!({ "classes": classes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.importTeachers" => import(state, &req.params, RosterKind::Teachers),
        "roster.importStudents" => import(state, &req.params, RosterKind::Students),
        "roster.previewTeachers" => preview(state, &req.params, RosterKind::Teachers),
        "roster.previewStudents" => preview(state, &req.params, RosterKind::Students),
        "teachers.list" => teachers_list(state),
        "students.list" => students_list(state, &req.params),
        "students.classes" => students_classes(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
