use crate::db;
use crate::explain::build_prompt;
use crate::homework::{self, Homework, HomeworkDraft, HomeworkError, HomeworkPatch, HomeworkStatus};
use crate::ipc::error::ok;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{query_err, require_db, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::{Role, SessionUser};
use rusqlite::Connection;
use serde_json::json;

impl From<HomeworkError> for HandlerErr {
    fn from(e: HomeworkError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

fn require_teacher(state: &AppState) -> Result<&SessionUser, HandlerErr> {
    match state.session.user() {
        Some(u) if u.role == Role::Teacher => Ok(u),
        _ => Err(HandlerErr::new("not_authorized", "teacher login required")),
    }
}

fn load_homework(conn: &Connection, id: &str) -> Result<Homework, HandlerErr> {
    db::get_homework(conn, id)
        .map_err(query_err)?
        .ok_or_else(|| HandlerErr::new("not_found", "homework not found").with_details(json!({ "id": id })))
}

fn create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let teacher = require_teacher(state)?;
    let draft: HomeworkDraft = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    let allow_past = setup::allow_past_due_dates(conn).map_err(query_err)?;

    let hw = homework::create_homework(&draft, teacher.name.clone(), homework::today(), allow_past)?;
    db::insert_homework(conn, &hw).map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    tracing::info!(id = %hw.id, class_name = %hw.class_name, "homework posted");
    Ok(json!({ "homework": hw }))
}

fn update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let teacher = require_teacher(state)?;
    let id = required_str(params, "id")?;
    let Some(patch_raw) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::new("bad_params", "patch must be an object"));
    };
    let patch: HomeworkPatch = serde_json::from_value(patch_raw.clone())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    let existing = load_homework(conn, &id)?;
    let allow_past = setup::allow_past_due_dates(conn).map_err(query_err)?;

    let updated = homework::apply_patch(
        &existing,
        &patch,
        teacher.name.as_deref(),
        homework::today(),
        allow_past,
    )?;
    db::update_homework(conn, &updated).map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "homework": updated }))
}

fn set_status(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    if state.session.user().is_none() {
        return Err(HandlerErr::new("not_authorized", "login required"));
    }
    let id = required_str(params, "id")?;
    let raw = required_str(params, "status")?;
    let Some(status) = HomeworkStatus::parse(&raw) else {
        return Err(HandlerErr::new("bad_params", "status must be one of: pending, completed"));
    };
    let mut hw = load_homework(conn, &id)?;
    hw.status = status;
    db::update_homework(conn, &hw).map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "homework": hw }))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let all = params.get("all").and_then(|v| v.as_bool()).unwrap_or(false);
    let mut homeworks = db::list_homeworks(conn).map_err(query_err)?;
    if !all {
        if let Some(user) = state.session.user() {
            homeworks = homework::filter_for_assigned(homeworks, user.assigned());
        }
    }
    Ok(json!({ "homeworks": homeworks }))
}

fn explain_prompt(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = required_str(params, "id")?;
    let hw = load_homework(conn, &id)?;
    Ok(json!({ "prompt": build_prompt(&hw) }))
}

fn explain(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let id = required_str(params, "id")?;
    let hw = load_homework(conn, &id)?;

    let Some(explainer) = state.explainer.as_mut() else {
        return Err(HandlerErr::new("explainer_unavailable", "no explanation model is configured")
            .with_details(json!({ "prompt": build_prompt(&hw) })));
    };
    let explanation = explainer.explain(&hw).map_err(|e| {
        tracing::warn!(error = %e, id = %hw.id, "explanation failed");
        HandlerErr::new("explain_failed", e.to_string())
    })?;
    Ok(json!({ "model": explanation.model, "text": explanation.text }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "homeworks.create" => create(state, &req.params),
        "homeworks.update" => update(state, &req.params),
        "homeworks.setStatus" => set_status(state, &req.params),
        "homeworks.list" => list(state, &req.params),
        "homeworks.explainPrompt" => explain_prompt(state, &req.params),
        "homeworks.explain" => explain(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
