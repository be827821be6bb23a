use crate::db;
use crate::ipc::error::ok;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{optional_str, query_err, require_db, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::session::{SessionUser, Theme};
use serde_json::json;

fn is_roll_number(s: &str) -> bool {
    (1..=10).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

fn session_get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(state.session.snapshot())
}

fn teacher_login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let secrete = optional_str(params, "secrete").unwrap_or_default();
    let secrete = secrete.trim();
    if secrete.is_empty() {
        return Err(HandlerErr::new("bad_params", "Please enter Secrete."));
    }
    let pin = optional_str(params, "pin").unwrap_or_default();

    let Some(teacher) = db::find_teacher_by_secrete(conn, &pin, secrete).map_err(query_err)? else {
        return Err(HandlerErr::new("invalid_credentials", "Invalid Secrete."));
    };

    let user = SessionUser::teacher(&teacher);
    tracing::info!(teacher_id = %teacher.id, "teacher signed in");
    state.session.set_user(Some(user.clone()));
    Ok(json!({ "user": user }))
}

fn student_login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let roll = optional_str(params, "rollNumber").unwrap_or_default();
    if !is_roll_number(&roll) {
        return Err(HandlerErr::new(
            "bad_params",
            "Please enter a valid numeric roll number (up to 10 digits).",
        ));
    }
    let dob = optional_str(params, "dob").unwrap_or_default();
    if dob.trim().is_empty() {
        return Err(HandlerErr::new("bad_params", "Please select your date of birth."));
    }

    let Some(student) = db::find_student_by_roll_and_dob(conn, &roll, dob.trim()).map_err(query_err)? else {
        return Err(HandlerErr::new("invalid_credentials", "Invalid roll number or DOB."));
    };

    let user = SessionUser::student(&student);
    tracing::info!(roll_number = %student.roll_number, "student signed in");
    state.session.set_user(Some(user.clone()));
    Ok(json!({ "user": user }))
}

fn logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.session.set_user(None);
    Ok(json!({ "ok": true }))
}

fn admin_status(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let configured = db::has_any_admin_secret(conn).map_err(query_err)?;
    Ok(json!({
        "configured": configured,
        "authed": state.session.admin_authed(),
    }))
}

fn admin_setup(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let password = optional_str(params, "password").unwrap_or_default();
    if password.trim().is_empty() {
        return Err(HandlerErr::new("bad_params", "Please enter an admin password"));
    }
    let min_len = setup::admin_min_password_length(conn).map_err(query_err)?;
    if password.chars().count() < min_len {
        return Err(HandlerErr::new(
            "bad_params",
            format!("Admin password must be at least {} characters long", min_len),
        ));
    }
    if db::has_any_admin_secret(conn).map_err(query_err)? {
        return Err(HandlerErr::new("already_configured", "an admin password is already set"));
    }
    db::add_admin_secret(conn, password.trim())
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    tracing::info!("admin password configured");
    Ok(json!({ "configured": true }))
}

fn admin_login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let password = required_str(params, "password")?;
    if !db::is_admin_secret(conn, &password).map_err(query_err)? {
        return Err(HandlerErr::new("invalid_credentials", "Invalid admin secrete"));
    }
    state.session.set_admin_authed(true);
    Ok(json!({ "authed": true }))
}

fn admin_logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.session.set_admin_authed(false);
    Ok(json!({ "authed": false }))
}

fn theme_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw = required_str(params, "theme")?;
    let Some(theme) = Theme::parse(&raw) else {
        return Err(HandlerErr::new("bad_params", "theme must be one of: light, dark"));
    };
    state.session.set_theme(theme);
    Ok(json!({ "theme": theme }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.get" => session_get(state),
        "auth.teacherLogin" => teacher_login(state, &req.params),
        "auth.studentLogin" => student_login(state, &req.params),
        "auth.logout" => logout(state),
        "admin.status" => admin_status(state),
        "admin.setup" => admin_setup(state, &req.params),
        "admin.login" => admin_login(state, &req.params),
        "admin.logout" => admin_logout(state),
        "theme.set" => theme_set(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
