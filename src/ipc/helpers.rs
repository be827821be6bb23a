use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::AppState;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_admin(state: &AppState) -> Result<(), HandlerErr> {
    if state.session.admin_authed() {
        Ok(())
    } else {
        Err(HandlerErr::new("not_authorized", "admin login required"))
    }
}

pub fn query_err(e: impl std::fmt::Display) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

/// Writes the session back to the workspace; failures are logged, not surfaced.
pub fn persist_session(state: &AppState) {
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = state.session.save(conn) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }
}
