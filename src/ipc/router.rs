use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use crate::ipc::helpers::persist_session;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);
    if state.session_events.try_iter().count() > 0 {
        persist_session(state);
    }
    resp
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::roster::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::homework::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
