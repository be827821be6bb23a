use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use rusqlite::Connection;
use serde::Deserialize;

use crate::explain::Explainer;
use crate::session::{SessionEvent, SessionService};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: SessionService,
    /// Drained after every request; any event means the session is saved.
    pub session_events: Receiver<SessionEvent>,
    /// Unset without an API key; explain requests then report unavailable.
    pub explainer: Option<Explainer>,
}
