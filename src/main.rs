mod db;
mod explain;
mod gemini;
mod homework;
mod ipc;
mod roster;
mod session;

use std::io::{self, BufRead, Write};

use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // stdout carries the IPC stream, so logs go to stderr.
    let filter = EnvFilter::try_from_env("ASSIGNLYD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn init_explainer() -> Option<explain::Explainer> {
    match gemini::GeminiClient::from_env()? {
        Ok(client) => {
            tracing::info!("explanation model configured");
            Some(explain::Explainer::new(Box::new(client)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to build model client; explanations disabled");
            None
        }
    }
}

fn init_session() -> session::SessionService {
    let (transport, forwarded) = session::ChannelTransport::new();
    let spawned = std::thread::Builder::new()
        .name("session-events".into())
        .spawn(move || {
            for event in forwarded {
                tracing::debug!(?event, "session event");
            }
        });
    match spawned {
        Ok(_) => session::SessionService::new(Box::new(transport)),
        Err(e) => {
            tracing::warn!(error = %e, "session event thread unavailable");
            session::SessionService::default()
        }
    }
}

fn main() {
    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "assignlyd starting");

    let mut session = init_session();
    let session_events = session.subscribe();
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        session,
        session_events,
        explainer: init_explainer(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}
