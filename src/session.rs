//! Who is signed in, whether the admin panel is unlocked, and the UI theme.
//!
//! Every change is broadcast as a [`SessionEvent`] to in-process subscribers and to the
//! configured [`SessionTransport`], and mirrored into the workspace settings table so a
//! reopened workspace comes back in the same state.

use std::sync::mpsc::{channel, Receiver, Sender};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::roster::{AssignedClass, StudentRecord, TeacherRecord};

const KEY_USER: &str = "session.user";
const KEY_THEME: &str = "session.theme";
const KEY_ADMIN: &str = "session.adminAuthed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    // Older saves used "parent" for the same role.
    #[serde(alias = "parent")]
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned: Option<Vec<AssignedClass>>,
}

impl SessionUser {
    pub fn teacher(t: &TeacherRecord) -> Self {
        Self {
            role: Role::Teacher,
            name: Some(t.name.clone()),
            roll_number: None,
            dob: None,
            teacher_id: Some(t.id.clone()),
            assigned: Some(t.assigned()),
        }
    }

    pub fn student(s: &StudentRecord) -> Self {
        Self {
            role: Role::Student,
            name: s.name.clone(),
            roll_number: Some(s.roll_number.clone()),
            dob: Some(s.dob.clone()),
            teacher_id: None,
            assigned: None,
        }
    }

    pub fn assigned(&self) -> &[AssignedClass] {
        self.assigned.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SessionEvent {
    UserChanged(Option<SessionUser>),
    AdminAuthChanged(bool),
    ThemeChanged(Theme),
}

/// Where session events go besides local subscribers.
pub trait SessionTransport: Send {
    fn publish(&self, event: &SessionEvent);
}

pub struct NullTransport;

impl SessionTransport for NullTransport {
    fn publish(&self, _event: &SessionEvent) {}
}

/// Forwards events over an in-process channel.
pub struct ChannelTransport {
    tx: Sender<SessionEvent>,
}

impl ChannelTransport {
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }
}

impl SessionTransport for ChannelTransport {
    fn publish(&self, event: &SessionEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("session transport receiver dropped");
        }
    }
}

pub struct SessionService {
    user: Option<SessionUser>,
    admin_authed: bool,
    theme: Theme,
    subscribers: Vec<Sender<SessionEvent>>,
    transport: Box<dyn SessionTransport>,
}

impl Default for SessionService {
    fn default() -> Self {
        Self::new(Box::new(NullTransport))
    }
}

impl SessionService {
    pub fn new(transport: Box<dyn SessionTransport>) -> Self {
        Self {
            user: None,
            admin_authed: false,
            theme: Theme::default(),
            subscribers: Vec::new(),
            transport,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.transport.publish(&event);
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn admin_authed(&self) -> bool {
        self.admin_authed
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_user(&mut self, user: Option<SessionUser>) {
        self.user = user.clone();
        self.emit(SessionEvent::UserChanged(user));
    }

    pub fn set_admin_authed(&mut self, authed: bool) {
        self.admin_authed = authed;
        self.emit(SessionEvent::AdminAuthChanged(authed));
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.emit(SessionEvent::ThemeChanged(theme));
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "user": self.user,
            "adminAuthed": self.admin_authed,
            "theme": self.theme(),
        })
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        match &self.user {
            Some(u) => db::settings_set_json(conn, KEY_USER, &serde_json::to_value(u)?)?,
            None => db::settings_delete(conn, KEY_USER)?,
        }
        db::settings_set_json(conn, KEY_THEME, &serde_json::to_value(self.theme)?)?;
        db::settings_set_json(conn, KEY_ADMIN, &serde_json::Value::Bool(self.admin_authed))?;
        Ok(())
    }

    /// Replaces the whole session with the one saved in a workspace. Keys that are
    /// missing or unreadable come back as their defaults, so nothing carries over
    /// from the previously selected workspace.
    pub fn restore(&mut self, conn: &Connection) {
        let user = read_saved::<SessionUser>(conn, KEY_USER);
        let admin = read_saved::<bool>(conn, KEY_ADMIN).unwrap_or(false);
        let theme = read_saved::<Theme>(conn, KEY_THEME).unwrap_or_default();

        self.set_user(user);
        self.set_admin_authed(admin);
        self.set_theme(theme);
    }
}

fn read_saved<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> Option<T> {
    let value = match db::settings_get_json(conn, key) {
        Ok(v) => v?,
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable saved session value");
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable saved session value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher() -> TeacherRecord {
        TeacherRecord {
            id: "T1".into(),
            name: "Jane".into(),
            pin: "1234".into(),
            grade: Some("Grade 4".into()),
            sections: Some(vec!["A".into()]),
            secrete: Some("s1".into()),
        }
    }

    #[test]
    fn subscribers_and_transport_see_every_change() {
        let (transport, forwarded) = ChannelTransport::new();
        let mut svc = SessionService::new(Box::new(transport));
        let rx = svc.subscribe();

        svc.set_user(Some(SessionUser::teacher(&teacher())));
        svc.set_theme(Theme::Dark);
        svc.set_admin_authed(true);

        let local: Vec<SessionEvent> = rx.try_iter().collect();
        let remote: Vec<SessionEvent> = forwarded.try_iter().collect();
        assert_eq!(local.len(), 3);
        assert_eq!(local, remote);
        assert_eq!(local[1], SessionEvent::ThemeChanged(Theme::Dark));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut svc = SessionService::default();
        let rx = svc.subscribe();
        drop(rx);
        let live = svc.subscribe();
        svc.set_admin_authed(true);
        assert_eq!(svc.subscribers.len(), 1);
        assert_eq!(live.try_recv().ok(), Some(SessionEvent::AdminAuthChanged(true)));
    }

    #[test]
    fn teacher_user_carries_assigned_classes() {
        let u = SessionUser::teacher(&teacher());
        assert_eq!(u.role, Role::Teacher);
        assert_eq!(u.assigned()[0].label(), "Grade 4 A");
    }

    #[test]
    fn parent_role_reads_back_as_student() {
        let u: SessionUser =
            serde_json::from_value(serde_json::json!({ "role": "parent", "rollNumber": "7" }))
                .expect("user");
        assert_eq!(u.role, Role::Student);
        assert_eq!(serde_json::to_value(&u).expect("json")["role"], "student");
    }

    #[test]
    fn save_and_restore_roundtrip_through_settings() {
        let dir = std::env::temp_dir().join(format!("assignlyd-session-{}", uuid::Uuid::new_v4()));
        let conn = db::open_db(&dir).expect("db");

        let mut svc = SessionService::default();
        svc.set_user(Some(SessionUser::teacher(&teacher())));
        svc.set_theme(Theme::Dark);
        svc.save(&conn).expect("save");

        let mut fresh = SessionService::default();
        let rx = fresh.subscribe();
        fresh.restore(&conn);
        assert_eq!(fresh.user(), svc.user());
        assert_eq!(fresh.theme(), Theme::Dark);
        assert!(!fresh.admin_authed());
        assert_eq!(rx.try_iter().count(), 3);

        drop(conn);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_saved_values_reset_to_defaults() {
        let dir = std::env::temp_dir().join(format!("assignlyd-session-{}", uuid::Uuid::new_v4()));
        let conn = db::open_db(&dir).expect("db");
        conn.execute(
            "INSERT INTO settings(key, value_json) VALUES('session.user', 'not json'), ('session.theme', '\"sepia\"')",
            [],
        )
        .expect("seed corrupt values");

        let mut svc = SessionService::default();
        svc.set_user(Some(SessionUser::teacher(&teacher())));
        svc.set_admin_authed(true);
        svc.set_theme(Theme::Dark);

        svc.restore(&conn);
        assert_eq!(svc.user(), None);
        assert!(!svc.admin_authed());
        assert_eq!(svc.theme(), Theme::Light);

        drop(conn);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
