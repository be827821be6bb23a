use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::homework::{Homework, HomeworkStatus};
use crate::roster::{StudentRecord, TeacherRecord};

pub const DB_FILE: &str = "assignly.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            pin TEXT NOT NULL,
            grade TEXT,
            sections_json TEXT,
            secrete TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_secrete ON teachers(secrete)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            roll_number TEXT PRIMARY KEY,
            name TEXT,
            dob TEXT NOT NULL,
            class_name TEXT,
            section TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS homeworks(
            id TEXT PRIMARY KEY,
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            description TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            teacher TEXT,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_homeworks_due ON homeworks(due_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admin_secrets(
            secret_hash TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt settings value for {}", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

/// Writes every teacher whole, keyed by id. With `replace` the table is cleared first.
pub fn upsert_teachers(conn: &Connection, teachers: &[TeacherRecord], replace: bool) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    if replace {
        tx.execute("DELETE FROM teachers", [])?;
    }
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO teachers(id, name, pin, grade, sections_json, secrete)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        for t in teachers {
            let sections_json = match &t.sections {
                Some(s) => Some(serde_json::to_string(s)?),
                None => None,
            };
            stmt.execute((
                &t.id,
                &t.name,
                &t.pin,
                &t.grade,
                &sections_json,
                &t.secrete,
            ))?;
        }
    }
    tx.commit()?;
    Ok(teachers.len())
}

/// Writes every student whole, keyed by roll number. With `replace` the table is cleared first.
pub fn upsert_students(conn: &Connection, students: &[StudentRecord], replace: bool) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    if replace {
        tx.execute("DELETE FROM students", [])?;
    }
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO students(roll_number, name, dob, class_name, section)
             VALUES(?, ?, ?, ?, ?)",
        )?;
        for s in students {
            stmt.execute((&s.roll_number, &s.name, &s.dob, &s.class_name, &s.section))?;
        }
    }
    tx.commit()?;
    Ok(students.len())
}

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<TeacherRecord> {
    let sections_json: Option<String> = r.get(4)?;
    let sections = sections_json
        .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .filter(|v| !v.is_empty());
    Ok(TeacherRecord {
        id: r.get(0)?,
        name: r.get(1)?,
        pin: r.get(2)?,
        grade: r.get(3)?,
        sections,
        secrete: r.get(5)?,
    })
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    Ok(StudentRecord {
        roll_number: r.get(0)?,
        name: r.get(1)?,
        dob: r.get(2)?,
        class_name: r.get(3)?,
        section: r.get(4)?,
    })
}

pub fn list_teachers(conn: &Connection) -> anyhow::Result<Vec<TeacherRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, pin, grade, sections_json, secrete FROM teachers ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], teacher_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_teacher_by_secrete(
    conn: &Connection,
    pin: &str,
    secrete: &str,
) -> anyhow::Result<Option<TeacherRecord>> {
    let t = conn
        .query_row(
            "SELECT id, name, pin, grade, sections_json, secrete
             FROM teachers
             WHERE secrete = ? AND pin = ?
             ORDER BY id
             LIMIT 1",
            (secrete, pin),
            teacher_from_row,
        )
        .optional()?;
    Ok(t)
}

pub fn list_students(conn: &Connection, class_name: Option<&str>) -> anyhow::Result<Vec<StudentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT roll_number, name, dob, class_name, section
         FROM students
         WHERE (?1 IS NULL OR class_name = ?1)
         ORDER BY roll_number",
    )?;
    let rows = stmt
        .query_map([class_name], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Distinct class names across the student roster, sorted.
pub fn student_classes(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT class_name FROM students
         WHERE class_name IS NOT NULL AND class_name <> ''
         ORDER BY class_name",
    )?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_student_by_roll_and_dob(
    conn: &Connection,
    roll_number: &str,
    dob: &str,
) -> anyhow::Result<Option<StudentRecord>> {
    let s = conn
        .query_row(
            "SELECT roll_number, name, dob, class_name, section
             FROM students
             WHERE roll_number = ? AND dob = ?
             LIMIT 1",
            (roll_number, dob),
            student_from_row,
        )
        .optional()?;
    Ok(s)
}

fn homework_from_row(r: &Row<'_>) -> rusqlite::Result<Homework> {
    let status: String = r.get(5)?;
    Ok(Homework {
        id: r.get(0)?,
        class_name: r.get(1)?,
        subject: r.get(2)?,
        description: r.get(3)?,
        date: r.get(4)?,
        status: HomeworkStatus::parse(&status).unwrap_or(HomeworkStatus::Pending),
        notes: r.get(6)?,
        teacher: r.get(7)?,
    })
}

pub fn insert_homework(conn: &Connection, hw: &Homework) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO homeworks(id, class_name, subject, description, due_date, status, notes, teacher, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &hw.id,
            &hw.class_name,
            &hw.subject,
            &hw.description,
            &hw.date,
            hw.status.as_str(),
            &hw.notes,
            &hw.teacher,
            now_millis(),
        ),
    )?;
    Ok(())
}

/// Overwrites the mutable fields of an existing homework; returns false if the id is unknown.
pub fn update_homework(conn: &Connection, hw: &Homework) -> anyhow::Result<bool> {
    let n = conn.execute(
        "UPDATE homeworks
         SET class_name = ?, subject = ?, description = ?, due_date = ?, status = ?, notes = ?, teacher = ?
         WHERE id = ?",
        (
            &hw.class_name,
            &hw.subject,
            &hw.description,
            &hw.date,
            hw.status.as_str(),
            &hw.notes,
            &hw.teacher,
            &hw.id,
        ),
    )?;
    Ok(n > 0)
}

pub fn get_homework(conn: &Connection, id: &str) -> anyhow::Result<Option<Homework>> {
    let hw = conn
        .query_row(
            "SELECT id, class_name, subject, description, due_date, status, notes, teacher
             FROM homeworks WHERE id = ?",
            [id],
            homework_from_row,
        )
        .optional()?;
    Ok(hw)
}

/// All homework, latest due date first.
pub fn list_homeworks(conn: &Connection) -> anyhow::Result<Vec<Homework>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_name, subject, description, due_date, status, notes, teacher
         FROM homeworks
         ORDER BY due_date DESC, created_at DESC",
    )?;
    let rows = stmt
        .query_map([], homework_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

pub fn has_any_admin_secret(conn: &Connection) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM admin_secrets", [], |r| r.get(0))?;
    Ok(n > 0)
}

pub fn add_admin_secret(conn: &Connection, secret: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO admin_secrets(secret_hash, created_at) VALUES(?, ?)",
        (hash_secret(secret), now_millis()),
    )?;
    Ok(())
}

pub fn is_admin_secret(conn: &Connection, secret: &str) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM admin_secrets WHERE secret_hash = ?",
            [hash_secret(secret)],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}
