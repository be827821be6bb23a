#![allow(dead_code)]

use rust_xlsxwriter::{Format, Workbook};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(vars: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_assignlyd");
    let mut child = Command::new(exe)
        .env_remove("ASSIGNLYD_GEMINI_API_KEY")
        .envs(vars.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn assignlyd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Sends a request that must fail and returns its `error` object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

/// Writes an xlsx with one sheet per entry; the first row of each is the header row.
/// Empty strings leave the cell unwritten.
pub fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).expect("sheet name");
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                sheet
                    .write_string(r as u32, c as u16, *text)
                    .expect("write cell");
            }
        }
    }
    workbook.save(path).expect("save workbook");
}

/// Writes a date-formatted serial cell (what a spreadsheet app stores for a typed date).
pub fn write_students_with_serial_dob(path: &Path, roll: &str, serial: f64, class_name: &str, section: &str) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Students").expect("sheet name");
    for (c, h) in ["Roll No", "DOB", "Class", "Section"].iter().enumerate() {
        sheet.write_string(0, c as u16, *h).expect("header");
    }
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    sheet.write_string(1, 0, roll).expect("roll");
    sheet
        .write_number_with_format(1, 1, serial, &date_format)
        .expect("dob");
    sheet.write_string(1, 2, class_name).expect("class");
    sheet.write_string(1, 3, section).expect("section");
    workbook.save(path).expect("save workbook");
}

/// Opens `workspace`, configures an admin password and signs in as admin.
pub fn select_workspace_as_admin(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(stdin, reader, "adm-setup", "admin.setup", json!({ "password": "letmein" }));
    let _ = request_ok(stdin, reader, "adm-login", "admin.login", json!({ "password": "letmein" }));
}
