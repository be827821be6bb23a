mod test_support;

use serde_json::json;
use test_support::{
    error_code, request_err, request_ok, select_workspace_as_admin, spawn_sidecar, temp_dir,
    write_students_with_serial_dob, write_workbook,
};

#[test]
fn teachers_sheet_imports_valid_rows_and_reports_rejected_lines() {
    let workspace = temp_dir("assignly-roster-teachers");
    let book = workspace.join("teachers.xlsx");
    write_workbook(
        &book,
        &[(
            "Teachers",
            vec![
                vec!["ID", "Name", "Class", "Section", "Pin"],
                vec!["T1", "Jane", "Grade 4", "A", "9999"],
                vec!["T2", "", "Grade 5", "", ""],
            ],
        )],
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.importTeachers",
        json!({ "path": book.to_string_lossy() }),
    );
    assert_eq!(res["sheetFound"], true);
    assert_eq!(res["sheetName"], "Teachers");
    assert_eq!(res["rowsTotal"], 2);
    assert_eq!(res["imported"], 1);
    assert_eq!(res["notice"], "Uploaded 1 teachers");
    assert_eq!(
        res["rejected"],
        json!([{ "line": 3, "reason": "missing_pin", "message": "pin is required" }])
    );

    let list = request_ok(&mut stdin, &mut reader, "2", "teachers.list", json!({}));
    assert_eq!(
        list["teachers"],
        json!([{ "id": "T1", "name": "Jane", "pin": "9999", "grade": "Grade 4", "sections": ["A"] }])
    );
}

#[test]
fn students_sheet_imports_with_shifted_dob() {
    let workspace = temp_dir("assignly-roster-students");
    let book = workspace.join("students.xlsx");
    write_workbook(
        &book,
        &[(
            "Students",
            vec![
                vec!["Roll No", "Name", "DOB", "Grade", "Section"],
                vec!["101", "Sam", "2010-01-01", "Grade 3", "B"],
                vec!["102", "Ria", "2010-02-02", "Grade 3", ""],
                vec!["", "Nobody", "2010-02-02", "Grade 3", "B"],
                vec!["103", "Kai", "whenever", "Grade 3", "B"],
            ],
        )],
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.importStudents",
        json!({ "path": book.to_string_lossy() }),
    );
    assert_eq!(res["imported"], 1);
    assert_eq!(res["notice"], "Uploaded 1 students");
    let reasons: Vec<(u64, String)> = res["rejected"]
        .as_array()
        .expect("rejected")
        .iter()
        .map(|r| {
            (
                r["line"].as_u64().expect("line"),
                r["reason"].as_str().expect("reason").to_string(),
            )
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            (3, "missing_section".to_string()),
            (4, "missing_roll_number".to_string()),
            (5, "unparseable_dob".to_string()),
        ]
    );

    let list = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(
        list["students"],
        json!([{
            "rollNumber": "101",
            "name": "Sam",
            "dob": "2010-01-02",
            "className": "Grade 3",
            "section": "B"
        }])
    );
    let classes = request_ok(&mut stdin, &mut reader, "3", "students.classes", json!({}));
    assert_eq!(classes["classes"], json!(["Grade 3"]));
}

#[test]
fn date_cells_are_read_as_dates() {
    let workspace = temp_dir("assignly-roster-serial-dob");
    let book = workspace.join("students.xlsx");
    // 42073 is 2015-03-10.
    write_students_with_serial_dob(&book, "7", 42073.0, "Grade 2", "C");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.previewStudents",
        json!({ "path": book.to_string_lossy() }),
    );
    assert_eq!(res["records"][0]["dob"], "2015-03-11");
    assert_eq!(res["imported"], 0);
}

#[test]
fn missing_sheet_is_flagged_not_failed() {
    let workspace = temp_dir("assignly-roster-no-sheet");
    let book = workspace.join("other.xlsx");
    write_workbook(&book, &[("Summary", vec![vec!["ID", "Pin"], vec!["T1", "1"]])]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.importTeachers",
        json!({ "path": book.to_string_lossy() }),
    );
    assert_eq!(res["sheetFound"], false);
    assert!(res.get("sheetName").is_none());
    assert_eq!(res["rowsTotal"], 0);
    assert_eq!(res["imported"], 0);
}

#[test]
fn sheet_name_matches_by_substring() {
    let workspace = temp_dir("assignly-roster-fuzzy");
    let book = workspace.join("teachers.xlsx");
    write_workbook(
        &book,
        &[
            ("Read Me", vec![vec!["notes"]]),
            ("2026 teachers", vec![vec!["Teacher ID", "PIN"], vec!["T9", "4321"]]),
        ],
    );
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.importTeachers",
        json!({ "path": book.to_string_lossy() }),
    );
    assert_eq!(res["sheetName"], "2026 teachers");
    assert_eq!(res["imported"], 1);
}

#[test]
fn replace_mode_clears_previous_roster() {
    let workspace = temp_dir("assignly-roster-replace");
    let first = workspace.join("first.xlsx");
    let second = workspace.join("second.xlsx");
    write_workbook(
        &first,
        &[("Teachers", vec![vec!["ID", "Pin"], vec!["T1", "1"], vec!["T2", "2"]])],
    );
    write_workbook(&second, &[("Teachers", vec![vec!["ID", "Pin"], vec!["T3", "3"]])]);
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace_as_admin(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "roster.importTeachers",
        json!({ "path": first.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.importTeachers",
        json!({ "path": second.to_string_lossy() }),
    );
    let list = request_ok(&mut stdin, &mut reader, "3", "teachers.list", json!({}));
    assert_eq!(list["teachers"].as_array().map(|a| a.len()), Some(3));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "roster.importTeachers",
        json!({ "path": second.to_string_lossy(), "mode": "replace" }),
    );
    let list = request_ok(&mut stdin, &mut reader, "5", "teachers.list", json!({}));
    assert_eq!(list["teachers"][0]["id"], "T3");
    assert_eq!(list["teachers"].as_array().map(|a| a.len()), Some(1));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "roster.importTeachers",
        json!({ "path": second.to_string_lossy(), "mode": "merge" }),
    );
    assert_eq!(error_code(&e), "bad_params");
}

#[test]
fn uploads_need_admin_and_a_readable_workbook() {
    let workspace = temp_dir("assignly-roster-guards");
    let garbage = workspace.join("garbage.xlsx");
    std::fs::write(&garbage, b"not a spreadsheet").expect("write garbage");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "roster.importStudents",
        json!({ "path": garbage.to_string_lossy() }),
    );
    assert_eq!(error_code(&e), "not_authorized");

    let _ = request_ok(&mut stdin, &mut reader, "3", "admin.setup", json!({ "password": "abcd" }));
    let _ = request_ok(&mut stdin, &mut reader, "4", "admin.login", json!({ "password": "abcd" }));
    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "roster.importStudents",
        json!({ "path": garbage.to_string_lossy() }),
    );
    assert_eq!(error_code(&e), "workbook_open_failed");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "roster.importStudents",
        json!({ "path": workspace.join("missing.xlsx").to_string_lossy() }),
    );
    assert_eq!(error_code(&e), "workbook_open_failed");
}
