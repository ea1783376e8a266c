use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn marksheet_params(sort_mode: &str) -> serde_json::Value {
    json!({
        "courseType": "theory",
        "sortMode": sort_mode,
        "students": [
            { "id": "s10", "roll": "10", "name": "Karim" },
            { "id": "s2", "roll": "2", "name": "Rahim" },
            { "id": "s1", "roll": "1", "name": "Salma" },
        ],
        "assessments": [
            { "id": "fin", "name": "Final", "fullMarks": 40, "order": 2 },
            { "id": "mid", "name": "Midterm", "fullMarks": 30, "order": 1 },
            { "id": "att", "name": "Attendance", "fullMarks": 5, "order": 3 },
        ],
        "marks": [
            { "studentId": "s1", "assessmentId": "mid", "obtainedMarks": 30 },
            { "studentId": "s1", "assessmentId": "fin", "obtainedMarks": 40 },
            { "studentId": "s2", "assessmentId": "mid", "obtainedMarks": 15 },
        ],
        "attendanceSummary": [
            { "studentId": "s1", "totalClasses": 40, "attendedClasses": 37 },
            { "studentId": "s2", "totalClasses": 40, "attendedClasses": 20 },
        ],
    })
}

#[test]
fn marksheet_rows_sort_by_numeric_roll() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let asc = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.marksheetModel",
        marksheet_params("roll-asc"),
    );
    let rolls: Vec<&str> = asc["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["roll"].as_str().expect("roll"))
        .collect();
    assert_eq!(rolls, vec!["1", "2", "10"]);

    let desc = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.marksheetModel",
        marksheet_params("roll-desc"),
    );
    let rolls: Vec<&str> = desc["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["roll"].as_str().expect("roll"))
        .collect();
    assert_eq!(rolls, vec!["10", "2", "1"]);

    let entered = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.marksheetModel",
        marksheet_params("entered"),
    );
    let rolls: Vec<&str> = entered["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["roll"].as_str().expect("roll"))
        .collect();
    assert_eq!(rolls, vec!["10", "2", "1"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn marksheet_columns_and_cells_are_export_ready() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.marksheetModel",
        marksheet_params("roll-asc"),
    );

    // Columns follow the order field, not the request order.
    let labels: Vec<&str> = model["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .map(|c| c["label"].as_str().expect("label"))
        .collect();
    assert_eq!(labels, vec!["Midterm (30)", "Final (40)", "Attendance (5)"]);

    let first = &model["rows"][0];
    assert_eq!(first["roll"].as_str(), Some("1"));
    assert_eq!(first["cells"][0].as_f64(), Some(30.0));
    assert_eq!(first["cells"][1].as_f64(), Some(40.0));
    // Attendance mirrors the summary-derived marks (92.5% -> 5), it is not
    // an entered mark.
    assert_eq!(first["cells"][2].as_f64(), Some(5.0));
    assert_eq!(first["total"].as_f64(), Some(75.0));
    assert_eq!(first["grade"].as_str(), Some("A"));

    let second = &model["rows"][1];
    assert_eq!(second["cells"][1], serde_json::Value::Null);
    assert_eq!(second["total"].as_f64(), Some(15.0));
    assert_eq!(second["grade"].as_str(), Some("F"));

    // No marks at all: empty cells, zero total.
    let third = &model["rows"][2];
    assert_eq!(third["cells"][0], serde_json::Value::Null);
    assert_eq!(third["total"].as_f64(), Some(0.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn attendance_sheet_model_has_marker_cells() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sessions.load",
        json!({
            "courseId": "c1",
            "sessions": [
                { "date": "2026-03-02", "period": 1 },
                { "date": "2026-03-02", "period": 2 },
            ],
            "records": [
                { "studentId": "s1", "sessionKey": "2026-03-02#1", "present": true },
                { "studentId": "s2", "sessionKey": "2026-03-02#1", "present": true },
                { "studentId": "s2", "sessionKey": "2026-03-02#2", "present": true },
            ],
        }),
    );

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.attendanceSheetModel",
        json!({
            "courseId": "c1",
            "sortMode": "roll-asc",
            "students": [
                { "id": "s2", "roll": "2", "name": "Rahim" },
                { "id": "s1", "roll": "1", "name": "Salma" },
            ],
        }),
    );

    assert_eq!(model["sessions"][0]["label"].as_str(), Some("2026-03-02 P1"));
    assert_eq!(model["sessions"][1]["label"].as_str(), Some("2026-03-02 P2"));

    let first = &model["rows"][0];
    assert_eq!(first["roll"].as_str(), Some("1"));
    assert_eq!(first["cells"][0]["marker"].as_str(), Some("P"));
    assert_eq!(first["cells"][1]["marker"].as_str(), Some("A"));
    assert_eq!(first["cells"][1]["present"].as_bool(), Some(false));
    assert_eq!(first["presentCount"].as_u64(), Some(1));
    assert_eq!(first["totalClasses"].as_u64(), Some(2));
    assert_eq!(first["percentage"].as_f64(), Some(50.0));

    let second = &model["rows"][1];
    assert_eq!(second["roll"].as_str(), Some("2"));
    assert_eq!(second["cells"][0]["marker"].as_str(), Some("P"));
    assert_eq!(second["cells"][1]["marker"].as_str(), Some("P"));
    assert_eq!(second["percentage"].as_f64(), Some(100.0));

    // An untracked course still shapes an empty sheet.
    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.attendanceSheetModel",
        json!({
            "courseId": "brand-new",
            "students": [{ "id": "s1", "roll": "1", "name": "Salma" }],
        }),
    );
    assert_eq!(empty["sessions"].as_array().map(|a| a.len()), Some(0));
    assert_eq!(empty["rows"][0]["percentage"].as_f64(), Some(0.0));

    drop(stdin);
    let _ = child.wait();
}
