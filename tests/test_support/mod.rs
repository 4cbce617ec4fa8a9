#![allow(dead_code)]

use serde_json::json;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
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
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .env("SCHOOLD_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn send_line(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, line: &str) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");

    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    assert!(!out.trim().is_empty(), "empty response for {}", line);
    serde_json::from_str(out.trim()).expect("parse response json")
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
    let value = send_line(stdin, reader, &payload.to_string());
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
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
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
    value.get("error").cloned().expect("error object")
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

pub fn error_status(error: &serde_json::Value) -> Option<i64> {
    error
        .get("details")
        .and_then(|d| d.get("status"))
        .and_then(|v| v.as_i64())
}

/// Builds edit-table form data from `(method, old, new)` rows of JSON objects. Every key
/// seen in any row is sent for every row, blank where the row lacks it.
pub fn edit_form(rows: &[(&str, serde_json::Value, serde_json::Value)]) -> serde_json::Value {
    let mut form: BTreeMap<String, Vec<String>> = BTreeMap::new();
    form.insert(
        "method".to_string(),
        rows.iter().map(|(m, _, _)| m.to_string()).collect(),
    );
    for (prefix, pick) in [("old:", 0usize), ("new:", 1usize)] {
        let side = |row: &(&str, serde_json::Value, serde_json::Value)| -> serde_json::Value {
            if pick == 0 {
                row.1.clone()
            } else {
                row.2.clone()
            }
        };
        let mut keys: Vec<String> = rows
            .iter()
            .filter_map(|r| side(r).as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()))
            .flatten()
            .collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            let values = rows
                .iter()
                .map(|r| match side(r).get(&key) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect();
            form.insert(format!("{prefix}{key}"), values);
        }
    }
    json!(form)
}

pub fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    workspace
}

pub fn student(name: &str) -> serde_json::Value {
    json!({
        "student_name": name,
        "age": 69,
        "year_enrolled": 2008,
        "graduating_year": 2016
    })
}

/// Student fields plus club name and role, as the membership edit table shows them.
pub fn membership(name: &str, club: &str, role: &str) -> serde_json::Value {
    let mut row = student(name);
    row["club_name"] = json!(club);
    row["role"] = json!(role);
    row
}

/// OBAMA and BIDEN, the WHITE HOUSE and OBAMA FOUNDATION clubs, and OBAMA as a WHITE HOUSE
/// member.
pub fn seed_memberships(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    for (i, name) in ["OBAMA", "BIDEN"].iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-s{i}"),
            "records.add",
            json!({ "entity": "student", "record": student(name) }),
        );
    }
    for (i, club) in ["WHITE HOUSE", "OBAMA FOUNDATION"].iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-c{i}"),
            "records.add",
            json!({ "entity": "club", "record": { "club_name": club } }),
        );
    }
    let _ = request_ok(
        stdin,
        reader,
        "seed-m",
        "records.add",
        json!({ "entity": "membership", "record": membership("OBAMA", "WHITE HOUSE", "member") }),
    );
}
