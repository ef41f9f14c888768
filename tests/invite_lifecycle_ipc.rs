use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar_with(envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with(&[])
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
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
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    request_ok(stdin, reader, id, "students.create", params)
        .get("student")
        .cloned()
        .expect("student")
}

fn invite_status(student: &serde_json::Value) -> String {
    student
        .get("parentInviteStatus")
        .and_then(|v| v.as_str())
        .expect("parentInviteStatus")
        .to_string()
}

#[test]
fn invite_lifecycle_end_to_end() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let first = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        json!({ "name": "Ana", "grade": "3rd", "parentEmail": "ana.parent@example.com" }),
    );
    let second = create_student(
        &mut stdin,
        &mut reader,
        "c2",
        json!({ "name": "Ben", "grade": "3rd", "parentEmail": "ben.parent@example.com" }),
    );
    let first_id = first.get("id").and_then(|v| v.as_str()).unwrap().to_string();
    let second_id = second.get("id").and_then(|v| v.as_str()).unwrap().to_string();

    // pending -> sent, with the timestamp and the outbound email recorded.
    let sent = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "invites.request",
        json!({ "studentId": first_id }),
    );
    let student = sent.get("student").expect("student");
    assert_eq!(invite_status(student), "sent");
    assert!(student
        .get("parentInviteSentAt")
        .and_then(|v| v.as_str())
        .is_some());

    let outbox = request_ok(&mut stdin, &mut reader, "o1", "outbox.list", json!({}));
    let messages = outbox.get("messages").and_then(|v| v.as_array()).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].get("to").and_then(|v| v.as_str()),
        Some("ana.parent@example.com")
    );
    let access_code = first.get("accessCode").and_then(|v| v.as_str()).unwrap();
    assert!(messages[0]
        .get("body")
        .and_then(|v| v.as_str())
        .unwrap()
        .contains(access_code));

    // sent -> accepted.
    let accepted = request_ok(
        &mut stdin,
        &mut reader,
        "i2",
        "invites.confirm",
        json!({ "studentId": first_id }),
    );
    assert_eq!(invite_status(accepted.get("student").unwrap()), "accepted");

    // Confirming a pending invite is illegal and changes nothing.
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "i3",
        "invites.confirm",
        json!({ "studentId": second_id }),
    );
    assert_eq!(code, "invalid_transition");
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "l1",
        "students.list",
        json!({ "nameContains": "ben" }),
    );
    assert_eq!(
        listed
            .pointer("/students/0/parentInviteStatus")
            .and_then(|v| v.as_str()),
        Some("pending")
    );

    // Expiring an accepted invite is illegal; re-inviting it is not.
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "i4",
        "invites.expire",
        json!({ "studentId": first_id }),
    );
    assert_eq!(code, "invalid_transition");

    let resent = request_ok(
        &mut stdin,
        &mut reader,
        "i5",
        "invites.request",
        json!({ "studentId": first_id }),
    );
    assert_eq!(invite_status(resent.get("student").unwrap()), "sent");

    // sent -> expired via the external scheduler, then resend again.
    let expired = request_ok(
        &mut stdin,
        &mut reader,
        "i6",
        "invites.expire",
        json!({ "studentId": first_id }),
    );
    assert_eq!(invite_status(expired.get("student").unwrap()), "expired");

    let resent = request_ok(
        &mut stdin,
        &mut reader,
        "i7",
        "invites.request",
        json!({ "studentId": first_id }),
    );
    assert_eq!(invite_status(resent.get("student").unwrap()), "sent");
}

#[test]
fn invite_requires_a_parent_email_on_file() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        json!({ "name": "Ana", "grade": "3rd" }),
    );
    let id = student.get("id").and_then(|v| v.as_str()).unwrap().to_string();
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "i1",
        "invites.request",
        json!({ "studentId": id }),
    );
    assert_eq!(code, "validation_failed");
}

#[test]
fn gateway_failure_surfaces_and_rolls_back() {
    let (_child, mut stdin, mut reader) = spawn_sidecar_with(&[("ROSTERD_FAIL_DISPATCH", "1")]);
    let student = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        json!({ "name": "Ana", "grade": "3rd", "parentEmail": "ana.parent@example.com" }),
    );
    let id = student.get("id").and_then(|v| v.as_str()).unwrap().to_string();

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "i1",
        "invites.request",
        json!({ "studentId": id }),
    );
    assert_eq!(code, "dispatch_failed");

    // Status is exactly what it was before the call; nothing was recorded.
    let listed = request_ok(&mut stdin, &mut reader, "l1", "students.list", json!({}));
    let row = listed.pointer("/students/0").expect("student row");
    assert_eq!(invite_status(row), "pending");
    assert!(row.get("parentInviteSentAt").is_none());

    let outbox = request_ok(&mut stdin, &mut reader, "o1", "outbox.list", json!({}));
    assert_eq!(
        outbox.get("messages").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}

#[test]
fn parent_email_with_progress_summary() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        json!({
            "name": "Ana",
            "grade": "3rd",
            "parentEmail": "ana.parent@example.com",
            "progress": { "completedActivities": 7, "totalActivities": 10 }
        }),
    );
    let id = student.get("id").and_then(|v| v.as_str()).unwrap().to_string();

    request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        "parents.email",
        json!({
            "studentId": id,
            "subject": "Update regarding Ana's progress",
            "message": "Ana is doing well this term.",
            "includeProgress": true
        }),
    );

    let outbox = request_ok(&mut stdin, &mut reader, "o1", "outbox.list", json!({}));
    let messages = outbox.get("messages").and_then(|v| v.as_array()).unwrap();
    assert_eq!(messages.len(), 1);
    let body = messages[0].get("body").and_then(|v| v.as_str()).unwrap();
    assert!(body.contains("7 of 10 activities"));

    // A plain parent email is not an invite: status stays pending.
    let listed = request_ok(&mut stdin, &mut reader, "l1", "students.list", json!({}));
    assert_eq!(
        listed
            .pointer("/students/0/parentInviteStatus")
            .and_then(|v| v.as_str()),
        Some("pending")
    );
}

#[test]
fn parent_email_without_address_is_rejected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student = create_student(
        &mut stdin,
        &mut reader,
        "c1",
        json!({ "name": "Ana", "grade": "3rd" }),
    );
    let id = student.get("id").and_then(|v| v.as_str()).unwrap().to_string();
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "p1",
        "parents.email",
        json!({ "studentId": id, "subject": "Hello", "message": "Hi there" }),
    );
    assert_eq!(code, "validation_failed");
}
