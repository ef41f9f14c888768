use chrono::Utc;
use serde_json::json;

use crate::dispatch::{self, ParentEmail};
use crate::invite::InviteEvent;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};

fn get_student_id(req: &Request) -> Result<String, serde_json::Value> {
    req.params
        .get("studentId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", "missing studentId", None))
}

/// `invites.request`: send (or resend) the invitation email and commit the
/// `dispatch` transition. A gateway failure surfaces `dispatch_failed` and
/// leaves the invite status at its pre-call value.
fn handle_invites_request(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_student_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match dispatch::request_parent_invite(&mut state.roster, &mut state.outbox, &student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(&req.id, &e),
    }
}

/// `invites.confirm`: the external confirmation channel reports acceptance.
fn handle_invites_confirm(state: &mut AppState, req: &Request) -> serde_json::Value {
    apply_event(state, req, InviteEvent::Confirm)
}

/// `invites.expire`: the external scheduler decided the confirmation window
/// has elapsed. The daemon runs no timer of its own.
fn handle_invites_expire(state: &mut AppState, req: &Request) -> serde_json::Value {
    apply_event(state, req, InviteEvent::Timeout)
}

fn apply_event(state: &mut AppState, req: &Request, event: InviteEvent) -> serde_json::Value {
    let student_id = match get_student_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state
        .roster
        .apply_invite_transition(&student_id, event, Utc::now())
    {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(&req.id, &e),
    }
}

/// `parents.email`: a teacher-composed message to the parent, unrelated to
/// the invite lifecycle.
fn handle_parents_email(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_student_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match req.params.get("subject").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subject", None),
    };
    let message = match req.params.get("message").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing message", None),
    };
    let include_progress = req
        .params
        .get("includeProgress")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let email = ParentEmail {
        subject,
        message,
        include_progress,
    };
    match dispatch::send_parent_email(&state.roster, &mut state.outbox, &student_id, &email) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => fail(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "invites.request" => Some(handle_invites_request(state, req)),
        "invites.confirm" => Some(handle_invites_confirm(state, req)),
        "invites.expire" => Some(handle_invites_expire(state, req)),
        "parents.email" => Some(handle_parents_email(state, req)),
        _ => None,
    }
}
