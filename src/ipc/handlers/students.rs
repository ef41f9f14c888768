use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{
    Grade, NewStudent, Progress, RosterFilter, Scores, Student, StudentPatch, StudentStatus,
};
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| bad_params(format!("{} must be a string", key))),
    }
}

fn parse_grade(label: &str) -> Result<Grade, HandlerErr> {
    Grade::parse(label).ok_or(HandlerErr {
        code: "validation_failed",
        message: format!("unknown grade: {}", label),
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Name and grade validation errors come from the store; only shape
    // problems (wrong JSON types) are rejected here.
    let name = match get_optional_str(&req.params, "name") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e.response(&req.id),
    };
    let grade = match get_optional_str(&req.params, "grade") {
        Ok(Some(label)) => match parse_grade(&label) {
            Ok(g) => Some(g),
            Err(e) => return e.response(&req.id),
        },
        Ok(None) => None,
        Err(e) => return e.response(&req.id),
    };
    let email = match get_optional_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let avatar = match get_optional_str(&req.params, "avatar") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let parent_email = match get_optional_str(&req.params, "parentEmail") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let progress = match req.params.get("progress") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match serde_json::from_value::<Progress>(v.clone()) {
            Ok(p) => Some(p),
            Err(e) => return err(&req.id, "bad_params", format!("invalid progress: {e}"), None),
        },
    };
    let scores = match req.params.get("scores") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match serde_json::from_value::<Scores>(v.clone()) {
            Ok(s) => Some(s),
            Err(e) => return err(&req.id, "bad_params", format!("invalid scores: {e}"), None),
        },
    };

    let new = NewStudent {
        name,
        email,
        grade,
        avatar,
        parent_email,
        progress,
        scores,
    };
    match state.roster.create(new) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(&req.id, &e),
    }
}

fn build_patch(patch: &serde_json::Map<String, serde_json::Value>) -> Result<StudentPatch, HandlerErr> {
    let mut out = StudentPatch::default();

    if let Some(v) = patch.get("name") {
        let s = v
            .as_str()
            .ok_or_else(|| bad_params("patch.name must be a string"))?;
        out.name = Some(s.to_string());
    }
    if let Some(v) = patch.get("grade") {
        let s = v
            .as_str()
            .ok_or_else(|| bad_params("patch.grade must be a string"))?;
        out.grade = Some(parse_grade(s)?);
    }
    if let Some(v) = patch.get("status") {
        let s = v
            .as_str()
            .ok_or_else(|| bad_params("patch.status must be a string"))?;
        out.status = Some(match s {
            "active" => StudentStatus::Active,
            "inactive" => StudentStatus::Inactive,
            _ => {
                return Err(HandlerErr {
                    code: "validation_failed",
                    message: format!("unknown status: {}", s),
                })
            }
        });
    }

    out.email = clearable_str(patch, "email")?;
    out.avatar = clearable_str(patch, "avatar")?;
    out.parent_email = clearable_str(patch, "parentEmail")?;

    if let Some(v) = patch.get("progress") {
        out.progress = Some(if v.is_null() {
            None
        } else {
            Some(
                serde_json::from_value::<Progress>(v.clone())
                    .map_err(|e| bad_params(format!("invalid progress: {e}")))?,
            )
        });
    }
    if let Some(v) = patch.get("scores") {
        out.scores = Some(if v.is_null() {
            None
        } else {
            Some(
                serde_json::from_value::<Scores>(v.clone())
                    .map_err(|e| bad_params(format!("invalid scores: {e}")))?,
            )
        });
    }

    Ok(out)
}

/// `null` clears the field; a string sets it; absent leaves it alone.
fn clearable_str(
    patch: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<Option<String>>, HandlerErr> {
    match patch.get(key) {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(v) => v
            .as_str()
            .map(|s| Some(Some(s.to_string())))
            .ok_or_else(|| bad_params(format!("patch.{} must be a string or null", key))),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    // The invite lifecycle is only reachable through the invites.* methods.
    if patch.contains_key("parentInviteStatus") || patch.contains_key("parentInviteSentAt") {
        return err(
            &req.id,
            "validation_failed",
            "parent invite status can only change via invite transitions",
            None,
        );
    }

    let patch = match build_patch(patch) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };

    match state.roster.update(&student_id, patch) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.roster.remove(&student_id) {
        Ok(()) => ok(&req.id, json!({})),
        Err(e) => fail(&req.id, &e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name_contains = match get_optional_str(&req.params, "nameContains") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let grade = match get_optional_str(&req.params, "grade") {
        Ok(Some(label)) => match parse_grade(&label) {
            Ok(g) => Some(g),
            Err(e) => return e.response(&req.id),
        },
        Ok(None) => None,
        Err(e) => return e.response(&req.id),
    };
    let sort_by = match get_optional_str(&req.params, "sortBy") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let filter = RosterFilter {
        name_contains,
        grade,
    };
    let mut students: Vec<Student> = state.roster.list(&filter).cloned().collect();

    match sort_by.as_deref() {
        None => {} // insertion order
        Some("name") => {
            students.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
        Some("grade") => students.sort_by_key(|s| s.grade as u8),
        Some("createdAt") => students.sort_by_key(|s| s.created_at),
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown sortBy: {}", other),
                None,
            )
        }
    }

    ok(&req.id, json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        _ => None,
    }
}
