use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};

/// Recorded send attempts, oldest first, for the UI's sent view.
fn handle_outbox_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "messages": state.outbox.messages() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "outbox.list" => Some(handle_outbox_list(state, req)),
        _ => None,
    }
}
