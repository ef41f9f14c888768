use serde::Deserialize;

use crate::dispatch::Outbox;
use crate::roster::RosterStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub roster: RosterStore,
    pub outbox: Outbox,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            roster: RosterStore::new(),
            outbox: Outbox::new(),
        }
    }

    /// Every send fails; used by integration tests to exercise rollback.
    pub fn with_failing_gateway() -> Self {
        AppState {
            roster: RosterStore::new(),
            outbox: Outbox::failing(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
