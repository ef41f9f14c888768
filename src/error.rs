use thiserror::Error;

use crate::invite::{InviteEvent, InviteStatus};

/// Failures surfaced by the roster core. Every variant maps to a stable
/// wire code at the IPC boundary (see `ipc::error`); the core itself never
/// logs or retries.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{0}")]
    Validation(String),

    #[error("student not found: {0}")]
    NotFound(String),

    #[error("invite event '{event}' is not legal while status is '{status}'")]
    InvalidTransition {
        status: InviteStatus,
        event: InviteEvent,
    },

    #[error("no unused access code found after {0} attempts")]
    CodeSpaceExhausted(u32),

    #[error("email dispatch failed: {0}")]
    Dispatch(String),
}

impl RosterError {
    /// Stable error code used in IPC responses.
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Validation(_) => "validation_failed",
            RosterError::NotFound(_) => "not_found",
            RosterError::InvalidTransition { .. } => "invalid_transition",
            RosterError::CodeSpaceExhausted(_) => "code_space_exhausted",
            RosterError::Dispatch(_) => "dispatch_failed",
        }
    }
}
