//! Parent-invite lifecycle state machine.
//!
//! A pure transition table; `RosterStore` applies the result and owns the
//! side effects (timestamps, persistence of the new status).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Sent,
    Accepted,
    Expired,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Sent => "sent",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteEvent {
    /// An invitation email is being sent (first send or resend).
    Dispatch,
    /// The recipient confirmed the invitation.
    Confirm,
    /// The configured confirmation window elapsed with no answer.
    Timeout,
}

impl fmt::Display for InviteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InviteEvent::Dispatch => "dispatch",
            InviteEvent::Confirm => "confirm",
            InviteEvent::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Computes the successor status, or fails with `InvalidTransition` for any
/// pair outside the table. A resend is only legal once the previous attempt
/// resolved (`accepted` or `expired`); `sent + dispatch` is illegal.
pub fn next(status: InviteStatus, event: InviteEvent) -> Result<InviteStatus, RosterError> {
    use InviteEvent::*;
    use InviteStatus::*;

    match (status, event) {
        (Pending, Dispatch) => Ok(Sent),
        (Sent, Confirm) => Ok(Accepted),
        (Sent, Timeout) => Ok(Expired),
        (Expired, Dispatch) => Ok(Sent),
        (Accepted, Dispatch) => Ok(Sent),
        _ => Err(RosterError::InvalidTransition { status, event }),
    }
}
