//! Dispatch coordination.
//!
//! The store and state machine stay pure; this module sequences the one
//! side effect in the system (handing an email to the gateway) against the
//! invite transition it implies. Legality is checked before the send, so a
//! gateway failure leaves the roster exactly as it was and an illegal
//! transition never produces an email.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RosterError;
use crate::invite::{self, InviteEvent};
use crate::roster::{RosterStore, Student};

/// Outcome-only view of the email transport. Retries, bounces, and delivery
/// tracking are the transport's concern.
pub trait EmailGateway {
    fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<(), RosterError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// In-memory gateway: records every accepted send so the UI (and tests)
/// can inspect what went out. `failing()` simulates a transport outage.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<OutboxMessage>,
    fail_all: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[OutboxMessage] {
        &self.messages
    }
}

impl EmailGateway for Outbox {
    fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<(), RosterError> {
        if self.fail_all {
            return Err(RosterError::Dispatch("email gateway unavailable".into()));
        }
        self.messages.push(OutboxMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

/// Sends (or resends) the parent invitation and commits the `dispatch`
/// transition. Order matters: legality first, then the send, then the
/// transition, so a failed send surfaces `DispatchError` with the invite
/// status untouched.
pub fn request_parent_invite(
    store: &mut RosterStore,
    gateway: &mut dyn EmailGateway,
    id: &str,
) -> Result<Student, RosterError> {
    let (to, subject, body) = {
        let student = store
            .get(id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        let Some(to) = student.parent_email.clone() else {
            return Err(RosterError::Validation(
                "student has no parent email on file".into(),
            ));
        };
        invite::next(student.parent_invite_status, InviteEvent::Dispatch)?;
        let (subject, body) = compose_invite(student);
        (to, subject, body)
    };

    gateway.send(&to, &subject, &body)?;
    store.apply_invite_transition(id, InviteEvent::Dispatch, Utc::now())
}

#[derive(Debug)]
pub struct ParentEmail {
    pub subject: String,
    pub message: String,
    pub include_progress: bool,
}

/// A teacher-composed email to the parent, outside the invite lifecycle.
/// No state transition; the attempt is only recorded by the gateway.
pub fn send_parent_email(
    store: &RosterStore,
    gateway: &mut dyn EmailGateway,
    id: &str,
    email: &ParentEmail,
) -> Result<(), RosterError> {
    let student = store
        .get(id)
        .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
    let Some(to) = student.parent_email.as_deref() else {
        return Err(RosterError::Validation(
            "student has no parent email on file".into(),
        ));
    };
    if email.subject.trim().is_empty() || email.message.trim().is_empty() {
        return Err(RosterError::Validation(
            "subject and message must not be empty".into(),
        ));
    }

    let mut body = email.message.clone();
    if email.include_progress {
        if let Some(p) = &student.progress {
            body.push_str(&format!(
                "\n\nProgress: {} of {} activities completed.",
                p.completed_activities, p.total_activities
            ));
            if let Some(last) = p.last_activity_date {
                body.push_str(&format!(" Last activity: {}.", last.to_rfc3339()));
            }
        }
    }

    gateway.send(to, &email.subject, &body)
}

fn compose_invite(student: &Student) -> (String, String) {
    let subject = format!("Invitation to follow {}'s classroom progress", student.name);
    let body = format!(
        "Hello,\n\nYou have been invited to follow {name}'s progress. \
         Use the access code {code} to link your account.\n",
        name = student.name,
        code = student.access_code
    );
    (subject, body)
}
