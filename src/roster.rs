//! The roster: the single authoritative registry of student records.
//!
//! All mutation goes through `RosterStore`; callers never hold a mutable
//! reference into the collection. Invite status is deliberately not
//! reachable from `StudentPatch` so the lifecycle rules in `invite` cannot
//! be bypassed by a generic update.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access_code;
use crate::error::RosterError;
use crate::invite::{self, InviteEvent, InviteStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th")]
    Fourth,
    #[serde(rename = "5th")]
    Fifth,
    #[serde(rename = "6th")]
    Sixth,
}

impl Grade {
    pub fn parse(s: &str) -> Option<Grade> {
        match s {
            "1st" => Some(Grade::First),
            "2nd" => Some(Grade::Second),
            "3rd" => Some(Grade::Third),
            "4th" => Some(Grade::Fourth),
            "5th" => Some(Grade::Fifth),
            "6th" => Some(Grade::Sixth),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::First => "1st",
            Grade::Second => "2nd",
            Grade::Third => "3rd",
            Grade::Fourth => "4th",
            Grade::Fifth => "5th",
            Grade::Sixth => "6th",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_activities: u32,
    pub total_activities: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<DateTime<Utc>>,
}

/// Per-role assessment scores from the awareness activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub victim: f64,
    pub bystander: f64,
    pub perpetrator: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub grade: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_email: Option<String>,
    pub parent_invite_status: InviteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_invite_sent_at: Option<DateTime<Utc>>,
    pub access_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Advances `updatedAt` on every mutation, strictly past its previous
    /// value even when the wall clock has not ticked.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

/// Fields a caller may supply at creation. Id, access code, status, invite
/// status, and timestamps are assigned by the store.
#[derive(Debug, Default)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
    pub grade: Option<Grade>,
    pub avatar: Option<String>,
    pub parent_email: Option<String>,
    pub progress: Option<Progress>,
    pub scores: Option<Scores>,
}

/// Partial update. An outer `Some` means the field was supplied; for
/// clearable fields the inner `None` clears it.
#[derive(Debug, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub grade: Option<Grade>,
    pub avatar: Option<Option<String>>,
    pub parent_email: Option<Option<String>>,
    pub progress: Option<Option<Progress>>,
    pub scores: Option<Option<Scores>>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Default, Clone)]
pub struct RosterFilter {
    /// Case-insensitive substring match on the student name.
    pub name_contains: Option<String>,
    /// Exact grade match.
    pub grade: Option<Grade>,
}

/// In-memory student registry. Insertion order is preserved and is the
/// order `list` yields.
#[derive(Debug, Default)]
pub struct RosterStore {
    students: Vec<Student>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    /// Access codes currently held by live students. Codes of removed
    /// students are absent and may be handed out again.
    pub fn codes_in_use(&self) -> HashSet<String> {
        self.students.iter().map(|s| s.access_code.clone()).collect()
    }

    /// Creates a student. The read-codes/generate/insert sequence runs under
    /// one `&mut self` borrow, so interleaved creates cannot pick colliding
    /// codes.
    pub fn create(&mut self, new: NewStudent) -> Result<Student, RosterError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(RosterError::Validation("name must not be empty".into()));
        }
        let Some(grade) = new.grade else {
            return Err(RosterError::Validation("grade is required".into()));
        };

        let in_use = self.codes_in_use();
        let access_code = access_code::generate(&in_use)?;

        let now = Utc::now();
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name,
            email: none_if_blank(new.email),
            grade,
            avatar: none_if_blank(new.avatar),
            parent_email: none_if_blank(new.parent_email),
            parent_invite_status: InviteStatus::Pending,
            parent_invite_sent_at: None,
            access_code,
            progress: new.progress,
            scores: new.scores,
            status: StudentStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.students.push(student.clone());
        Ok(student)
    }

    /// Merges a partial update. `id`, `accessCode`, `createdAt`, and the
    /// invite status are not expressible in `StudentPatch`.
    pub fn update(&mut self, id: &str, patch: StudentPatch) -> Result<Student, RosterError> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(RosterError::Validation("name must not be empty".into()));
            }
        }

        let student = self.get_mut(id)?;
        if let Some(name) = patch.name {
            student.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            student.email = none_if_blank(email);
        }
        if let Some(grade) = patch.grade {
            student.grade = grade;
        }
        if let Some(avatar) = patch.avatar {
            student.avatar = none_if_blank(avatar);
        }
        if let Some(parent_email) = patch.parent_email {
            student.parent_email = none_if_blank(parent_email);
        }
        if let Some(progress) = patch.progress {
            student.progress = progress;
        }
        if let Some(scores) = patch.scores {
            student.scores = scores;
        }
        if let Some(status) = patch.status {
            student.status = status;
        }
        student.touch(Utc::now());
        Ok(student.clone())
    }

    /// Removes a student, freeing the access code. A second removal of the
    /// same id fails with `NotFound` so callers can detect stale references.
    pub fn remove(&mut self, id: &str) -> Result<(), RosterError> {
        let idx = self
            .students
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        self.students.remove(idx);
        Ok(())
    }

    /// Restartable borrowed iterator over the roster in insertion order.
    pub fn list<'a>(
        &'a self,
        filter: &RosterFilter,
    ) -> impl Iterator<Item = &'a Student> + 'a {
        let needle = filter.name_contains.as_ref().map(|s| s.to_lowercase());
        let grade = filter.grade;
        self.students.iter().filter(move |s| {
            let name_ok = needle
                .as_ref()
                .map_or(true, |n| s.name.to_lowercase().contains(n.as_str()));
            let grade_ok = grade.map_or(true, |g| s.grade == g);
            name_ok && grade_ok
        })
    }

    /// Applies an invite lifecycle event. On an illegal transition nothing
    /// is mutated. `now` is caller-supplied so the dispatch coordinator can
    /// stamp `parentInviteSentAt` with the moment the send was attempted.
    pub fn apply_invite_transition(
        &mut self,
        id: &str,
        event: InviteEvent,
        now: DateTime<Utc>,
    ) -> Result<Student, RosterError> {
        let student = self.get_mut(id)?;
        if event == InviteEvent::Dispatch && blank(&student.parent_email) {
            return Err(RosterError::Validation(
                "student has no parent email on file".into(),
            ));
        }
        let next = invite::next(student.parent_invite_status, event)?;
        student.parent_invite_status = next;
        if event == InviteEvent::Dispatch {
            student.parent_invite_sent_at = Some(now);
        }
        student.touch(now);
        Ok(student.clone())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Student, RosterError> {
        self.students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))
    }
}

fn none_if_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}
