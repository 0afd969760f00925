//! Schedulable resources and the advisory availability rule.
//!
//! Instructors, lab rooms, and teaching assistants share one unavailability
//! shape: a set of blocked dates and a set of blocked time slots. The check
//! is purely advisory; it never blocks a reschedule request, it only lets
//! clients warn the student before submission.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::TimeSlot;
use crate::error::{RelabError, Result};

/// Unique identifier for a schedulable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Deref for ResourceId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Uuid> for ResourceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The three kinds of schedulable resource, each served from its own
/// collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Instructor,
    LabRoom,
    TeachingAssistant,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Instructor,
        ResourceKind::LabRoom,
        ResourceKind::TeachingAssistant,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Instructor => "INSTRUCTOR",
            ResourceKind::LabRoom => "LAB_ROOM",
            ResourceKind::TeachingAssistant => "TEACHING_ASSISTANT",
        };
        f.write_str(s)
    }
}

impl FromStr for ResourceKind {
    type Err = RelabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INSTRUCTOR" => Ok(ResourceKind::Instructor),
            "LAB_ROOM" => Ok(ResourceKind::LabRoom),
            "TEACHING_ASSISTANT" => Ok(ResourceKind::TeachingAssistant),
            other => Err(RelabError::Validation(format!(
                "Unknown resource kind: {other}"
            ))),
        }
    }
}

/// A schedulable resource with date/slot unavailability.
///
/// `name` holds the person's name for instructors and TAs, and the room
/// number for lab rooms. Kind-specific detail fields stay `None` where they
/// do not apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default)]
    pub unavailable_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub unavailable_time_slots: Vec<TimeSlot>,
}

impl Resource {
    /// The conjunctive unavailability rule: a resource is unavailable for
    /// `(date, slot)` only when the date AND the slot are both blocked. A
    /// resource blocked on the date but free in that slot (or the reverse)
    /// still counts as available.
    pub fn is_available(&self, date: NaiveDate, slot: TimeSlot) -> bool {
        !(self.unavailable_dates.contains(&date) && self.unavailable_time_slots.contains(&slot))
    }
}

/// Aggregate advisory answer for a proposed `(module, date, slot)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub module_code: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub available: bool,
    pub message: String,
}

/// Build the aggregate report: the slot is workable when at least one
/// resource of each kind is available and no existing request already
/// claims the same `(module, date, slot)`.
pub fn availability_report(
    module_code: &str,
    date: NaiveDate,
    slot: TimeSlot,
    instructors: &[Resource],
    lab_rooms: &[Resource],
    teaching_assistants: &[Resource],
    conflicting_requests: usize,
) -> AvailabilityReport {
    let any_available = |pool: &[Resource]| pool.iter().any(|r| r.is_available(date, slot));

    let instructor_available = any_available(instructors);
    let lab_room_available = any_available(lab_rooms);
    let ta_available = any_available(teaching_assistants);
    let no_conflicts = conflicting_requests == 0;

    let available = instructor_available && lab_room_available && ta_available && no_conflicts;

    let message = if available {
        "All resources available".to_string()
    } else {
        let mut parts = Vec::new();
        if !instructor_available {
            parts.push("Instructor not available.");
        }
        if !lab_room_available {
            parts.push("Lab room not available.");
        }
        if !ta_available {
            parts.push("TA not available.");
        }
        if !no_conflicts {
            parts.push("Conflict with existing requests");
        }
        parts.join(" ")
    };

    AvailabilityReport {
        module_code: module_code.to_string(),
        date,
        time_slot: slot,
        available,
        message,
    }
}
