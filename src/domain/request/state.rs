//! Core types for the reschedule approval pipeline.
//!
//! This module defines the type-safe request lifecycle using the typestate
//! pattern. Each request progresses through distinct review states, enforced
//! at compile time for the normal pipeline and checked at runtime for the
//! admin override path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;
use crate::error::{RelabError, Result};

/// The four fixed daily lab scheduling windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "08:30-10:30")]
    MorningFirst,
    #[serde(rename = "10:30-12:30")]
    MorningSecond,
    #[serde(rename = "13:30-15:30")]
    AfternoonFirst,
    #[serde(rename = "15:30-17:30")]
    AfternoonSecond,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::MorningFirst,
        TimeSlot::MorningSecond,
        TimeSlot::AfternoonFirst,
        TimeSlot::AfternoonSecond,
    ];
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSlot::MorningFirst => write!(f, "08:30-10:30"),
            TimeSlot::MorningSecond => write!(f, "10:30-12:30"),
            TimeSlot::AfternoonFirst => write!(f, "13:30-15:30"),
            TimeSlot::AfternoonSecond => write!(f, "15:30-17:30"),
        }
    }
}

impl FromStr for TimeSlot {
    type Err = RelabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "08:30-10:30" => Ok(TimeSlot::MorningFirst),
            "10:30-12:30" => Ok(TimeSlot::MorningSecond),
            "13:30-15:30" => Ok(TimeSlot::AfternoonFirst),
            "15:30-17:30" => Ok(TimeSlot::AfternoonSecond),
            _ => Err(RelabError::Validation(format!("Invalid time slot: {}", s))),
        }
    }
}

/// Pipeline status for filtering, storage, and API responses.
///
/// This enum represents the string values stored in the database's `status`
/// column. The typestate structs below are the authoritative in-memory
/// representation; this is the flat view of the same states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    LabAdvisorReviewed,
    ModuleCoordinatorReviewed,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// `APPROVED` and `REJECTED` are terminal for ordinary roles.
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::LabAdvisorReviewed => write!(f, "LAB_ADVISOR_REVIEWED"),
            RequestStatus::ModuleCoordinatorReviewed => write!(f, "MODULE_COORDINATOR_REVIEWED"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = RelabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(RequestStatus::Pending),
            "LAB_ADVISOR_REVIEWED" => Ok(RequestStatus::LabAdvisorReviewed),
            "MODULE_COORDINATOR_REVIEWED" => Ok(RequestStatus::ModuleCoordinatorReviewed),
            "APPROVED" => Ok(RequestStatus::Approved),
            "REJECTED" => Ok(RequestStatus::Rejected),
            _ => Err(RelabError::Validation(format!(
                "Invalid request status: {}",
                s
            ))),
        }
    }
}

/// Unique identifier for a reschedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Marker trait for valid review states.
///
/// This trait enables the typestate pattern, ensuring that transition
/// methods are only available on requests in the matching state.
pub trait ReviewState: Send + Sync {}

/// A reschedule request tracked through the approval pipeline.
///
/// Uses the typestate pattern to ensure type-safe state transitions.
/// The generic parameter `S` represents the current review state.
#[derive(Debug, Clone, Serialize)]
pub struct Request<S: ReviewState> {
    /// The current review state, carrying the comments accumulated so far.
    pub state: S,
    /// The student-supplied request data.
    pub data: RequestData,
}

/// Student-supplied data for a reschedule request.
///
/// Immutable after creation except for `updated_at`, which is refreshed on
/// every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestData {
    pub id: RequestId,
    /// Owning student (set at creation, immutable).
    pub student_id: UserId,
    pub student_name: String,
    /// Must reference an active course module.
    pub module_code: String,
    pub original_lab_date: NaiveDate,
    /// Must differ from `original_lab_date`.
    pub requested_date: NaiveDate,
    pub requested_time_slot: TimeSlot,
    /// Free-text justification, required, non-empty.
    pub reason: String,
    /// Ordered list of opaque stored-file references.
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Review States
// ============================================================================

/// Request is waiting for the lab advisor.
///
/// This is the initial state for all newly submitted requests.
#[derive(Debug, Clone, Serialize)]
pub struct Pending;

impl ReviewState for Pending {}

/// The lab advisor has recorded a recommendation.
///
/// The comment is optional only because the admin override can land here
/// without one; the normal transition always fills it.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorReviewed {
    pub recommendation: Option<String>,
}

impl ReviewState for AdvisorReviewed {}

/// The module coordinator has endorsed the advisor's recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorReviewed {
    /// Carried over from `AdvisorReviewed`.
    pub recommendation: Option<String>,
    pub endorsement: Option<String>,
}

impl ReviewState for CoordinatorReviewed {}

/// Request was approved.
///
/// Comment fields skipped by the admin fast path stay `None`.
#[derive(Debug, Clone, Serialize)]
pub struct Approved {
    pub recommendation: Option<String>,
    pub endorsement: Option<String>,
    /// Lab coordinator sign-off comment.
    pub sign_off: Option<String>,
    /// The lab date the approval is for.
    pub approved_date: Option<NaiveDate>,
}

impl ReviewState for Approved {}

/// Request was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub recommendation: Option<String>,
    pub endorsement: Option<String>,
    pub sign_off: Option<String>,
    /// Required on the normal rejection path; absent only after an override.
    pub reason: Option<String>,
}

impl ReviewState for Rejected {}

// ============================================================================
// Unified Request Representation
// ============================================================================

/// Enum that can hold a request in any review state.
///
/// This is used for storage and API responses where we need to handle
/// requests uniformly regardless of their current state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "request")]
pub enum AnyRequest {
    Pending(Request<Pending>),
    AdvisorReviewed(Request<AdvisorReviewed>),
    CoordinatorReviewed(Request<CoordinatorReviewed>),
    Approved(Request<Approved>),
    Rejected(Request<Rejected>),
}

impl AnyRequest {
    /// Get the request ID regardless of state.
    pub fn id(&self) -> RequestId {
        self.data().id
    }

    /// Get the request data regardless of state.
    pub fn data(&self) -> &RequestData {
        match self {
            AnyRequest::Pending(r) => &r.data,
            AnyRequest::AdvisorReviewed(r) => &r.data,
            AnyRequest::CoordinatorReviewed(r) => &r.data,
            AnyRequest::Approved(r) => &r.data,
            AnyRequest::Rejected(r) => &r.data,
        }
    }

    /// Flat status of the current state.
    pub fn status(&self) -> RequestStatus {
        match self {
            AnyRequest::Pending(_) => RequestStatus::Pending,
            AnyRequest::AdvisorReviewed(_) => RequestStatus::LabAdvisorReviewed,
            AnyRequest::CoordinatorReviewed(_) => RequestStatus::ModuleCoordinatorReviewed,
            AnyRequest::Approved(_) => RequestStatus::Approved,
            AnyRequest::Rejected(_) => RequestStatus::Rejected,
        }
    }

    /// Check if this request is in a terminal state for ordinary roles.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Flatten to the storable/serializable record form.
    pub fn to_record(&self) -> RequestRecord {
        let data = self.data().clone();
        let mut record = RequestRecord {
            id: data.id,
            student_id: data.student_id,
            student_name: data.student_name,
            module_code: data.module_code,
            original_lab_date: data.original_lab_date,
            requested_date: data.requested_date,
            requested_time_slot: data.requested_time_slot,
            reason: data.reason,
            attachments: data.attachments,
            status: self.status(),
            lab_advisor_recommendation: None,
            module_coordinator_approval: None,
            lab_coordinator_approval: None,
            approved_date: None,
            rejection_reason: None,
            created_at: data.created_at,
            updated_at: data.updated_at,
        };
        match self {
            AnyRequest::Pending(_) => {}
            AnyRequest::AdvisorReviewed(r) => {
                record.lab_advisor_recommendation = r.state.recommendation.clone();
            }
            AnyRequest::CoordinatorReviewed(r) => {
                record.lab_advisor_recommendation = r.state.recommendation.clone();
                record.module_coordinator_approval = r.state.endorsement.clone();
            }
            AnyRequest::Approved(r) => {
                record.lab_advisor_recommendation = r.state.recommendation.clone();
                record.module_coordinator_approval = r.state.endorsement.clone();
                record.lab_coordinator_approval = r.state.sign_off.clone();
                record.approved_date = r.state.approved_date;
            }
            AnyRequest::Rejected(r) => {
                record.lab_advisor_recommendation = r.state.recommendation.clone();
                record.module_coordinator_approval = r.state.endorsement.clone();
                record.lab_coordinator_approval = r.state.sign_off.clone();
                record.rejection_reason = r.state.reason.clone();
            }
        }
        record
    }

    /// Rebuild the typed representation from a stored record.
    pub fn from_record(record: RequestRecord) -> AnyRequest {
        let data = RequestData {
            id: record.id,
            student_id: record.student_id,
            student_name: record.student_name,
            module_code: record.module_code,
            original_lab_date: record.original_lab_date,
            requested_date: record.requested_date,
            requested_time_slot: record.requested_time_slot,
            reason: record.reason,
            attachments: record.attachments,
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        match record.status {
            RequestStatus::Pending => AnyRequest::Pending(Request {
                state: Pending,
                data,
            }),
            RequestStatus::LabAdvisorReviewed => AnyRequest::AdvisorReviewed(Request {
                state: AdvisorReviewed {
                    recommendation: record.lab_advisor_recommendation,
                },
                data,
            }),
            RequestStatus::ModuleCoordinatorReviewed => AnyRequest::CoordinatorReviewed(Request {
                state: CoordinatorReviewed {
                    recommendation: record.lab_advisor_recommendation,
                    endorsement: record.module_coordinator_approval,
                },
                data,
            }),
            RequestStatus::Approved => AnyRequest::Approved(Request {
                state: Approved {
                    recommendation: record.lab_advisor_recommendation,
                    endorsement: record.module_coordinator_approval,
                    sign_off: record.lab_coordinator_approval,
                    approved_date: record.approved_date,
                },
                data,
            }),
            RequestStatus::Rejected => AnyRequest::Rejected(Request {
                state: Rejected {
                    recommendation: record.lab_advisor_recommendation,
                    endorsement: record.module_coordinator_approval,
                    sign_off: record.lab_coordinator_approval,
                    reason: record.rejection_reason,
                },
                data,
            }),
        }
    }
}

// Conversion traits for going from typed Request to AnyRequest

impl From<Request<Pending>> for AnyRequest {
    fn from(r: Request<Pending>) -> Self {
        AnyRequest::Pending(r)
    }
}

impl From<Request<AdvisorReviewed>> for AnyRequest {
    fn from(r: Request<AdvisorReviewed>) -> Self {
        AnyRequest::AdvisorReviewed(r)
    }
}

impl From<Request<CoordinatorReviewed>> for AnyRequest {
    fn from(r: Request<CoordinatorReviewed>) -> Self {
        AnyRequest::CoordinatorReviewed(r)
    }
}

impl From<Request<Approved>> for AnyRequest {
    fn from(r: Request<Approved>) -> Self {
        AnyRequest::Approved(r)
    }
}

impl From<Request<Rejected>> for AnyRequest {
    fn from(r: Request<Rejected>) -> Self {
        AnyRequest::Rejected(r)
    }
}

/// Flat, nullable-field view of a request in any state.
///
/// This is the shape stored in the database and returned over the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: RequestId,
    pub student_id: UserId,
    pub student_name: String,
    pub module_code: String,
    pub original_lab_date: NaiveDate,
    pub requested_date: NaiveDate,
    pub requested_time_slot: TimeSlot,
    pub reason: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub status: RequestStatus,
    pub lab_advisor_recommendation: Option<String>,
    pub module_coordinator_approval: Option<String>,
    pub lab_coordinator_approval: Option<String>,
    pub approved_date: Option<NaiveDate>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
