//! State transitions for the reschedule approval pipeline.
//!
//! This module implements the role-gated transitions using Rust's type
//! system to enforce the forward pipeline at compile time. Each review state
//! is a distinct type parameter on `Request<S>`:
//!
//! ```text
//! Request<Pending> ──recommend()──> Request<AdvisorReviewed>
//!        │                                 │
//!        │                                 └──endorse()──> Request<CoordinatorReviewed>
//!        │                                 │                      │
//!        │                                 │                      └──approve()──> Request<Approved>
//!        └──reject()──> Request<Rejected> <┴──reject()────────────┘
//! ```
//!
//! `Approved` and `Rejected` are terminal for ordinary roles. The admin
//! override escape hatch ([`advance`] with [`ReviewAction::Override`]) may
//! move a request to any enumerated status from any current state; comment
//! fields belonging to skipped stages stay absent.
//!
//! [`advance`] is the single authoritative transition table: it resolves the
//! caller's acting role, dispatches to the typestate methods, and rejects
//! everything else with `InvalidTransition`.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::domain::user::Role;
use crate::error::{RelabError, Result};

use super::state::{
    AdvisorReviewed, AnyRequest, Approved, CoordinatorReviewed, Pending, Rejected, Request,
    RequestStatus,
};

/// A reviewer's action on a request, as carried in `PUT /api/requests/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    /// Lab advisor records a recommendation on a `PENDING` request.
    Recommend { comment: String },
    /// Module coordinator endorses an advisor-reviewed request.
    Endorse { comment: String },
    /// Lab coordinator (or admin, from any non-terminal state) grants final
    /// approval for the given lab date.
    Approve {
        comment: String,
        #[serde(rename = "approvedDate")]
        approved_date: NaiveDate,
    },
    /// Any reviewer rejects a non-terminal request with a justification.
    Reject { reason: String },
    /// Admin-only escape hatch: force any enumerated status.
    Override { status: RequestStatus },
}

impl ReviewAction {
    fn name(&self) -> &'static str {
        match self {
            ReviewAction::Recommend { .. } => "recommend",
            ReviewAction::Endorse { .. } => "endorse",
            ReviewAction::Approve { .. } => "approve",
            ReviewAction::Reject { .. } => "reject",
            ReviewAction::Override { .. } => "override",
        }
    }
}

/// Validates that a required free-text payload field is non-blank.
fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RelabError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl Request<Pending> {
    /// Lab advisor review: `PENDING -> LAB_ADVISOR_REVIEWED`.
    pub fn recommend(
        mut self,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Request<AdvisorReviewed>> {
        let recommendation = required("labAdvisorRecommendation", comment)?;
        self.data.updated_at = now;
        Ok(Request {
            state: AdvisorReviewed {
                recommendation: Some(recommendation),
            },
            data: self.data,
        })
    }

    pub fn reject(mut self, reason: &str, now: DateTime<Utc>) -> Result<Request<Rejected>> {
        let reason = required("rejectionReason", reason)?;
        self.data.updated_at = now;
        Ok(Request {
            state: Rejected {
                recommendation: None,
                endorsement: None,
                sign_off: None,
                reason: Some(reason),
            },
            data: self.data,
        })
    }
}

impl Request<AdvisorReviewed> {
    /// Module coordinator review: `LAB_ADVISOR_REVIEWED -> MODULE_COORDINATOR_REVIEWED`.
    pub fn endorse(
        mut self,
        comment: &str,
        now: DateTime<Utc>,
    ) -> Result<Request<CoordinatorReviewed>> {
        let endorsement = required("moduleCoordinatorApproval", comment)?;
        self.data.updated_at = now;
        Ok(Request {
            state: CoordinatorReviewed {
                recommendation: self.state.recommendation, // Carry over advisor comment
                endorsement: Some(endorsement),
            },
            data: self.data,
        })
    }

    pub fn reject(mut self, reason: &str, now: DateTime<Utc>) -> Result<Request<Rejected>> {
        let reason = required("rejectionReason", reason)?;
        self.data.updated_at = now;
        Ok(Request {
            state: Rejected {
                recommendation: self.state.recommendation,
                endorsement: None,
                sign_off: None,
                reason: Some(reason),
            },
            data: self.data,
        })
    }
}

impl Request<CoordinatorReviewed> {
    /// Final approval: `MODULE_COORDINATOR_REVIEWED -> APPROVED`.
    pub fn approve(
        mut self,
        sign_off: &str,
        approved_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Request<Approved>> {
        let sign_off = required("labCoordinatorApproval", sign_off)?;
        self.data.updated_at = now;
        Ok(Request {
            state: Approved {
                recommendation: self.state.recommendation,
                endorsement: self.state.endorsement,
                sign_off: Some(sign_off),
                approved_date: Some(approved_date),
            },
            data: self.data,
        })
    }

    pub fn reject(mut self, reason: &str, now: DateTime<Utc>) -> Result<Request<Rejected>> {
        let reason = required("rejectionReason", reason)?;
        self.data.updated_at = now;
        Ok(Request {
            state: Rejected {
                recommendation: self.state.recommendation,
                endorsement: self.state.endorsement,
                sign_off: None,
                reason: Some(reason),
            },
            data: self.data,
        })
    }
}

/// Apply a review action to a request on behalf of a caller.
///
/// This is the single authoritative transition table. The caller's role set
/// is reduced to one acting role (most privileged reviewer capability); that
/// role and the request's current status select the transition:
///
/// | Role | Required status | New status |
/// |---|---|---|
/// | LAB_ADVISOR | PENDING | LAB_ADVISOR_REVIEWED |
/// | MODULE_COORDINATOR | LAB_ADVISOR_REVIEWED | MODULE_COORDINATOR_REVIEWED |
/// | LAB_COORDINATOR | MODULE_COORDINATOR_REVIEWED | APPROVED |
/// | ADMIN | any non-terminal | APPROVED |
/// | any reviewer | any non-terminal | REJECTED |
/// | ADMIN | any | any (override) |
///
/// Everything else fails with `InvalidTransition`. Missing or blank payload
/// fields fail with `ValidationError`; callers without any reviewer role
/// fail with `Forbidden`. Comments are written exactly once: every
/// transition fills only its own field and carries earlier ones over
/// untouched.
pub fn advance(
    request: AnyRequest,
    roles: &[Role],
    action: &ReviewAction,
    now: DateTime<Utc>,
) -> Result<AnyRequest> {
    let Some(role) = Role::acting_reviewer(roles) else {
        return Err(RelabError::Forbidden(
            "No reviewer role grants access to this request".to_string(),
        ));
    };

    let id = request.id();
    let from = request.status();

    let invalid = |request: &AnyRequest| RelabError::InvalidTransition {
        id,
        from: request.status(),
        role,
    };

    let next: AnyRequest = match (role, action, request) {
        (Role::LabAdvisor, ReviewAction::Recommend { comment }, AnyRequest::Pending(r)) => {
            r.recommend(comment, now)?.into()
        }
        (
            Role::ModuleCoordinator,
            ReviewAction::Endorse { comment },
            AnyRequest::AdvisorReviewed(r),
        ) => r.endorse(comment, now)?.into(),
        (
            Role::LabCoordinator,
            ReviewAction::Approve {
                comment,
                approved_date,
            },
            AnyRequest::CoordinatorReviewed(r),
        ) => r.approve(comment, *approved_date, now)?.into(),
        // Admin fast path: approve from any non-terminal state. Skipped
        // stages leave their comment fields absent.
        (
            Role::Admin,
            ReviewAction::Approve {
                comment,
                approved_date,
            },
            req,
        ) if !req.is_terminal() => {
            let sign_off = required("labCoordinatorApproval", comment)?;
            admin_approve(req, sign_off, *approved_date, now)
        }
        (_, ReviewAction::Reject { reason }, req) if !req.is_terminal() => match req {
            AnyRequest::Pending(r) => r.reject(reason, now)?.into(),
            AnyRequest::AdvisorReviewed(r) => r.reject(reason, now)?.into(),
            AnyRequest::CoordinatorReviewed(r) => r.reject(reason, now)?.into(),
            // Unreachable: terminal states were filtered by the guard.
            other => return Err(invalid(&other)),
        },
        (Role::Admin, ReviewAction::Override { status }, req) => override_status(req, *status, now),
        (_, _, req) => return Err(invalid(&req)),
    };

    counter!(
        "relab_request_transitions_total",
        "from" => from.to_string(),
        "to" => next.status().to_string(),
        "role" => role.to_string()
    )
    .increment(1);
    tracing::info!(
        request_id = %id,
        %from,
        to = %next.status(),
        %role,
        action = action.name(),
        "request transition applied"
    );

    Ok(next)
}

/// Admin approval from any non-terminal state, preserving whatever comments
/// the pipeline has collected so far.
fn admin_approve(
    request: AnyRequest,
    sign_off: String,
    approved_date: NaiveDate,
    now: DateTime<Utc>,
) -> AnyRequest {
    let (recommendation, endorsement, mut data) = split_comments(request);
    data.updated_at = now;
    Request {
        state: Approved {
            recommendation,
            endorsement,
            sign_off: Some(sign_off),
            approved_date: Some(approved_date),
        },
        data,
    }
    .into()
}

/// Admin override: force the target status, keeping collected comments and
/// leaving the rest absent. `approved_date` survives only on `APPROVED`.
fn override_status(request: AnyRequest, status: RequestStatus, now: DateTime<Utc>) -> AnyRequest {
    let mut record = request.to_record();
    record.status = status;
    record.updated_at = now;
    if status != RequestStatus::Approved {
        record.approved_date = None;
    }
    if status != RequestStatus::Rejected {
        record.rejection_reason = None;
    }
    AnyRequest::from_record(record)
}

fn split_comments(
    request: AnyRequest,
) -> (
    Option<String>,
    Option<String>,
    super::state::RequestData,
) {
    match request {
        AnyRequest::Pending(r) => (None, None, r.data),
        AnyRequest::AdvisorReviewed(r) => (r.state.recommendation, None, r.data),
        AnyRequest::CoordinatorReviewed(r) => (r.state.recommendation, r.state.endorsement, r.data),
        AnyRequest::Approved(r) => (r.state.recommendation, r.state.endorsement, r.data),
        AnyRequest::Rejected(r) => (r.state.recommendation, r.state.endorsement, r.data),
    }
}
