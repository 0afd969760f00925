//! Appeals against rejected reschedule requests.
//!
//! An appeal has a much simpler lifecycle than the request it contests:
//! `PENDING` until a panel decision lands, then terminally `APPROVED` or
//! `REJECTED`. There is exactly one review; a second attempt fails with
//! `AlreadyReviewed` no matter what it carries.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::RequestId;
use crate::domain::user::UserId;
use crate::error::{RelabError, Result};

/// Unique identifier for an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppealId(pub Uuid);

impl AppealId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppealId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Deref for AppealId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Uuid> for AppealId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppealStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AppealStatus::Pending)
    }
}

impl fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppealStatus::Pending => "PENDING",
            AppealStatus::Approved => "APPROVED",
            AppealStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

impl FromStr for AppealStatus {
    type Err = RelabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(AppealStatus::Pending),
            "APPROVED" => Ok(AppealStatus::Approved),
            "REJECTED" => Ok(AppealStatus::Rejected),
            other => Err(RelabError::Validation(format!(
                "Unknown appeal status: {other}"
            ))),
        }
    }
}

/// The panel's verdict on an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppealDecision {
    Approved,
    Rejected,
}

/// A student's appeal against a rejected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: AppealId,
    pub request_id: RequestId,
    pub student_id: UserId,
    pub student_name: String,
    pub appeal_reason: String,
    /// Ordered list of opaque stored-file references.
    #[serde(default)]
    pub attachments: Vec<String>,
    pub status: AppealStatus,
    /// Panel comments recorded at review time. `None` until reviewed.
    pub panel_decision: Option<String>,
    /// Username of the admin who reviewed the appeal.
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appeal {
    /// Create a new pending appeal. The caller is responsible for checking
    /// that the contested request exists, is `REJECTED`, and belongs to the
    /// appellant.
    pub fn new(
        request_id: RequestId,
        student_id: UserId,
        student_name: String,
        appeal_reason: &str,
        attachments: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let appeal_reason = appeal_reason.trim();
        if appeal_reason.is_empty() {
            return Err(RelabError::Validation(
                "appealReason is required".to_string(),
            ));
        }
        Ok(Appeal {
            id: AppealId::new(),
            request_id,
            student_id,
            student_name,
            appeal_reason: appeal_reason.to_string(),
            attachments,
            status: AppealStatus::Pending,
            panel_decision: None,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record the panel's single terminal review.
    ///
    /// Absent comments mean a quick action and get canned text for either
    /// decision. An explicitly supplied blank comment on a rejection is an
    /// error: a rejected appellant is owed a written justification. A blank
    /// comment on an approval is dropped in favor of the canned text.
    pub fn review(
        &mut self,
        decision: AppealDecision,
        comments: Option<String>,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status.is_terminal() {
            return Err(RelabError::AlreadyReviewed(self.id));
        }

        let comments = comments.map(|c| c.trim().to_string());
        let panel_decision = match (decision, comments) {
            (_, Some(text)) if !text.is_empty() => text,
            (AppealDecision::Approved, _) => "Approved via quick action".to_string(),
            (AppealDecision::Rejected, None) => "Rejected via quick action".to_string(),
            (AppealDecision::Rejected, Some(_)) => {
                return Err(RelabError::Validation(
                    "Comments are required when rejecting an appeal".to_string(),
                ));
            }
        };

        self.status = match decision {
            AppealDecision::Approved => AppealStatus::Approved,
            AppealDecision::Rejected => AppealStatus::Rejected,
        };
        self.panel_decision = Some(panel_decision);
        self.reviewed_by = Some(reviewer.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Replace the appeal reason. Only pending appeals may be edited.
    pub fn amend_reason(&mut self, appeal_reason: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(RelabError::AlreadyReviewed(self.id));
        }
        let appeal_reason = appeal_reason.trim();
        if appeal_reason.is_empty() {
            return Err(RelabError::Validation(
                "appealReason is required".to_string(),
            ));
        }
        self.appeal_reason = appeal_reason.to_string();
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_appeal() -> Appeal {
        Appeal::new(
            RequestId(Uuid::new_v4()),
            UserId::new(),
            "Nadia Perera".to_string(),
            "New evidence from the medical center",
            vec![],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn blank_reason_is_rejected_at_creation() {
        let err = Appeal::new(
            RequestId(Uuid::new_v4()),
            UserId::new(),
            "x".to_string(),
            "  ",
            vec![],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, RelabError::Validation(_)));
    }

    #[test]
    fn attachments_are_kept_and_serialized() {
        let appeal = Appeal::new(
            RequestId(Uuid::new_v4()),
            UserId::new(),
            "Nadia Perera".to_string(),
            "new evidence",
            vec!["cert.pdf".to_string()],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(appeal.attachments, vec!["cert.pdf".to_string()]);

        let json = serde_json::to_value(&appeal).unwrap();
        assert_eq!(json["attachments"][0], "cert.pdf");
    }

    #[test]
    fn review_with_comments_records_them() {
        let mut appeal = pending_appeal();
        appeal
            .review(
                AppealDecision::Rejected,
                Some("Evidence predates the original decision".to_string()),
                "panel_admin",
                Utc::now(),
            )
            .unwrap();
        assert_eq!(appeal.status, AppealStatus::Rejected);
        assert_eq!(
            appeal.panel_decision.as_deref(),
            Some("Evidence predates the original decision")
        );
        assert_eq!(appeal.reviewed_by.as_deref(), Some("panel_admin"));
    }

    #[test]
    fn quick_approval_gets_canned_comment() {
        let mut appeal = pending_appeal();
        appeal
            .review(AppealDecision::Approved, None, "panel_admin", Utc::now())
            .unwrap();
        assert_eq!(appeal.status, AppealStatus::Approved);
        assert_eq!(appeal.panel_decision.as_deref(), Some("Approved via quick action"));
    }

    #[test]
    fn blank_comment_counts_as_absent_for_approval() {
        let mut appeal = pending_appeal();
        appeal
            .review(
                AppealDecision::Approved,
                Some("   ".to_string()),
                "panel_admin",
                Utc::now(),
            )
            .unwrap();
        assert_eq!(appeal.panel_decision.as_deref(), Some("Approved via quick action"));
    }

    #[test]
    fn quick_rejection_gets_canned_comment() {
        let mut appeal = pending_appeal();
        appeal
            .review(AppealDecision::Rejected, None, "panel_admin", Utc::now())
            .unwrap();
        assert_eq!(appeal.status, AppealStatus::Rejected);
        assert_eq!(appeal.panel_decision.as_deref(), Some("Rejected via quick action"));
    }

    #[test]
    fn rejection_with_blank_comment_fails_and_leaves_appeal_pending() {
        let mut appeal = pending_appeal();
        let err = appeal
            .review(
                AppealDecision::Rejected,
                Some("   ".to_string()),
                "panel_admin",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RelabError::Validation(_)));
        assert_eq!(appeal.status, AppealStatus::Pending);
        assert_eq!(appeal.panel_decision, None);
    }

    #[test]
    fn second_review_fails() {
        let mut appeal = pending_appeal();
        appeal
            .review(AppealDecision::Approved, None, "panel_admin", Utc::now())
            .unwrap();
        let err = appeal
            .review(
                AppealDecision::Rejected,
                Some("changed our minds".to_string()),
                "panel_admin",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, RelabError::AlreadyReviewed(_)));
        assert_eq!(appeal.status, AppealStatus::Approved);
    }

    #[test]
    fn amend_is_pending_only() {
        let mut appeal = pending_appeal();
        appeal
            .amend_reason("Clarified timeline", Utc::now())
            .unwrap();
        assert_eq!(appeal.appeal_reason, "Clarified timeline");

        appeal
            .review(AppealDecision::Approved, None, "panel_admin", Utc::now())
            .unwrap();
        let err = appeal.amend_reason("too late", Utc::now()).unwrap_err();
        assert!(matches!(err, RelabError::AlreadyReviewed(_)));
    }
}
