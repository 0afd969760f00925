//! Persistence layer for the reschedule workflow engine.
//!
//! The [`Storage`] trait abstracts over backends so handlers and tests can
//! run against either Postgres or the in-memory store. The two mutating
//! lifecycle operations, [`Storage::advance_request`] and
//! [`Storage::review_appeal`], must execute as atomic read-modify-writes:
//! of two concurrent, mutually exclusive attempts on the same entity,
//! exactly one succeeds and the loser fails with `InvalidTransition` or
//! `AlreadyReviewed`.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::domain::appeal::{Appeal, AppealDecision, AppealId};
use crate::domain::module::{LabModule, ModuleId};
use crate::domain::request::{
    AnyRequest, Pending, Request, RequestData, RequestId, RequestRecord, RequestStatus,
    ReviewAction, TimeSlot,
};
use crate::domain::resource::{Resource, ResourceId, ResourceKind};
use crate::domain::user::{Role, User, UserId};
use crate::error::{RelabError, Result};

/// Creation payload for a reschedule request, as posted by a student.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub module_code: String,
    pub original_lab_date: NaiveDate,
    pub requested_date: NaiveDate,
    pub requested_time_slot: TimeSlot,
    pub reason: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl NewRequest {
    /// Validate the payload and build the initial `PENDING` request for the
    /// submitting student. The caller is responsible for verifying the
    /// referenced module exists and is active.
    pub fn into_pending(
        self,
        student_id: UserId,
        student_name: String,
        now: DateTime<Utc>,
    ) -> Result<Request<Pending>> {
        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            return Err(RelabError::Validation("reason is required".to_string()));
        }
        if self.requested_date == self.original_lab_date {
            return Err(RelabError::Validation(
                "requestedDate must differ from originalLabDate".to_string(),
            ));
        }
        Ok(Request {
            state: Pending,
            data: RequestData {
                id: RequestId(uuid::Uuid::new_v4()),
                student_id,
                student_name,
                module_code: self.module_code.trim().to_string(),
                original_lab_date: self.original_lab_date,
                requested_date: self.requested_date,
                requested_time_slot: self.requested_time_slot,
                reason,
                attachments: self.attachments,
                created_at: now,
                updated_at: now,
            },
        })
    }
}

/// Creation payload for an appeal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppeal {
    pub request_id: RequestId,
    pub appeal_reason: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Filter for request listings. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub student_id: Option<UserId>,
    pub status: Option<RequestStatus>,
    pub module_code: Option<String>,
    pub requested_date: Option<NaiveDate>,
    pub requested_time_slot: Option<TimeSlot>,
}

/// The two admin partitions of the appeal queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppealPartition {
    Pending,
    Reviewed,
}

/// Filter for appeal listings.
#[derive(Debug, Clone, Default)]
pub struct AppealFilter {
    pub student_id: Option<UserId>,
    pub partition: Option<AppealPartition>,
}

/// Backend-agnostic persistence operations.
///
/// Listings are sorted newest first by `created_at`.
#[async_trait]
pub trait Storage: Send + Sync {
    // Reschedule requests

    async fn insert_request(&self, request: AnyRequest) -> Result<RequestRecord>;
    async fn get_request(&self, id: RequestId) -> Result<RequestRecord>;
    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<RequestRecord>>;

    /// Atomically load the request, apply the transition table, and persist
    /// the outcome. Concurrent mutually exclusive attempts race on the
    /// status guard; the loser sees `InvalidTransition`.
    async fn advance_request(
        &self,
        id: RequestId,
        roles: &[Role],
        action: &ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<RequestRecord>;

    async fn delete_request(&self, id: RequestId) -> Result<()>;

    /// Count existing requests already targeting `(module, date, slot)`.
    async fn count_conflicting_requests(
        &self,
        module_code: &str,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<usize>;

    // Appeals

    async fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal>;
    async fn get_appeal(&self, id: AppealId) -> Result<Appeal>;
    async fn list_appeals(&self, filter: &AppealFilter) -> Result<Vec<Appeal>>;

    /// Atomically record the panel's single terminal review.
    async fn review_appeal(
        &self,
        id: AppealId,
        decision: AppealDecision,
        comments: Option<String>,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal>;

    /// Replace the reason of a still-pending appeal.
    async fn amend_appeal(
        &self,
        id: AppealId,
        appeal_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal>;

    async fn delete_appeal(&self, id: AppealId) -> Result<()>;

    // Users

    async fn insert_user(&self, user: User) -> Result<User>;
    async fn get_user(&self, id: UserId) -> Result<User>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn update_user(&self, user: User) -> Result<User>;
    async fn delete_user(&self, id: UserId) -> Result<()>;

    // Course modules

    async fn insert_module(&self, module: LabModule) -> Result<LabModule>;
    async fn get_module(&self, id: ModuleId) -> Result<LabModule>;
    async fn find_module_by_code(&self, code: &str) -> Result<Option<LabModule>>;
    async fn list_modules(&self) -> Result<Vec<LabModule>>;
    async fn update_module(&self, module: LabModule) -> Result<LabModule>;
    async fn delete_module(&self, id: ModuleId) -> Result<()>;

    // Schedulable resources

    async fn insert_resource(&self, resource: Resource) -> Result<Resource>;
    async fn get_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<Resource>;
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Resource>>;
    async fn update_resource(&self, resource: Resource) -> Result<Resource>;
    async fn delete_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<()>;
}
