//! In-memory storage backend.
//!
//! Used by tests and by the server when no database is wanted. All state
//! lives behind one `parking_lot::Mutex`, which also gives the lifecycle
//! operations their atomic read-modify-write semantics for free: a
//! transition loads, checks, and stores the entity under a single lock
//! acquisition, so racing attempts serialize and the loser fails on the
//! status guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use crate::domain::appeal::{Appeal, AppealDecision, AppealId};
use crate::domain::module::{LabModule, ModuleId};
use crate::domain::request::{
    AnyRequest, RequestId, RequestRecord, ReviewAction, TimeSlot, advance,
};
use crate::domain::resource::{Resource, ResourceId, ResourceKind};
use crate::domain::user::{Role, User, UserId};
use crate::error::{RelabError, Result};

use super::{AppealFilter, AppealPartition, RequestFilter, Storage};

#[derive(Default)]
struct Inner {
    requests: HashMap<RequestId, RequestRecord>,
    appeals: HashMap<AppealId, Appeal>,
    users: HashMap<UserId, User>,
    modules: HashMap<ModuleId, LabModule>,
    resources: HashMap<ResourceId, Resource>,
}

/// In-memory [`Storage`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_request(record: &RequestRecord, filter: &RequestFilter) -> bool {
    filter.student_id.is_none_or(|id| record.student_id == id)
        && filter.status.is_none_or(|s| record.status == s)
        && filter
            .module_code
            .as_deref()
            .is_none_or(|code| record.module_code == code)
        && filter
            .requested_date
            .is_none_or(|d| record.requested_date == d)
        && filter
            .requested_time_slot
            .is_none_or(|slot| record.requested_time_slot == slot)
}

fn matches_appeal(appeal: &Appeal, filter: &AppealFilter) -> bool {
    filter.student_id.is_none_or(|id| appeal.student_id == id)
        && filter.partition.is_none_or(|p| match p {
            AppealPartition::Pending => !appeal.status.is_terminal(),
            AppealPartition::Reviewed => appeal.status.is_terminal(),
        })
}

#[async_trait]
impl Storage for MemoryStore {
    async fn insert_request(&self, request: AnyRequest) -> Result<RequestRecord> {
        let record = request.to_record();
        self.inner.lock().requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_request(&self, id: RequestId) -> Result<RequestRecord> {
        self.inner
            .lock()
            .requests
            .get(&id)
            .cloned()
            .ok_or(RelabError::RequestNotFound(id))
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<RequestRecord>> {
        let inner = self.inner.lock();
        let mut records: Vec<_> = inner
            .requests
            .values()
            .filter(|r| matches_request(r, filter))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn advance_request(
        &self,
        id: RequestId,
        roles: &[Role],
        action: &ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<RequestRecord> {
        // Load, transition, and store under one lock acquisition.
        let mut inner = self.inner.lock();
        let record = inner
            .requests
            .get(&id)
            .cloned()
            .ok_or(RelabError::RequestNotFound(id))?;
        let next = advance(AnyRequest::from_record(record), roles, action, now)?;
        let record = next.to_record();
        inner.requests.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_request(&self, id: RequestId) -> Result<()> {
        self.inner
            .lock()
            .requests
            .remove(&id)
            .map(|_| ())
            .ok_or(RelabError::RequestNotFound(id))
    }

    async fn count_conflicting_requests(
        &self,
        module_code: &str,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<usize> {
        let inner = self.inner.lock();
        Ok(inner
            .requests
            .values()
            .filter(|r| {
                r.module_code == module_code
                    && r.requested_date == date
                    && r.requested_time_slot == slot
            })
            .count())
    }

    async fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal> {
        self.inner.lock().appeals.insert(appeal.id, appeal.clone());
        Ok(appeal)
    }

    async fn get_appeal(&self, id: AppealId) -> Result<Appeal> {
        self.inner
            .lock()
            .appeals
            .get(&id)
            .cloned()
            .ok_or(RelabError::AppealNotFound(id))
    }

    async fn list_appeals(&self, filter: &AppealFilter) -> Result<Vec<Appeal>> {
        let inner = self.inner.lock();
        let mut appeals: Vec<_> = inner
            .appeals
            .values()
            .filter(|a| matches_appeal(a, filter))
            .cloned()
            .collect();
        appeals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appeals)
    }

    async fn review_appeal(
        &self,
        id: AppealId,
        decision: AppealDecision,
        comments: Option<String>,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let mut inner = self.inner.lock();
        let appeal = inner
            .appeals
            .get_mut(&id)
            .ok_or(RelabError::AppealNotFound(id))?;
        // Appeal::review mutates in place only after all checks pass, so a
        // failed review leaves the stored appeal untouched.
        appeal.review(decision, comments, reviewer, now)?;
        Ok(appeal.clone())
    }

    async fn amend_appeal(
        &self,
        id: AppealId,
        appeal_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let mut inner = self.inner.lock();
        let appeal = inner
            .appeals
            .get_mut(&id)
            .ok_or(RelabError::AppealNotFound(id))?;
        appeal.amend_reason(appeal_reason, now)?;
        Ok(appeal.clone())
    }

    async fn delete_appeal(&self, id: AppealId) -> Result<()> {
        self.inner
            .lock()
            .appeals
            .remove(&id)
            .map(|_| ())
            .ok_or(RelabError::AppealNotFound(id))
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        self.inner.lock().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        self.inner
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RelabError::NotFound("User", id.to_string()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.lock();
        let mut users: Vec<_> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let mut inner = self.inner.lock();
        if !inner.users.contains_key(&user.id) {
            return Err(RelabError::NotFound("User", user.id.to_string()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.inner
            .lock()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RelabError::NotFound("User", id.to_string()))
    }

    async fn insert_module(&self, module: LabModule) -> Result<LabModule> {
        self.inner.lock().modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn get_module(&self, id: ModuleId) -> Result<LabModule> {
        self.inner
            .lock()
            .modules
            .get(&id)
            .cloned()
            .ok_or_else(|| RelabError::NotFound("Module", id.to_string()))
    }

    async fn find_module_by_code(&self, code: &str) -> Result<Option<LabModule>> {
        Ok(self
            .inner
            .lock()
            .modules
            .values()
            .find(|m| m.module_code == code)
            .cloned())
    }

    async fn list_modules(&self) -> Result<Vec<LabModule>> {
        let inner = self.inner.lock();
        let mut modules: Vec<_> = inner.modules.values().cloned().collect();
        modules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(modules)
    }

    async fn update_module(&self, module: LabModule) -> Result<LabModule> {
        let mut inner = self.inner.lock();
        if !inner.modules.contains_key(&module.id) {
            return Err(RelabError::NotFound("Module", module.id.to_string()));
        }
        inner.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn delete_module(&self, id: ModuleId) -> Result<()> {
        self.inner
            .lock()
            .modules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RelabError::NotFound("Module", id.to_string()))
    }

    async fn insert_resource(&self, resource: Resource) -> Result<Resource> {
        self.inner
            .lock()
            .resources
            .insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn get_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<Resource> {
        self.inner
            .lock()
            .resources
            .get(&id)
            .filter(|r| r.kind == kind)
            .cloned()
            .ok_or_else(|| RelabError::NotFound("Resource", id.to_string()))
    }

    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Resource>> {
        let inner = self.inner.lock();
        let mut resources: Vec<_> = inner
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn update_resource(&self, resource: Resource) -> Result<Resource> {
        let mut inner = self.inner.lock();
        if !inner.resources.contains_key(&resource.id) {
            return Err(RelabError::NotFound("Resource", resource.id.to_string()));
        }
        inner.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn delete_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.resources.get(&id) {
            Some(r) if r.kind == kind => {
                inner.resources.remove(&id);
                Ok(())
            }
            _ => Err(RelabError::NotFound("Resource", id.to_string())),
        }
    }
}
