//! Postgres storage backend.
//!
//! All queries are issued at runtime against the schema in `migrations/`.
//! Status and time-slot columns are TEXT holding the canonical string forms
//! and are parsed back through `FromStr` when rows are loaded. The two
//! lifecycle operations run in a transaction with `SELECT ... FOR UPDATE`
//! so concurrent transition attempts serialize on the row lock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::appeal::{Appeal, AppealDecision, AppealId, AppealStatus};
use crate::domain::module::{LabModule, ModuleId};
use crate::domain::request::{
    AnyRequest, RequestId, RequestRecord, ReviewAction, TimeSlot, advance,
};
use crate::domain::resource::{Resource, ResourceId, ResourceKind};
use crate::domain::user::{Role, User, UserId};
use crate::error::{RelabError, Result};

use super::{AppealFilter, AppealPartition, RequestFilter, Storage};

/// Postgres-backed [`Storage`] implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RelabError::Other(e.into()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const REQUEST_COLUMNS: &str = "id, student_id, student_name, module_code, original_lab_date, \
     requested_date, requested_time_slot, reason, attachments, status, \
     lab_advisor_recommendation, module_coordinator_approval, lab_coordinator_approval, \
     approved_date, rejection_reason, created_at, updated_at";

fn request_from_row(row: &PgRow) -> Result<RequestRecord> {
    let status: String = row.try_get("status")?;
    let slot: String = row.try_get("requested_time_slot")?;
    Ok(RequestRecord {
        id: RequestId(row.try_get("id")?),
        student_id: UserId(row.try_get("student_id")?),
        student_name: row.try_get("student_name")?,
        module_code: row.try_get("module_code")?,
        original_lab_date: row.try_get("original_lab_date")?,
        requested_date: row.try_get("requested_date")?,
        requested_time_slot: slot.parse()?,
        reason: row.try_get("reason")?,
        attachments: row.try_get("attachments")?,
        status: status.parse()?,
        lab_advisor_recommendation: row.try_get("lab_advisor_recommendation")?,
        module_coordinator_approval: row.try_get("module_coordinator_approval")?,
        lab_coordinator_approval: row.try_get("lab_coordinator_approval")?,
        approved_date: row.try_get("approved_date")?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn appeal_from_row(row: &PgRow) -> Result<Appeal> {
    let status: String = row.try_get("status")?;
    Ok(Appeal {
        id: AppealId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        student_id: UserId(row.try_get("student_id")?),
        student_name: row.try_get("student_name")?,
        appeal_reason: row.try_get("appeal_reason")?,
        attachments: row.try_get("attachments")?,
        status: status.parse()?,
        panel_decision: row.try_get("panel_decision")?,
        reviewed_by: row.try_get("reviewed_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let roles: Vec<String> = row.try_get("roles")?;
    let roles = roles
        .iter()
        .map(|r| r.parse())
        .collect::<Result<Vec<Role>>>()?;
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        student_number: row.try_get("student_number")?,
        department: row.try_get("department")?,
        semester: row.try_get("semester")?,
        roles,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn module_from_row(row: &PgRow) -> Result<LabModule> {
    Ok(LabModule {
        id: ModuleId(row.try_get("id")?),
        module_code: row.try_get("module_code")?,
        module_name: row.try_get("module_name")?,
        department: row.try_get("department")?,
        semester: row.try_get("semester")?,
        coordinator: row.try_get("coordinator")?,
        lab_sessions: row.try_get("lab_sessions")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn resource_from_row(row: &PgRow) -> Result<Resource> {
    let kind: String = row.try_get("kind")?;
    let slots: Vec<String> = row.try_get("unavailable_time_slots")?;
    let slots = slots
        .iter()
        .map(|s| s.parse())
        .collect::<Result<Vec<TimeSlot>>>()?;
    Ok(Resource {
        id: ResourceId(row.try_get("id")?),
        kind: kind.parse()?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        capacity: row.try_get("capacity")?,
        equipment: row.try_get("equipment")?,
        unavailable_dates: row.try_get("unavailable_dates")?,
        unavailable_time_slots: slots,
    })
}

async fn store_request<'e, E>(executor: E, record: &RequestRecord) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO reschedule_requests (id, student_id, student_name, module_code, \
             original_lab_date, requested_date, requested_time_slot, reason, attachments, \
             status, lab_advisor_recommendation, module_coordinator_approval, \
             lab_coordinator_approval, approved_date, rejection_reason, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         ON CONFLICT (id) DO UPDATE SET \
             status = EXCLUDED.status, \
             lab_advisor_recommendation = EXCLUDED.lab_advisor_recommendation, \
             module_coordinator_approval = EXCLUDED.module_coordinator_approval, \
             lab_coordinator_approval = EXCLUDED.lab_coordinator_approval, \
             approved_date = EXCLUDED.approved_date, \
             rejection_reason = EXCLUDED.rejection_reason, \
             updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.0)
    .bind(record.student_id.0)
    .bind(&record.student_name)
    .bind(&record.module_code)
    .bind(record.original_lab_date)
    .bind(record.requested_date)
    .bind(record.requested_time_slot.to_string())
    .bind(&record.reason)
    .bind(&record.attachments)
    .bind(record.status.to_string())
    .bind(&record.lab_advisor_recommendation)
    .bind(&record.module_coordinator_approval)
    .bind(&record.lab_coordinator_approval)
    .bind(record.approved_date)
    .bind(&record.rejection_reason)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Storage for PgStore {
    async fn insert_request(&self, request: AnyRequest) -> Result<RequestRecord> {
        let record = request.to_record();
        store_request(&self.pool, &record).await?;
        Ok(record)
    }

    async fn get_request(&self, id: RequestId) -> Result<RequestRecord> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM reschedule_requests WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RelabError::RequestNotFound(id))?;
        request_from_row(&row)
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<RequestRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM reschedule_requests \
             WHERE ($1::uuid IS NULL OR student_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR module_code = $3) \
               AND ($4::date IS NULL OR requested_date = $4) \
               AND ($5::text IS NULL OR requested_time_slot = $5) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.student_id.map(|id| id.0))
        .bind(filter.status.map(|s| s.to_string()))
        .bind(filter.module_code.as_deref())
        .bind(filter.requested_date)
        .bind(filter.requested_time_slot.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(request_from_row).collect()
    }

    async fn advance_request(
        &self,
        id: RequestId,
        roles: &[Role],
        action: &ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<RequestRecord> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM reschedule_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RelabError::RequestNotFound(id))?;

        let record = request_from_row(&row)?;
        let next = advance(AnyRequest::from_record(record), roles, action, now)?;
        let record = next.to_record();
        store_request(&mut *tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn delete_request(&self, id: RequestId) -> Result<()> {
        let result = sqlx::query("DELETE FROM reschedule_requests WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::RequestNotFound(id));
        }
        Ok(())
    }

    async fn count_conflicting_requests(
        &self,
        module_code: &str,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<usize> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM reschedule_requests \
             WHERE module_code = $1 AND requested_date = $2 AND requested_time_slot = $3",
        )
        .bind(module_code)
        .bind(date)
        .bind(slot.to_string())
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }

    async fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal> {
        sqlx::query(
            "INSERT INTO appeals (id, request_id, student_id, student_name, appeal_reason, \
                 attachments, status, panel_decision, reviewed_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(appeal.id.0)
        .bind(appeal.request_id.0)
        .bind(appeal.student_id.0)
        .bind(&appeal.student_name)
        .bind(&appeal.appeal_reason)
        .bind(&appeal.attachments)
        .bind(appeal.status.to_string())
        .bind(&appeal.panel_decision)
        .bind(&appeal.reviewed_by)
        .bind(appeal.created_at)
        .bind(appeal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(appeal)
    }

    async fn get_appeal(&self, id: AppealId) -> Result<Appeal> {
        let row = sqlx::query("SELECT * FROM appeals WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RelabError::AppealNotFound(id))?;
        appeal_from_row(&row)
    }

    async fn list_appeals(&self, filter: &AppealFilter) -> Result<Vec<Appeal>> {
        let partition = filter.partition.map(|p| match p {
            AppealPartition::Pending => AppealStatus::Pending.to_string(),
            AppealPartition::Reviewed => "REVIEWED".to_string(),
        });
        let rows = sqlx::query(
            "SELECT * FROM appeals \
             WHERE ($1::uuid IS NULL OR student_id = $1) \
               AND ($2::text IS NULL \
                    OR ($2 = 'PENDING' AND status = 'PENDING') \
                    OR ($2 = 'REVIEWED' AND status <> 'PENDING')) \
             ORDER BY created_at DESC",
        )
        .bind(filter.student_id.map(|id| id.0))
        .bind(partition)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(appeal_from_row).collect()
    }

    async fn review_appeal(
        &self,
        id: AppealId,
        decision: AppealDecision,
        comments: Option<String>,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM appeals WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RelabError::AppealNotFound(id))?;

        let mut appeal = appeal_from_row(&row)?;
        appeal.review(decision, comments, reviewer, now)?;

        sqlx::query(
            "UPDATE appeals SET status = $2, panel_decision = $3, reviewed_by = $4, \
                 updated_at = $5 WHERE id = $1",
        )
        .bind(id.0)
        .bind(appeal.status.to_string())
        .bind(&appeal.panel_decision)
        .bind(&appeal.reviewed_by)
        .bind(appeal.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(appeal)
    }

    async fn amend_appeal(
        &self,
        id: AppealId,
        appeal_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM appeals WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RelabError::AppealNotFound(id))?;

        let mut appeal = appeal_from_row(&row)?;
        appeal.amend_reason(appeal_reason, now)?;

        sqlx::query("UPDATE appeals SET appeal_reason = $2, updated_at = $3 WHERE id = $1")
            .bind(id.0)
            .bind(&appeal.appeal_reason)
            .bind(appeal.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(appeal)
    }

    async fn delete_appeal(&self, id: AppealId) -> Result<()> {
        let result = sqlx::query("DELETE FROM appeals WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::AppealNotFound(id));
        }
        Ok(())
    }

    async fn insert_user(&self, user: User) -> Result<User> {
        let roles: Vec<String> = user.roles.iter().map(Role::to_string).collect();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, first_name, last_name, \
                 student_number, department, semester, roles, enabled, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.student_number)
        .bind(&user.department)
        .bind(user.semester)
        .bind(&roles)
        .bind(user.enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RelabError::NotFound("User", id.to_string()))?;
        user_from_row(&row)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let roles: Vec<String> = user.roles.iter().map(Role::to_string).collect();
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, first_name = $5, \
                 last_name = $6, student_number = $7, department = $8, semester = $9, \
                 roles = $10, enabled = $11, updated_at = $12 WHERE id = $1",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.student_number)
        .bind(&user.department)
        .bind(user.semester)
        .bind(&roles)
        .bind(user.enabled)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("User", user.id.to_string()));
        }
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("User", id.to_string()));
        }
        Ok(())
    }

    async fn insert_module(&self, module: LabModule) -> Result<LabModule> {
        sqlx::query(
            "INSERT INTO modules (id, module_code, module_name, department, semester, \
                 coordinator, lab_sessions, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(module.id.0)
        .bind(&module.module_code)
        .bind(&module.module_name)
        .bind(&module.department)
        .bind(module.semester)
        .bind(&module.coordinator)
        .bind(&module.lab_sessions)
        .bind(module.active)
        .bind(module.created_at)
        .bind(module.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(module)
    }

    async fn get_module(&self, id: ModuleId) -> Result<LabModule> {
        let row = sqlx::query("SELECT * FROM modules WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RelabError::NotFound("Module", id.to_string()))?;
        module_from_row(&row)
    }

    async fn find_module_by_code(&self, code: &str) -> Result<Option<LabModule>> {
        let row = sqlx::query("SELECT * FROM modules WHERE module_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(module_from_row).transpose()
    }

    async fn list_modules(&self) -> Result<Vec<LabModule>> {
        let rows = sqlx::query("SELECT * FROM modules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(module_from_row).collect()
    }

    async fn update_module(&self, module: LabModule) -> Result<LabModule> {
        let result = sqlx::query(
            "UPDATE modules SET module_code = $2, module_name = $3, department = $4, \
                 semester = $5, coordinator = $6, lab_sessions = $7, active = $8, \
                 updated_at = $9 WHERE id = $1",
        )
        .bind(module.id.0)
        .bind(&module.module_code)
        .bind(&module.module_name)
        .bind(&module.department)
        .bind(module.semester)
        .bind(&module.coordinator)
        .bind(&module.lab_sessions)
        .bind(module.active)
        .bind(module.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("Module", module.id.to_string()));
        }
        Ok(module)
    }

    async fn delete_module(&self, id: ModuleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("Module", id.to_string()));
        }
        Ok(())
    }

    async fn insert_resource(&self, resource: Resource) -> Result<Resource> {
        let slots: Vec<String> = resource
            .unavailable_time_slots
            .iter()
            .map(TimeSlot::to_string)
            .collect();
        sqlx::query(
            "INSERT INTO resources (id, kind, name, email, capacity, equipment, \
                 unavailable_dates, unavailable_time_slots) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(resource.id.0)
        .bind(resource.kind.to_string())
        .bind(&resource.name)
        .bind(&resource.email)
        .bind(resource.capacity)
        .bind(&resource.equipment)
        .bind(&resource.unavailable_dates)
        .bind(&slots)
        .execute(&self.pool)
        .await?;
        Ok(resource)
    }

    async fn get_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<Resource> {
        let row = sqlx::query("SELECT * FROM resources WHERE id = $1 AND kind = $2")
            .bind(id.0)
            .bind(kind.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RelabError::NotFound("Resource", id.to_string()))?;
        resource_from_row(&row)
    }

    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Resource>> {
        let rows = sqlx::query("SELECT * FROM resources WHERE kind = $1 ORDER BY name")
            .bind(kind.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(resource_from_row).collect()
    }

    async fn update_resource(&self, resource: Resource) -> Result<Resource> {
        let slots: Vec<String> = resource
            .unavailable_time_slots
            .iter()
            .map(TimeSlot::to_string)
            .collect();
        let result = sqlx::query(
            "UPDATE resources SET name = $2, email = $3, capacity = $4, equipment = $5, \
                 unavailable_dates = $6, unavailable_time_slots = $7 \
             WHERE id = $1 AND kind = $8",
        )
        .bind(resource.id.0)
        .bind(&resource.name)
        .bind(&resource.email)
        .bind(resource.capacity)
        .bind(&resource.equipment)
        .bind(&resource.unavailable_dates)
        .bind(&slots)
        .bind(resource.kind.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("Resource", resource.id.to_string()));
        }
        Ok(resource)
    }

    async fn delete_resource(&self, kind: ResourceKind, id: ResourceId) -> Result<()> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1 AND kind = $2")
            .bind(id.0)
            .bind(kind.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelabError::NotFound("Resource", id.to_string()));
        }
        Ok(())
    }
}
