//! User management endpoints (admin only, except self-lookup).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::user::{Role, User, UserId};
use crate::error::Result;

use super::AppState;
use super::auth::AuthUser;

/// `GET /api/users`
pub async fn list(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<User>>> {
    user.require_admin()?;
    Ok(Json(state.store.list_users().await?))
}

/// `GET /api/users/{id}`: admins may fetch anyone, others only themselves.
pub async fn fetch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    let id = UserId(id);
    if id != user.id {
        user.require_admin()?;
    }
    Ok(Json(state.store.get_user(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_number: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i32>,
    pub roles: Option<Vec<Role>>,
    pub enabled: Option<bool>,
}

/// `PUT /api/users/{id}`
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUser>,
) -> Result<Json<User>> {
    user.require_admin()?;
    let mut target = state.store.get_user(UserId(id)).await?;
    if let Some(email) = body.email {
        target.email = email;
    }
    if let Some(first_name) = body.first_name {
        target.first_name = first_name;
    }
    if let Some(last_name) = body.last_name {
        target.last_name = last_name;
    }
    if let Some(student_number) = body.student_number {
        target.student_number = Some(student_number);
    }
    if let Some(department) = body.department {
        target.department = Some(department);
    }
    if let Some(semester) = body.semester {
        target.semester = Some(semester);
    }
    if let Some(roles) = body.roles {
        target.roles = roles;
    }
    if let Some(enabled) = body.enabled {
        target.enabled = enabled;
    }
    target.updated_at = Utc::now();
    Ok(Json(state.store.update_user(target).await?))
}

/// `DELETE /api/users/{id}`
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_admin()?;
    state.store.delete_user(UserId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
