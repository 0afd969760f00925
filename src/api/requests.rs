//! Reschedule request endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::request::{RequestId, RequestRecord, RequestStatus, ReviewAction};
use crate::domain::user::{Role, UserId};
use crate::error::{RelabError, Result};
use crate::storage::{NewRequest, RequestFilter};

use super::AppState;
use super::auth::AuthUser;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<RequestStatus>,
    pub module_code: Option<String>,
}

/// `GET /api/requests`. Students only ever see their own submissions;
/// reviewers see everything.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RequestRecord>>> {
    let filter = RequestFilter {
        student_id: scope_to_student(&user),
        status: params.status,
        module_code: params.module_code,
        ..Default::default()
    };
    Ok(Json(state.store.list_requests(&filter).await?))
}

/// `POST /api/requests`
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewRequest>,
) -> Result<(StatusCode, Json<RequestRecord>)> {
    user.require(Role::Student)?;

    let module = state
        .store
        .find_module_by_code(&body.module_code)
        .await?
        .ok_or_else(|| RelabError::NotFound("Module", body.module_code.clone()))?;
    if !module.active {
        return Err(RelabError::Validation(format!(
            "Module {} is not accepting reschedule requests",
            module.module_code
        )));
    }

    let pending = body.into_pending(user.id, user.username.clone(), Utc::now())?;
    let record = state.store.insert_request(pending.into()).await?;
    tracing::info!(request_id = %record.id, student = %user.username, "request created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/requests/{id}`
pub async fn fetch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestRecord>> {
    let record = state.store.get_request(RequestId(id)).await?;
    ensure_visible(&user, &record)?;
    Ok(Json(record))
}

/// `PUT /api/requests/{id}`: apply one transition from the table.
pub async fn review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(action): Json<ReviewAction>,
) -> Result<Json<RequestRecord>> {
    user.require_reviewer()?;
    let record = state
        .store
        .advance_request(RequestId(id), &user.roles, &action, Utc::now())
        .await?;
    Ok(Json(record))
}

/// `DELETE /api/requests/{id}`
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_admin()?;
    state.store.delete_request(RequestId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/requests/status/{status}`
pub async fn list_by_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(status): Path<String>,
) -> Result<Json<Vec<RequestRecord>>> {
    user.require_reviewer()?;
    let filter = RequestFilter {
        status: Some(status.parse()?),
        ..Default::default()
    };
    Ok(Json(state.store.list_requests(&filter).await?))
}

/// `GET /api/requests/student/{student_id}`
pub async fn list_by_student(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<RequestRecord>>> {
    let student_id = UserId(student_id);
    if student_id != user.id {
        user.require_reviewer()?;
    }
    let filter = RequestFilter {
        student_id: Some(student_id),
        ..Default::default()
    };
    Ok(Json(state.store.list_requests(&filter).await?))
}

fn scope_to_student(user: &AuthUser) -> Option<UserId> {
    if user.is_reviewer() {
        None
    } else {
        Some(user.id)
    }
}

fn ensure_visible(user: &AuthUser, record: &RequestRecord) -> Result<()> {
    if user.is_reviewer() || record.student_id == user.id {
        Ok(())
    } else {
        Err(RelabError::Forbidden(
            "Students may only view their own requests".to_string(),
        ))
    }
}
