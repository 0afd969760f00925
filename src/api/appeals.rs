//! Appeal endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::appeal::{Appeal, AppealDecision, AppealId};
use crate::domain::request::RequestStatus;
use crate::error::{RelabError, Result};
use crate::storage::{AppealFilter, AppealPartition, NewAppeal};

use super::AppState;
use super::auth::AuthUser;

/// `GET /api/appeals`. Admins see the whole queue; students their own.
pub async fn list(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Appeal>>> {
    let filter = if user.is_admin() {
        AppealFilter::default()
    } else {
        AppealFilter {
            student_id: Some(user.id),
            ..Default::default()
        }
    };
    Ok(Json(state.store.list_appeals(&filter).await?))
}

/// `POST /api/appeals`. Only the owner of a `REJECTED` request may appeal.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewAppeal>,
) -> Result<(StatusCode, Json<Appeal>)> {
    let request = state.store.get_request(body.request_id).await?;
    if request.student_id != user.id {
        return Err(RelabError::InvalidAppeal(
            "Only the request's owner may appeal it".to_string(),
        ));
    }
    if request.status != RequestStatus::Rejected {
        return Err(RelabError::InvalidAppeal(format!(
            "Request {} is in status '{}'; only rejected requests can be appealed",
            request.id, request.status
        )));
    }

    // Every attachment must reference a previously uploaded file.
    for reference in &body.attachments {
        if reference.contains('/') || reference.contains('\\') || reference.contains("..") {
            return Err(RelabError::Validation(format!(
                "Attachment not found: {reference}"
            )));
        }
        let path = std::path::Path::new(&state.config.upload_dir).join(reference);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(RelabError::Validation(format!(
                "Attachment not found: {reference}"
            )));
        }
    }

    let appeal = Appeal::new(
        body.request_id,
        user.id,
        user.username.clone(),
        &body.appeal_reason,
        body.attachments,
        Utc::now(),
    )?;
    let appeal = state.store.insert_appeal(appeal).await?;
    tracing::info!(appeal_id = %appeal.id, request_id = %appeal.request_id, "appeal created");
    Ok((StatusCode::CREATED, Json(appeal)))
}

/// `GET /api/appeals/pending`
pub async fn list_pending(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Appeal>>> {
    user.require_admin()?;
    let filter = AppealFilter {
        partition: Some(AppealPartition::Pending),
        ..Default::default()
    };
    Ok(Json(state.store.list_appeals(&filter).await?))
}

/// `GET /api/appeals/reviewed`
pub async fn list_reviewed(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Appeal>>> {
    user.require_admin()?;
    let filter = AppealFilter {
        partition: Some(AppealPartition::Reviewed),
        ..Default::default()
    };
    Ok(Json(state.store.list_appeals(&filter).await?))
}

/// `GET /api/appeals/{id}`
pub async fn fetch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Appeal>> {
    let appeal = state.store.get_appeal(AppealId(id)).await?;
    if !user.is_admin() && appeal.student_id != user.id {
        return Err(RelabError::Forbidden(
            "Students may only view their own appeals".to_string(),
        ));
    }
    Ok(Json(appeal))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    /// `true` approves, `false` rejects.
    pub decision: bool,
    pub comments: Option<String>,
}

/// `POST /api/appeals/{id}/review`: the panel's single terminal decision.
pub async fn review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<Appeal>> {
    user.require_admin()?;
    let decision = if body.decision {
        AppealDecision::Approved
    } else {
        AppealDecision::Rejected
    };
    let appeal = state
        .store
        .review_appeal(AppealId(id), decision, body.comments, &user.username, Utc::now())
        .await?;
    tracing::info!(appeal_id = %appeal.id, status = %appeal.status, "appeal reviewed");
    Ok(Json(appeal))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendBody {
    pub appeal_reason: String,
}

/// `PUT /api/appeals/{id}`: owner edits a still-pending appeal.
pub async fn amend(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AmendBody>,
) -> Result<Json<Appeal>> {
    let appeal = state.store.get_appeal(AppealId(id)).await?;
    if appeal.student_id != user.id && !user.is_admin() {
        return Err(RelabError::Forbidden(
            "Only the appellant may edit an appeal".to_string(),
        ));
    }
    let appeal = state
        .store
        .amend_appeal(AppealId(id), &body.appeal_reason, Utc::now())
        .await?;
    Ok(Json(appeal))
}

/// `DELETE /api/appeals/{id}`
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_admin()?;
    state.store.delete_appeal(AppealId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
