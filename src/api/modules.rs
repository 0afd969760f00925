//! Course module management endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::module::{LabModule, ModuleId, NewModule};
use crate::error::Result;

use super::AppState;
use super::auth::AuthUser;

/// `GET /api/modules`: any authenticated user may browse modules.
pub async fn list(State(state): State<AppState>, _user: AuthUser) -> Result<Json<Vec<LabModule>>> {
    Ok(Json(state.store.list_modules().await?))
}

/// `POST /api/modules`
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<NewModule>,
) -> Result<(StatusCode, Json<LabModule>)> {
    user.require_admin()?;
    let module = body.into_module(Utc::now())?;
    let module = state.store.insert_module(module).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// `GET /api/modules/{id}`
pub async fn fetch(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LabModule>> {
    Ok(Json(state.store.get_module(ModuleId(id)).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModule {
    pub module_name: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i32>,
    pub coordinator: Option<String>,
    pub lab_sessions: Option<Vec<String>>,
    pub active: Option<bool>,
}

/// `PUT /api/modules/{id}`: partial update, absent fields keep their value.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateModule>,
) -> Result<Json<LabModule>> {
    user.require_admin()?;
    let mut module = state.store.get_module(ModuleId(id)).await?;
    if let Some(name) = body.module_name {
        module.module_name = name;
    }
    if let Some(department) = body.department {
        module.department = department;
    }
    if let Some(semester) = body.semester {
        module.semester = semester;
    }
    if let Some(coordinator) = body.coordinator {
        module.coordinator = coordinator;
    }
    if let Some(sessions) = body.lab_sessions {
        module.lab_sessions = sessions;
    }
    if let Some(active) = body.active {
        module.active = active;
    }
    module.updated_at = Utc::now();
    Ok(Json(state.store.update_module(module).await?))
}

/// `DELETE /api/modules/{id}`
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    user.require_admin()?;
    state.store.delete_module(ModuleId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
