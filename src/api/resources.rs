//! Schedulable resource endpoints.
//!
//! The same handler set serves `/api/instructors`, `/api/lab-rooms`, and
//! `/api/teaching-assistants`; the resource kind arrives as a router-level
//! extension. `GET .../available` applies the conjunctive availability rule
//! from the domain layer; `/api/resources/availability` aggregates across
//! all three kinds for a proposed slot.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::request::TimeSlot;
use crate::domain::resource::{
    AvailabilityReport, Resource, ResourceId, ResourceKind, availability_report,
};
use crate::domain::user::Role;
use crate::error::{RelabError, Result};

use super::AppState;
use super::auth::AuthUser;

/// Resource management is restricted to lab coordinators and admins; read
/// and availability endpoints stay open to any authenticated caller.
fn require_manager(user: &AuthUser) -> Result<()> {
    if user.has_role(Role::LabCoordinator) || user.is_admin() {
        Ok(())
    } else {
        Err(RelabError::Forbidden(
            "Requires role LAB_COORDINATOR or ADMIN".to_string(),
        ))
    }
}

/// Routes for one resource collection. The caller layers in the kind.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/available", get(list_available))
        .route("/{id}", get(fetch).put(update).delete(delete))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    _user: AuthUser,
) -> Result<Json<Vec<Resource>>> {
    Ok(Json(state.store.list_resources(kind).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResource {
    pub name: String,
    pub email: Option<String>,
    pub capacity: Option<i32>,
    pub equipment: Option<String>,
    #[serde(default)]
    pub unavailable_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub unavailable_time_slots: Vec<TimeSlot>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    user: AuthUser,
    Json(body): Json<NewResource>,
) -> Result<(StatusCode, Json<Resource>)> {
    require_manager(&user)?;
    if body.name.trim().is_empty() {
        return Err(RelabError::Validation("name is required".to_string()));
    }
    let resource = Resource {
        id: ResourceId::new(),
        kind,
        name: body.name.trim().to_string(),
        email: body.email,
        capacity: body.capacity,
        equipment: body.equipment,
        unavailable_dates: body.unavailable_dates,
        unavailable_time_slots: body.unavailable_time_slots,
    };
    let resource = state.store.insert_resource(resource).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn fetch(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Resource>> {
    Ok(Json(state.store.get_resource(kind, ResourceId(id)).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<NewResource>,
) -> Result<Json<Resource>> {
    require_manager(&user)?;
    // Full replace; the id and kind are fixed by the path.
    let existing = state.store.get_resource(kind, ResourceId(id)).await?;
    let resource = Resource {
        id: existing.id,
        kind,
        name: body.name.trim().to_string(),
        email: body.email,
        capacity: body.capacity,
        equipment: body.equipment,
        unavailable_dates: body.unavailable_dates,
        unavailable_time_slots: body.unavailable_time_slots,
    };
    Ok(Json(state.store.update_resource(resource).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    require_manager(&user)?;
    state.store.delete_resource(kind, ResourceId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityParams {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
}

/// `GET /api/{kind}/available?date=&timeSlot=`
pub async fn list_available(
    State(state): State<AppState>,
    Extension(kind): Extension<ResourceKind>,
    _user: AuthUser,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<Resource>>> {
    let resources = state.store.list_resources(kind).await?;
    let available = resources
        .into_iter()
        .filter(|r| r.is_available(params.date, params.time_slot))
        .collect();
    Ok(Json(available))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    pub module_code: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
}

/// `GET /api/resources/availability?moduleCode=&date=&timeSlot=`
///
/// Advisory only: a negative report never blocks request submission.
pub async fn availability(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<AggregateParams>,
) -> Result<Json<AvailabilityReport>> {
    let instructors = state.store.list_resources(ResourceKind::Instructor).await?;
    let lab_rooms = state.store.list_resources(ResourceKind::LabRoom).await?;
    let teaching_assistants = state
        .store
        .list_resources(ResourceKind::TeachingAssistant)
        .await?;
    let conflicts = state
        .store
        .count_conflicting_requests(&params.module_code, params.date, params.time_slot)
        .await?;

    Ok(Json(availability_report(
        &params.module_code,
        params.date,
        params.time_slot,
        &instructors,
        &lab_rooms,
        &teaching_assistants,
        conflicts,
    )))
}
