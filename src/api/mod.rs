//! HTTP surface of the workflow engine.
//!
//! All routes live under `/api`. Every route except `/api/auth/*` requires a
//! bearer token; role checks happen per handler so failures distinguish
//! `401` (no usable token) from `403` (wrong role).

pub mod appeals;
pub mod auth;
pub mod modules;
pub mod requests;
pub mod resources;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::domain::resource::ResourceKind;
use crate::storage::Storage;

use auth::AuthKeys;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub config: Config,
    pub keys: AuthKeys,
}

impl AppState {
    pub fn new(store: Arc<dyn Storage>, config: Config) -> Self {
        let keys = AuthKeys::new(config.jwt_secret.as_bytes(), config.token_ttl_secs);
        Self {
            store,
            config,
            keys,
        }
    }
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    let keys = state.keys.clone();

    let auth_routes = Router::new()
        .route("/signin", post(auth::signin))
        .route("/signup", post(auth::signup));

    let request_routes = Router::new()
        .route("/", get(requests::list).post(requests::create))
        .route("/upload", post(uploads::upload))
        .route("/files/{filename}", get(uploads::download))
        .route("/status/{status}", get(requests::list_by_status))
        .route("/student/{student_id}", get(requests::list_by_student))
        .route(
            "/{id}",
            get(requests::fetch)
                .put(requests::review)
                .delete(requests::delete),
        );

    let appeal_routes = Router::new()
        .route("/", get(appeals::list).post(appeals::create))
        .route("/pending", get(appeals::list_pending))
        .route("/reviewed", get(appeals::list_reviewed))
        .route("/{id}/review", post(appeals::review))
        .route(
            "/{id}",
            get(appeals::fetch).put(appeals::amend).delete(appeals::delete),
        );

    let module_routes = Router::new()
        .route("/", get(modules::list).post(modules::create))
        .route(
            "/{id}",
            get(modules::fetch).put(modules::update).delete(modules::delete),
        );

    let user_routes = Router::new().route("/", get(users::list)).route(
        "/{id}",
        get(users::fetch).put(users::update).delete(users::delete),
    );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/requests", request_routes)
        .nest("/api/appeals", appeal_routes)
        .nest("/api/modules", module_routes)
        .nest("/api/users", user_routes)
        .nest(
            "/api/instructors",
            resources::routes().layer(Extension(ResourceKind::Instructor)),
        )
        .nest(
            "/api/lab-rooms",
            resources::routes().layer(Extension(ResourceKind::LabRoom)),
        )
        .nest(
            "/api/teaching-assistants",
            resources::routes().layer(Extension(ResourceKind::TeachingAssistant)),
        )
        .route("/api/resources/availability", get(resources::availability))
        .layer(Extension(keys))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
