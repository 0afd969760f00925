//! Error types for the reschedule workflow engine.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::domain::appeal::AppealId;
use crate::domain::request::{RequestId, RequestStatus};
use crate::domain::user::Role;

/// Result type alias using the relab error type.
pub type Result<T> = std::result::Result<T, RelabError>;

/// Main error type for the workflow engine.
///
/// Every variant maps to a specific HTTP status in `IntoResponse`; nothing
/// is silently swallowed or retried.
#[derive(Error, Debug)]
pub enum RelabError {
    /// Reschedule request not found
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// Appeal not found
    #[error("Appeal not found: {0}")]
    AppealNotFound(AppealId),

    /// Generic entity lookup failure (users, modules, resources, files)
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// The acting role may not move the request out of its current status
    #[error("Invalid transition: request {id} is in status '{from}', which role {role} cannot act on")]
    InvalidTransition {
        id: RequestId,
        from: RequestStatus,
        role: Role,
    },

    /// Appeal created against a non-rejected or foreign request
    #[error("Invalid appeal: {0}")]
    InvalidAppeal(String),

    /// Duplicate appeal decision
    #[error("Appeal {0} has already been reviewed")]
    AlreadyReviewed(AppealId),

    /// Missing or invalid required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or unverifiable credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Database error
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelabError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelabError::RequestNotFound(_)
            | RelabError::AppealNotFound(_)
            | RelabError::NotFound(..) => StatusCode::NOT_FOUND,
            RelabError::InvalidTransition { .. }
            | RelabError::InvalidAppeal(_)
            | RelabError::Validation(_) => StatusCode::BAD_REQUEST,
            RelabError::AlreadyReviewed(_) => StatusCode::CONFLICT,
            RelabError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelabError::Forbidden(_) => StatusCode::FORBIDDEN,
            #[cfg(feature = "postgres")]
            RelabError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelabError::Serialization(_) | RelabError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelabError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
