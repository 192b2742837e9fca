//! Maps `CoreError` (and adapter-only failures: authentication, RBAC,
//! strict-schema rejection) onto HTTP responses per §6's stable status
//! table: NotFound→404, VersionConflict/IdempotencyConflict→409,
//! Forbidden→403, Unauthenticated→401, everything else→422.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shopfloor_core::error::CoreError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_actions: Option<Vec<String>>,
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                error: "unauthenticated".to_string(),
                message: message.into(),
                current_status: None,
                allowed_actions: None,
            },
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorBody {
                error: "forbidden".to_string(),
                message: message.into(),
                current_status: None,
                allowed_actions: None,
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: ErrorBody {
                error: "validation".to_string(),
                message: message.into(),
                current_status: None,
                allowed_actions: None,
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY);
        let (current_status, allowed_actions) = match &err {
            CoreError::TransitionNotAllowed {
                current_status,
                allowed_actions,
                ..
            } => (
                Some(current_status.to_string()),
                Some(allowed_actions.clone()),
            ),
            _ => (None, None),
        };
        let error = match &err {
            CoreError::NotFound(_) => "not_found",
            CoreError::VersionConflict { .. } => "version_conflict",
            CoreError::IdempotencyConflict { .. } => "idempotency_conflict",
            CoreError::TransitionNotAllowed { .. } => "transition_not_allowed",
            CoreError::InvariantViolation(_) => "invariant_violation",
            CoreError::Validation(_) => "validation",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Unauthenticated(_) => "unauthenticated",
        };
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                message: err.to_string(),
                current_status,
                allowed_actions,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
