use crate::models::TaskStatus;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error taxonomy for the Task Transition Core. Kinds, not type names: each
/// variant maps to one stable HTTP status at the adapter boundary and
/// carries enough structure to render a precise, testable message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Target task/deliverable does not exist in the tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// `expected_row_version` did not match the task's current version.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    /// Same `client_event_id` reused with a different request fingerprint.
    #[error("idempotency conflict for client_event_id {client_event_id}")]
    IdempotencyConflict { client_event_id: String },

    /// Action invalid from the current status, or missing required action
    /// data, or attempted on a task lacking required context.
    #[error("action '{action}' not allowed from status '{current_status}': {message}")]
    TransitionNotAllowed {
        action: String,
        current_status: TaskStatus,
        allowed_actions: Vec<String>,
        message: String,
    },

    /// Fix-task context rules, WIP=1, project consistency, or a uniqueness
    /// invariant (I5, I6, I11, I12) would be violated.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed payload: enum out of range, negative priority, unknown
    /// fields, missing `notes` on rejection, `other_kind_label` rules.
    #[error("validation error: {0}")]
    Validation(String),

    /// Role lacks permission for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing actor/tenant context at the boundary.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

impl CoreError {
    pub fn not_found_task(task_id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("task {task_id} not found"))
    }

    pub fn not_found_deliverable(deliverable_id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("deliverable {deliverable_id} not found"))
    }

    pub fn version_conflict(expected: i64, actual: i64) -> Self {
        Self::VersionConflict { expected, actual }
    }

    pub fn idempotency_conflict(client_event_id: impl Into<String>) -> Self {
        Self::IdempotencyConflict {
            client_event_id: client_event_id.into(),
        }
    }

    pub fn transition_not_allowed(
        action: impl Into<String>,
        current_status: TaskStatus,
        allowed_actions: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransitionNotAllowed {
            action: action.into(),
            current_status,
            allowed_actions,
            message: message.into(),
        }
    }

    /// Check if this error indicates a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }

    /// Check if this error indicates a validation problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// Stable HTTP status per §6: error kinds crossing the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::NotFound(_) => 404,
            CoreError::VersionConflict { .. } => 409,
            CoreError::IdempotencyConflict { .. } => 409,
            CoreError::TransitionNotAllowed { .. } => 422,
            CoreError::InvariantViolation(_) => 422,
            CoreError::Validation(_) => 422,
            CoreError::Forbidden(_) => 403,
            CoreError::Unauthenticated(_) => 401,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_helpers_format_consistently() {
        let error = CoreError::not_found_task(42);
        assert_eq!(error, CoreError::NotFound("task 42 not found".to_string()));
        assert!(error.is_not_found());
        assert_eq!(error.status_code(), 404);
    }

    #[test]
    fn version_conflict_carries_both_versions() {
        let error = CoreError::version_conflict(1, 2);
        assert_eq!(error.status_code(), 409);
        assert_eq!(
            format!("{error}"),
            "version conflict: expected 1, found 2"
        );
    }

    #[test]
    fn transition_not_allowed_enumerates_allowed_actions() {
        let error = CoreError::transition_not_allowed(
            "submit",
            TaskStatus::Blocked,
            vec!["unblock".to_string()],
            "submit is not valid from blocked",
        );
        match &error {
            CoreError::TransitionNotAllowed {
                allowed_actions, ..
            } => assert_eq!(allowed_actions, &vec!["unblock".to_string()]),
            _ => panic!("expected TransitionNotAllowed"),
        }
        assert_eq!(error.status_code(), 422);
    }

    #[test]
    fn status_codes_match_the_error_boundary_mapping() {
        assert_eq!(CoreError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(CoreError::Unauthenticated("x".into()).status_code(), 401);
        assert_eq!(CoreError::InvariantViolation("x".into()).status_code(), 422);
        assert_eq!(
            CoreError::idempotency_conflict("evt-1").status_code(),
            409
        );
    }
}
