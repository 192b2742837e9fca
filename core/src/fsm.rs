//! The Task FSM: a pure, stateless mapping from `(status, action, payload)`
//! to `(new_status, side_effects)`. Never touches storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::models::{FixSeverity, TaskStatus};

/// Closed set of actions the core accepts. Kept string-keyed at the
/// boundary (part of the external contract) but translated once into this
/// enum before anything inside the core looks at it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Unblock,
    SelfAssign,
    Assign,
    Start,
    Submit,
    ReviewApprove,
    ReviewReject,
    ShiftRelease,
    RecallToPool,
    Escalate,
    Cancel,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Unblock => "unblock",
            Action::SelfAssign => "self_assign",
            Action::Assign => "assign",
            Action::Start => "start",
            Action::Submit => "submit",
            Action::ReviewApprove => "review_approve",
            Action::ReviewReject => "review_reject",
            Action::ShiftRelease => "shift_release",
            Action::RecallToPool => "recall_to_pool",
            Action::Escalate => "escalate",
            Action::Cancel => "cancel",
        }
    }

    /// Every action the string-keyed boundary recognizes, in table order.
    pub const ALL: [Action; 11] = [
        Action::Unblock,
        Action::SelfAssign,
        Action::Assign,
        Action::Start,
        Action::Submit,
        Action::ReviewApprove,
        Action::ReviewReject,
        Action::ShiftRelease,
        Action::RecallToPool,
        Action::Escalate,
        Action::Cancel,
    ];

    /// Parse the boundary's string action name. Unknown names are a
    /// `TransitionNotAllowed`, not a panic — the action set is part of the
    /// public contract and callers send it as a plain string.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == raw)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "unknown action '{raw}', expected one of: {}",
                    Self::ALL
                        .iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    fn allowed_from(self, status: TaskStatus) -> bool {
        TRANSITIONS
            .iter()
            .any(|row| row.action == self && row.from.contains(&status))
    }
}

/// A declarative instruction produced by the FSM and executed by the
/// Transition Executor within the same transaction. The FSM never performs
/// I/O itself; it only describes what should happen.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    CreateFixTask {
        reason: Option<String>,
        fix_title: Option<String>,
        assign_to: Option<String>,
        severity: FixSeverity,
    },
    Escalate { message: String },
}

struct TransitionRow {
    action: Action,
    from: &'static [TaskStatus],
    to: Option<TaskStatus>,
}

const NON_TERMINAL: [TaskStatus; 5] = [
    TaskStatus::Blocked,
    TaskStatus::Available,
    TaskStatus::Assigned,
    TaskStatus::InProgress,
    TaskStatus::Submitted,
];

const TRANSITIONS: &[TransitionRow] = &[
    TransitionRow {
        action: Action::Unblock,
        from: &[TaskStatus::Blocked],
        to: Some(TaskStatus::Available),
    },
    TransitionRow {
        action: Action::SelfAssign,
        from: &[TaskStatus::Available],
        to: Some(TaskStatus::Assigned),
    },
    TransitionRow {
        action: Action::Assign,
        from: &[TaskStatus::Available],
        to: Some(TaskStatus::Assigned),
    },
    TransitionRow {
        action: Action::Start,
        from: &[TaskStatus::Assigned],
        to: Some(TaskStatus::InProgress),
    },
    TransitionRow {
        action: Action::Submit,
        from: &[TaskStatus::InProgress],
        to: Some(TaskStatus::Submitted),
    },
    TransitionRow {
        action: Action::ReviewApprove,
        from: &[TaskStatus::Submitted],
        to: Some(TaskStatus::Done),
    },
    TransitionRow {
        action: Action::ReviewReject,
        from: &[TaskStatus::Submitted],
        to: Some(TaskStatus::InProgress),
    },
    TransitionRow {
        action: Action::ShiftRelease,
        from: &[TaskStatus::Assigned, TaskStatus::InProgress],
        to: Some(TaskStatus::Available),
    },
    TransitionRow {
        action: Action::RecallToPool,
        from: &[TaskStatus::Assigned, TaskStatus::InProgress],
        to: Some(TaskStatus::Available),
    },
    TransitionRow {
        action: Action::Escalate,
        from: &NON_TERMINAL,
        to: None,
    },
    TransitionRow {
        action: Action::Cancel,
        from: &NON_TERMINAL,
        to: Some(TaskStatus::Canceled),
    },
];

/// Every action valid from `status`, in table order. Used to populate
/// `TransitionNotAllowed::allowed_actions` — never hand-maintained
/// separately from the transition table itself.
pub fn allowed_actions(status: TaskStatus) -> Vec<String> {
    Action::ALL
        .into_iter()
        .filter(|a| a.allowed_from(status))
        .map(|a| a.as_str().to_string())
        .collect()
}

fn not_allowed(action: Action, status: TaskStatus, message: impl Into<String>) -> CoreError {
    CoreError::transition_not_allowed(
        action.as_str(),
        status,
        allowed_actions(status),
        message,
    )
}

fn payload_str(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn parse_severity(payload: &Value) -> Result<FixSeverity> {
    match payload_str(payload, "severity").as_deref() {
        None => Ok(FixSeverity::Major),
        Some("minor") => Ok(FixSeverity::Minor),
        Some("major") => Ok(FixSeverity::Major),
        Some("critical") => Ok(FixSeverity::Critical),
        Some(other) => Err(CoreError::Validation(format!(
            "unknown fix severity '{other}'"
        ))),
    }
}

/// Evaluate one action against the current status. Pure: no I/O, no
/// mutation, safe to call speculatively for dry-run/validation purposes.
pub fn evaluate(
    status: TaskStatus,
    action: Action,
    payload: &Value,
) -> Result<(TaskStatus, Vec<SideEffect>)> {
    let row = TRANSITIONS
        .iter()
        .find(|row| row.action == action && row.from.contains(&status))
        .ok_or_else(|| {
            not_allowed(
                action,
                status,
                format!("'{}' is not valid from status '{status}'", action.as_str()),
            )
        })?;

    match action {
        Action::Assign if payload_str(payload, "assign_to").is_none() => {
            return Err(not_allowed(
                action,
                status,
                "assign requires 'assign_to'",
            ));
        }
        Action::Escalate if payload_str(payload, "message").is_none() => {
            return Err(not_allowed(action, status, "escalate requires 'message'"));
        }
        _ => {}
    }

    let side_effects = match action {
        Action::ReviewReject => vec![SideEffect::CreateFixTask {
            reason: payload_str(payload, "reason"),
            fix_title: payload_str(payload, "fix_title"),
            assign_to: payload_str(payload, "assign_to"),
            severity: parse_severity(payload)?,
        }],
        Action::Escalate => vec![SideEffect::Escalate {
            message: payload_str(payload, "message").expect("checked above"),
        }],
        _ => Vec::new(),
    };

    // `escalate` never changes status (P5); every other row names `to`.
    let new_status = row.to.unwrap_or(status);
    Ok((new_status, side_effects))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn self_assign_moves_available_to_assigned() {
        let (status, effects) =
            evaluate(TaskStatus::Available, Action::SelfAssign, &json!({})).unwrap();
        assert_eq!(status, TaskStatus::Assigned);
        assert!(effects.is_empty());
    }

    #[test]
    fn assign_without_assign_to_is_not_allowed() {
        let err = evaluate(TaskStatus::Available, Action::Assign, &json!({})).unwrap_err();
        assert!(matches!(err, CoreError::TransitionNotAllowed { .. }));
    }

    #[test]
    fn submit_from_blocked_is_not_allowed_and_lists_unblock() {
        let err = evaluate(TaskStatus::Blocked, Action::Submit, &json!({})).unwrap_err();
        match err {
            CoreError::TransitionNotAllowed {
                allowed_actions, ..
            } => assert_eq!(allowed_actions, vec!["unblock".to_string()]),
            _ => panic!("expected TransitionNotAllowed"),
        }
    }

    #[test]
    fn review_reject_emits_create_fix_task_with_default_severity() {
        let (status, effects) = evaluate(
            TaskStatus::Submitted,
            Action::ReviewReject,
            &json!({ "reason": "porosity" }),
        )
        .unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(
            effects,
            vec![SideEffect::CreateFixTask {
                reason: Some("porosity".to_string()),
                fix_title: None,
                assign_to: None,
                severity: FixSeverity::Major,
            }]
        );
    }

    #[test]
    fn escalate_does_not_change_status() {
        let (status, effects) = evaluate(
            TaskStatus::InProgress,
            Action::Escalate,
            &json!({ "message": "blocked on parts" }),
        )
        .unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(
            effects,
            vec![SideEffect::Escalate {
                message: "blocked on parts".to_string()
            }]
        );
    }

    #[test]
    fn cancel_is_allowed_from_every_non_terminal_status() {
        for status in NON_TERMINAL {
            let (new_status, _) = evaluate(status, Action::Cancel, &json!({})).unwrap();
            assert_eq!(new_status, TaskStatus::Canceled);
        }
    }

    #[test]
    fn cancel_is_not_allowed_from_terminal_statuses() {
        assert!(evaluate(TaskStatus::Done, Action::Cancel, &json!({})).is_err());
        assert!(evaluate(TaskStatus::Canceled, Action::Cancel, &json!({})).is_err());
    }

    #[test]
    fn action_parse_rejects_unknown_names() {
        assert!(Action::parse("nonexistent").is_err());
        assert_eq!(Action::parse("self_assign").unwrap(), Action::SelfAssign);
    }
}
