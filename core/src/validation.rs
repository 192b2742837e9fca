//! Payload-level validation (§7 `Validation` kind): malformed fields the
//! FSM and invariant layer never see because the request is rejected
//! before a `Task` is even constructed.

use crate::error::{CoreError, Result};
use crate::models::{NewTask, TaskKind};

pub struct TaskValidator;

impl TaskValidator {
    /// Title: 1-200 characters, not only whitespace.
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("title must not be empty".to_string()));
        }
        if trimmed.len() > 200 {
            return Err(CoreError::Validation(
                "title must be at most 200 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Description: optional, but 1-2000 characters when present.
    pub fn validate_description(description: Option<&str>) -> Result<()> {
        let Some(description) = description else {
            return Ok(());
        };
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(
                "description must not be only whitespace".to_string(),
            ));
        }
        if trimmed.len() > 2000 {
            return Err(CoreError::Validation(
                "description must be at most 2000 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// `other_kind_label` required iff `kind = other`.
    pub fn validate_kind_label(kind: TaskKind, other_kind_label: Option<&str>) -> Result<()> {
        match (kind, other_kind_label) {
            (TaskKind::Other, None) => Err(CoreError::Validation(
                "other_kind_label is required when kind=other".to_string(),
            )),
            (TaskKind::Other, Some(label)) if label.trim().is_empty() => Err(CoreError::Validation(
                "other_kind_label must not be empty".to_string(),
            )),
            (k, Some(_)) if k != TaskKind::Other => Err(CoreError::Validation(
                "other_kind_label must be absent unless kind=other".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn validate_priority(priority: i32) -> Result<()> {
        if priority < 0 {
            return Err(CoreError::Validation(
                "priority must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_title(&task.title)?;
        Self::validate_description(task.description.as_deref())?;
        Self::validate_kind_label(task.kind, task.other_kind_label.as_deref())?;
        Self::validate_priority(task.priority)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use uuid::Uuid;

    fn new_task() -> NewTask {
        NewTask {
            tenant_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            deliverable_id: None,
            title: "Drill mounting holes".to_string(),
            description: None,
            kind: TaskKind::Production,
            other_kind_label: None,
            is_milestone: false,
            priority: 0,
            initial_status: TaskStatus::Available,
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn valid_new_task_passes() {
        assert!(TaskValidator::validate_new_task(&new_task()).is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut task = new_task();
        task.title = "   ".to_string();
        assert!(TaskValidator::validate_new_task(&task).is_err());
    }

    #[test]
    fn negative_priority_is_rejected() {
        let mut task = new_task();
        task.priority = -1;
        assert!(TaskValidator::validate_new_task(&task).is_err());
    }

    #[test]
    fn other_kind_without_label_is_rejected() {
        let mut task = new_task();
        task.kind = TaskKind::Other;
        assert!(TaskValidator::validate_new_task(&task).is_err());
    }

    #[test]
    fn other_kind_with_label_is_accepted() {
        let mut task = new_task();
        task.kind = TaskKind::Other;
        task.other_kind_label = Some("calibration".to_string());
        assert!(TaskValidator::validate_new_task(&task).is_ok());
    }

    #[test]
    fn label_present_on_non_other_kind_is_rejected() {
        let mut task = new_task();
        task.other_kind_label = Some("calibration".to_string());
        assert!(TaskValidator::validate_new_task(&task).is_err());
    }
}
