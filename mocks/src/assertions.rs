//! Custom assertion helpers for testing the Task Transition Core.

use shopfloor_core::fsm;
use shopfloor_core::models::{Task, TaskStatus};

/// Assert two tasks are equal ignoring timestamps and `row_version`.
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "task IDs don't match");
    assert_eq!(actual.tenant_id, expected.tenant_id, "tenant IDs don't match");
    assert_eq!(actual.title, expected.title, "task titles don't match");
    assert_eq!(actual.status, expected.status, "task statuses don't match");
    assert_eq!(actual.assigned_to, expected.assigned_to, "assignees don't match");
}

/// Assert a task matches the given partial criteria.
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(expected_title) = &matcher.title {
        assert_eq!(&task.title, expected_title, "task title doesn't match expected");
    }
    if let Some(expected_status) = matcher.status {
        assert_eq!(task.status, expected_status, "task status doesn't match expected");
    }
    if let Some(expected_assignee) = matcher.assigned_to {
        assert_eq!(
            task.assigned_to,
            Some(expected_assignee),
            "task assignee doesn't match expected"
        );
    }
}

/// Assert `action` is listed as allowed from `status` by the FSM table.
pub fn assert_action_allowed_from(action: &str, status: TaskStatus) {
    let allowed = fsm::allowed_actions(status);
    assert!(
        allowed.iter().any(|a| a == action),
        "expected '{action}' to be allowed from '{status}', allowed: {allowed:?}"
    );
}

/// Assert `action` is NOT listed as allowed from `status`.
pub fn assert_action_not_allowed_from(action: &str, status: TaskStatus) {
    let allowed = fsm::allowed_actions(status);
    assert!(
        !allowed.iter().any(|a| a == action),
        "expected '{action}' to be disallowed from '{status}', allowed: {allowed:?}"
    );
}

/// Assert a task list contains a task with the given title.
pub fn assert_contains_task_with_title(tasks: &[Task], title: &str) {
    assert!(
        tasks.iter().any(|t| t.title == title),
        "expected to find a task titled '{}', available titles: {:?}",
        title,
        tasks.iter().map(|t| &t.title).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date, most recent first.
pub fn assert_tasks_sorted_by_date(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "tasks are not sorted by creation date (most recent first): '{}' ({}) comes before '{}' ({})",
            window[0].title,
            window[0].created_at,
            window[1].title,
            window[1].created_at
        );
    }
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<uuid::Uuid>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_assigned_to(mut self, user_id: uuid::Uuid) -> Self {
        self.assigned_to = Some(user_id);
        self
    }
}
