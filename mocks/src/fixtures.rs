//! Standard test fixtures for consistent testing across crates.

use chrono::Utc;
use shopfloor_core::models::{ActorContext, NewTask, Task, TaskStatus};
use uuid::Uuid;

use crate::builders::{ActorContextBuilder, NewTaskBuilder, TaskBuilder};

/// A basic task with sensible defaults, ready to insert.
pub fn create_test_task() -> Task {
    TaskBuilder::new().build()
}

/// A task in a specific status, scoped to one tenant/project.
pub fn create_test_task_with_status(tenant_id: Uuid, status: TaskStatus) -> Task {
    TaskBuilder::new()
        .with_tenant(tenant_id)
        .with_status(status)
        .build()
}

/// A task assigned to a specific user.
pub fn create_test_task_assigned_to(tenant_id: Uuid, assignee: Uuid) -> Task {
    TaskBuilder::new()
        .with_tenant(tenant_id)
        .with_status(TaskStatus::Assigned)
        .with_assigned_to(assignee)
        .build()
}

/// `count` unique tasks within one tenant, distributed across statuses.
pub fn create_test_tasks(tenant_id: Uuid, count: usize) -> Vec<Task> {
    let statuses = [
        TaskStatus::Available,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Submitted,
        TaskStatus::Done,
    ];
    (0..count)
        .map(|i| {
            TaskBuilder::new()
                .with_tenant(tenant_id)
                .with_title(format!("Test task {i}"))
                .with_status(statuses[i % statuses.len()])
                .build()
        })
        .collect()
}

/// One task in each non-terminal-and-terminal status, for exhaustive checks.
pub fn create_tasks_in_all_statuses(tenant_id: Uuid) -> Vec<Task> {
    [
        TaskStatus::Blocked,
        TaskStatus::Available,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Submitted,
        TaskStatus::Done,
        TaskStatus::Canceled,
    ]
    .into_iter()
    .map(|status| {
        let now = Utc::now();
        let mut builder = TaskBuilder::new()
            .with_tenant(tenant_id)
            .with_title(format!("{status} task"))
            .with_status(status);
        if status.requires_assignee() {
            builder = builder.with_assigned_to(Uuid::new_v4());
        }
        let _ = now;
        builder.build()
    })
    .collect()
}

/// A standard [`NewTask`] for testing `create_task`.
pub fn create_new_task(tenant_id: Uuid) -> NewTask {
    NewTaskBuilder::new().with_tenant(tenant_id).build()
}

/// A standard [`ActorContext`] scoped to the given tenant.
pub fn create_test_actor_context(tenant_id: Uuid) -> ActorContext {
    ActorContextBuilder::new().with_tenant(tenant_id).build()
}
