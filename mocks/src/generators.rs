//! Random test data generators, and proptest strategies for property-based
//! tests of the FSM and the storage contract.

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use proptest::prelude::*;
use rand::Rng;
use shopfloor_core::models::{FixContext, Task, TaskKind, TaskStatus, WorkKind};
use uuid::Uuid;

/// A realistic-looking task title.
pub fn generate_task_title() -> String {
    Sentence(3..8).fake()
}

/// A realistic-looking task description.
pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

/// A uniformly random non-blocked, non-canceled status — useful when a test
/// only cares about "some in-flight status".
pub fn generate_active_status() -> TaskStatus {
    let statuses = [
        TaskStatus::Available,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Submitted,
    ];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// A task with randomized title/description/status within one tenant.
pub fn generate_random_task(tenant_id: Uuid, project_id: Uuid) -> Task {
    let now = Utc::now();
    let status = generate_active_status();
    let assigned_to = if status.requires_assignee() {
        Some(Uuid::new_v4())
    } else {
        None
    };
    Task {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id: None,
        title: generate_task_title(),
        description: Some(generate_task_description()),
        kind: TaskKind::Production,
        other_kind_label: None,
        is_milestone: false,
        priority: rand::thread_rng().gen_range(0..10),
        status,
        assigned_to,
        assigned_at: assigned_to.map(|_| now),
        work_kind: WorkKind::Work,
        fix: FixContext::default(),
        row_version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// Configurable generator for bulk task creation in one tenant/project.
pub struct TaskGenerator {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
}

impl TaskGenerator {
    pub fn new(tenant_id: Uuid, project_id: Uuid) -> Self {
        Self {
            tenant_id,
            project_id,
        }
    }

    pub fn generate(&self) -> Task {
        generate_random_task(self.tenant_id, self.project_id)
    }

    pub fn generate_many(&self, count: usize) -> Vec<Task> {
        (0..count).map(|_| self.generate()).collect()
    }
}

/// Proptest strategy over the task statuses the FSM accepts actions from.
pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Available),
        Just(TaskStatus::Assigned),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Submitted),
        Just(TaskStatus::Done),
        Just(TaskStatus::Canceled),
    ]
}

/// Proptest strategy over non-terminal statuses, matching the FSM's
/// `cancel`/`escalate` applicability table.
pub fn non_terminal_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Available),
        Just(TaskStatus::Assigned),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Submitted),
    ]
}

/// Proptest strategy generating plausible row versions for race-condition
/// and optimistic-concurrency property tests.
pub fn row_version_strategy() -> impl Strategy<Value = i64> {
    1i64..1000
}
