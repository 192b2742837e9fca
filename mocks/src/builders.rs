//! Fluent builders for constructing domain records in tests.

use chrono::Utc;
use shopfloor_core::models::{
    ActorContext, Deliverable, DeliverableId, DeliverableStatus, FixContext, NewTask, ProjectId,
    Task, TaskFilter, TaskKind, TaskStatus, TenantId, UserId, WorkKind,
};
use uuid::Uuid;

/// Builder for constructing [`Task`] instances in tests.
pub struct TaskBuilder {
    task: Task,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task: Task {
                id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                project_id: Uuid::new_v4(),
                deliverable_id: None,
                title: "Test task".to_string(),
                description: None,
                kind: TaskKind::Production,
                other_kind_label: None,
                is_milestone: false,
                priority: 0,
                status: TaskStatus::Available,
                assigned_to: None,
                assigned_at: None,
                work_kind: WorkKind::Work,
                fix: FixContext::default(),
                row_version: 1,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.task.tenant_id = tenant_id;
        self
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.task.project_id = project_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.task.title = title.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_assigned_to(mut self, user_id: UserId) -> Self {
        self.task.assigned_to = Some(user_id);
        self.task.assigned_at = Some(Utc::now());
        self
    }

    pub fn with_row_version(mut self, row_version: i64) -> Self {
        self.task.row_version = row_version;
        self
    }

    pub fn as_fix_task(mut self, fix: FixContext) -> Self {
        self.task.work_kind = WorkKind::Fix;
        self.task.fix = fix;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for constructing [`NewTask`] instances in tests.
pub struct NewTaskBuilder {
    new_task: NewTask,
}

impl Default for NewTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NewTaskBuilder {
    pub fn new() -> Self {
        Self {
            new_task: NewTask {
                tenant_id: Uuid::new_v4(),
                project_id: Uuid::new_v4(),
                deliverable_id: None,
                title: "New test task".to_string(),
                description: None,
                kind: TaskKind::Production,
                other_kind_label: None,
                is_milestone: false,
                priority: 0,
                initial_status: TaskStatus::Available,
                created_by: Uuid::new_v4(),
            },
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.new_task.tenant_id = tenant_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.new_task.title = title.into();
        self
    }

    pub fn with_initial_status(mut self, status: TaskStatus) -> Self {
        self.new_task.initial_status = status;
        self
    }

    pub fn build(self) -> NewTask {
        self.new_task
    }
}

/// Builder for constructing [`TaskFilter`] instances in tests.
pub struct TaskFilterBuilder {
    filter: TaskFilter,
}

impl TaskFilterBuilder {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            filter: TaskFilter::for_tenant(tenant_id),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_assigned_to(mut self, user_id: UserId) -> Self {
        self.filter.assigned_to = Some(user_id);
        self
    }

    pub fn build(self) -> TaskFilter {
        self.filter
    }
}

/// Builder for constructing [`Deliverable`] instances in tests.
pub struct DeliverableBuilder {
    deliverable: Deliverable,
}

impl Default for DeliverableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliverableBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            deliverable: Deliverable {
                id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                project_id: Uuid::new_v4(),
                deliverable_type: "bracket".to_string(),
                serial: format!("SN-{}", Uuid::new_v4()),
                status: DeliverableStatus::Open,
                created_by: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: DeliverableId) -> Self {
        self.deliverable.id = id;
        self
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.deliverable.tenant_id = tenant_id;
        self
    }

    pub fn with_status(mut self, status: DeliverableStatus) -> Self {
        self.deliverable.status = status;
        self
    }

    pub fn build(self) -> Deliverable {
        self.deliverable
    }
}

/// Builder for constructing [`ActorContext`] instances in tests.
pub struct ActorContextBuilder {
    ctx: ActorContext,
}

impl Default for ActorContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: ActorContext {
                tenant_id: Uuid::new_v4(),
                actor_user_id: Uuid::new_v4(),
                role: "worker".to_string(),
            },
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.ctx.tenant_id = tenant_id;
        self
    }

    pub fn with_actor(mut self, actor_user_id: UserId) -> Self {
        self.ctx.actor_user_id = actor_user_id;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.ctx.role = role.into();
        self
    }

    pub fn build(self) -> ActorContext {
        self.ctx
    }
}
