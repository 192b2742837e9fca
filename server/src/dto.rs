//! Request/response bodies for the HTTP adapter.
//!
//! Every request body uses `#[serde(deny_unknown_fields)]` per §6 ("Reject
//! request bodies with unknown fields (strict schema)"). These are plain
//! wire shapes; they carry no behavior of their own and are translated into
//! `shopfloor_core` types at the route boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopfloor_core::models::{
    DeliverableId, FixSeverity, FixSource, NewTask, ProjectId, QcResult, Task, TaskFilter,
    TaskId, TaskKind, TaskStatus, TenantId, UserId,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyTransitionRequest {
    pub action: String,
    pub expected_row_version: i64,
    #[serde(default)]
    pub payload: Value,
    pub client_event_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub task: TaskDto,
    pub fix_task: Option<TaskDto>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub project_id: ProjectId,
    pub deliverable_id: Option<DeliverableId>,
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub other_kind_label: Option<String>,
    #[serde(default)]
    pub is_milestone: bool,
    #[serde(default)]
    pub priority: i32,
    pub initial_status: TaskStatus,
}

impl CreateTaskRequest {
    pub fn into_new_task(self, tenant_id: TenantId, created_by: UserId) -> NewTask {
        NewTask {
            tenant_id,
            project_id: self.project_id,
            deliverable_id: self.deliverable_id,
            title: self.title,
            description: self.description,
            kind: self.kind,
            other_kind_label: self.other_kind_label,
            is_milestone: self.is_milestone,
            priority: self.priority,
            initial_status: self.initial_status,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QcDecisionRequest {
    pub inspector_user_id: UserId,
    pub result: QcResult,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QcDecisionResponse {
    pub deliverable_id: DeliverableId,
    pub deliverable_status: String,
    pub inspection_id: shopfloor_core::models::QcInspectionId,
    pub fix_task: Option<TaskDto>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFixTaskRequest {
    pub project_id: ProjectId,
    pub origin_task_id: Option<TaskId>,
    pub deliverable_id: Option<DeliverableId>,
    pub title: String,
    pub description: Option<String>,
    pub source: FixSource,
    pub severity: FixSeverity,
    pub minutes_spent: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ListTasksQuery {
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListTasksQuery {
    pub fn into_filter(self, tenant_id: TenantId) -> TaskFilter {
        let mut filter = TaskFilter::for_tenant(tenant_id);
        filter.project_id = self.project_id;
        filter.status = self.status;
        filter.assigned_to = self.assigned_to;
        filter.limit = self.limit;
        filter.offset = self.offset;
        filter
    }
}

/// Wire representation of [`Task`]; a 1:1 field mirror kept separate from
/// the domain type so storage-shape changes don't leak into the HTTP
/// contract unannounced.
#[derive(Debug, Serialize)]
pub struct TaskDto {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub deliverable_id: Option<DeliverableId>,
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub other_kind_label: Option<String>,
    pub is_milestone: bool,
    pub priority: i32,
    pub status: TaskStatus,
    pub assigned_to: Option<UserId>,
    pub row_version: i64,
}

impl From<Task> for TaskDto {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            tenant_id: task.tenant_id,
            project_id: task.project_id,
            deliverable_id: task.deliverable_id,
            title: task.title,
            description: task.description,
            kind: task.kind,
            other_kind_label: task.other_kind_label,
            is_milestone: task.is_milestone,
            priority: task.priority,
            status: task.status,
            assigned_to: task.assigned_to,
            row_version: task.row_version,
        }
    }
}
