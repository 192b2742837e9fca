//! Domain types for the Task Transition Core.
//!
//! These are plain records, not ORM proxies: the executor and services
//! receive and return values of these types directly, never a row handle
//! or a lazily-loaded proxy object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the tenant (organization) a request operates within.
///
/// Every other identifier in this module is scoped to a tenant; nothing
/// here is ever looked up without a `tenant_id` alongside it.
pub type TenantId = Uuid;
pub type ProjectId = Uuid;
pub type UserId = Uuid;
pub type TaskId = Uuid;
pub type DeliverableId = Uuid;
pub type QcInspectionId = Uuid;
pub type SignoffId = Uuid;
pub type TransitionId = Uuid;

/// The caller's identity and permission-relevant context, extracted by the
/// (out-of-scope) adapter layer and handed to every core entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub tenant_id: TenantId,
    pub actor_user_id: UserId,
    pub role: String,
}

/// Domain classification of a task's purpose. Orthogonal to [`WorkKind`]:
/// a `fix` task is still `kind = production` in the common case.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Production,
    Maintenance,
    Admin,
    Other,
}

/// Lifecycle status of a [`Task`]. See `core::fsm` for the transition table.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Blocked,
    Available,
    Assigned,
    InProgress,
    Submitted,
    Done,
    Canceled,
}

impl TaskStatus {
    /// Terminal statuses accept no further actions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Canceled)
    }

    /// I2: statuses requiring an assignee present.
    pub fn requires_assignee(self) -> bool {
        matches!(
            self,
            TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Submitted
        )
    }

    /// I2: statuses requiring no assignee.
    pub fn requires_no_assignee(self) -> bool {
        matches!(self, TaskStatus::Blocked | TaskStatus::Available)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Blocked => "blocked",
            TaskStatus::Available => "available",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Done => "done",
            TaskStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// Whether a task is ordinary production work or a corrective fix-task.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Work,
    Fix,
}

/// Why a fix-task exists.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixSource {
    QcReject,
    WorkerInitiative,
    SupervisorRequest,
}

impl FixSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FixSource::QcReject => "qc_reject",
            FixSource::WorkerInitiative => "worker_initiative",
            FixSource::SupervisorRequest => "supervisor_request",
        }
    }
}

/// How serious a fix-task is.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixSeverity {
    Minor,
    Major,
    Critical,
}

impl FixSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            FixSeverity::Minor => "minor",
            FixSeverity::Major => "major",
            FixSeverity::Critical => "critical",
        }
    }
}

/// Fix-specific context, populated iff `work_kind = Fix` (I5).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixContext {
    pub origin_task_id: Option<TaskId>,
    pub qc_inspection_id: Option<QcInspectionId>,
    pub fix_source: Option<FixSource>,
    pub fix_severity: Option<FixSeverity>,
    pub minutes_spent: Option<i32>,
}

/// A unit of work or corrective action within a tenant/project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
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
    pub assigned_at: Option<DateTime<Utc>>,

    pub work_kind: WorkKind,
    pub fix: FixContext,

    pub row_version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// I1: assignment fields are either both present or both absent.
    pub fn assignment_is_consistent(&self) -> bool {
        self.assigned_to.is_some() == self.assigned_at.is_some()
    }

    /// I2: status/assignment consistency.
    pub fn status_assignment_is_consistent(&self) -> bool {
        if self.status.requires_assignee() {
            self.assigned_to.is_some()
        } else if self.status.requires_no_assignee() {
            self.assigned_to.is_none()
        } else {
            true
        }
    }

    /// I10: assignment cannot predate creation.
    pub fn temporal_order_is_consistent(&self) -> bool {
        match self.assigned_at {
            Some(assigned_at) => assigned_at >= self.created_at,
            None => true,
        }
    }
}

/// Input to create a new [`Task`]. Produced by an external collaborator
/// (standalone creation or template bootstrap); the core does not care
/// which, only that the invariants below hold once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub deliverable_id: Option<DeliverableId>,
    pub title: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub other_kind_label: Option<String>,
    pub is_milestone: bool,
    pub priority: i32,
    /// Tasks created standalone start `Available`; tasks created with
    /// unresolved dependencies start `Blocked`. The core accepts either.
    pub initial_status: TaskStatus,
    pub created_by: UserId,
}

/// Filter criteria for listing tasks. All fields optional (besides tenant
/// scoping) and AND-combined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFilter {
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<UserId>,
    pub work_kind: Option<WorkKind>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TaskFilter {
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            project_id: None,
            status: None,
            assigned_to: None,
            work_kind: None,
            limit: None,
            offset: None,
        }
    }
}

/// Append-only record of one applied action on a [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTransition {
    pub id: TransitionId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub actor_user_id: UserId,

    pub action: String,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,

    /// Canonical JSON of the request payload plus server-derived fields
    /// (e.g. `fix_task_id`).
    pub payload: serde_json::Value,

    pub client_event_id: Option<String>,

    pub expected_row_version: i64,
    pub result_row_version: i64,

    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a [`Deliverable`]. Read-only from this core's point
/// of view except for the QC-rejection write in `core::qc`.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    Open,
    SubmittedToQc,
    QcRejected,
    QcApproved,
    Canceled,
}

/// A physical artifact identified by `(tenant_id, serial)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deliverable {
    pub id: DeliverableId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub deliverable_type: String,
    pub serial: String,
    pub status: DeliverableStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Approval step preceding QC submission.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignoffResult {
    Approved,
    Rejected,
}

/// Record of one production sign-off on a deliverable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverableSignoff {
    pub id: SignoffId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub deliverable_id: DeliverableId,
    pub signed_off_by: UserId,
    pub result: SignoffResult,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one QC decision.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QcResult {
    Approved,
    Rejected,
}

/// Immutable record of one QC decision on a [`Deliverable`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QcInspection {
    pub id: QcInspectionId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub deliverable_id: DeliverableId,
    pub inspector_user_id: UserId,
    /// Captured from the most recent approved production sign-off.
    pub responsible_user_id: Option<UserId>,
    pub result: QcResult,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
