//! The Fix-Task Service: the sole constructor of `work_kind=fix` tasks
//! (P6). Three high-level entry points delegate to one primitive.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::invariants::validate_fix_task;
use crate::models::{
    DeliverableId, FixContext, FixSeverity, FixSource, ProjectId, QcInspectionId, Task, TaskId,
    TaskKind, TaskStatus, TenantId, UserId, WorkKind,
};
use crate::storage::Transaction;

pub struct FixTaskService;

impl FixTaskService {
    /// Primitive that every entry point delegates to (§4.4).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_fix<T: Transaction>(
        tx: &mut T,
        tenant_id: TenantId,
        project_id: ProjectId,
        deliverable_id: Option<DeliverableId>,
        actor_user_id: UserId,
        title: String,
        description: Option<String>,
        source: FixSource,
        severity: FixSeverity,
        minutes_spent: Option<i32>,
        origin_task_id: Option<TaskId>,
        qc_inspection_id: Option<QcInspectionId>,
    ) -> Result<Task> {
        // I5 + domain rule: a fix-task always requires a deliverable context.
        let deliverable_id = deliverable_id.ok_or_else(|| {
            CoreError::InvariantViolation(
                "fix-task creation requires a deliverable_id".to_string(),
            )
        })?;

        // I7 + I8: the deliverable must belong to this tenant and this task's
        // project, never taken on faith from the caller.
        let deliverable = tx
            .get_deliverable(tenant_id, deliverable_id)
            .await?
            .ok_or_else(|| CoreError::not_found_deliverable(deliverable_id))?;
        if deliverable.project_id != project_id {
            return Err(CoreError::InvariantViolation(format!(
                "I8: deliverable {deliverable_id} belongs to project {}, not {project_id}",
                deliverable.project_id
            )));
        }

        if source == FixSource::QcReject {
            if let Some(origin_task_id) = origin_task_id {
                if tx
                    .find_qc_reject_fix_for_origin(tenant_id, origin_task_id)
                    .await?
                    .is_some()
                {
                    return Err(CoreError::InvariantViolation(format!(
                        "a qc_reject fix-task already exists for origin task {origin_task_id}"
                    )));
                }
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            tenant_id,
            project_id,
            deliverable_id: Some(deliverable_id),
            title,
            description,
            kind: TaskKind::Production,
            other_kind_label: None,
            is_milestone: false,
            priority: 0,
            status: TaskStatus::Available,
            assigned_to: None,
            assigned_at: None,
            work_kind: WorkKind::Fix,
            fix: FixContext {
                origin_task_id,
                qc_inspection_id,
                fix_source: Some(source),
                fix_severity: Some(severity),
                minutes_spent,
            },
            row_version: 1,
            created_at: now,
            updated_at: now,
        };

        validate_fix_task(&task)?;
        let _ = actor_user_id;
        tx.insert_task(task).await
    }

    /// A worker raising a fix against a task they were working on.
    pub async fn create_initiative_fix_for_task<T: Transaction>(
        tx: &mut T,
        origin_task: &Task,
        actor_user_id: UserId,
        title: String,
        description: Option<String>,
        severity: FixSeverity,
        minutes_spent: Option<i32>,
    ) -> Result<Task> {
        Self::create_fix(
            tx,
            origin_task.tenant_id,
            origin_task.project_id,
            origin_task.deliverable_id,
            actor_user_id,
            title,
            description,
            FixSource::WorkerInitiative,
            severity,
            minutes_spent,
            Some(origin_task.id),
            None,
        )
        .await
    }

    /// A worker raising a fix directly against a deliverable, with no
    /// single originating task.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_initiative_fix_for_deliverable<T: Transaction>(
        tx: &mut T,
        tenant_id: TenantId,
        project_id: ProjectId,
        deliverable_id: DeliverableId,
        actor_user_id: UserId,
        title: String,
        description: Option<String>,
        severity: FixSeverity,
        minutes_spent: Option<i32>,
    ) -> Result<Task> {
        Self::create_fix(
            tx,
            tenant_id,
            project_id,
            Some(deliverable_id),
            actor_user_id,
            title,
            description,
            FixSource::WorkerInitiative,
            severity,
            minutes_spent,
            None,
            None,
        )
        .await
    }

    /// A fix-task generated by QC rejection (§4.5). Always `severity`
    /// supplied by the caller (QC Decision Path defaults it to `major`).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_qc_reject_fix<T: Transaction>(
        tx: &mut T,
        tenant_id: TenantId,
        project_id: ProjectId,
        deliverable_id: DeliverableId,
        qc_inspection_id: QcInspectionId,
        actor_user_id: UserId,
        title: String,
        description: Option<String>,
        severity: FixSeverity,
    ) -> Result<Task> {
        Self::create_fix(
            tx,
            tenant_id,
            project_id,
            Some(deliverable_id),
            actor_user_id,
            title,
            description,
            FixSource::QcReject,
            severity,
            None,
            None,
            Some(qc_inspection_id),
        )
        .await
    }
}
