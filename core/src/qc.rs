//! QC Decision Path (§4.5): the deliverable QC sub-flow, ported only
//! where it creates fix-tasks, since that is the piece coupled to this
//! core's fix-task invariants.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::fix_service::FixTaskService;
use crate::models::{
    ActorContext, Deliverable, DeliverableId, DeliverableStatus, FixSeverity, QcInspection,
    QcResult, SignoffResult, Task, UserId,
};
use crate::storage::Transaction;

pub struct QcDecisionOutcome {
    pub deliverable: Deliverable,
    pub inspection: QcInspection,
    pub fix_task: Option<Task>,
}

pub struct QcDecisionPath;

impl QcDecisionPath {
    pub async fn decide<T: Transaction>(
        tx: &mut T,
        actor_ctx: &ActorContext,
        deliverable_id: DeliverableId,
        inspector_user_id: UserId,
        result: QcResult,
        notes: Option<String>,
    ) -> Result<QcDecisionOutcome> {
        // Step 4 (ordering per spec): validate before any state change.
        if result == QcResult::Rejected && notes.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(CoreError::Validation(
                "rejection requires a non-empty notes value".to_string(),
            ));
        }

        let mut deliverable = tx
            .get_deliverable(actor_ctx.tenant_id, deliverable_id)
            .await?
            .ok_or_else(|| CoreError::not_found_deliverable(deliverable_id))?;

        if deliverable.status != DeliverableStatus::SubmittedToQc {
            return Err(CoreError::Validation(format!(
                "deliverable {deliverable_id} is not awaiting QC (status: {:?})",
                deliverable.status
            )));
        }

        let responsible_user_id = if result == QcResult::Rejected {
            // Step 1: most recent approved production sign-off.
            tx.latest_approved_signoff(actor_ctx.tenant_id, deliverable_id)
                .await?
                .filter(|s| s.result == SignoffResult::Approved)
                .map(|s| s.signed_off_by)
        } else {
            None
        };

        let inspection = QcInspection {
            id: Uuid::new_v4(),
            tenant_id: actor_ctx.tenant_id,
            project_id: deliverable.project_id,
            deliverable_id,
            inspector_user_id,
            responsible_user_id,
            result,
            notes: notes.clone(),
            created_at: Utc::now(),
        };
        let inspection = tx.insert_inspection(inspection).await?;

        deliverable.status = match result {
            QcResult::Approved => DeliverableStatus::QcApproved,
            QcResult::Rejected => DeliverableStatus::QcRejected,
        };
        deliverable.updated_at = Utc::now();
        let deliverable = tx.update_deliverable(deliverable).await?;

        let fix_task = if result == QcResult::Rejected {
            let title = format!("QC rejection fix: {}", deliverable.serial);
            Some(
                FixTaskService::create_qc_reject_fix(
                    tx,
                    actor_ctx.tenant_id,
                    deliverable.project_id,
                    deliverable_id,
                    inspection.id,
                    actor_ctx.actor_user_id,
                    title,
                    notes,
                    FixSeverity::Major,
                )
                .await?,
            )
        } else {
            None
        };

        Ok(QcDecisionOutcome {
            deliverable,
            inspection,
            fix_task,
        })
    }
}
