//! Pure invariant validators callable without a storage round trip.
//!
//! Separated from [`crate::fix_service`] so the executor, the Fix-Task
//! Service, and tests can all validate a constructed [`Task`] before it is
//! ever persisted.

use crate::error::{CoreError, Result};
use crate::models::{FixSource, Task, WorkKind};

/// I5, I6: fix columns coherent with `work_kind`.
///
/// - `work_kind = work` ⇒ all `fix_*` fields NULL.
/// - `work_kind = fix` ⇒ `fix_source`/`fix_severity` required, a context
///   (`origin_task_id`, `qc_inspection_id`, or `deliverable_id`) present,
///   and `fix_source = qc_reject` requires `qc_inspection_id`.
pub fn validate_fix_task(task: &Task) -> Result<()> {
    match task.work_kind {
        WorkKind::Work => {
            if task.fix.fix_source.is_some()
                || task.fix.fix_severity.is_some()
                || task.fix.origin_task_id.is_some()
                || task.fix.qc_inspection_id.is_some()
            {
                return Err(CoreError::InvariantViolation(
                    "non-fix tasks must have all fix_* fields null".to_string(),
                ));
            }
            Ok(())
        }
        WorkKind::Fix => {
            let source = task.fix.fix_source.ok_or_else(|| {
                CoreError::InvariantViolation("fix task requires fix_source".to_string())
            })?;
            if task.fix.fix_severity.is_none() {
                return Err(CoreError::InvariantViolation(
                    "fix task requires fix_severity".to_string(),
                ));
            }

            let has_context = task.fix.origin_task_id.is_some()
                || task.fix.qc_inspection_id.is_some()
                || task.deliverable_id.is_some();
            if !has_context {
                return Err(CoreError::InvariantViolation(
                    "fix task requires an origin_task_id, qc_inspection_id, or deliverable_id"
                        .to_string(),
                ));
            }

            match source {
                FixSource::QcReject if task.fix.qc_inspection_id.is_none() => {
                    Err(CoreError::InvariantViolation(
                        "fix_source=qc_reject requires qc_inspection_id".to_string(),
                    ))
                }
                FixSource::WorkerInitiative
                    if task.fix.origin_task_id.is_none() && task.deliverable_id.is_none() =>
                {
                    Err(CoreError::InvariantViolation(
                        "fix_source=worker_initiative requires origin_task_id or deliverable_id"
                            .to_string(),
                    ))
                }
                _ => Ok(()),
            }
        }
    }
}
