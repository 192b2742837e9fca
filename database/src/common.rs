//! Row mapping and storage-error translation shared by the SQLite backend.
//!
//! Nothing here talks to a connection pool; it only converts between SQL
//! rows/errors and the domain types `shopfloor_core` works with.

use chrono::{DateTime, Utc};
use shopfloor_core::error::{CoreError, Result};
use shopfloor_core::models::{
    Deliverable, DeliverableSignoff, DeliverableStatus, FixContext, FixSeverity, FixSource,
    QcInspection, QcResult, SignoffResult, Task, TaskKind, TaskStatus, TaskTransition, WorkKind,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

/// `Row::try_get` wrapped in the domain error type, so row-mapping
/// functions can use `?` without round-tripping through `sqlx::Error`.
pub(crate) fn get<'r, T>(row: &'r SqliteRow, col: &'static str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(col).map_err(sqlx_error_to_core_error)
}

/// UUIDs are stored as lowercase-hyphenated TEXT (see the migration), not
/// through sqlx's binary `uuid` codec, so every id column round-trips via
/// `to_string`/`parse_str` instead of a direct `Decode<Uuid>`.
pub(crate) fn get_uuid(row: &SqliteRow, col: &'static str) -> Result<Uuid> {
    let raw: String = get(row, col)?;
    Uuid::parse_str(&raw)
        .map_err(|e| CoreError::InvariantViolation(format!("invalid uuid in column {col}: {e}")))
}

pub(crate) fn get_uuid_opt(row: &SqliteRow, col: &'static str) -> Result<Option<Uuid>> {
    let raw: Option<String> = get(row, col)?;
    raw.map(|raw| {
        Uuid::parse_str(&raw).map_err(|e| {
            CoreError::InvariantViolation(format!("invalid uuid in column {col}: {e}"))
        })
    })
    .transpose()
}

pub fn task_kind_to_str(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Production => "production",
        TaskKind::Maintenance => "maintenance",
        TaskKind::Admin => "admin",
        TaskKind::Other => "other",
    }
}

pub fn str_to_task_kind(s: &str) -> Result<TaskKind> {
    match s {
        "production" => Ok(TaskKind::Production),
        "maintenance" => Ok(TaskKind::Maintenance),
        "admin" => Ok(TaskKind::Admin),
        "other" => Ok(TaskKind::Other),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid task kind in database: {s}"
        ))),
    }
}

pub fn task_status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Blocked => "blocked",
        TaskStatus::Available => "available",
        TaskStatus::Assigned => "assigned",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Submitted => "submitted",
        TaskStatus::Done => "done",
        TaskStatus::Canceled => "canceled",
    }
}

pub fn str_to_task_status(s: &str) -> Result<TaskStatus> {
    match s {
        "blocked" => Ok(TaskStatus::Blocked),
        "available" => Ok(TaskStatus::Available),
        "assigned" => Ok(TaskStatus::Assigned),
        "in_progress" => Ok(TaskStatus::InProgress),
        "submitted" => Ok(TaskStatus::Submitted),
        "done" => Ok(TaskStatus::Done),
        "canceled" => Ok(TaskStatus::Canceled),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid task status in database: {s}"
        ))),
    }
}

pub fn work_kind_to_str(kind: WorkKind) -> &'static str {
    match kind {
        WorkKind::Work => "work",
        WorkKind::Fix => "fix",
    }
}

pub fn str_to_work_kind(s: &str) -> Result<WorkKind> {
    match s {
        "work" => Ok(WorkKind::Work),
        "fix" => Ok(WorkKind::Fix),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid work_kind in database: {s}"
        ))),
    }
}

pub fn str_to_fix_source(s: &str) -> Result<FixSource> {
    match s {
        "qc_reject" => Ok(FixSource::QcReject),
        "worker_initiative" => Ok(FixSource::WorkerInitiative),
        "supervisor_request" => Ok(FixSource::SupervisorRequest),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid fix_source in database: {s}"
        ))),
    }
}

pub fn str_to_fix_severity(s: &str) -> Result<FixSeverity> {
    match s {
        "minor" => Ok(FixSeverity::Minor),
        "major" => Ok(FixSeverity::Major),
        "critical" => Ok(FixSeverity::Critical),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid fix_severity in database: {s}"
        ))),
    }
}

pub fn deliverable_status_to_str(status: DeliverableStatus) -> &'static str {
    match status {
        DeliverableStatus::Open => "open",
        DeliverableStatus::SubmittedToQc => "submitted_to_qc",
        DeliverableStatus::QcRejected => "qc_rejected",
        DeliverableStatus::QcApproved => "qc_approved",
        DeliverableStatus::Canceled => "canceled",
    }
}

pub fn str_to_deliverable_status(s: &str) -> Result<DeliverableStatus> {
    match s {
        "open" => Ok(DeliverableStatus::Open),
        "submitted_to_qc" => Ok(DeliverableStatus::SubmittedToQc),
        "qc_rejected" => Ok(DeliverableStatus::QcRejected),
        "qc_approved" => Ok(DeliverableStatus::QcApproved),
        "canceled" => Ok(DeliverableStatus::Canceled),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid deliverable status in database: {s}"
        ))),
    }
}

pub fn signoff_result_to_str(result: SignoffResult) -> &'static str {
    match result {
        SignoffResult::Approved => "approved",
        SignoffResult::Rejected => "rejected",
    }
}

pub fn str_to_signoff_result(s: &str) -> Result<SignoffResult> {
    match s {
        "approved" => Ok(SignoffResult::Approved),
        "rejected" => Ok(SignoffResult::Rejected),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid signoff result in database: {s}"
        ))),
    }
}

pub fn qc_result_to_str(result: QcResult) -> &'static str {
    match result {
        QcResult::Approved => "approved",
        QcResult::Rejected => "rejected",
    }
}

pub fn str_to_qc_result(s: &str) -> Result<QcResult> {
    match s {
        "approved" => Ok(QcResult::Approved),
        "rejected" => Ok(QcResult::Rejected),
        _ => Err(CoreError::InvariantViolation(format!(
            "invalid QC result in database: {s}"
        ))),
    }
}

pub fn row_to_task(row: &SqliteRow) -> Result<Task> {
    let kind = str_to_task_kind(&get::<String>(row, "kind")?)?;
    let status = str_to_task_status(&get::<String>(row, "status")?)?;
    let work_kind = str_to_work_kind(&get::<String>(row, "work_kind")?)?;

    let fix_source: Option<String> = get(row, "fix_source")?;
    let fix_severity: Option<String> = get(row, "fix_severity")?;

    let fix = FixContext {
        origin_task_id: get_uuid_opt(row, "origin_task_id")?,
        qc_inspection_id: get_uuid_opt(row, "qc_inspection_id")?,
        fix_source: fix_source.map(|s| str_to_fix_source(&s)).transpose()?,
        fix_severity: fix_severity.map(|s| str_to_fix_severity(&s)).transpose()?,
        minutes_spent: get(row, "minutes_spent")?,
    };

    Ok(Task {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_uuid(row, "project_id")?,
        deliverable_id: get_uuid_opt(row, "deliverable_id")?,
        title: get(row, "title")?,
        description: get(row, "description")?,
        kind,
        other_kind_label: get(row, "other_kind_label")?,
        is_milestone: get(row, "is_milestone")?,
        priority: get(row, "priority")?,
        status,
        assigned_to: get_uuid_opt(row, "assigned_to")?,
        assigned_at: get(row, "assigned_at")?,
        work_kind,
        fix,
        row_version: get(row, "row_version")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn row_to_transition(row: &SqliteRow) -> Result<TaskTransition> {
    let from_status = str_to_task_status(&get::<String>(row, "from_status")?)?;
    let to_status = str_to_task_status(&get::<String>(row, "to_status")?)?;
    let payload_text: String = get(row, "payload")?;
    let payload: serde_json::Value = serde_json::from_str(&payload_text)
        .map_err(|e| CoreError::InvariantViolation(format!("corrupt transition payload: {e}")))?;

    Ok(TaskTransition {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_uuid(row, "project_id")?,
        task_id: get_uuid(row, "task_id")?,
        actor_user_id: get_uuid(row, "actor_user_id")?,
        action: get(row, "action")?,
        from_status,
        to_status,
        payload,
        client_event_id: get(row, "client_event_id")?,
        expected_row_version: get(row, "expected_row_version")?,
        result_row_version: get(row, "result_row_version")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn row_to_deliverable(row: &SqliteRow) -> Result<Deliverable> {
    let status = str_to_deliverable_status(&get::<String>(row, "status")?)?;
    Ok(Deliverable {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_uuid(row, "project_id")?,
        deliverable_type: get(row, "deliverable_type")?,
        serial: get(row, "serial")?,
        status,
        created_by: get_uuid(row, "created_by")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub fn row_to_signoff(row: &SqliteRow) -> Result<DeliverableSignoff> {
    let result = str_to_signoff_result(&get::<String>(row, "result")?)?;
    Ok(DeliverableSignoff {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_uuid(row, "project_id")?,
        deliverable_id: get_uuid(row, "deliverable_id")?,
        signed_off_by: get_uuid(row, "signed_off_by")?,
        result,
        comment: get(row, "comment")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn row_to_inspection(row: &SqliteRow) -> Result<QcInspection> {
    let result = str_to_qc_result(&get::<String>(row, "result")?)?;
    Ok(QcInspection {
        id: get_uuid(row, "id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        project_id: get_uuid(row, "project_id")?,
        deliverable_id: get_uuid(row, "deliverable_id")?,
        inspector_user_id: get_uuid(row, "inspector_user_id")?,
        responsible_user_id: get_uuid_opt(row, "responsible_user_id")?,
        result,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
    })
}

/// SQLite has no native timezone-aware type; sqlx round-trips chrono's
/// `DateTime<Utc>` through RFC3339 text. Centralized so callers never reach
/// for `Utc::now()` directly and diverge on formatting.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Translate a storage-layer failure into the domain error it represents.
///
/// Every unique index created by the migration stands in for one of the
/// core crate's invariants; a constraint violation here is that invariant
/// failing under a concurrent writer, not a generic database error.
pub fn sqlx_error_to_core_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();

            if message.contains("idx_tasks_wip_one_active_per_assignee") {
                return CoreError::InvariantViolation(
                    "I3: assignee already has an active task".to_string(),
                );
            }
            if message.contains("idx_tasks_one_qc_reject_fix_per_origin") {
                return CoreError::InvariantViolation(
                    "I11: origin task already has a qc_reject fix-task".to_string(),
                );
            }
            if message.contains("idx_inspections_one_per_deliverable") {
                return CoreError::InvariantViolation(
                    "I12: deliverable already has a QC inspection".to_string(),
                );
            }
            if message.contains("idx_transitions_client_event") {
                return CoreError::IdempotencyConflict {
                    client_event_id: "unknown".to_string(),
                };
            }
            if message.contains("idx_transitions_result_version") {
                // The expected/actual row versions aren't visible from the raw
                // sqlx error; callers that can recover them (`insert_transition`)
                // raise `version_conflict` directly before reaching this generic
                // translator. This branch is the fallback for any other call site.
                return CoreError::version_conflict(-1, -1);
            }
            if message.contains("deliverables.tenant_id") && message.contains("deliverables.serial")
            {
                return CoreError::InvariantViolation(
                    "a deliverable with this serial already exists for the tenant".to_string(),
                );
            }
            if message.contains("CHECK constraint failed") {
                return CoreError::InvariantViolation(format!(
                    "storage-level invariant rejected the write: {message}"
                ));
            }
            CoreError::InvariantViolation(format!("database constraint error: {message}"))
        }
        sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
        _ => CoreError::InvariantViolation(format!("database operation failed: {err}")),
    }
}
