use async_trait::async_trait;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

use shopfloor_core::error::{CoreError, Result};
use shopfloor_core::models::{
    Deliverable, DeliverableId, DeliverableSignoff, QcInspection, QcInspectionId, Task, TaskFilter,
    TaskId, TaskTransition, TenantId, UserId,
};
use shopfloor_core::storage::{Storage, Transaction, TransitionInsertOutcome};

use crate::common::{
    deliverable_status_to_str, get, now, qc_result_to_str, row_to_deliverable, row_to_inspection,
    row_to_signoff, row_to_task, row_to_transition, signoff_result_to_str, sqlx_error_to_core_error,
    task_kind_to_str, task_status_to_str, work_kind_to_str,
};

fn is_unique_violation(err: &sqlx::Error, needle: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains(needle))
}

/// SQLite-backed [`Storage`]: a connection pool plus migrations, nothing
/// more. Every mutating operation happens inside a [`SqliteTx`].
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") {
            database_url.to_string()
        } else if database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false)
        {
            match Sqlite::create_database(&db_url).await {
                Ok(_) => tracing::info!("database created"),
                Err(error) => {
                    tracing::error!("error creating database: {}", error);
                    return Err(CoreError::InvariantViolation(format!(
                        "failed to create database: {error}"
                    )));
                }
            }
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_core_error)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::InvariantViolation(format!("migration failed: {e}")))?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    /// Intended for tests that want to reach past the trait for setup.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await.map_err(sqlx_error_to_core_error)?;
        Ok(SqliteTx { tx })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_core_error)?;
        Ok(())
    }
}

/// One open SQLite transaction. `commit`/`rollback` consume it, matching
/// the executor's single-shot use of each transaction.
pub struct SqliteTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl Transaction for SqliteTx {
    async fn get_task(&mut self, tenant_id: TenantId, task_id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(task_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn find_transition_by_client_event(
        &mut self,
        task_id: TaskId,
        client_event_id: &str,
    ) -> Result<Option<TaskTransition>> {
        let row = sqlx::query("SELECT * FROM task_transitions WHERE task_id = ? AND client_event_id = ?")
            .bind(task_id.to_string())
            .bind(client_event_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_transition).transpose()
    }

    async fn insert_transition(
        &mut self,
        transition: TaskTransition,
    ) -> Result<TransitionInsertOutcome> {
        let payload_text = serde_json::to_string(&transition.payload).map_err(|e| {
            CoreError::InvariantViolation(format!("failed to serialize transition payload: {e}"))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO task_transitions
                (id, tenant_id, project_id, task_id, actor_user_id, action, from_status,
                 to_status, payload, client_event_id, expected_row_version, result_row_version,
                 created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transition.id.to_string())
        .bind(transition.tenant_id.to_string())
        .bind(transition.project_id.to_string())
        .bind(transition.task_id.to_string())
        .bind(transition.actor_user_id.to_string())
        .bind(&transition.action)
        .bind(task_status_to_str(transition.from_status))
        .bind(task_status_to_str(transition.to_status))
        .bind(&payload_text)
        .bind(&transition.client_event_id)
        .bind(transition.expected_row_version)
        .bind(transition.result_row_version)
        .bind(transition.created_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(TransitionInsertOutcome::Inserted(transition)),
            Err(err) if is_unique_violation(&err, "idx_transitions_client_event") => {
                let client_event_id = transition.client_event_id.as_deref().ok_or_else(|| {
                    CoreError::InvariantViolation(
                        "client_event_id uniqueness conflict on a transition with no client_event_id"
                            .to_string(),
                    )
                })?;
                let existing = self
                    .find_transition_by_client_event(transition.task_id, client_event_id)
                    .await?
                    .ok_or_else(|| {
                        CoreError::InvariantViolation(
                            "transition insert conflicted but no existing row was found"
                                .to_string(),
                        )
                    })?;
                Ok(TransitionInsertOutcome::AlreadyExists(existing))
            }
            Err(err) if is_unique_violation(&err, "idx_transitions_result_version") => {
                Err(CoreError::version_conflict(
                    transition.expected_row_version,
                    transition.result_row_version,
                ))
            }
            Err(err) => Err(sqlx_error_to_core_error(err)),
        }
    }

    async fn update_task(&mut self, task: Task) -> Result<Task> {
        let updated_at = now();
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                deliverable_id = ?, title = ?, description = ?, kind = ?, other_kind_label = ?,
                is_milestone = ?, priority = ?, status = ?, assigned_to = ?, assigned_at = ?,
                work_kind = ?, origin_task_id = ?, qc_inspection_id = ?, fix_source = ?,
                fix_severity = ?, minutes_spent = ?, row_version = ?, updated_at = ?
            WHERE tenant_id = ? AND id = ? AND row_version = ?
            "#,
        )
        .bind(task.deliverable_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task_kind_to_str(task.kind))
        .bind(&task.other_kind_label)
        .bind(task.is_milestone)
        .bind(task.priority)
        .bind(task_status_to_str(task.status))
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.assigned_at)
        .bind(work_kind_to_str(task.work_kind))
        .bind(task.fix.origin_task_id.map(|id| id.to_string()))
        .bind(task.fix.qc_inspection_id.map(|id| id.to_string()))
        .bind(task.fix.fix_source.map(|s| s.as_str()))
        .bind(task.fix.fix_severity.map(|s| s.as_str()))
        .bind(task.fix.minutes_spent)
        .bind(task.row_version)
        .bind(updated_at)
        .bind(task.tenant_id.to_string())
        .bind(task.id.to_string())
        .bind(task.row_version - 1)
        .execute(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::version_conflict(task.row_version - 1, task.row_version));
        }

        self.get_task(task.tenant_id, task.id)
            .await?
            .ok_or_else(|| CoreError::not_found_task(task.id))
    }

    async fn insert_task(&mut self, task: Task) -> Result<Task> {
        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, tenant_id, project_id, deliverable_id, title, description, kind,
                 other_kind_label, is_milestone, priority, status, assigned_to, assigned_at,
                 work_kind, origin_task_id, qc_inspection_id, fix_source, fix_severity,
                 minutes_spent, row_version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.to_string())
        .bind(task.tenant_id.to_string())
        .bind(task.project_id.to_string())
        .bind(task.deliverable_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task_kind_to_str(task.kind))
        .bind(&task.other_kind_label)
        .bind(task.is_milestone)
        .bind(task.priority)
        .bind(task_status_to_str(task.status))
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.assigned_at)
        .bind(work_kind_to_str(task.work_kind))
        .bind(task.fix.origin_task_id.map(|id| id.to_string()))
        .bind(task.fix.qc_inspection_id.map(|id| id.to_string()))
        .bind(task.fix.fix_source.map(|s| s.as_str()))
        .bind(task.fix.fix_severity.map(|s| s.as_str()))
        .bind(task.fix.minutes_spent)
        .bind(task.row_version)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;

        self.get_task(task.tenant_id, task.id)
            .await?
            .ok_or_else(|| CoreError::not_found_task(task.id))
    }

    async fn list_tasks(&mut self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut builder: sqlx::QueryBuilder<Sqlite> =
            sqlx::QueryBuilder::new("SELECT * FROM tasks WHERE tenant_id = ");
        builder.push_bind(filter.tenant_id.to_string());

        if let Some(project_id) = filter.project_id {
            builder.push(" AND project_id = ");
            builder.push_bind(project_id.to_string());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(task_status_to_str(status));
        }
        if let Some(assigned_to) = filter.assigned_to {
            builder.push(" AND assigned_to = ");
            builder.push_bind(assigned_to.to_string());
        }
        if let Some(work_kind) = filter.work_kind {
            builder.push(" AND work_kind = ");
            builder.push_bind(work_kind_to_str(work_kind));
        }
        builder.push(" ORDER BY created_at ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn count_active_assignments(
        &mut self,
        tenant_id: TenantId,
        assigned_to: UserId,
    ) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM tasks
            WHERE tenant_id = ? AND assigned_to = ?
              AND status IN ('assigned', 'in_progress', 'submitted')
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(assigned_to.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;
        let n: i64 = get(&row, "n")?;
        Ok(n as u64)
    }

    async fn get_deliverable(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<Deliverable>> {
        let row = sqlx::query("SELECT * FROM deliverables WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(deliverable_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_deliverable).transpose()
    }

    async fn update_deliverable(&mut self, deliverable: Deliverable) -> Result<Deliverable> {
        sqlx::query("UPDATE deliverables SET status = ?, updated_at = ? WHERE tenant_id = ? AND id = ?")
            .bind(deliverable_status_to_str(deliverable.status))
            .bind(now())
            .bind(deliverable.tenant_id.to_string())
            .bind(deliverable.id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;

        self.get_deliverable(deliverable.tenant_id, deliverable.id)
            .await?
            .ok_or_else(|| CoreError::not_found_deliverable(deliverable.id))
    }

    async fn record_signoff(&mut self, signoff: DeliverableSignoff) -> Result<DeliverableSignoff> {
        sqlx::query(
            r#"
            INSERT INTO deliverable_signoffs
                (id, tenant_id, project_id, deliverable_id, signed_off_by, result, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(signoff.id.to_string())
        .bind(signoff.tenant_id.to_string())
        .bind(signoff.project_id.to_string())
        .bind(signoff.deliverable_id.to_string())
        .bind(signoff.signed_off_by.to_string())
        .bind(signoff_result_to_str(signoff.result))
        .bind(&signoff.comment)
        .bind(signoff.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;
        Ok(signoff)
    }

    async fn latest_approved_signoff(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<DeliverableSignoff>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM deliverable_signoffs
            WHERE tenant_id = ? AND deliverable_id = ? AND result = 'approved'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(deliverable_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_signoff).transpose()
    }

    async fn insert_inspection(&mut self, inspection: QcInspection) -> Result<QcInspection> {
        sqlx::query(
            r#"
            INSERT INTO qc_inspections
                (id, tenant_id, project_id, deliverable_id, inspector_user_id,
                 responsible_user_id, result, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(inspection.id.to_string())
        .bind(inspection.tenant_id.to_string())
        .bind(inspection.project_id.to_string())
        .bind(inspection.deliverable_id.to_string())
        .bind(inspection.inspector_user_id.to_string())
        .bind(inspection.responsible_user_id.map(|id| id.to_string()))
        .bind(qc_result_to_str(inspection.result))
        .bind(&inspection.notes)
        .bind(inspection.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;
        Ok(inspection)
    }

    async fn get_inspection(
        &mut self,
        tenant_id: TenantId,
        inspection_id: QcInspectionId,
    ) -> Result<Option<QcInspection>> {
        let row = sqlx::query("SELECT * FROM qc_inspections WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(inspection_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_inspection).transpose()
    }

    async fn find_qc_reject_fix_for_origin(
        &mut self,
        tenant_id: TenantId,
        origin_task_id: TaskId,
    ) -> Result<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE tenant_id = ? AND origin_task_id = ? AND work_kind = 'fix' AND fix_source = 'qc_reject'
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(origin_task_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(sqlx_error_to_core_error)?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(sqlx_error_to_core_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(sqlx_error_to_core_error)
    }
}
