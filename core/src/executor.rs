//! The Transition Executor (§4.2): the transactional `apply` of one
//! action against one task. The single place that sequences idempotency
//! checking, FSM evaluation, side-effect composition, and persistence.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::fingerprint::{same_request, TransitionRequest};
use crate::fix_service::FixTaskService;
use crate::fsm::{self, Action, SideEffect};
use crate::models::{
    ActorContext, DeliverableId, FixContext, FixSeverity, FixSource, NewTask, ProjectId,
    QcResult, Task, TaskFilter, TaskId, TaskStatus, TaskTransition, UserId, WorkKind,
};
use crate::qc::{QcDecisionOutcome, QcDecisionPath};
use crate::storage::{Storage, Transaction, TransitionInsertOutcome};
use crate::validation::TaskValidator;

/// Public contract of §4.2/§6: `apply_transition`.
pub struct TransitionExecutor<S: Storage> {
    storage: S,
}

/// Result of a successful `apply` call: the task's new snapshot and, when
/// a side effect created one, the fix-task it produced.
pub struct TransitionOutcome {
    pub task: Task,
    pub fix_task: Option<Task>,
}

/// Input to `TransitionExecutor::create_fix_task` (§6): either an origin
/// task or a deliverable must be given, matching the Fix-Task Service's own
/// requirement that every fix-task carry a deliverable context.
pub struct CreateFixTaskSpec {
    pub project_id: ProjectId,
    pub origin_task_id: Option<TaskId>,
    pub deliverable_id: Option<DeliverableId>,
    pub title: String,
    pub description: Option<String>,
    pub source: FixSource,
    pub severity: FixSeverity,
    pub minutes_spent: Option<i32>,
}

impl<S: Storage> TransitionExecutor<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[instrument(skip(self, payload), fields(task_id = %task_id, action = %action))]
    pub async fn apply(
        &self,
        actor_ctx: &ActorContext,
        task_id: TaskId,
        action: &str,
        expected_row_version: i64,
        payload: Value,
        client_event_id: Option<String>,
    ) -> Result<TransitionOutcome> {
        let action = Action::parse(action)?;
        let mut tx = Box::new(self.storage.begin().await?);

        let request = TransitionRequest {
            task_id: task_id.to_string(),
            actor_user_id: actor_ctx.actor_user_id.to_string(),
            action: action.as_str().to_string(),
            expected_row_version,
            payload: payload.clone(),
        };

        // Step 1: idempotency short-circuit.
        if let Some(client_event_id) = client_event_id.as_deref() {
            if let Some(existing) = tx
                .find_transition_by_client_event(task_id, client_event_id)
                .await?
            {
                let existing_request = TransitionRequest {
                    task_id: existing.task_id.to_string(),
                    actor_user_id: existing.actor_user_id.to_string(),
                    action: existing.action.clone(),
                    expected_row_version: existing.expected_row_version,
                    payload: existing.payload.clone(),
                };
                if !same_request(&request, &existing_request) {
                    return Err(CoreError::idempotency_conflict(client_event_id));
                }
                let outcome = Self::load_result_by_transition(tx.as_mut(), actor_ctx, &existing)
                    .await?;
                tx.commit().await?;
                return Ok(outcome);
            }
        }

        // Step 2: load task.
        let task = tx
            .get_task(actor_ctx.tenant_id, task_id)
            .await?
            .ok_or_else(|| CoreError::not_found_task(task_id))?;

        // Step 3: optimistic check.
        if task.row_version != expected_row_version {
            return Err(CoreError::version_conflict(
                expected_row_version,
                task.row_version,
            ));
        }

        // Step 4: FSM evaluation.
        let (new_status, side_effects) = fsm::evaluate(task.status, action, &payload)?;

        // Step 5: action-specific mutations, prepared in memory only.
        let mut mutated = task.clone();
        mutated.status = new_status;
        match action {
            Action::Assign => {
                let assign_to = payload
                    .get("assign_to")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| CoreError::Validation("assign_to must be a UUID".to_string()))?;
                mutated.assigned_to = Some(assign_to);
                mutated.assigned_at = Some(Utc::now());
            }
            Action::SelfAssign => {
                mutated.assigned_to = Some(actor_ctx.actor_user_id);
                mutated.assigned_at = Some(Utc::now());
            }
            Action::ShiftRelease | Action::RecallToPool => {
                mutated.assigned_to = None;
                mutated.assigned_at = None;
            }
            _ => {}
        }

        // I3 WIP=1: check before committing an assignment into effect.
        if matches!(action, Action::Assign | Action::SelfAssign) {
            let assignee = mutated.assigned_to.expect("set above");
            let active = tx
                .count_active_assignments(actor_ctx.tenant_id, assignee)
                .await?;
            if active > 0 {
                return Err(CoreError::InvariantViolation(format!(
                    "user {assignee} already has an active task in this tenant (WIP=1)"
                )));
            }
        }

        // Step 6: side effect composition.
        let mut tr_payload = Self::base_payload(&payload);
        let mut fix_task = None;
        for effect in &side_effects {
            match effect {
                SideEffect::CreateFixTask {
                    reason,
                    fix_title,
                    assign_to: _,
                    severity,
                } => {
                    let deliverable_id = mutated.deliverable_id.ok_or_else(|| {
                        CoreError::transition_not_allowed(
                            action.as_str(),
                            task.status,
                            fsm::allowed_actions(task.status),
                            "cannot create a fix-task without a deliverable_id",
                        )
                    })?;
                    let title = fix_title
                        .clone()
                        .unwrap_or_else(|| format!("Fix for {}", mutated.title));
                    let created = FixTaskService::create_fix(
                        tx.as_mut(),
                        actor_ctx.tenant_id,
                        mutated.project_id,
                        Some(deliverable_id),
                        actor_ctx.actor_user_id,
                        title,
                        reason.clone(),
                        crate::models::FixSource::SupervisorRequest,
                        *severity,
                        None,
                        Some(mutated.id),
                        None,
                    )
                    .await?;
                    tr_payload.insert(
                        "fix_task_id".to_string(),
                        Value::String(created.id.to_string()),
                    );
                    fix_task = Some(created);
                }
                SideEffect::Escalate { message } => {
                    tr_payload.insert("message".to_string(), Value::String(message.clone()));
                }
            }
        }

        // Step 7: append the transition record before any task mutation.
        let result_row_version = if action == Action::Escalate {
            task.row_version
        } else {
            expected_row_version + 1
        };
        let transition = TaskTransition {
            id: Uuid::new_v4(),
            tenant_id: actor_ctx.tenant_id,
            project_id: task.project_id,
            task_id: task.id,
            actor_user_id: actor_ctx.actor_user_id,
            action: action.as_str().to_string(),
            from_status: task.status,
            to_status: new_status,
            payload: Value::Object(tr_payload),
            client_event_id: client_event_id.clone(),
            expected_row_version,
            result_row_version,
            created_at: Utc::now(),
        };

        let inserted = match tx.insert_transition(transition).await? {
            TransitionInsertOutcome::Inserted(row) => row,
            TransitionInsertOutcome::AlreadyExists(existing) => {
                // A concurrent winner already claimed this client_event_id;
                // replay their result rather than mutate the task ourselves.
                let outcome =
                    Self::load_result_by_transition(tx.as_mut(), actor_ctx, &existing).await?;
                tx.commit().await?;
                return Ok(outcome);
            }
        };

        // Step 8: apply task mutations, only reachable because our insert won.
        let persisted_task = if action == Action::Escalate {
            task
        } else {
            mutated.row_version = inserted.result_row_version;
            mutated.updated_at = Utc::now();
            tx.update_task(mutated).await?
        };

        // Step 9: commit.
        tx.commit().await?;

        Ok(TransitionOutcome {
            task: persisted_task,
            fix_task,
        })
    }

    /// Drop server-derived keys before the transition's payload is built
    /// up with side-effect output; the caller's own payload values are
    /// preserved as given (canonicalization is a comparison-time concern,
    /// not a storage-time one).
    fn base_payload(payload: &Value) -> Map<String, Value> {
        match payload {
            Value::Object(map) => map
                .iter()
                .filter(|(k, _)| k.as_str() != "fix_task_id")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Map::new(),
        }
    }

    /// Re-derive `(task, fix_task)` from a previously committed transition,
    /// for idempotent replay (§4.2 step 1, §4.3 insert protocol).
    async fn load_result_by_transition(
        tx: &mut S::Tx,
        actor_ctx: &ActorContext,
        transition: &TaskTransition,
    ) -> Result<TransitionOutcome> {
        let task = tx
            .get_task(actor_ctx.tenant_id, transition.task_id)
            .await?
            .ok_or_else(|| CoreError::not_found_task(transition.task_id))?;

        let fix_task = match transition
            .payload
            .get("fix_task_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            Some(fix_task_id) => tx.get_task(actor_ctx.tenant_id, fix_task_id).await?,
            None => None,
        };

        Ok(TransitionOutcome { task, fix_task })
    }

    /// Supports `GET`-style listing at the adapter boundary; not part of
    /// the transition algorithm itself.
    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut tx = Box::new(self.storage.begin().await?);
        let tasks = tx.list_tasks(filter).await?;
        tx.commit().await?;
        Ok(tasks)
    }

    /// §6 `create_task`: standalone task creation, outside the FSM (a task
    /// is born in `blocked` or `available`, never via a transition).
    pub async fn create_task(&self, spec: NewTask) -> Result<Task> {
        TaskValidator::validate_new_task(&spec)?;
        if !matches!(spec.initial_status, TaskStatus::Blocked | TaskStatus::Available) {
            return Err(CoreError::Validation(
                "initial_status must be blocked or available".to_string(),
            ));
        }

        let mut tx = Box::new(self.storage.begin().await?);

        // I7 + I8: a caller-supplied deliverable_id must belong to this
        // tenant and project before it's attached to a task.
        if let Some(deliverable_id) = spec.deliverable_id {
            match tx.get_deliverable(spec.tenant_id, deliverable_id).await {
                Ok(Some(deliverable)) if deliverable.project_id == spec.project_id => {}
                Ok(Some(deliverable)) => {
                    tx.rollback().await?;
                    return Err(CoreError::InvariantViolation(format!(
                        "I8: deliverable {deliverable_id} belongs to project {}, not {}",
                        deliverable.project_id, spec.project_id
                    )));
                }
                Ok(None) => {
                    tx.rollback().await?;
                    return Err(CoreError::not_found_deliverable(deliverable_id));
                }
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err);
                }
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            tenant_id: spec.tenant_id,
            project_id: spec.project_id,
            deliverable_id: spec.deliverable_id,
            title: spec.title,
            description: spec.description,
            kind: spec.kind,
            other_kind_label: spec.other_kind_label,
            is_milestone: spec.is_milestone,
            priority: spec.priority,
            status: spec.initial_status,
            assigned_to: None,
            assigned_at: None,
            work_kind: WorkKind::Work,
            fix: FixContext::default(),
            row_version: 1,
            created_at: now,
            updated_at: now,
        };

        match tx.insert_task(task).await {
            Ok(task) => {
                tx.commit().await?;
                Ok(task)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// §6 `qc_decision`: the QC Decision Path, transaction-wrapped.
    pub async fn qc_decision(
        &self,
        actor_ctx: &ActorContext,
        deliverable_id: DeliverableId,
        inspector_user_id: UserId,
        result: QcResult,
        notes: Option<String>,
    ) -> Result<QcDecisionOutcome> {
        let mut tx = Box::new(self.storage.begin().await?);
        match QcDecisionPath::decide(
            tx.as_mut(),
            actor_ctx,
            deliverable_id,
            inspector_user_id,
            result,
            notes,
        )
        .await
        {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// §6 `create_fix_task`: worker-initiative or supervisor-requested
    /// fix-tasks raised outside a transition's own side effects.
    /// `qc_reject` fix-tasks are never created here — they exist only as a
    /// side effect of [`Self::qc_decision`] (P6).
    pub async fn create_fix_task(
        &self,
        actor_ctx: &ActorContext,
        spec: CreateFixTaskSpec,
    ) -> Result<Task> {
        if spec.source == FixSource::QcReject {
            return Err(CoreError::Validation(
                "create_fix_task does not accept fix_source=qc_reject; use qc_decision".to_string(),
            ));
        }

        let mut tx = Box::new(self.storage.begin().await?);

        let project_id = match spec.origin_task_id {
            Some(origin_task_id) => {
                match tx.get_task(actor_ctx.tenant_id, origin_task_id).await {
                    Ok(Some(origin)) => origin.project_id,
                    Ok(None) => {
                        tx.rollback().await?;
                        return Err(CoreError::not_found_task(origin_task_id));
                    }
                    Err(err) => {
                        tx.rollback().await?;
                        return Err(err);
                    }
                }
            }
            None => spec.project_id,
        };

        let result = FixTaskService::create_fix(
            tx.as_mut(),
            actor_ctx.tenant_id,
            project_id,
            spec.deliverable_id,
            actor_ctx.actor_user_id,
            spec.title,
            spec.description,
            spec.source,
            spec.severity,
            spec.minutes_spent,
            spec.origin_task_id,
            None,
        )
        .await;

        match result {
            Ok(task) => {
                tx.commit().await?;
                Ok(task)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }
}
