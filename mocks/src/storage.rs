//! In-memory [`Storage`]/[`Transaction`] implementation for testing.
//!
//! Mirrors the shape of `shopfloor-db`'s SQLite backend without a
//! database: one shared, mutex-guarded state that every transaction
//! mutates directly (so concurrent transactions compose correctly), with
//! an undo journal giving `rollback` the ability to discard just the
//! writes made through that transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shopfloor_core::error::{CoreError, Result};
use shopfloor_core::models::{
    Deliverable, DeliverableId, DeliverableSignoff, QcInspection, QcInspectionId, SignoffResult,
    Task, TaskFilter, TaskId, TaskStatus, TaskTransition, TenantId, UserId,
};
use shopfloor_core::storage::{Storage, Transaction, TransitionInsertOutcome};

#[derive(Default)]
struct MockState {
    tasks: HashMap<TaskId, Task>,
    transitions: HashMap<(TaskId, String), TaskTransition>,
    deliverables: HashMap<DeliverableId, Deliverable>,
    signoffs: Vec<DeliverableSignoff>,
    inspections: HashMap<QcInspectionId, QcInspection>,
}

type UndoOp = Box<dyn FnOnce(&mut MockState) + Send + Sync>;

/// Mock implementation of [`Storage`] for testing.
///
/// All reads and writes within a transaction go straight through to the
/// shared state (there is no snapshot isolation), which keeps concurrent
/// transactions from clobbering each other's writes at commit time. Each
/// transaction records an undo journal so `rollback` can still discard
/// exactly what it wrote.
#[derive(Clone, Default)]
pub struct MockStorage {
    state: Arc<Mutex<MockState>>,
    error_injection: Arc<Mutex<Option<CoreError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store pre-populated with the given tasks.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let storage = Self::new();
        let mut state = storage.state.lock();
        for task in tasks {
            state.tasks.insert(task.id, task);
        }
        drop(state);
        storage
    }

    /// Inject an error to be returned (and consumed) by the next call.
    pub fn inject_error(&self, error: CoreError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "method '{method}' was not called. Call history: {history:?}"
        );
    }
}

#[async_trait]
impl Storage for MockStorage {
    type Tx = MockTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(MockTransaction {
            shared: self.state.clone(),
            journal: Vec::new(),
            error_injection: self.error_injection.clone(),
            call_history: self.call_history.clone(),
        })
    }

    async fn health_check(&self) -> Result<()> {
        self.call_history.lock().push("health_check()".to_string());
        Ok(())
    }
}

pub struct MockTransaction {
    shared: Arc<Mutex<MockState>>,
    journal: Vec<UndoOp>,
    error_injection: Arc<Mutex<Option<CoreError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockTransaction {
    fn check_error_injection(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.call_history.lock().push(call.into());
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn get_task(&mut self, tenant_id: TenantId, task_id: TaskId) -> Result<Option<Task>> {
        self.record(format!("get_task({task_id})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .tasks
            .get(&task_id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_transition_by_client_event(
        &mut self,
        task_id: TaskId,
        client_event_id: &str,
    ) -> Result<Option<TaskTransition>> {
        self.record(format!(
            "find_transition_by_client_event({task_id}, {client_event_id})"
        ));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .transitions
            .get(&(task_id, client_event_id.to_string()))
            .cloned())
    }

    async fn insert_transition(
        &mut self,
        transition: TaskTransition,
    ) -> Result<TransitionInsertOutcome> {
        self.record(format!("insert_transition({})", transition.task_id));
        self.check_error_injection()?;

        let key = (
            transition.task_id,
            transition
                .client_event_id
                .clone()
                .unwrap_or_else(|| transition.id.to_string()),
        );

        let mut state = self.shared.lock();
        if let Some(existing) = state.transitions.get(&key) {
            return Ok(TransitionInsertOutcome::AlreadyExists(existing.clone()));
        }
        state.transitions.insert(key.clone(), transition.clone());
        drop(state);

        self.journal.push(Box::new(move |state| {
            state.transitions.remove(&key);
        }));
        Ok(TransitionInsertOutcome::Inserted(transition))
    }

    async fn update_task(&mut self, task: Task) -> Result<Task> {
        self.record(format!("update_task({})", task.id));
        self.check_error_injection()?;

        let mut state = self.shared.lock();
        let current = state
            .tasks
            .get(&task.id)
            .cloned()
            .ok_or_else(|| CoreError::not_found_task(task.id))?;
        if current.row_version != task.row_version - 1 {
            return Err(CoreError::version_conflict(
                current.row_version,
                task.row_version,
            ));
        }
        state.tasks.insert(task.id, task.clone());
        drop(state);

        self.journal.push(Box::new(move |state| {
            state.tasks.insert(current.id, current);
        }));
        Ok(task)
    }

    async fn insert_task(&mut self, task: Task) -> Result<Task> {
        self.record(format!("insert_task({})", task.id));
        self.check_error_injection()?;

        self.shared.lock().tasks.insert(task.id, task.clone());
        let task_id = task.id;
        self.journal.push(Box::new(move |state| {
            state.tasks.remove(&task_id);
        }));
        Ok(task)
    }

    async fn list_tasks(&mut self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.record("list_tasks()");
        self.check_error_injection()?;

        let state = self.shared.lock();
        let mut result: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.tenant_id == filter.tenant_id)
            .filter(|t| filter.project_id.map_or(true, |p| t.project_id == p))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.assigned_to.map_or(true, |a| t.assigned_to == Some(a)))
            .filter(|t| filter.work_kind.map_or(true, |w| t.work_kind == w))
            .cloned()
            .collect();
        drop(state);

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(offset) = filter.offset {
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn count_active_assignments(
        &mut self,
        tenant_id: TenantId,
        assigned_to: UserId,
    ) -> Result<u64> {
        self.record(format!("count_active_assignments({assigned_to})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .filter(|t| t.assigned_to == Some(assigned_to))
            .filter(|t| {
                matches!(
                    t.status,
                    TaskStatus::Assigned | TaskStatus::InProgress | TaskStatus::Submitted
                )
            })
            .count() as u64)
    }

    async fn get_deliverable(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<Deliverable>> {
        self.record(format!("get_deliverable({deliverable_id})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .deliverables
            .get(&deliverable_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_deliverable(&mut self, deliverable: Deliverable) -> Result<Deliverable> {
        self.record(format!("update_deliverable({})", deliverable.id));
        self.check_error_injection()?;

        let mut state = self.shared.lock();
        let previous = state.deliverables.get(&deliverable.id).cloned();
        state
            .deliverables
            .insert(deliverable.id, deliverable.clone());
        drop(state);

        let deliverable_id = deliverable.id;
        self.journal.push(Box::new(move |state| match previous {
            Some(previous) => {
                state.deliverables.insert(deliverable_id, previous);
            }
            None => {
                state.deliverables.remove(&deliverable_id);
            }
        }));
        Ok(deliverable)
    }

    async fn record_signoff(&mut self, signoff: DeliverableSignoff) -> Result<DeliverableSignoff> {
        self.record(format!("record_signoff({})", signoff.deliverable_id));
        self.check_error_injection()?;

        self.shared.lock().signoffs.push(signoff.clone());
        let signoff_id = signoff.id;
        self.journal.push(Box::new(move |state| {
            state.signoffs.retain(|s| s.id != signoff_id);
        }));
        Ok(signoff)
    }

    async fn latest_approved_signoff(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<DeliverableSignoff>> {
        self.record(format!("latest_approved_signoff({deliverable_id})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .signoffs
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .filter(|s| s.deliverable_id == deliverable_id)
            .filter(|s| s.result == SignoffResult::Approved)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn insert_inspection(&mut self, inspection: QcInspection) -> Result<QcInspection> {
        self.record(format!("insert_inspection({})", inspection.deliverable_id));
        self.check_error_injection()?;

        let mut state = self.shared.lock();
        if state
            .inspections
            .values()
            .any(|i| i.deliverable_id == inspection.deliverable_id)
        {
            return Err(CoreError::InvariantViolation(format!(
                "deliverable {} already has a QC inspection",
                inspection.deliverable_id
            )));
        }
        state
            .inspections
            .insert(inspection.id, inspection.clone());
        drop(state);

        let inspection_id = inspection.id;
        self.journal.push(Box::new(move |state| {
            state.inspections.remove(&inspection_id);
        }));
        Ok(inspection)
    }

    async fn get_inspection(
        &mut self,
        tenant_id: TenantId,
        inspection_id: QcInspectionId,
    ) -> Result<Option<QcInspection>> {
        self.record(format!("get_inspection({inspection_id})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .inspections
            .get(&inspection_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_qc_reject_fix_for_origin(
        &mut self,
        tenant_id: TenantId,
        origin_task_id: TaskId,
    ) -> Result<Option<Task>> {
        self.record(format!("find_qc_reject_fix_for_origin({origin_task_id})"));
        self.check_error_injection()?;
        Ok(self
            .shared
            .lock()
            .tasks
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .find(|t| {
                t.fix.origin_task_id == Some(origin_task_id)
                    && t.fix.fix_source == Some(shopfloor_core::models::FixSource::QcReject)
            })
            .cloned())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut state = self.shared.lock();
        for undo in self.journal.into_iter().rev() {
            undo(&mut state);
        }
        Ok(())
    }
}
