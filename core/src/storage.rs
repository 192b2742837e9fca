//! The Storage Contract (§4.7): the abstract transactional store the core
//! depends on. No SQL, no connection pool — just the operations the
//! executor and services need, with the invariants they must uphold.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Deliverable, DeliverableId, DeliverableSignoff, QcInspection, QcInspectionId, Task,
    TaskFilter, TaskId, TaskTransition, TenantId, UserId,
};

/// Outcome of an idempotent transition insert: either this writer's row
/// was the one that landed, or a prior transition already occupies the
/// `(task_id, client_event_id)` slot and is returned instead.
pub enum TransitionInsertOutcome {
    Inserted(TaskTransition),
    AlreadyExists(TaskTransition),
}

/// A single transactional unit of work. All mutating Storage operations
/// happen through one `Transaction`, mirroring §9's "global mutable
/// session" re-architecture: there is no ambient session, only this
/// explicit handle passed through the core.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Load a task scoped by tenant. Missing ⇒ `Ok(None)`, never an error.
    async fn get_task(&mut self, tenant_id: TenantId, task_id: TaskId) -> Result<Option<Task>>;

    /// Look up an existing transition by `(task_id, client_event_id)`.
    async fn find_transition_by_client_event(
        &mut self,
        task_id: TaskId,
        client_event_id: &str,
    ) -> Result<Option<TaskTransition>>;

    /// Insert a transition record with "insert if no conflict on
    /// `(task_id, client_event_id)`" semantics (only meaningful when
    /// `client_event_id` is present; always inserts otherwise).
    async fn insert_transition(
        &mut self,
        transition: TaskTransition,
    ) -> Result<TransitionInsertOutcome>;

    /// Persist task mutations prepared by the executor. Enforces I1, I2,
    /// I3, I4, I7, I8, I10 at the storage layer as a last-line guarantee.
    async fn update_task(&mut self, task: Task) -> Result<Task>;

    /// Insert a brand new task (standalone creation or Fix-Task Service).
    async fn insert_task(&mut self, task: Task) -> Result<Task>;

    /// Enumerate a tenant's tasks, for listing and WIP=1 checks.
    async fn list_tasks(&mut self, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Count a user's active (assigned/in_progress/submitted) tasks in a
    /// tenant, supporting the WIP=1 invariant (I3).
    async fn count_active_assignments(
        &mut self,
        tenant_id: TenantId,
        assigned_to: UserId,
    ) -> Result<u64>;

    async fn get_deliverable(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<Deliverable>>;

    async fn update_deliverable(&mut self, deliverable: Deliverable) -> Result<Deliverable>;

    /// Append-only: one sign-off row per call, never mutated afterward.
    async fn record_signoff(&mut self, signoff: DeliverableSignoff) -> Result<DeliverableSignoff>;

    /// Most recent `approved` production sign-off for a deliverable, used
    /// to populate a QC rejection's `responsible_user_id`.
    async fn latest_approved_signoff(
        &mut self,
        tenant_id: TenantId,
        deliverable_id: DeliverableId,
    ) -> Result<Option<DeliverableSignoff>>;

    /// Append-only: enforces I12 (one inspection per deliverable) at the
    /// storage layer via a partial unique index.
    async fn insert_inspection(&mut self, inspection: QcInspection) -> Result<QcInspection>;

    async fn get_inspection(
        &mut self,
        tenant_id: TenantId,
        inspection_id: QcInspectionId,
    ) -> Result<Option<QcInspection>>;

    /// A qc_reject fix-task already recorded for this origin task, if any
    /// (I11, checked by the Fix-Task Service before insert).
    async fn find_qc_reject_fix_for_origin(
        &mut self,
        tenant_id: TenantId,
        origin_task_id: TaskId,
    ) -> Result<Option<Task>>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Entry point into the transactional store: begins a [`Transaction`]
/// scoping every subsequent call until commit or rollback. Project scoping
/// for deliverables/inspections is threaded through the individual calls
/// above rather than the `begin` call itself, since a transaction is not
/// inherently bound to one project.
#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx>;

    /// Shallow liveness check (e.g. `SELECT 1`), not a full schema check.
    async fn health_check(&self) -> Result<()>;
}
