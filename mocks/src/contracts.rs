//! Contract test helpers for validating [`Storage`] implementations.
//!
//! Any backend wired up behind `Storage` — the in-memory mock here, the
//! SQLite backend, or a future one — should satisfy this suite.

use shopfloor_core::error::CoreError;
use shopfloor_core::models::TaskStatus;
use shopfloor_core::storage::{Storage, Transaction};

use crate::builders::TaskBuilder;

/// Run the full contract suite against a fresh [`Storage`] implementation.
pub async fn test_storage_contract<S: Storage>(storage: &S) {
    test_insert_then_get(storage).await;
    test_missing_task_is_none(storage).await;
    test_optimistic_concurrency_rejects_stale_writers(storage).await;
    test_wip_counts_only_active_statuses(storage).await;
}

async fn test_insert_then_get<S: Storage>(storage: &S) {
    let task = TaskBuilder::new().build();
    let tenant_id = task.tenant_id;

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();
    let fetched = tx.get_task(tenant_id, task.id).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(fetched.unwrap().id, task.id);
}

async fn test_missing_task_is_none<S: Storage>(storage: &S) {
    let mut tx = Box::new(storage.begin().await.unwrap());
    let result = tx
        .get_task(uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(result.is_none());
}

async fn test_optimistic_concurrency_rejects_stale_writers<S: Storage>(storage: &S) {
    let task = TaskBuilder::new().build();

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();

    let mut winner = task.clone();
    winner.priority = 5;
    winner.row_version = 2;
    tx.update_task(winner).await.unwrap();

    let mut loser = task.clone();
    loser.priority = 9;
    loser.row_version = 2;
    let result = tx.update_task(loser).await;
    tx.rollback().await.unwrap();

    assert!(matches!(result, Err(CoreError::VersionConflict { .. })));
}

async fn test_wip_counts_only_active_statuses<S: Storage>(storage: &S) {
    let tenant_id = uuid::Uuid::new_v4();
    let assignee = uuid::Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(
        TaskBuilder::new()
            .with_tenant(tenant_id)
            .with_status(TaskStatus::Assigned)
            .with_assigned_to(assignee)
            .build(),
    )
    .await
    .unwrap();
    tx.insert_task(
        TaskBuilder::new()
            .with_tenant(tenant_id)
            .with_status(TaskStatus::Available)
            .build(),
    )
    .await
    .unwrap();

    let active = tx.count_active_assignments(tenant_id, assignee).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(active, 1, "only the assigned task should count toward WIP");
}
