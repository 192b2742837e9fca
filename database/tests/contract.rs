//! Contract tests that any `Storage` implementation must pass.
//!
//! These exercise the trait itself, independent of the backend, so a
//! future non-SQLite `Storage` can be checked against the same behavior.

use chrono::Utc;
use shopfloor_core::error::CoreError;
use shopfloor_core::models::{FixContext, Task, TaskFilter, TaskKind, TaskStatus, WorkKind};
use shopfloor_core::storage::{Storage, Transaction};
use shopfloor_db::SqliteStorage;
use uuid::Uuid;

fn new_task(tenant_id: Uuid, project_id: Uuid) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id: None,
        title: "Contract test task".to_string(),
        description: None,
        kind: TaskKind::Production,
        other_kind_label: None,
        is_milestone: false,
        priority: 0,
        status: TaskStatus::Available,
        assigned_to: None,
        assigned_at: None,
        work_kind: WorkKind::Work,
        fix: FixContext::default(),
        row_version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// Runs the full contract suite against a fresh, migrated [`Storage`].
#[allow(dead_code)]
pub async fn test_storage_contract<S: Storage>(storage: S) {
    test_health_check(&storage).await;
    test_insert_then_get(&storage).await;
    test_missing_task_is_none_not_error(&storage).await;
    test_optimistic_concurrency(&storage).await;
    test_task_listing_contract(&storage).await;
    test_rollback_discards_writes(&storage).await;
}

async fn test_health_check<S: Storage>(storage: &S) {
    assert!(
        storage.health_check().await.is_ok(),
        "health check should pass on a freshly migrated storage"
    );
}

async fn test_insert_then_get<S: Storage>(storage: &S) {
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());
    let inserted = tx.insert_task(task.clone()).await.unwrap();
    assert_eq!(inserted.row_version, 1);

    let fetched = tx.get_task(tenant_id, task.id).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(fetched.unwrap().id, task.id);
}

async fn test_missing_task_is_none_not_error<S: Storage>(storage: &S) {
    let mut tx = Box::new(storage.begin().await.unwrap());
    let result = tx.get_task(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    tx.commit().await.unwrap();
    assert!(result.is_none());
}

async fn test_optimistic_concurrency<S: Storage>(storage: &S) {
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();

    // Two independent "readers" load the same row_version and race to update it.
    let mut writer_a = task.clone();
    writer_a.status = TaskStatus::Assigned;
    writer_a.assigned_to = Some(Uuid::new_v4());
    writer_a.assigned_at = Some(Utc::now());
    writer_a.row_version = 2;

    let mut writer_b = task.clone();
    writer_b.priority = 9;
    writer_b.row_version = 2;

    let a_result = tx.update_task(writer_a).await;
    assert!(a_result.is_ok(), "first writer should win the race");

    let b_result = tx.update_task(writer_b).await;
    tx.rollback().await.unwrap();

    match b_result {
        Err(CoreError::VersionConflict { expected, actual }) => {
            assert_eq!(expected, 1, "expected should be the pre-increment version the writer started from");
            assert_eq!(actual, 2, "actual should be the version the losing writer tried to write");
        }
        other => panic!("second writer should lose with VersionConflict, got: {other:?}"),
    }
}

async fn test_task_listing_contract<S: Storage>(storage: &S) {
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());
    for _ in 0..3 {
        tx.insert_task(new_task(tenant_id, project_id)).await.unwrap();
    }
    let other_tenant_task = new_task(Uuid::new_v4(), Uuid::new_v4());
    tx.insert_task(other_tenant_task).await.unwrap();

    let scoped = tx
        .list_tasks(TaskFilter::for_tenant(tenant_id))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(scoped.len(), 3, "listing must be scoped to the requested tenant");
}

async fn test_rollback_discards_writes<S: Storage>(storage: &S) {
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();
    tx.rollback().await.unwrap();

    let mut verify_tx = Box::new(storage.begin().await.unwrap());
    let result = verify_tx.get_task(tenant_id, task.id).await.unwrap();
    verify_tx.commit().await.unwrap();

    assert!(result.is_none(), "a rolled-back insert must not be visible afterward");
}

#[tokio::test]
async fn sqlite_storage_satisfies_the_contract() {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    storage.migrate().await.unwrap();
    test_storage_contract(storage).await;
}
