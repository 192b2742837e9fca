use chrono::Utc;
use shopfloor_core::error::CoreError;
use shopfloor_core::models::{
    DeliverableSignoff, FixContext, QcInspection, QcResult, SignoffResult, Task, TaskFilter,
    TaskKind, TaskStatus, TaskTransition, WorkKind,
};
use shopfloor_core::storage::{Storage, Transaction, TransitionInsertOutcome};
use shopfloor_db::SqliteStorage;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

async fn test_storage() -> SqliteStorage {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    storage.migrate().await.unwrap();
    storage
}

fn new_task(tenant_id: Uuid, project_id: Uuid) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id: None,
        title: "Drill mounting holes".to_string(),
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

fn new_transition(task: &Task, actor: Uuid, client_event_id: Option<&str>) -> TaskTransition {
    TaskTransition {
        id: Uuid::new_v4(),
        tenant_id: task.tenant_id,
        project_id: task.project_id,
        task_id: task.id,
        actor_user_id: actor,
        action: "assign".to_string(),
        from_status: TaskStatus::Available,
        to_status: TaskStatus::Assigned,
        payload: serde_json::json!({}),
        client_event_id: client_event_id.map(str::to_string),
        expected_row_version: 1,
        result_row_version: 2,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn health_check_succeeds_after_migration() {
    let storage = test_storage().await;
    assert!(storage.health_check().await.is_ok());
}

#[tokio::test]
async fn insert_then_get_round_trips_a_task() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let task = new_task(tenant_id, project_id);

    let mut tx = Box::new(storage.begin().await.unwrap());
    let inserted = tx.insert_task(task.clone()).await.unwrap();
    assert_eq!(inserted.id, task.id);

    let fetched = tx.get_task(tenant_id, task.id).await.unwrap();
    tx.commit().await.unwrap();

    let fetched = fetched.expect("task should round-trip");
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.title, task.title);
    assert_eq!(fetched.status, TaskStatus::Available);
    assert_eq!(fetched.row_version, 1);
}

#[tokio::test]
async fn get_task_returns_none_for_missing_row() {
    let storage = test_storage().await;
    let mut tx = Box::new(storage.begin().await.unwrap());
    let result = tx.get_task(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn update_task_enforces_optimistic_row_version() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();

    let mut mutated = task.clone();
    mutated.status = TaskStatus::Assigned;
    mutated.assigned_to = Some(Uuid::new_v4());
    mutated.assigned_at = Some(Utc::now());
    mutated.row_version = 2;

    let updated = tx.update_task(mutated.clone()).await.unwrap();
    assert_eq!(updated.row_version, 2);
    assert_eq!(updated.status, TaskStatus::Assigned);

    // Replaying the same update with a stale expected version must fail.
    let mut stale = updated.clone();
    stale.row_version = 2;
    stale.priority = 5;
    let result = tx.update_task(stale).await;
    tx.rollback().await.unwrap();

    match result {
        Err(CoreError::VersionConflict { .. }) => {}
        other => panic!("expected VersionConflict, got: {other:?}"),
    }
}

#[tokio::test]
async fn wip_unique_index_rejects_a_second_active_assignment() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let assignee = Uuid::new_v4();

    let mut first = new_task(tenant_id, project_id);
    first.status = TaskStatus::Assigned;
    first.assigned_to = Some(assignee);
    first.assigned_at = Some(Utc::now());

    let mut second = new_task(tenant_id, project_id);
    second.status = TaskStatus::Assigned;
    second.assigned_to = Some(assignee);
    second.assigned_at = Some(Utc::now());

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(first).await.unwrap();
    let result = tx.insert_task(second).await;
    tx.rollback().await.unwrap();

    match result {
        Err(CoreError::InvariantViolation(_)) => {}
        other => panic!("expected InvariantViolation, got: {other:?}"),
    }
}

#[tokio::test]
async fn insert_transition_is_idempotent_on_client_event_id() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());
    let actor = Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();

    let transition = new_transition(&task, actor, Some("client-event-1"));
    let first = tx.insert_transition(transition.clone()).await.unwrap();
    match first {
        TransitionInsertOutcome::Inserted(t) => assert_eq!(t.id, transition.id),
        TransitionInsertOutcome::AlreadyExists(_) => panic!("expected a fresh insert"),
    }

    // Same client_event_id, different transition id: the storage layer
    // must hand back the one that already landed rather than erroring.
    let mut replay = new_transition(&task, actor, Some("client-event-1"));
    replay.id = Uuid::new_v4();
    let second = tx.insert_transition(replay).await.unwrap();
    tx.commit().await.unwrap();

    match second {
        TransitionInsertOutcome::AlreadyExists(t) => assert_eq!(t.id, transition.id),
        TransitionInsertOutcome::Inserted(_) => panic!("expected a replay to be deduplicated"),
    }
}

#[tokio::test]
async fn find_transition_by_client_event_returns_none_when_absent() {
    let storage = test_storage().await;
    let task = new_task(Uuid::new_v4(), Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());
    tx.insert_task(task.clone()).await.unwrap();
    let found = tx
        .find_transition_by_client_event(task.id, "never-sent")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn list_tasks_filters_by_status_and_assignee() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let assignee = Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());

    let available = new_task(tenant_id, project_id);
    tx.insert_task(available.clone()).await.unwrap();

    let mut assigned = new_task(tenant_id, project_id);
    assigned.status = TaskStatus::Assigned;
    assigned.assigned_to = Some(assignee);
    assigned.assigned_at = Some(Utc::now());
    tx.insert_task(assigned.clone()).await.unwrap();

    let all = tx
        .list_tasks(TaskFilter::for_tenant(tenant_id))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let only_assigned = tx
        .list_tasks(TaskFilter {
            status: Some(TaskStatus::Assigned),
            ..TaskFilter::for_tenant(tenant_id)
        })
        .await
        .unwrap();
    assert_eq!(only_assigned.len(), 1);
    assert_eq!(only_assigned[0].id, assigned.id);

    let by_assignee = tx
        .list_tasks(TaskFilter {
            assigned_to: Some(assignee),
            ..TaskFilter::for_tenant(tenant_id)
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(by_assignee.len(), 1);
    assert_eq!(by_assignee[0].id, assigned.id);
}

#[tokio::test]
async fn count_active_assignments_counts_wip_statuses_only() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let assignee = Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());

    let mut active = new_task(tenant_id, Uuid::new_v4());
    active.status = TaskStatus::InProgress;
    active.assigned_to = Some(assignee);
    active.assigned_at = Some(Utc::now());
    tx.insert_task(active).await.unwrap();

    let done = new_task(tenant_id, Uuid::new_v4());
    // Done tasks still have an assignee on record, but no longer count as WIP.
    let mut done = done;
    done.status = TaskStatus::Done;
    done.assigned_to = Some(assignee);
    done.assigned_at = Some(Utc::now());
    tx.insert_task(done).await.unwrap();

    let count = tx
        .count_active_assignments(tenant_id, assignee)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count, 1);
}

#[tokio::test]
async fn qc_inspection_round_trips_and_enforces_one_per_deliverable() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();

    let mut tx = Box::new(storage.begin().await.unwrap());

    let deliverable = shopfloor_core::models::Deliverable {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_type: "bracket".to_string(),
        serial: "SN-0001".to_string(),
        status: shopfloor_core::models::DeliverableStatus::SubmittedToQc,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    // update_deliverable doubles as upsert-by-primary-key here: insert the
    // row directly through the pool since there is no separate insert path.
    sqlx::query(
        "INSERT INTO deliverables (id, tenant_id, project_id, deliverable_type, serial, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(deliverable.id.to_string())
    .bind(deliverable.tenant_id.to_string())
    .bind(deliverable.project_id.to_string())
    .bind(&deliverable.deliverable_type)
    .bind(&deliverable.serial)
    .bind("submitted_to_qc")
    .bind(deliverable.created_by.to_string())
    .bind(deliverable.created_at.to_rfc3339())
    .bind(deliverable.updated_at.to_rfc3339())
    .execute(storage.pool())
    .await
    .unwrap();

    let inspection = QcInspection {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id: deliverable.id,
        inspector_user_id: Uuid::new_v4(),
        responsible_user_id: None,
        result: QcResult::Rejected,
        notes: Some("misaligned hole".to_string()),
        created_at: Utc::now(),
    };

    let inserted = tx.insert_inspection(inspection.clone()).await.unwrap();
    assert_eq!(inserted.id, inspection.id);

    let fetched = tx
        .get_inspection(tenant_id, inspection.id)
        .await
        .unwrap()
        .expect("inspection should round-trip");
    assert_eq!(fetched.result, QcResult::Rejected);
    assert_eq!(fetched.notes.as_deref(), Some("misaligned hole"));

    let mut second = inspection.clone();
    second.id = Uuid::new_v4();
    let result = tx.insert_inspection(second).await;
    tx.rollback().await.unwrap();

    match result {
        Err(CoreError::InvariantViolation(_)) => {}
        other => panic!("expected InvariantViolation for duplicate inspection, got: {other:?}"),
    }
}

#[tokio::test]
async fn record_signoff_is_append_only_and_latest_approved_wins() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let deliverable_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO deliverables (id, tenant_id, project_id, deliverable_type, serial, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(deliverable_id.to_string())
    .bind(tenant_id.to_string())
    .bind(project_id.to_string())
    .bind("bracket")
    .bind("SN-0002")
    .bind("open")
    .bind(Uuid::new_v4().to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(storage.pool())
    .await
    .unwrap();

    let mut tx = Box::new(storage.begin().await.unwrap());

    let approver = Uuid::new_v4();
    let rejected = DeliverableSignoff {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id,
        signed_off_by: approver,
        result: SignoffResult::Rejected,
        comment: None,
        created_at: Utc::now(),
    };
    tx.record_signoff(rejected).await.unwrap();

    let approved = DeliverableSignoff {
        id: Uuid::new_v4(),
        tenant_id,
        project_id,
        deliverable_id,
        signed_off_by: approver,
        result: SignoffResult::Approved,
        comment: Some("looks good".to_string()),
        created_at: Utc::now(),
    };
    let inserted_approved = tx.record_signoff(approved.clone()).await.unwrap();

    let latest = tx
        .latest_approved_signoff(tenant_id, deliverable_id)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let latest = latest.expect("an approved sign-off should exist");
    assert_eq!(latest.id, inserted_approved.id);
    assert_eq!(latest.result, SignoffResult::Approved);
}

#[tokio::test]
async fn performance_smoke_for_common_operations() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let task = new_task(tenant_id, Uuid::new_v4());

    let mut tx = Box::new(storage.begin().await.unwrap());

    let start = Instant::now();
    tx.insert_task(task.clone()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100), "insert_task too slow");

    let start = Instant::now();
    tx.get_task(tenant_id, task.id).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100), "get_task too slow");

    let start = Instant::now();
    tx.list_tasks(TaskFilter::for_tenant(tenant_id)).await.unwrap();
    tx.commit().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100), "list_tasks too slow");
}

#[tokio::test]
async fn concurrent_task_inserts_all_succeed_on_distinct_assignees() {
    let storage = std::sync::Arc::new(test_storage().await);
    let tenant_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let storage = storage.clone();
        let task = new_task(tenant_id, Uuid::new_v4());
        handles.push(tokio::spawn(async move {
            let mut tx = Box::new(storage.begin().await.unwrap());
            let result = tx.insert_task(task).await;
            if result.is_ok() {
                tx.commit().await.unwrap();
            } else {
                tx.rollback().await.unwrap();
            }
            result
        }));
    }

    let mut ok_count = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok_count += 1;
        }
    }
    assert_eq!(ok_count, 10);

    let storage_tx = Box::new(storage.begin().await.unwrap());
    let mut storage_tx = storage_tx;
    let all = storage_tx
        .list_tasks(TaskFilter::for_tenant(tenant_id))
        .await
        .unwrap();
    storage_tx.commit().await.unwrap();
    assert_eq!(all.len(), 10);
}
