//! End-to-end scenario tests driving `TransitionExecutor` against a real
//! SQLite-backed `Storage`, covering the literal scenarios S1-S6.

use chrono::Utc;
use serde_json::json;
use shopfloor_core::error::CoreError;
use shopfloor_core::models::{
    ActorContext, DeliverableStatus, FixContext, QcResult, SignoffResult, Task, TaskKind,
    TaskStatus, WorkKind,
};
use shopfloor_core::storage::{Storage, Transaction};
use shopfloor_core::TransitionExecutor;
use shopfloor_db::SqliteStorage;
use uuid::Uuid;

async fn test_storage() -> SqliteStorage {
    let storage = SqliteStorage::new(":memory:").await.unwrap();
    storage.migrate().await.unwrap();
    storage
}

fn actor(tenant_id: Uuid, actor_user_id: Uuid) -> ActorContext {
    ActorContext {
        tenant_id,
        actor_user_id,
        role: "worker".to_string(),
    }
}

async fn seed_task(storage: &SqliteStorage, tenant_id: Uuid, project_id: Uuid) -> Task {
    let now = Utc::now();
    let task = Task {
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
    };
    let mut tx = Box::new(storage.begin().await.unwrap());
    let task = tx.insert_task(task).await.unwrap();
    tx.commit().await.unwrap();
    task
}

/// S1 — happy path: available -> assigned -> in_progress -> submitted -> done.
#[tokio::test]
async fn s1_happy_path_walks_the_full_lifecycle() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let u1 = Uuid::new_v4();
    let lead = Uuid::new_v4();

    let task = seed_task(&storage, tenant_id, project_id).await;
    let executor = TransitionExecutor::new(storage);
    let ctx = actor(tenant_id, u1);

    let outcome = executor
        .apply(&ctx, task.id, "self_assign", 1, json!({}), None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Assigned);
    assert_eq!(outcome.task.assigned_to, Some(u1));
    assert_eq!(outcome.task.row_version, 2);

    let outcome = executor
        .apply(&ctx, task.id, "start", 2, json!({}), None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::InProgress);
    assert_eq!(outcome.task.row_version, 3);

    let outcome = executor
        .apply(&ctx, task.id, "submit", 3, json!({}), None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Submitted);
    assert_eq!(outcome.task.row_version, 4);

    let lead_ctx = actor(tenant_id, lead);
    let outcome = executor
        .apply(&lead_ctx, task.id, "review_approve", 4, json!({}), None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Done);
    assert_eq!(outcome.task.row_version, 5);
}

/// S2 — idempotent replay: same client_event_id and payload twice returns
/// an identical result and commits exactly one transition row.
#[tokio::test]
async fn s2_idempotent_replay_returns_identical_result() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let u1 = Uuid::new_v4();
    let task = seed_task(&storage, tenant_id, Uuid::new_v4()).await;
    let executor = TransitionExecutor::new(storage);
    let ctx = actor(tenant_id, u1);
    let payload = json!({ "assign_to": u1.to_string() });

    let first = executor
        .apply(&ctx, task.id, "assign", 1, payload.clone(), Some("evt-1".to_string()))
        .await
        .unwrap();
    assert_eq!(first.task.row_version, 2);

    let second = executor
        .apply(&ctx, task.id, "assign", 1, payload, Some("evt-1".to_string()))
        .await
        .unwrap();
    assert_eq!(second.task.row_version, 2);
    assert_eq!(second.task.id, first.task.id);
    assert_eq!(second.task.assigned_to, first.task.assigned_to);
}

/// S3 — idempotency conflict: same client_event_id, different payload.
#[tokio::test]
async fn s3_idempotency_conflict_on_changed_payload() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    let task = seed_task(&storage, tenant_id, Uuid::new_v4()).await;
    let executor = TransitionExecutor::new(storage);
    let ctx = actor(tenant_id, u1);

    executor
        .apply(
            &ctx,
            task.id,
            "assign",
            1,
            json!({ "assign_to": u1.to_string() }),
            Some("evt-1".to_string()),
        )
        .await
        .unwrap();

    let result = executor
        .apply(
            &ctx,
            task.id,
            "assign",
            1,
            json!({ "assign_to": u2.to_string() }),
            Some("evt-1".to_string()),
        )
        .await;

    match result {
        Err(CoreError::IdempotencyConflict { client_event_id }) => {
            assert_eq!(client_event_id, "evt-1");
        }
        other => panic!("expected IdempotencyConflict, got: {other:?}"),
    }

    let tasks = executor
        .list_tasks(shopfloor_core::models::TaskFilter::for_tenant(tenant_id))
        .await
        .unwrap();
    let current = tasks.into_iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(current.row_version, 2);
    assert_eq!(current.assigned_to, Some(u1));
}

/// S4 — version conflict race: two concurrent assigns with the same
/// expected_row_version, different client_event_id. Exactly one wins.
#[tokio::test]
async fn s4_concurrent_assigns_only_one_wins() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let task = seed_task(&storage, tenant_id, Uuid::new_v4()).await;
    let executor = std::sync::Arc::new(TransitionExecutor::new(storage));

    let mut handles = Vec::new();
    for i in 0..2 {
        let executor = executor.clone();
        let actor_user_id = Uuid::new_v4();
        let ctx = actor(tenant_id, actor_user_id);
        let task_id = task.id;
        handles.push(tokio::spawn(async move {
            executor
                .apply(
                    &ctx,
                    task_id,
                    "assign",
                    1,
                    json!({ "assign_to": actor_user_id.to_string() }),
                    Some(format!("evt-race-{i}")),
                )
                .await
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(CoreError::VersionConflict { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one concurrent assign should win");
    assert_eq!(conflicts, 1, "the loser should see a VersionConflict");
}

/// S5 — QC rejection creates exactly one fix-task and a second decision on
/// the same deliverable is rejected by I12.
#[tokio::test]
async fn s5_qc_rejection_creates_exactly_one_fix_task() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let deliverable_id = Uuid::new_v4();
    let approver = Uuid::new_v4();
    let inspector = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO deliverables (id, tenant_id, project_id, deliverable_type, serial, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(deliverable_id.to_string())
    .bind(tenant_id.to_string())
    .bind(project_id.to_string())
    .bind("bracket")
    .bind("SN-S5")
    .bind("submitted_to_qc")
    .bind(approver.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(storage.pool())
    .await
    .unwrap();

    {
        let mut tx = Box::new(storage.begin().await.unwrap());
        tx.record_signoff(shopfloor_core::models::DeliverableSignoff {
            id: Uuid::new_v4(),
            tenant_id,
            project_id,
            deliverable_id,
            signed_off_by: approver,
            result: SignoffResult::Approved,
            comment: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let executor = TransitionExecutor::new(storage);
    let ctx = actor(tenant_id, inspector);

    let outcome = executor
        .qc_decision(
            &ctx,
            deliverable_id,
            inspector,
            QcResult::Rejected,
            Some("scratch".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.deliverable.status, DeliverableStatus::QcRejected);
    let fix_task = outcome.fix_task.expect("rejection must produce a fix-task");
    assert_eq!(fix_task.work_kind, WorkKind::Fix);
    assert_eq!(fix_task.fix.fix_source, Some(shopfloor_core::models::FixSource::QcReject));
    assert_eq!(fix_task.fix.qc_inspection_id, Some(outcome.inspection.id));
    assert_eq!(fix_task.status, TaskStatus::Available);

    let second = executor
        .qc_decision(&ctx, deliverable_id, inspector, QcResult::Rejected, Some("again".to_string()))
        .await;
    match second {
        Err(CoreError::NotFound(_)) | Err(CoreError::Validation(_)) => {
            // Deliverable is no longer submitted_to_qc after the first decision.
        }
        other => panic!("expected the second decision to be rejected, got: {other:?}"),
    }
}

/// S6 — WIP=1: a second self-assign in the same tenant fails until the
/// first task reaches a terminal status.
#[tokio::test]
async fn s6_wip_one_blocks_a_second_active_assignment() {
    let storage = test_storage().await;
    let tenant_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let u1 = Uuid::new_v4();

    let t1 = seed_task(&storage, tenant_id, project_id).await;
    let t2 = seed_task(&storage, tenant_id, project_id).await;
    let executor = TransitionExecutor::new(storage);
    let ctx = actor(tenant_id, u1);

    executor
        .apply(&ctx, t1.id, "self_assign", 1, json!({}), None)
        .await
        .unwrap();

    let result = executor
        .apply(&ctx, t2.id, "self_assign", 1, json!({}), None)
        .await;
    match result {
        Err(CoreError::InvariantViolation(_)) => {}
        other => panic!("expected InvariantViolation (WIP=1), got: {other:?}"),
    }

    // Walk t1 to done, then the second self-assign should succeed.
    executor.apply(&ctx, t1.id, "start", 2, json!({}), None).await.unwrap();
    executor.apply(&ctx, t1.id, "submit", 3, json!({}), None).await.unwrap();
    executor
        .apply(&ctx, t1.id, "review_approve", 4, json!({}), None)
        .await
        .unwrap();

    let outcome = executor
        .apply(&ctx, t2.id, "self_assign", 1, json!({}), None)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Assigned);
}
