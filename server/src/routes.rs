//! Axum route handlers for the §6 service boundary: `apply_transition`,
//! `create_task`, `qc_decision`, `create_fix_task`, plus a `list_tasks`
//! read route and a health check.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use shopfloor_core::executor::{CreateFixTaskSpec, TransitionExecutor};
use shopfloor_core::models::TaskId;
use shopfloor_db::SqliteStorage;

use crate::actor::Actor;
use crate::dto::{
    ApplyTransitionRequest, CreateFixTaskRequest, CreateTaskRequest, ListTasksQuery,
    QcDecisionRequest, QcDecisionResponse, TaskDto, TransitionResponse,
};
use crate::error::ApiError;
use crate::permission::PermissionOracle;

/// §6: "QC-family actions are not accepted as task transitions"; a client
/// must use the dedicated `qc_decision` route for them.
const QC_FAMILY_ACTIONS: &[&str] = &["qc_decision", "qc_approve", "qc_reject"];

pub struct AppState {
    pub executor: TransitionExecutor<SqliteStorage>,
    pub permissions: Arc<dyn PermissionOracle>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:task_id/transitions", post(apply_transition))
        .route("/deliverables/:deliverable_id/qc-decision", post(qc_decision))
        .route("/fix-tasks", post(create_fix_task))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Actor(actor_ctx): Actor,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskDto>>, ApiError> {
    let filter = query.into_filter(actor_ctx.tenant_id);
    let tasks = state.executor.list_tasks(filter).await?;
    Ok(Json(tasks.into_iter().map(TaskDto::from).collect()))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Actor(actor_ctx): Actor,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    require_permission(&state, "task.create", &actor_ctx.role)?;
    let new_task = request.into_new_task(actor_ctx.tenant_id, actor_ctx.actor_user_id);
    let task = state.executor.create_task(new_task).await?;
    Ok(Json(task.into()))
}

async fn apply_transition(
    State(state): State<Arc<AppState>>,
    Actor(actor_ctx): Actor,
    Path(task_id): Path<TaskId>,
    Json(request): Json<ApplyTransitionRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    if QC_FAMILY_ACTIONS.contains(&request.action.as_str()) {
        return Err(ApiError::validation(format!(
            "action '{}' is a QC-family action; use the qc-decision route instead",
            request.action
        )));
    }

    require_permission(&state, &format!("task.{}", request.action), &actor_ctx.role)?;

    let outcome = state
        .executor
        .apply(
            &actor_ctx,
            task_id,
            &request.action,
            request.expected_row_version,
            request.payload,
            request.client_event_id,
        )
        .await?;

    Ok(Json(TransitionResponse {
        task: outcome.task.into(),
        fix_task: outcome.fix_task.map(TaskDto::from),
    }))
}

async fn qc_decision(
    State(state): State<Arc<AppState>>,
    Actor(actor_ctx): Actor,
    Path(deliverable_id): Path<shopfloor_core::models::DeliverableId>,
    Json(request): Json<QcDecisionRequest>,
) -> Result<Json<QcDecisionResponse>, ApiError> {
    require_permission(&state, "deliverable.qc_decision", &actor_ctx.role)?;

    let outcome = state
        .executor
        .qc_decision(
            &actor_ctx,
            deliverable_id,
            request.inspector_user_id,
            request.result,
            request.notes,
        )
        .await?;

    Ok(Json(QcDecisionResponse {
        deliverable_id: outcome.deliverable.id,
        deliverable_status: deliverable_status_str(outcome.deliverable.status),
        inspection_id: outcome.inspection.id,
        fix_task: outcome.fix_task.map(TaskDto::from),
    }))
}

fn deliverable_status_str(status: shopfloor_core::models::DeliverableStatus) -> String {
    use shopfloor_core::models::DeliverableStatus::*;
    match status {
        Open => "open",
        SubmittedToQc => "submitted_to_qc",
        QcRejected => "qc_rejected",
        QcApproved => "qc_approved",
        Canceled => "canceled",
    }
    .to_string()
}

async fn create_fix_task(
    State(state): State<Arc<AppState>>,
    Actor(actor_ctx): Actor,
    Json(request): Json<CreateFixTaskRequest>,
) -> Result<Json<TaskDto>, ApiError> {
    let permission = format!("fix.{}", request.source.as_str());
    require_permission(&state, &permission, &actor_ctx.role)?;

    let spec = CreateFixTaskSpec {
        project_id: request.project_id,
        origin_task_id: request.origin_task_id,
        deliverable_id: request.deliverable_id,
        title: request.title,
        description: request.description,
        source: request.source,
        severity: request.severity,
        minutes_spent: request.minutes_spent,
    };
    let task = state.executor.create_fix_task(&actor_ctx, spec).await?;
    Ok(Json(task.into()))
}

fn require_permission(state: &AppState, permission: &str, role: &str) -> Result<(), ApiError> {
    if state.permissions.is_allowed(permission, role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "role '{role}' is not allowed for '{permission}'"
        )))
    }
}
