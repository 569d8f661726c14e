//! REST endpoints for task submission, inspection, cancellation, and
//! history.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actions::registry::ActionRegistry;
use crate::error::{RegistryError, SchedulerError};
use crate::scheduler::{Scheduler, TaskPriority, TaskStatus};
use crate::store::traits::HistoryStore;

use super::ws::ws_handler;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<ActionRegistry>,
    /// History backend for the read endpoint (None when persistence is disabled).
    pub history: Option<Arc<dyn HistoryStore>>,
}

/// Build the Axum router with task REST and WebSocket routes.
pub fn task_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/tasks", get(ws_handler))
        .route("/api/actions", get(list_actions))
        .route("/api/services", get(list_services))
        .route("/api/tasks", post(submit_task).get(list_tasks))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/cancel", post(cancel_task))
        .route("/api/history", get(list_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "autotask"
    }))
}

// ── Actions ─────────────────────────────────────────────────────────────

async fn list_actions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

async fn list_services(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.services().await)
}

// ── Tasks ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubmitRequest {
    action: String,
    #[serde(default)]
    context: Value,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    priority: TaskPriority,
}

/// POST /api/tasks
///
/// Resolves the action, runs the advisory duplicate check, and enqueues.
/// A detected duplicate returns 409 with the existing task instead of
/// queueing a second copy.
async fn submit_task(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> impl IntoResponse {
    let (definition, handler) = match state.registry.resolve(&body.action, &body.context).await {
        Ok(resolved) => resolved,
        Err(e @ RegistryError::ActionNotFound { .. }) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    if let Some(existing) = state
        .scheduler
        .find_duplicate(&definition, &handler, &body.context, &body.params)
        .await
    {
        warn!(
            action = %body.action,
            existing = %existing.id,
            "Duplicate submission rejected"
        );
        let conflict = SchedulerError::AlreadyInProgress {
            id: existing.id,
            status: existing.status,
        };
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": conflict.to_string(),
                "task": existing,
            })),
        )
            .into_response();
    }

    let record = state
        .scheduler
        .submit(
            definition,
            handler,
            body.context,
            body.params,
            body.priority,
            None,
        )
        .await;
    (StatusCode::CREATED, Json(serde_json::json!(record))).into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    service: Option<String>,
    status: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref().map(str::parse::<TaskStatus>) {
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e})),
            )
                .into_response();
        }
        None => None,
    };
    let tasks = state.scheduler.list(query.service.as_deref(), status).await;
    Json(tasks).into_response()
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let task_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid task ID"})),
            )
                .into_response();
        }
    };

    match state.scheduler.get(task_id).await {
        Some(record) => Json(record).into_response(),
        None => {
            let err = SchedulerError::TaskNotFound { id: task_id };
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

async fn cancel_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let task_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid task ID"})),
            )
                .into_response();
        }
    };

    match state.scheduler.cancel(task_id).await {
        Ok(()) => {
            info!(task_id = %task_id, "Cancellation requested via REST");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "cancel_requested"})),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

// ── History ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    service: Option<String>,
    status: Option<String>,
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    50
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let Some(history) = &state.history else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "History persistence is disabled"})),
        )
            .into_response();
    };

    match history
        .list_history(
            query.service.as_deref(),
            query.status.as_deref(),
            query.limit,
        )
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            warn!(error = %e, "History query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "History query failed"})),
            )
                .into_response()
        }
    }
}
