// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API surface.
//!
//! Thin request routing over the store and the execution queue. Creating or
//! executing anything here only enqueues work; the queue processor performs
//! all execution asynchronously. Non-2xx responses carry the stable envelope
//! `{"error": "<message>"}` with 400 for missing/invalid input, 404 for
//! absent entities, and 500 otherwise.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::application::registry::IntegrationRegistry;
use crate::domain::context::ExecutionContext;
use crate::domain::execution::Execution;
use crate::domain::repository::{ExecutionRepository, RepositoryError, WorkflowRepository};
use crate::domain::workflow::{Edge, Node, Workflow, WorkflowError, WorkflowId};

pub struct AppState {
    pub workflow_repo: Arc<dyn WorkflowRepository>,
    pub execution_repo: Arc<dyn ExecutionRepository>,
    pub registry: Arc<IntegrationRegistry>,
}

pub fn app(
    workflow_repo: Arc<dyn WorkflowRepository>,
    execution_repo: Arc<dyn ExecutionRepository>,
    registry: Arc<IntegrationRegistry>,
) -> Router {
    let state = Arc::new(AppState {
        workflow_repo,
        execution_repo,
        registry,
    });

    Router::new()
        .route("/health", get(health))
        .route("/integrations", get(list_integrations))
        .route("/workflows", get(list_workflows).post(create_workflow).delete(delete_workflow))
        .route("/workflows/{id}", put(update_workflow))
        .route("/workflows/{id}/execute", post(execute_workflow))
        .route("/workflows/{id}/executions/latest", get(latest_for_workflow))
        .route("/executions", get(query_executions).post(create_execution))
        .route("/executions/{id}/status", get(execution_status))
        .with_state(state)
}

// ============================================================================
// Error Envelope
// ============================================================================

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(m) => ApiError::NotFound(m),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

// ============================================================================
// Workflow Endpoints
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_integrations(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "integrations": state.registry.all(),
        "stats": state.registry.stats(),
    }))
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    Ok(Json(state.workflow_repo.list_all().await?))
}

fn parse_graph(payload: &Value) -> Result<(String, Vec<Node>, Vec<Edge>), ApiError> {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?
        .to_string();

    let nodes: Vec<Node> = match payload.get("nodes") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("invalid nodes: {e}")))?,
        None => Vec::new(),
    };
    let edges: Vec<Edge> = match payload.get("edges") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ApiError::BadRequest(format!("invalid edges: {e}")))?,
        None => Vec::new(),
    };

    Ok((name, nodes, edges))
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Workflow>, ApiError> {
    let (name, nodes, edges) = parse_graph(&payload)?;
    let workflow = Workflow::new(name, nodes, edges)?;
    state.workflow_repo.save(&workflow).await?;
    Ok(Json(workflow))
}

async fn update_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> Result<Json<Workflow>, ApiError> {
    let id = WorkflowId::from_uuid(id);
    let mut workflow = state
        .workflow_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {id}")))?;

    let (name, nodes, edges) = parse_graph(&payload)?;
    workflow.update(name, nodes, edges)?;
    state.workflow_repo.save(&workflow).await?;
    Ok(Json(workflow))
}

#[derive(Deserialize)]
struct DeleteParams {
    id: Option<String>,
}

async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, ApiError> {
    let id = params
        .id
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest("id is not a valid workflow id".to_string()))?;
    state.workflow_repo.delete(WorkflowId::from_uuid(id)).await?;
    Ok(Json(json!({ "success": true })))
}

// ============================================================================
// Execution Endpoints
// ============================================================================

/// Execution summary in the wire shape clients poll.
#[derive(Serialize)]
struct ExecutionSummary {
    id: Uuid,
    workflow_id: Uuid,
    status: String,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Execution> for ExecutionSummary {
    fn from(execution: &Execution) -> Self {
        Self {
            id: execution.id.0,
            workflow_id: execution.workflow_id.0,
            status: execution.status.as_str().to_string(),
            started_at: execution.started_at,
            completed_at: execution.completed_at,
            error_message: execution.error_message.clone(),
            created_at: execution.created_at,
        }
    }
}

async fn create_execution(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let workflow_id = payload
        .get("workflowId")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("workflowId is required".to_string()))?;
    let workflow_id = Uuid::parse_str(workflow_id)
        .map_err(|_| ApiError::BadRequest("workflowId is not a valid id".to_string()))?;

    let execution = enqueue(&state, WorkflowId::from_uuid(workflow_id)).await?;
    Ok(Json(json!({
        "executionId": execution.id.0,
        "status": "queued",
    })))
}

async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let execution = enqueue(&state, WorkflowId::from_uuid(id)).await?;
    Ok(Json(json!({ "executionId": execution.id.0 })))
}

async fn enqueue(state: &AppState, workflow_id: WorkflowId) -> Result<Execution, ApiError> {
    // Surface a clean 404 before the store's foreign key would.
    state
        .workflow_repo
        .find_by_id(workflow_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {workflow_id}")))?;
    Ok(state.execution_repo.create(workflow_id).await?)
}

#[derive(Deserialize)]
struct ExecutionQuery {
    #[serde(rename = "executionId")]
    execution_id: Option<String>,
    #[serde(rename = "workflowId")]
    workflow_id: Option<String>,
    #[serde(default)]
    latest: Option<bool>,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("{what} is not a valid id")))
}

async fn query_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(raw) = query.execution_id {
        let id = crate::domain::execution::ExecutionId(parse_uuid(&raw, "executionId")?);
        let with_steps = state
            .execution_repo
            .find_with_steps(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Execution {id}")))?;

        let mut body = serde_json::to_value(ExecutionSummary::from(&with_steps.execution))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        body["steps"] = serde_json::to_value(&with_steps.steps)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        return Ok(Json(body));
    }

    if let Some(raw) = query.workflow_id {
        let workflow_id = parse_uuid(&raw, "workflowId")?;
        if query.latest.unwrap_or(false) {
            let latest = state
                .execution_repo
                .latest_for_workflow(WorkflowId::from_uuid(workflow_id))
                .await?;
            return Ok(Json(match latest {
                Some(execution) => serde_json::to_value(ExecutionSummary::from(&execution))
                    .map_err(|e| ApiError::Internal(e.to_string()))?,
                None => Value::Null,
            }));
        }
        return Err(ApiError::BadRequest(
            "latest=true is required when querying by workflowId".to_string(),
        ));
    }

    Err(ApiError::BadRequest(
        "executionId or workflowId is required".to_string(),
    ))
}

async fn latest_for_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let latest = state
        .execution_repo
        .latest_for_workflow(WorkflowId::from_uuid(id))
        .await?;
    Ok(Json(match latest {
        Some(execution) => serde_json::to_value(ExecutionSummary::from(&execution))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        None => Value::Null,
    }))
}

async fn execution_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let id = crate::domain::execution::ExecutionId(id);
    let with_steps = state
        .execution_repo
        .find_with_steps(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Execution {id}")))?;

    // Client-side context view, rebuilt from the audit trail. The engine
    // itself never consumes this.
    let context = ExecutionContext::restore_from_steps(id, &with_steps.steps);

    let mut body = serde_json::to_value(ExecutionSummary::from(&with_steps.execution))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    body["steps"] = serde_json::to_value(&with_steps.steps)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    body["context"] = json!({
        "variables": context.variables,
        "nodeOutputs": context.node_outputs,
    });
    Ok(Json(body))
}
