// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP surface tests: routing, required-key validation, the stable error
//! envelope, and the enqueue-only contract.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use relay_core::domain::execution::ExecutionStatus;
use relay_core::domain::repository::ExecutionRepository;
use relay_core::infrastructure::integrations::builtin_registry;
use relay_core::infrastructure::repositories::InMemoryStore;
use relay_core::presentation::api;

fn test_app() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let app = api::app(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(builtin_registry()),
    );
    (app, store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn simple_workflow_payload(name: &str) -> Value {
    json!({
        "name": name,
        "nodes": [
            {"id": "M", "type": "trigger", "subtype": "manual_trigger", "config": {}},
        ],
        "edges": [],
    })
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn integrations_catalog_is_exposed() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/integrations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total"], json!(9));
    let ids: Vec<&str> = body["integrations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"branch_condition"));
}

#[tokio::test]
async fn workflow_crud_round_trip() {
    let (app, _) = test_app();

    let (status, created) =
        send(&app, "POST", "/workflows", Some(simple_workflow_payload("hello"))).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&app, "GET", "/workflows", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let update = json!({
        "name": "hello-renamed",
        "nodes": created["nodes"],
        "edges": [],
    });
    let (status, updated) = send(&app, "PUT", &format!("/workflows/{id}"), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], json!("hello-renamed"));

    let (status, _) = send(&app, "DELETE", &format!("/workflows?id={id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", &format!("/workflows?id={id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_required_keys_are_rejected() {
    let (app, _) = test_app();

    let (status, body) = send(&app, "POST", "/workflows", Some(json!({"nodes": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let (status, body) = send(&app, "POST", "/executions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("workflowId"));

    let (status, body) = send(&app, "DELETE", "/workflows", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("id"));
}

#[tokio::test]
async fn invalid_graph_is_a_bad_request() {
    let (app, _) = test_app();
    let payload = json!({
        "name": "broken",
        "nodes": [
            {"id": "A", "type": "action", "subtype": "set_variable", "config": {}},
        ],
        "edges": [
            {"id": "e1", "source": "A", "target": "ghost"},
        ],
    });
    let (status, body) = send(&app, "POST", "/workflows", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn unknown_entities_return_404_envelopes() {
    let (app, _) = test_app();
    let ghost = uuid::Uuid::new_v4();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/workflows/{ghost}"),
        Some(simple_workflow_payload("x")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "POST", &format!("/workflows/{ghost}/execute"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/executions?executionId={ghost}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_execution_enqueues_without_running() {
    let (app, store) = test_app();

    let (_, created) = send(&app, "POST", "/workflows", Some(simple_workflow_payload("queued"))).await;
    let workflow_id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/executions",
        Some(json!({"workflowId": workflow_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("queued"));
    let execution_id = body["executionId"].as_str().unwrap();

    // No queue processor is running here, so the execution must still be
    // pending: the API never executes synchronously.
    let execution = ExecutionRepository::find_by_id(
        &store,
        relay_core::domain::execution::ExecutionId(execution_id.parse().unwrap()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Pending);

    // Both latest-execution reads agree.
    let (status, latest) = send(
        &app,
        "GET",
        &format!("/executions?workflowId={workflow_id}&latest=true"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], json!(execution_id));

    let (status, latest) = send(
        &app,
        "GET",
        &format!("/workflows/{workflow_id}/executions/latest"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], json!(execution_id));
}

#[tokio::test]
async fn latest_is_null_when_no_executions_exist() {
    let (app, _) = test_app();
    let (_, created) = send(&app, "POST", "/workflows", Some(simple_workflow_payload("fresh"))).await;
    let workflow_id = created["id"].as_str().unwrap();

    let (status, latest) = send(
        &app,
        "GET",
        &format!("/workflows/{workflow_id}/executions/latest"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(latest.is_null());
}

#[tokio::test]
async fn execution_status_includes_steps_and_context() {
    let (app, store) = test_app();

    let (_, created) = send(&app, "POST", "/workflows", Some(simple_workflow_payload("status"))).await;
    let workflow_id = created["id"].as_str().unwrap();

    let (_, enqueued) = send(&app, "POST", &format!("/workflows/{workflow_id}/execute"), None).await;
    let execution_id = enqueued["executionId"].as_str().unwrap().to_string();

    // Run it through the real engine so steps exist.
    let engine = relay_core::application::engine::ExecutionEngine::new(
        Arc::new(store.clone()),
        Arc::new(builtin_registry()),
    );
    let claimed = store.claim_next_pending().await.unwrap().unwrap();
    engine.execute(claimed).await.unwrap();

    let (status, body) = send(&app, "GET", &format!("/executions/{execution_id}/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["steps"].as_array().unwrap().len(), 1);
    assert_eq!(body["steps"][0]["node_id"], json!("M"));
    assert!(body["context"]["nodeOutputs"]["M"]["data"]["triggered"].as_bool().unwrap());

    // The query-param form returns the same execution with steps.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/executions?executionId={execution_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(execution_id));
    assert_eq!(body["steps"].as_array().unwrap().len(), 1);
}
