#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use taskfleet_engine::{Engine, EngineConfig, NoopPackager};
use taskfleet_gateway::GatewayServer;
use taskfleet_reason::ReasoningBackend;
use taskfleet_store::{MemoryStore, TaskStore};
use tower::ServiceExt;

struct StaticBackend;

#[async_trait]
impl ReasoningBackend for StaticBackend {
    async fn complete(
        &self,
        _system_prompt: &str,
        _prompt: &str,
    ) -> taskfleet_core::FleetResult<String> {
        Ok("ok".into())
    }
}

fn app() -> Router {
    let engine = Engine::with_defaults(
        EngineConfig::default(),
        Arc::new(MemoryStore::new()) as Arc<dyn TaskStore>,
        Arc::new(StaticBackend),
        Arc::new(NoopPackager),
    )
    .unwrap();
    GatewayServer::build(engine)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_submit_and_fetch_task() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/tasks",
            json!({ "prompt": "build a page", "submitted_by": "user-3" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    let response = app.oneshot(get(&format!("/tasks/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["task"]["prompt"], "build a page");
    assert_eq!(body["task"]["status"], "pending");
    assert_eq!(body["task"]["submitted_by"], "user-3");
    assert!(body["subtasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_prompt_is_rejected() {
    let response = app()
        .oneshot(post_json("/tasks", json!({ "prompt": "   " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("prompt"));
}

#[tokio::test]
async fn test_unknown_task_is_404() {
    let id = uuid::Uuid::new_v4();
    let response = app().oneshot(get(&format!("/tasks/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app()
        .oneshot(post_json(&format!("/tasks/{id}/cancel"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let app = app();
    let response = app
        .clone()
        .oneshot(post_json("/tasks", json!({ "prompt": "cancel me" })))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(&format!("/tasks/{id}/cancel"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    // A second cancel reports the same terminal state.
    let response = app
        .oneshot(post_json(&format!("/tasks/{id}/cancel"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");
}

#[tokio::test]
async fn test_agent_roster() {
    let response = app().oneshot(get("/agents")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let agents = body.as_array().unwrap();
    assert_eq!(agents.len(), 5);
    assert!(agents.iter().all(|a| a["status"] == "idle"));
}
