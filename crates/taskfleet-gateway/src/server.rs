use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use taskfleet_engine::Engine;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    /// The engine every handler talks to.
    pub engine: Engine,
}

/// The HTTP/WebSocket surface over one engine.
pub struct GatewayServer;

impl GatewayServer {
    /// Router exposing the full API over the given engine.
    pub fn build(engine: Engine) -> Router {
        let state = Arc::new(AppState { engine });
        Router::new()
            .route("/tasks", post(submit_task))
            .route("/tasks/{id}", get(get_task))
            .route("/tasks/{id}/cancel", post(cancel_task))
            .route("/agents", get(list_agents))
            .route("/health", get(health))
            .route("/ws", get(ws_handler))
            .with_state(state)
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// The task prompt; must not be blank.
    pub prompt: String,
    /// Optional submitter identifier.
    pub submitted_by: Option<String>,
}

/// Body of a successful `POST /tasks` response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Id of the accepted task.
    pub id: Uuid,
    /// Its initial status.
    pub status: String,
}

fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "error": message })))
}

fn internal_error(error: taskfleet_core::FleetError) -> (StatusCode, Json<serde_json::Value>) {
    warn!(%error, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    if request.prompt.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "prompt must not be empty").into_response();
    }
    match state
        .engine
        .submit_task(request.prompt, request.submitted_by)
        .await
    {
        Ok(task) => (
            StatusCode::CREATED,
            Json(SubmitResponse {
                id: task.id,
                status: "pending".into(),
            }),
        )
            .into_response(),
        Err(error) => internal_error(error).into_response(),
    }
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.engine.task_snapshot(id).await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "unknown task").into_response(),
        Err(error) => internal_error(error).into_response(),
    }
}

async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.engine.cancel_task(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "unknown task").into_response(),
        Err(error) => internal_error(error).into_response(),
    }
}

async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.agents().await)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "taskfleet" }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

/// Forward every engine event to one WebSocket client until it hangs up.
///
/// A client that falls behind the broadcast buffer just misses the
/// dropped events; the feed is observational, not a ledger.
async fn stream_events(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let mut events = state.engine.subscribe();
    let (mut sender, mut receiver) = socket.split();
    info!(%connection_id, "event feed connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(%connection_id, missed, "event feed lagging");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(%error, "unserializable event");
                        continue;
                    }
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // The feed is one-way; other frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    info!(%connection_id, "event feed disconnected");
}
