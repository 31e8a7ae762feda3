use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};

use crate::chat::{ChatRequest, ChatService};
use crate::state::AppState;

/// GET /ws/{user_id}: upgrade to the chat socket.
pub async fn ws_chat(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(app): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| chat_session(socket, user_id, app.chat))
}

async fn chat_session(socket: WebSocket, user_id: String, chat: Arc<ChatService>) {
    let (mut tx, mut rx) = socket.split();
    let conn = chat.register(&user_id).await;

    let greeting = [chat.welcome(&user_id).await, ChatService::suggestions()];
    let mut open = true;
    for frame in greeting {
        if tx.send(Message::Text(frame.to_string().into())).await.is_err() {
            open = false;
            break;
        }
    }

    while open {
        let Some(msg) = rx.next().await else { break };
        match msg {
            Ok(Message::Text(text)) => {
                let reply = chat.respond_frame(text.as_str(), &user_id).await;
                if tx.send(Message::Text(reply.to_string().into())).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "websocket receive failed");
                break;
            }
        }
    }

    chat.unregister(conn).await;
}

/// POST /api/command: same processing as the socket, for clients without
/// WebSocket support.
pub async fn api_command(
    State(app): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Json<Value> {
    let user = body.user.as_deref().unwrap_or("Anonymous");
    Json(app.chat.respond(&body.message, user).await)
}

/// GET /api/health: chat-side health.
pub async fn api_health(State(app): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "llm_available": app.chat.llm_available(),
        "llm": app.chat.llm_status().await,
        "active_connections": app.chat.active_connections().await,
        "timestamp": Utc::now(),
    }))
}

/// GET /health: liveness plus a database round trip.
pub async fn health(State(app): State<AppState>) -> Json<Value> {
    let store = app.store.clone();
    let database = match tokio::task::spawn_blocking(move || store.health_check()).await {
        Ok(Ok(())) => "ok".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("task join error: {e}"),
    };
    let status = if database == "ok" { "OK" } else { "DEGRADED" };
    Json(json!({ "status": status, "database": database }))
}
