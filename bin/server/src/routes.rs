//! HTTP routes for conversations and messages.

use crate::error::ApiError;
use crate::state::{AppState, SERVICE_NAME};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rubber_soul_conversation::{Conversation, SessionPatch, SessionSettings};
use rubber_soul_core::ConversationId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/conversations/create", post(create_conversation))
        .route("/api/messages/send", post(send_message))
        .route("/api/conversations/{id}", get(get_conversation))
        .route(
            "/api/conversations/{id}/session",
            get(get_session).put(update_session),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation_id: ConversationId,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub content: String,
    #[serde(default = "default_ai_mode")]
    pub ai_mode: String,
}

fn default_ai_mode() -> String {
    "claude".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub assistant_message: String,
    /// Echoed exactly as the client sent it.
    pub conversation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateSessionResponse {
    pub success: bool,
    pub session: SessionSettings,
    pub ignored_keys: Vec<String>,
}

/// Ids are the only way to reach a conversation, so a malformed id is
/// reported the same way as an unknown one.
fn parse_id(raw: &str) -> Result<ConversationId, ApiError> {
    raw.parse().map_err(|e| {
        tracing::debug!(error = %e, conversation_id = %raw, "Malformed conversation id");
        ApiError::ConversationNotFound { id: raw.to_string() }
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

async fn create_conversation(State(state): State<Arc<AppState>>) -> Json<CreateConversationResponse> {
    let conversation_id = state.store().create().await;
    let live = state.store().count().await;
    tracing::info!(conversation_id = %conversation_id, live, "Created conversation");

    Json(CreateConversationResponse {
        conversation_id,
        success: true,
    })
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let id = parse_id(&request.conversation_id)?;
    tracing::debug!(conversation_id = %id, ai_mode = %request.ai_mode, "Sending message");

    let reply = state.relay.send(id, request.content).await?;

    Ok(Json(SendMessageResponse {
        success: true,
        assistant_message: reply.assistant_message,
        conversation_id: request.conversation_id,
    }))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store().get(id).await?))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSettings>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store().session(id).await?))
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<UpdateSessionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let ignored_keys = patch.ignored_keys();
    if !ignored_keys.is_empty() {
        tracing::warn!(
            conversation_id = %id,
            keys = %ignored_keys.join(", "),
            "Ignoring unknown session keys"
        );
    }

    let session = state.store().update_session(id, &patch).await?;

    Ok(Json(UpdateSessionResponse {
        success: true,
        session,
        ignored_keys,
    }))
}
