//! REST API server for the coach chat backend
//!
//! Exposes the chat engine via HTTP endpoints.
//! Guardrail rejections surface as 400 with the rejection reason;
//! infrastructure failures surface as 500 without internal detail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::{ChatEngine, ChatOutcome};
use crate::metadata::ProductMetadata;
use crate::models::Exchange;
use crate::store::ConversationStore;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<Exchange>,
    pub user_text: String,
    #[serde(rename = "convoId")]
    pub convo_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub bot_reply: String,
    #[serde(rename = "convoId")]
    pub convo_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<ChatEngine>,
    pub metadata: Arc<ProductMetadata>,
    pub store: Arc<dyn ConversationStore>,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// =============================
/// Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn read_metadata(State(state): State<ApiState>) -> Json<ProductMetadata> {
    Json((*state.metadata).clone())
}

async fn chat(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> Response {
    let user_id = req.user_id.unwrap_or_else(|| "demo-user".to_string());
    info!(user_id = %user_id, "Received chat message");

    let outcome = state
        .engine
        .handle_message(&user_id, req.convo_id, &req.history, &req.user_text)
        .await;

    match outcome {
        Ok(ChatOutcome::Reply { text, convo_id }) => (
            StatusCode::OK,
            Json(ChatResponse {
                bot_reply: text,
                convo_id,
            }),
        )
            .into_response(),
        Ok(ChatOutcome::Rejected { reason, .. }) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            error!("Chat turn failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.",
            )
        }
    }
}

async fn list_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.store.list_conversations(&query.user_id).await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(e) => {
            error!("Failed to list conversations: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.",
            )
        }
    }
}

async fn fetch_history(
    State(state): State<ApiState>,
    Path(convo_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.store.owner_of(&convo_id).await {
        Ok(Some(owner)) if owner == query.user_id => {}
        Ok(_) => return error_response(StatusCode::FORBIDDEN, "Access forbidden"),
        Err(e) => {
            error!("Failed to fetch conversation owner: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.",
            );
        }
    }

    match state.store.list_messages(&convo_id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            error!("Failed to list messages: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred.",
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(
    engine: Arc<ChatEngine>,
    metadata: Arc<ProductMetadata>,
    store: Arc<dyn ConversationStore>,
) -> Router {
    let state = ApiState {
        engine,
        metadata,
        store,
    };

    Router::new()
        .route("/health", get(health))
        .route("/metadata", get(read_metadata))
        .route("/api/chat", post(chat))
        .route("/api/history", get(list_history))
        .route("/api/history/:convo_id", get(fetch_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: Arc<ChatEngine>,
    metadata: Arc<ProductMetadata>,
    store: Arc<dyn ConversationStore>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine, metadata, store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
