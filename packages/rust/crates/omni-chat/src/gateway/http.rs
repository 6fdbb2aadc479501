//! HTTP gateway: POST /chat → conversation turn → JSON response.
//!
//! Request validation (400 for empty message), 500 on generation failure, 504 when the
//! generation call exceeds its timeout. Session listing and clearing are exposed for operators.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::conversation::ConversationService;
use crate::error::ConversationError;
use crate::session::SessionSummary;

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User message to send to the model.
    pub message: String,
    /// Conversation session identifier; a new one is minted when absent or blank.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response body for POST /chat.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Assistant reply.
    pub response: String,
    /// Session identifier the turn was recorded under.
    pub session_id: String,
}

/// Response body for DELETE /session/{session_id}.
#[derive(Debug, Serialize)]
pub struct ClearSessionResponse {
    pub message: String,
    pub cleared: bool,
}

/// Response body for GET /sessions.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Response body for gateway health endpoint.
#[derive(Debug, Serialize)]
pub struct GatewayHealthResponse {
    pub status: &'static str,
    pub message: String,
    pub turn_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_turns: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight_turns: Option<usize>,
}

/// Shared state for the HTTP server: conversation service + optional concurrency limit.
#[derive(Clone)]
pub struct GatewayState {
    pub service: ConversationService,
    /// When Some, limits concurrent chat turns; excess requests wait for a slot.
    pub concurrency_semaphore: Option<Arc<Semaphore>>,
    pub max_concurrent_turns: Option<usize>,
}

/// Validate request body; mints a session id when none was supplied. The message is passed on
/// as sent.
pub fn validate_chat_request(
    body: &ChatRequest,
) -> Result<(String, String), (StatusCode, String)> {
    if body.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message must be non-empty".to_string(),
        ));
    }
    let session_id = body
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);
    Ok((session_id, body.message.clone()))
}

/// HTTP status for a failed turn.
#[must_use]
pub fn conversation_error_status(error: &ConversationError) -> StatusCode {
    match error {
        ConversationError::Validation(_) => StatusCode::BAD_REQUEST,
        ConversationError::GenerationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ConversationError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

async fn handle_chat(
    State(state): State<GatewayState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let (session_id, message) = validate_chat_request(&body)?;
    let _permit = if let Some(ref sem) = state.concurrency_semaphore {
        Some(sem.acquire().await.map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "concurrency limit closed".to_string(),
            )
        })?)
    } else {
        None
    };
    let response = state
        .service
        .handle_message(&session_id, &message)
        .await
        .map_err(|error| (conversation_error_status(&error), error.to_string()))?;
    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

async fn handle_clear_session(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
) -> Json<ClearSessionResponse> {
    let cleared = state.service.clear_session(&session_id);
    Json(ClearSessionResponse {
        message: format!("Session {session_id} cleared"),
        cleared,
    })
}

async fn handle_list_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.service.list_sessions(),
    })
}

async fn handle_health(State(state): State<GatewayState>) -> Json<GatewayHealthResponse> {
    let in_flight_turns = state.max_concurrent_turns.and_then(|max| {
        state
            .concurrency_semaphore
            .as_ref()
            .map(|sem| max.saturating_sub(sem.available_permits()))
    });
    Json(GatewayHealthResponse {
        status: "healthy",
        message: "chat gateway is running".to_string(),
        turn_timeout_secs: state.service.generation_timeout().as_secs(),
        max_concurrent_turns: state.max_concurrent_turns,
        in_flight_turns,
    })
}

/// Build the gateway router.
pub fn router(service: ConversationService, max_concurrent_turns: Option<usize>) -> Router {
    let concurrency_semaphore = max_concurrent_turns.map(|n| Arc::new(Semaphore::new(n)));
    let state = GatewayState {
        service,
        concurrency_semaphore,
        max_concurrent_turns,
    };
    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/sessions", get(handle_list_sessions))
        .route("/session/{session_id}", delete(handle_clear_session))
        .with_state(state)
}

/// Run the HTTP server; binds to `bind_addr` (e.g. `0.0.0.0:8000`).
/// Shuts down gracefully on Ctrl+C (SIGINT) or SIGTERM (Unix); in-flight turns finish first.
pub async fn run_http(
    service: ConversationService,
    bind_addr: &str,
    max_concurrent_turns: Option<usize>,
) -> Result<()> {
    let turn_timeout_secs = service.generation_timeout().as_secs();
    let app = router(service, max_concurrent_turns);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind chat gateway on {bind_addr}"))?;
    tracing::info!(
        bind_addr,
        turn_timeout_secs,
        max_concurrent_turns = ?max_concurrent_turns,
        "chat gateway listening (Ctrl+C/SIGTERM to stop)"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!(bind_addr, "chat gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let ctrl_c = tokio::signal::ctrl_c();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to listen for SIGTERM; Ctrl+C only");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %error, "failed to listen for Ctrl+C");
        }
    }
}
