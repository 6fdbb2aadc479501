//! Chat gateway: per-session conversation history + OpenAI-compatible reply generation.
//!
//! - **Session store**: session_id → ordered turns, per-session serialization, idle eviction.
//! - **Conversation service**: record user turn → generate (outside any lock, bounded by a
//!   timeout) → record assistant turn.
//! - **Gateway**: HTTP (`/chat`, `/sessions`, `/session/{id}`, `/health`) and stdio.

#![allow(missing_docs)]

mod config;
mod conversation;
mod error;
mod gateway;
mod instructions;
mod llm;
mod observability;
mod session;

pub use config::{
    ChatConfig, DEFAULT_BIND_ADDR, DEFAULT_INSTRUCTIONS_PATH, DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
    DEFAULT_SESSION_SWEEP_INTERVAL_SECS, DEFAULT_TURN_TIMEOUT_SECS, GatewaySettings, LlmSettings,
    RuntimeSettings, SessionSettings, load_runtime_settings, load_runtime_settings_from_paths,
    runtime_settings_paths, set_config_home_override,
};
pub use conversation::{ConversationService, DEFAULT_GENERATION_TIMEOUT};
pub use error::{ConversationError, GenerationError, ValidationError};
pub use gateway::{
    ChatRequest, ChatResponse, ClearSessionResponse, DEFAULT_STDIO_SESSION_ID,
    GatewayHealthResponse, GatewayState, SessionListResponse, conversation_error_status, router,
    run_http, run_stdio, serve_lines, validate_chat_request,
};
pub use instructions::{DEFAULT_INSTRUCTIONS, load_instructions};
pub use llm::{
    ChatMessage, DEFAULT_INFERENCE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    LlmClient, ReplyGenerator, build_chat_messages,
};
pub use observability::SessionEvent;
pub use session::{
    IdleSweeper, PendingUserTurn, Session, SessionStore, SessionSummary, Turn, TurnRole,
    spawn_idle_sweeper,
};
