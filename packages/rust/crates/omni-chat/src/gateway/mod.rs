//! Gateway namespace: HTTP and stdio entrypoints.

mod http;
mod stdio;

pub use http::{
    ChatRequest, ChatResponse, ClearSessionResponse, GatewayHealthResponse, GatewayState,
    SessionListResponse, conversation_error_status, router, run_http, validate_chat_request,
};
pub use stdio::{DEFAULT_STDIO_SESSION_ID, run_stdio, serve_lines};
