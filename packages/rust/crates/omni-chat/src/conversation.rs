//! One request/response turn: record the user turn, generate outside any store lock, record the
//! reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ConversationError, GenerationError, ValidationError};
use crate::llm::ReplyGenerator;
use crate::observability::SessionEvent;
use crate::session::{SessionStore, SessionSummary, Turn, TurnRole};

/// Default bound on a single generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Orchestrates conversation turns over a shared [`SessionStore`].
#[derive(Clone)]
pub struct ConversationService {
    store: SessionStore,
    generator: Arc<dyn ReplyGenerator>,
    instructions: Arc<str>,
    generation_timeout: Duration,
}

impl ConversationService {
    pub fn new(
        store: SessionStore,
        generator: Arc<dyn ReplyGenerator>,
        instructions: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            generator,
            instructions: instructions.into(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_generation_timeout(mut self, generation_timeout: Duration) -> Self {
        self.generation_timeout = generation_timeout;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    /// Run one turn for `session_id` and return the assistant reply.
    ///
    /// `user_text` is recorded as sent; it only has to contain something besides whitespace.
    /// On generation failure or timeout the user turn stays in history; retrying the same text
    /// reuses it instead of appending a duplicate.
    pub async fn handle_message(
        &self,
        session_id: &str,
        user_text: &str,
    ) -> Result<String, ConversationError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId.into());
        }
        if user_text.trim().is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        let pending = self.store.record_user_turn(session_id, user_text)?;
        let history = &pending.session.history;
        let started = Instant::now();
        let generated = tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(history, &self.instructions),
        )
        .await;

        let reply = match generated {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(result) => {
                let error = result.err().unwrap_or(GenerationError::EmptyReply);
                tracing::warn!(
                    event = SessionEvent::ConversationGenerationFailed.as_str(),
                    session_id,
                    history_turns = history.len(),
                    error = %error,
                    "reply generation failed; user turn kept for retry"
                );
                return Err(error.into());
            }
            Err(_) => {
                tracing::warn!(
                    event = SessionEvent::ConversationGenerationTimeout.as_str(),
                    session_id,
                    history_turns = history.len(),
                    timeout_ms = self.generation_timeout.as_millis(),
                    "reply generation timed out; user turn kept for retry"
                );
                return Err(ConversationError::GenerationTimeout(self.generation_timeout));
            }
        };

        let updated = self
            .store
            .append_turn(session_id, TurnRole::Assistant, reply.as_str())?;
        tracing::info!(
            event = SessionEvent::ConversationTurnCompleted.as_str(),
            session_id,
            retried = !pending.appended,
            total_turns = updated.history.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "conversation turn completed"
        );
        Ok(reply)
    }

    /// Remove a session; `false` when it did not exist.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.store.clear(session_id)
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list_sessions()
    }

    pub fn history(&self, session_id: &str) -> Option<Vec<Turn>> {
        self.store.get_history(session_id)
    }
}
