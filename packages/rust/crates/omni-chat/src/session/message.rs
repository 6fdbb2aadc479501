//! Conversation records: turns, sessions, and listing summaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Speaker of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Wire name, matching the OpenAI-compatible `role` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(ValidationError::InvalidRole(raw.to_string())),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of one session as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    /// Oldest first.
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            history: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    /// Whether the last recorded turn is a user turn with no assistant reply yet.
    #[must_use]
    pub fn has_pending_user_turn(&self) -> bool {
        self.history
            .last()
            .is_some_and(|turn| turn.role == TurnRole::User)
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_active {
            self.last_active = now;
        }
    }

    pub(crate) fn push_turn(&mut self, role: TurnRole, content: String, now: DateTime<Utc>) {
        let floor = self
            .history
            .last()
            .map_or(self.created_at, |turn| turn.timestamp);
        self.history.push(Turn {
            role,
            content,
            timestamp: now.max(floor),
        });
        self.touch(now);
    }

    pub(crate) fn is_idle(&self, now: DateTime<Utc>, max_idle: chrono::TimeDelta) -> bool {
        now.signed_duration_since(self.last_active) > max_idle
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            turn_count: self.history.len(),
            created_at: self.created_at,
            last_active: self.last_active,
        }
    }
}

/// Operational view of one live session (no message content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}
