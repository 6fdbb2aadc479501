/// Stable `event` field values emitted with `tracing` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SessionCreated,
    SessionExpiredOnAccess,
    SessionTurnAppended,
    SessionRetryTurnReused,
    SessionCleared,
    SessionEvicted,
    SessionSweepCompleted,
    SessionSweeperStarted,
    SessionSweeperStopped,
    ConversationTurnCompleted,
    ConversationGenerationFailed,
    ConversationGenerationTimeout,
    InstructionsLoaded,
    InstructionsFallback,
}

impl SessionEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionCreated => "session.created",
            Self::SessionExpiredOnAccess => "session.expired_on_access",
            Self::SessionTurnAppended => "session.turn.appended",
            Self::SessionRetryTurnReused => "session.turn.retry_reused",
            Self::SessionCleared => "session.cleared",
            Self::SessionEvicted => "session.evicted",
            Self::SessionSweepCompleted => "session.sweep.completed",
            Self::SessionSweeperStarted => "session.sweeper.started",
            Self::SessionSweeperStopped => "session.sweeper.stopped",
            Self::ConversationTurnCompleted => "conversation.turn.completed",
            Self::ConversationGenerationFailed => "conversation.generation.failed",
            Self::ConversationGenerationTimeout => "conversation.generation.timeout",
            Self::InstructionsLoaded => "instructions.loaded",
            Self::InstructionsFallback => "instructions.fallback",
        }
    }
}
