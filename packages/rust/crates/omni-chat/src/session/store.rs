//! In-memory session store: session_id → ordered conversation history.
//!
//! Each session lives in its own slot guarded by a mutex, so operations on different ids only
//! contend on the brief map lookup. Removal (clear, idle eviction, expiry on access) marks the
//! slot retired while holding its lock and then detaches it from the map; any caller that later
//! locks a retired slot looks the id up again and lands on a fresh session.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::ValidationError;
use crate::observability::SessionEvent;

use super::message::{Session, SessionSummary, Turn, TurnRole};

struct SessionSlot {
    state: StdMutex<SlotState>,
}

struct SlotState {
    session: Session,
    retired: bool,
    /// Replies currently being generated for user turns recorded in this slot.
    generations_in_flight: usize,
}

impl SessionSlot {
    fn new(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            state: StdMutex::new(SlotState {
                session: Session::new(id, now),
                retired: false,
                generations_in_flight: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SlotMap = HashMap<String, Arc<SessionSlot>>;

/// A recorded user turn whose reply is still being generated.
///
/// While it is held, an identical message to the same session counts as a new turn rather than
/// a retry. Dropping it (reply recorded, generation failed, or request cancelled) releases the
/// session for retries.
#[must_use = "dropping the pending turn immediately re-enables retry reuse"]
pub struct PendingUserTurn {
    /// Session snapshot right after the user turn was recorded.
    pub session: Session,
    /// `false` when an unanswered identical turn was reused instead of appended.
    pub appended: bool,
    slot: Arc<SessionSlot>,
}

impl Drop for PendingUserTurn {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        state.generations_in_flight = state.generations_in_flight.saturating_sub(1);
    }
}

/// Volatile, process-local session store. Cloning yields another handle to the same sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    slots: Arc<StdRwLock<SlotMap>>,
    idle_timeout: Option<TimeDelta>,
}

impl SessionStore {
    /// Create an empty store; sessions only leave through `clear` or `evict_idle`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that also expires idle sessions lazily when they are next mutated.
    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            slots: Arc::default(),
            idle_timeout: TimeDelta::from_std(idle_timeout).ok(),
        }
    }

    /// Return the session for `session_id`, creating an empty one if absent. Refreshes
    /// `last_active`.
    pub fn get_or_create(&self, session_id: &str) -> Session {
        let now = Utc::now();
        self.with_live_session(session_id, now, |session| {
            session.touch(now);
            session.clone()
        })
    }

    /// Append one turn (creating the session if absent) and return the updated session.
    ///
    /// Concurrent appends to the same id are serialized; each one is applied exactly once.
    pub fn append_turn(
        &self,
        session_id: &str,
        role: TurnRole,
        content: impl Into<String>,
    ) -> Result<Session, ValidationError> {
        let content = validated_content(content.into())?;
        let now = Utc::now();
        Ok(self.with_live_session(session_id, now, |session| {
            session.push_turn(role, content, now);
            log_appended(session, role);
            session.clone()
        }))
    }

    /// Record a user turn and mark a reply generation as running for it.
    ///
    /// When the history already ends with the same unanswered user turn and no generation is
    /// running, that turn is reused: a retried request (previous generation failed or timed out)
    /// does not duplicate the message. Identical messages sent while a reply is still being
    /// generated are appended as turns of their own.
    pub fn record_user_turn(
        &self,
        session_id: &str,
        content: impl Into<String>,
    ) -> Result<PendingUserTurn, ValidationError> {
        let content = validated_content(content.into())?;
        let now = Utc::now();
        Ok(self.with_live_slot(session_id, now, |slot, state| {
            let is_retry = state.generations_in_flight == 0
                && state.session.has_pending_user_turn()
                && state
                    .session
                    .history
                    .last()
                    .is_some_and(|turn| turn.content == content);
            state.generations_in_flight += 1;
            let session = &mut state.session;
            if is_retry {
                session.touch(now);
                tracing::debug!(
                    event = SessionEvent::SessionRetryTurnReused.as_str(),
                    session_id = %session.id,
                    turn_count = session.history.len(),
                    "pending user turn reused for retried message"
                );
                return PendingUserTurn {
                    session: session.clone(),
                    appended: false,
                    slot: Arc::clone(slot),
                };
            }
            session.push_turn(TurnRole::User, content, now);
            log_appended(session, TurnRole::User);
            PendingUserTurn {
                session: session.clone(),
                appended: true,
                slot: Arc::clone(slot),
            }
        }))
    }

    /// Read-only copy of the history; `None` when the session does not exist.
    ///
    /// Does not refresh `last_active`.
    #[must_use]
    pub fn get_history(&self, session_id: &str) -> Option<Vec<Turn>> {
        loop {
            let slot = self.lookup(session_id)?;
            let state = slot.lock();
            if state.retired {
                continue;
            }
            return Some(state.session.history.clone());
        }
    }

    /// Remove a session entirely. Returns whether one existed.
    pub fn clear(&self, session_id: &str) -> bool {
        loop {
            let Some(slot) = self.lookup(session_id) else {
                return false;
            };
            let mut state = slot.lock();
            if state.retired {
                continue;
            }
            state.retired = true;
            self.detach(session_id, &slot);
            tracing::debug!(
                event = SessionEvent::SessionCleared.as_str(),
                session_id,
                turn_count = state.session.history.len(),
                "session cleared"
            );
            return true;
        }
    }

    /// Summaries of all live sessions, sorted by id. Never observes a half-applied turn.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries = self
            .snapshot_slots()
            .into_iter()
            .filter_map(|(_, slot)| {
                let state = slot.lock();
                (!state.retired).then(|| state.session.summary())
            })
            .collect::<Vec<_>>();
        summaries.sort_by(|left, right| left.session_id.cmp(&right.session_id));
        summaries
    }

    /// Remove every session whose `last_active` is more than `max_idle` before `now`.
    ///
    /// Takes each session's lock before deciding, so an append that refreshed the session first
    /// keeps it alive, and an append that arrives after removal starts a fresh session.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<String> {
        let Ok(max_idle) = TimeDelta::from_std(max_idle) else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        for (session_id, slot) in self.snapshot_slots() {
            let mut state = slot.lock();
            if state.retired || !state.session.is_idle(now, max_idle) {
                continue;
            }
            state.retired = true;
            self.detach(&session_id, &slot);
            tracing::debug!(
                event = SessionEvent::SessionEvicted.as_str(),
                session_id = %session_id,
                turn_count = state.session.history.len(),
                last_active = %state.session.last_active,
                "idle session evicted"
            );
            evicted.push(session_id);
        }
        evicted
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_slots().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_live_session<T>(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Session) -> T,
    ) -> T {
        self.with_live_slot(session_id, now, |_, state| apply(&mut state.session))
    }

    fn with_live_slot<T>(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        apply: impl FnOnce(&Arc<SessionSlot>, &mut SlotState) -> T,
    ) -> T {
        loop {
            let (slot, created) = self.slot_for(session_id, now);
            let mut state = slot.lock();
            if state.retired {
                continue;
            }
            if !created
                && let Some(idle_timeout) = self.idle_timeout
                && state.session.is_idle(now, idle_timeout)
            {
                state.retired = true;
                self.detach(session_id, &slot);
                tracing::debug!(
                    event = SessionEvent::SessionExpiredOnAccess.as_str(),
                    session_id,
                    last_active = %state.session.last_active,
                    "idle session expired on access"
                );
                continue;
            }
            if created {
                tracing::debug!(
                    event = SessionEvent::SessionCreated.as_str(),
                    session_id,
                    "session created"
                );
            }
            return apply(&slot, &mut *state);
        }
    }

    fn slot_for(&self, session_id: &str, now: DateTime<Utc>) -> (Arc<SessionSlot>, bool) {
        if let Some(slot) = self.lookup(session_id) {
            return (slot, false);
        }
        let mut slots = self.write_slots();
        match slots.entry(session_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(SessionSlot::new(session_id, now));
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    fn lookup(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.read_slots().get(session_id).cloned()
    }

    fn detach(&self, session_id: &str, slot: &Arc<SessionSlot>) {
        let mut slots = self.write_slots();
        if slots
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(session_id);
        }
    }

    fn snapshot_slots(&self) -> Vec<(String, Arc<SessionSlot>)> {
        self.read_slots()
            .iter()
            .map(|(session_id, slot)| (session_id.clone(), Arc::clone(slot)))
            .collect()
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, SlotMap> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, SlotMap> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validated_content(content: String) -> Result<String, ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(content)
}

fn log_appended(session: &Session, role: TurnRole) {
    tracing::debug!(
        event = SessionEvent::SessionTurnAppended.as_str(),
        session_id = %session.id,
        role = role.as_str(),
        total_turns = session.history.len(),
        "session turn appended"
    );
}
