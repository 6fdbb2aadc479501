//! Session namespace: turn types, the per-session store, and the idle sweeper.

mod message;
mod store;
mod sweeper;

pub use message::{Session, SessionSummary, Turn, TurnRole};
pub use store::{PendingUserTurn, SessionStore};
pub use sweeper::{IdleSweeper, spawn_idle_sweeper};
