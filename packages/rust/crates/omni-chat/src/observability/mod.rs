//! Structured log event names shared by the store, service, and gateway.

mod session_events;

pub use session_events::SessionEvent;
