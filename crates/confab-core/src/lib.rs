//! Conversation session management for confab.

pub mod session;

pub use session::{ChatSession, FALLBACK_ANSWER, IgnoreReason, SessionEvent};
