//! Transcript persistence and context windowing for confab.

pub mod error;
pub mod history;
pub mod store;

pub use error::StoreError;
pub use history::{HISTORY_WINDOW, history_window};
pub use store::{JsonFileStore, MemoryStore, StoredTranscript, TranscriptStore};
