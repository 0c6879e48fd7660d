//! The bounded context window sent alongside each question.

use confab_types::{HistoryEntry, Message};

/// Maximum number of transcript entries included as context per question.
pub const HISTORY_WINDOW: usize = 10;

/// Derive the context window from a transcript.
///
/// Takes the most recent [`HISTORY_WINDOW`] entries that are not failure
/// placeholders, reduced to `{role, content}` pairs, in their original
/// chronological order. The window is recomputed on every submission and
/// never persisted.
pub fn history_window(messages: &[Message]) -> Vec<HistoryEntry> {
    let mut window: Vec<HistoryEntry> = messages
        .iter()
        .rev()
        .filter(|m| !m.is_error)
        .take(HISTORY_WINDOW)
        .map(|m| HistoryEntry {
            role: m.role,
            content: m.content.clone(),
        })
        .collect();
    window.reverse();
    window
}
