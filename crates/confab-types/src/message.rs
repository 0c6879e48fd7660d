//! The conversation transcript data model.

use serde::{Deserialize, Serialize};

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the conversation transcript.
///
/// The transcript is append-only: entries are never edited or reordered
/// once appended, and every save mirrors the full sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Source documents a successful answer was grounded on. Empty for
    /// user questions and for failure entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Set only on the placeholder appended when a request fails. Entries
    /// marked this way are excluded from future context windows.
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    /// A user question.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            is_error: false,
        }
    }

    /// A successful assistant answer with its citation sources.
    pub fn answer(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            is_error: false,
        }
    }

    /// The placeholder assistant entry appended when a request fails.
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: Vec::new(),
            is_error: true,
        }
    }
}
