//! Service boundary for the remote question-answering backend.

use crate::error::ApiError;
use crate::message::Role;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One `{role, content}` pair sent as conversation context with a question.
///
/// History entries are derived from the transcript on each submission
/// (sources stripped, failure placeholders excluded) and are never
/// persisted themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// A successful reply: the answer text plus the documents it cited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// A boxed future resolving to an answer, as returned by [`QaService::ask`].
pub type AskFuture<'a> = Pin<Box<dyn Future<Output = Result<Answer, ApiError>> + Send + 'a>>;

/// The question-answering boundary the session manager talks to.
///
/// Implementations must settle every call: either an [`Answer`] or an
/// [`ApiError`], never a silent success without a payload. Dyn-compatible
/// so the session works with `Arc<dyn QaService>`.
pub trait QaService: Send + Sync {
    /// Ask a question, providing a bounded window of prior conversation
    /// turns as context.
    fn ask<'a>(&'a self, question: &'a str, history: &'a [HistoryEntry]) -> AskFuture<'a>;
}
