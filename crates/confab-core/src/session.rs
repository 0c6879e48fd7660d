//! The conversation session manager.
//!
//! Owns the ordered transcript, the single-flight request guard, and the
//! lifecycle of each question from submission to its terminal entry.

use std::sync::{Arc, Mutex};

use confab_session::{TranscriptStore, history_window};
use confab_types::{Message, QaService};

/// Fixed text of the assistant entry appended when a request fails.
pub const FALLBACK_ANSWER: &str =
    "Sorry, something went wrong while answering your question. \
     Check that the assistant service is running and try again.";

/// Events emitted by [`ChatSession::submit`] as a question moves through
/// its lifecycle. A rendering layer can drive its display from these, or
/// poll [`ChatSession::messages`] and [`ChatSession::is_pending`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The trimmed question was accepted and appended to the transcript.
    Question { content: String },
    /// The service answered; the assistant entry was appended.
    Answer {
        content: String,
        sources: Vec<String>,
    },
    /// The request failed; the fixed fallback entry was appended instead.
    /// `detail` is for logs and verbose display only — the transcript
    /// carries just the fallback text.
    Failure { detail: String },
    /// The submission was dropped before any request was made.
    Ignored { reason: IgnoreReason },
    /// The response arrived after the transcript had been cleared and was
    /// dropped; nothing was appended.
    Discarded,
}

/// Why a submission was dropped without a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The question was empty after trimming.
    EmptyQuestion,
    /// Another question is still in flight.
    RequestInFlight,
}

struct SessionState {
    messages: Vec<Message>,
    pending: bool,
    /// Bumped by `clear()`. A response that settles under an older
    /// generation is discarded instead of appended.
    generation: u64,
}

/// The conversation session manager.
///
/// Holds the append-only transcript, mirrors every change to the store,
/// and admits at most one in-flight question at a time. All methods take
/// `&self`; state sits behind a mutex that is never held across an await,
/// so a session can be shared via `Arc` and the single-flight guarantee
/// holds even for concurrent submitters.
pub struct ChatSession {
    client: Arc<dyn QaService>,
    store: Arc<dyn TranscriptStore>,
    state: Mutex<SessionState>,
}

impl ChatSession {
    /// Open a session, restoring the transcript persisted by an earlier
    /// run. Any load failure degrades to an empty transcript; a missing
    /// or corrupt history is never fatal.
    pub async fn open(client: Arc<dyn QaService>, store: Arc<dyn TranscriptStore>) -> Self {
        let messages = match store.load().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Could not restore transcript, starting empty: {e}");
                Vec::new()
            }
        };

        Self {
            client,
            store,
            state: Mutex::new(SessionState {
                messages,
                pending: false,
                generation: 0,
            }),
        }
    }

    /// Snapshot of the transcript, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    /// True while a question is in flight.
    pub fn is_pending(&self) -> bool {
        self.state.lock().unwrap().pending
    }

    /// Submit a question.
    ///
    /// Appends the user entry immediately, asks the service with a bounded
    /// window of prior turns, and appends exactly one assistant entry once
    /// the call settles: the answer on success, the fixed fallback on any
    /// failure. Service errors never escape this method.
    ///
    /// A submission is dropped without a request when the trimmed question
    /// is empty or another question is still in flight. Dropping the
    /// returned future mid-request leaves the in-flight guard raised; this
    /// session deliberately has no cancellation.
    pub async fn submit<F>(&self, question: &str, mut on_event: F)
    where
        F: FnMut(SessionEvent),
    {
        let question = question.trim();
        if question.is_empty() {
            on_event(SessionEvent::Ignored {
                reason: IgnoreReason::EmptyQuestion,
            });
            return;
        }

        // Raise the guard, append the question and derive the context
        // window under a single lock acquisition, so concurrent submits
        // cannot interleave between the check and the append.
        let (window, generation) = {
            let mut state = self.state.lock().unwrap();
            if state.pending {
                drop(state);
                on_event(SessionEvent::Ignored {
                    reason: IgnoreReason::RequestInFlight,
                });
                return;
            }
            state.pending = true;
            state.messages.push(Message::user(question));
            (history_window(&state.messages), state.generation)
        };

        on_event(SessionEvent::Question {
            content: question.to_string(),
        });
        self.persist().await;

        let outcome = self.client.ask(question, &window).await;

        let event = {
            let mut state = self.state.lock().unwrap();
            state.pending = false;

            if state.generation != generation {
                // The transcript was cleared while the request was in
                // flight; the question this would answer no longer exists.
                tracing::debug!("Discarding response for a cleared transcript");
                SessionEvent::Discarded
            } else {
                match outcome {
                    Ok(answer) => {
                        state
                            .messages
                            .push(Message::answer(answer.answer.clone(), answer.sources.clone()));
                        SessionEvent::Answer {
                            content: answer.answer,
                            sources: answer.sources,
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Ask failed: {e}");
                        state.messages.push(Message::failure(FALLBACK_ANSWER));
                        SessionEvent::Failure {
                            detail: e.to_string(),
                        }
                    }
                }
            }
        };

        if !matches!(event, SessionEvent::Discarded) {
            self.persist().await;
        }
        on_event(event);
    }

    /// Clear the transcript and delete its persisted copy.
    ///
    /// A request already in flight is not cancelled; its response will be
    /// discarded when it settles, and until then new submissions are still
    /// rejected by the in-flight guard.
    pub async fn clear(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.messages.clear();
            state.generation += 1;
        }

        if let Err(e) = self.store.delete().await {
            tracing::warn!("Failed to delete persisted transcript: {e}");
        }
    }

    /// Mirror the current transcript to the store. Failures are logged and
    /// swallowed: losing history on a bad disk is the accepted degraded
    /// mode, losing the conversation itself is not.
    async fn persist(&self) {
        let snapshot = self.state.lock().unwrap().messages.clone();
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!("Failed to persist transcript: {e}");
        }
    }
}
