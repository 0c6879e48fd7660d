//! Persistent transcript storage backed by a JSON file.
//!
//! One conversation, one file: the whole transcript lives under a single
//! fixed name inside the config directory. Storage here is advisory; the
//! session layer treats any failure as a degraded but survivable state.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use confab_types::Message;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;

/// File name of the persisted transcript inside the config directory.
const HISTORY_FILE: &str = "history.json";

/// A boxed future returned by the store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Storage boundary for the conversation transcript.
///
/// Implementations mirror the full message sequence on every save and
/// hand it back at session start. Dyn-compatible so the session works
/// with `Arc<dyn TranscriptStore>`.
pub trait TranscriptStore: Send + Sync {
    /// Read the persisted transcript. An absent store yields an empty
    /// transcript; unreadable or corrupt contents are an error, and the
    /// caller decides how much to care.
    fn load(&self) -> StoreFuture<'_, Vec<Message>>;

    /// Replace the persisted transcript with the full `messages` sequence.
    fn save<'a>(&'a self, messages: &'a [Message]) -> StoreFuture<'a, ()>;

    /// Remove the persisted transcript. Removing an absent one is Ok.
    fn delete(&self) -> StoreFuture<'_, ()>;
}

/// On-disk envelope around the message sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTranscript {
    /// When the transcript was last written. Advisory metadata; nothing
    /// is keyed off it.
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// File-based transcript store (atomic write: .tmp → rename).
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store inside `config_dir`, ensuring the directory exists.
    pub async fn new(config_dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&config_dir).await?;
        Ok(Self {
            path: config_dir.join(HISTORY_FILE),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<Message>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => {
                let stored: StoredTranscript = serde_json::from_str(&data)?;
                Ok(stored.messages)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, messages: &[Message]) -> Result<(), StoreError> {
        let stored = StoredTranscript {
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TranscriptStore for JsonFileStore {
    fn load(&self) -> StoreFuture<'_, Vec<Message>> {
        Box::pin(self.read())
    }

    fn save<'a>(&'a self, messages: &'a [Message]) -> StoreFuture<'a, ()> {
        Box::pin(self.write(messages))
    }

    fn delete(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.remove())
    }
}

/// In-memory store for ephemeral sessions and tests. Never touches disk.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptStore for MemoryStore {
    fn load(&self) -> StoreFuture<'_, Vec<Message>> {
        Box::pin(async move { Ok(self.messages.lock().unwrap().clone()) })
    }

    fn save<'a>(&'a self, messages: &'a [Message]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            *self.messages.lock().unwrap() = messages.to_vec();
            Ok(())
        })
    }

    fn delete(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.messages.lock().unwrap().clear();
            Ok(())
        })
    }
}
