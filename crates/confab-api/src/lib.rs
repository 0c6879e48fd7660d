//! HTTP client for the confab question-answering service.

mod client;
mod retry;

pub use client::{ApiClient, HealthStatus, IndexStats, IngestReport};
pub use retry::RetryConfig;
