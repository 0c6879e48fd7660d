//! Shared types and error hierarchy for confab.

pub mod error;
pub mod message;
pub mod service;

pub use error::{ApiError, ConfigError};
pub use message::*;
pub use service::*;
