//! Error types for spkr-assign
//!
//! Only configuration errors and unparseable core input are surfaced as hard
//! failures. Provider failures are [`crate::types::ProviderError`] and never
//! leave the Signal Collector.

use std::path::PathBuf;
use thiserror::Error;

/// Assignment error type
#[derive(Debug, Error)]
pub enum AssignError {
    /// Invalid threshold, weight table, or other configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transcript missing speakers, not JSON, or in an unknown format
    #[error("Invalid transcript {path}: {reason}")]
    Transcript { path: PathBuf, reason: String },

    /// Audio, transcript, or stored assignment not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Run was cancelled; nothing was persisted
    #[error("Assignment run cancelled")]
    Cancelled,

    /// Persistence failure (I/O or serialization)
    #[error("Store error: {0}")]
    Store(String),

    /// Background task failure (panicked or aborted blocking task)
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// spkr-common error
    #[error("Common error: {0}")]
    Common(#[from] spkr_common::Error),
}

/// Result type for assignment operations
pub type AssignResult<T> = Result<T, AssignError>;
