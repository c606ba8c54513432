//! spkr-assign library interface
//!
//! Resolves anonymous diarization labels to known speakers by fusing
//! independent evidence (voice biometrics, names mentioned in conversation,
//! expected participants, cross-transcript agreement).
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod collector;
pub mod config;
pub mod error;
pub mod fusion;
pub mod recording_id;
pub mod store;
pub mod transcript;
pub mod types;
pub mod workflow;

pub use crate::error::{AssignError, AssignResult};
