//! # spkr Common Library
//!
//! Shared code for the speaker assignment tools including:
//! - Common error type
//! - Root folder resolution and layout
//! - TOML configuration loading and atomic write-back

pub mod config;
pub mod error;

pub use error::{Error, Result};
