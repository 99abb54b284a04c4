//! Core types, configuration, and error handling for coderev.
//!
//! This crate provides the shared foundation used by the review engine and the CLI:
//! - [`CoderevError`] — unified error type using `thiserror`
//! - [`CoderevConfig`] — configuration loaded from `.coderev.toml`
//! - Shared types: [`UploadedItem`], [`InputMode`], [`ReviewRecord`], [`ApiKey`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CoderevConfig, LlmConfig, ReviewConfig, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_FOCUS,
};
pub use error::CoderevError;
pub use types::{
    readable_bytes, ApiKey, InputDescriptor, InputMode, OutputFormat, ReviewRecord, UploadedItem,
};

/// A convenience `Result` type for coderev operations.
pub type Result<T> = std::result::Result<T, CoderevError>;
