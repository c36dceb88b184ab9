//! Core types, configuration, and error handling for codeseek.
//!
//! This crate provides the shared foundation used by the index crate and the
//! command-line binary:
//! - [`CodeseekError`]: unified error type using `thiserror`
//! - [`CodeseekConfig`]: configuration loaded from `.codeseek.toml`
//! - Shared types: [`SearchResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CodeseekConfig, EmbeddingConfig, IndexConfig, LoggingConfig, WorkspaceConfig,
};
pub use error::CodeseekError;
pub use types::{OutputFormat, SearchResult};

/// A convenience `Result` type for codeseek operations.
pub type Result<T> = std::result::Result<T, CodeseekError>;
