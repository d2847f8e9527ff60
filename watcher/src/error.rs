//! Error types for the Octowatch Watcher.
//!
//! This module defines the crate-level error type aggregating the
//! per-component errors, plus a specialized `Result` alias.

use thiserror::Error;

use crate::config::ConfigError;
use crate::cursor::CursorError;
use crate::github::GitHubError;
use crate::notifier::NotifierError;

/// Errors that can occur during watcher operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cursor persistence error.
    #[error("cursor store error: {0}")]
    Cursor(#[from] CursorError),

    /// GitHub API error.
    #[error("github error: {0}")]
    GitHub(#[from] GitHubError),

    /// Notification delivery error.
    #[error("notifier error: {0}")]
    Notifier(#[from] NotifierError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;
