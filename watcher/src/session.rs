//! Shared session configuration and control-plane message types.
//!
//! The destination webhook and poll interval are the only pieces of state
//! with two interested parties: the control surface writes them, the
//! scheduler and delivery path read them. They live behind an `RwLock` so
//! every scheduling decision and every delivery reads the latest value.
//! Everything else (last snapshot, cursors) stays owned by the runner, which
//! answers control queries over a command channel instead of sharing state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, RwLock};

/// Runtime-changeable configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Destination webhook; `None` suppresses delivery.
    pub webhook_url: Option<String>,

    /// Delay between detection passes.
    pub interval: Duration,
}

/// Settings handle shared between the control surface and the runner.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Wraps initial settings for sharing.
#[must_use]
pub fn shared_settings(webhook_url: Option<String>, interval: Duration) -> SharedSettings {
    Arc::new(RwLock::new(Settings {
        webhook_url,
        interval,
    }))
}

/// Outcome summary of one detection pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Number of change events the detector produced.
    pub events: usize,

    /// Number of notifications delivered to the webhook.
    pub delivered: usize,

    /// Present when the pass was skipped or something went wrong; a short
    /// human-readable note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PassReport {
    /// A pass that was skipped entirely.
    #[must_use]
    pub fn skipped(note: impl Into<String>) -> Self {
        Self {
            events: 0,
            delivered: 0,
            note: Some(note.into()),
        }
    }
}

/// Commands the control surface sends to the runner.
///
/// Replies travel back over `oneshot` channels so the runner remains the
/// single writer of its session state.
#[derive(Debug)]
pub enum ControlCommand {
    /// Run a detection pass now and report the outcome.
    ForceCheck {
        reply: oneshot::Sender<PassReport>,
    },

    /// Report the repository names from the last snapshot.
    ListRepos {
        reply: oneshot::Sender<Vec<String>>,
    },
}
