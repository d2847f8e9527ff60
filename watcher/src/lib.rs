//! Octowatch Watcher - GitHub repository activity notifier.
//!
//! This crate polls the GitHub API for one account's repositories, diffs
//! each snapshot against the previous one, classifies what changed, and
//! posts webhook notifications for every change event.
//!
//! # Overview
//!
//! A detection pass fetches the repository list, diffs it against the last
//! snapshot, and consults commit history (incrementally, from a persisted
//! per-repository cursor) to attribute activity to concrete commits. The
//! resulting [`types::ChangeEvent`]s are rendered into embeds and delivered
//! in order. Passes are driven by a timer or by the HTTP control surface;
//! only one pass runs at a time.
//!
//! # Modules
//!
//! - [`types`]: snapshots, commits, and change events
//! - [`config`]: configuration from environment variables
//! - [`error`]: crate-level error type
//! - [`github`]: repository-list and commit fetching
//! - [`cursor`]: persisted per-repository commit cursors
//! - [`detector`]: the change-detection engine
//! - [`notifier`]: embed rendering and webhook delivery
//! - [`session`]: shared runtime settings and control commands
//! - [`control`]: local HTTP command surface
//! - [`runner`]: the pass runner owning session state

pub mod config;
pub mod control;
pub mod cursor;
pub mod detector;
pub mod error;
pub mod github;
pub mod notifier;
pub mod runner;
pub mod session;
pub mod types;

pub use config::Config;
pub use control::{create_router, AppState};
pub use cursor::{CursorError, CursorStore};
pub use detector::{ChangeDetector, DetectorPolicy};
pub use error::{Result, WatcherError};
pub use github::{GitHubClient, GitHubError};
pub use notifier::{Notifier, NotifierError};
pub use runner::Watcher;
pub use session::{shared_settings, ControlCommand, PassReport, Settings, SharedSettings};
pub use types::{ChangeEvent, CommitRecord, CursorTable, RepoRecord, Snapshot};
