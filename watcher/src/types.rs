//! Core data types for repository change detection.
//!
//! This module defines the snapshot, commit, and change-event types shared by
//! the fetchers, the detector, and the notifier. Wire types deserialize
//! directly from GitHub API payloads; [`ChangeEvent`] serializes with a
//! `type` tag so downstream consumers can dispatch on the event kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder rendered when a repository has no description.
///
/// A missing description is always rendered as this literal, never as an
/// empty string.
pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No description";

/// A single repository record as returned by the repository-list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    /// Repository name (unique within the account, case-sensitive).
    pub name: String,

    /// Free-text description, absent when the repository has none.
    pub description: Option<String>,

    /// When the repository was created.
    pub created_at: DateTime<Utc>,

    /// When the repository was last touched (pushes, metadata edits).
    pub updated_at: DateTime<Utc>,
}

/// A point-in-time read of all repositories for the watched account.
///
/// Keyed by repository name. `BTreeMap` keeps iteration order stable, which
/// fixes the order in which per-repository events are emitted.
pub type Snapshot = BTreeMap<String, RepoRecord>;

/// Builds a [`Snapshot`] from a list of repository records.
///
/// Later duplicates win, matching how the list endpoint would be interpreted
/// if it ever repeated a name.
#[must_use]
pub fn snapshot_from_records(records: Vec<RepoRecord>) -> Snapshot {
    records.into_iter().map(|r| (r.name.clone(), r)).collect()
}

/// Per-repository cursor table: the newest commit author date already
/// processed for each repository. A missing entry means "never checked".
pub type CursorTable = BTreeMap<String, DateTime<Utc>>;

/// One commit, normalized from the commit-list payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit SHA.
    pub sha: String,

    /// Author date; the chronological key for ordering and cursors.
    pub author_date: DateTime<Utc>,

    /// Touched file paths, in API order. `None` when the list endpoint
    /// omitted them and a detail fetch is required.
    pub files: Option<Vec<String>>,
}

/// A classified repository change.
///
/// Every event names a repository that exists in the snapshot that produced
/// it and carries a timestamp suitable for chronological ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A repository appeared that was absent from the previous snapshot.
    RepositoryCreated {
        repo: String,
        timestamp: DateTime<Utc>,
    },

    /// The repository description changed, including to or from no value.
    DescriptionUpdated {
        repo: String,
        description: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// One commit's worth of file changes.
    FileUpdated {
        repo: String,
        files: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Metadata changed but no attributable commit or description diff was
    /// found.
    GeneralUpdated {
        repo: String,
        timestamp: DateTime<Utc>,
    },
}

impl ChangeEvent {
    /// The repository this event belongs to.
    #[must_use]
    pub fn repo(&self) -> &str {
        match self {
            Self::RepositoryCreated { repo, .. }
            | Self::DescriptionUpdated { repo, .. }
            | Self::FileUpdated { repo, .. }
            | Self::GeneralUpdated { repo, .. } => repo,
        }
    }

    /// The event timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RepositoryCreated { timestamp, .. }
            | Self::DescriptionUpdated { timestamp, .. }
            | Self::FileUpdated { timestamp, .. }
            | Self::GeneralUpdated { timestamp, .. } => *timestamp,
        }
    }

    /// Human-readable kind label used in notification titles.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::RepositoryCreated { .. } => "Repository Created",
            Self::DescriptionUpdated { .. } => "Description Updated",
            Self::FileUpdated { .. } => "File Update",
            Self::GeneralUpdated { .. } => "General Update",
        }
    }
}

/// Renders an optional description for display, substituting the placeholder
/// when there is no value or the value is blank.
#[must_use]
pub fn display_description(description: Option<&str>) -> &str {
    match description {
        Some(text) if !text.trim().is_empty() => text,
        _ => NO_DESCRIPTION_PLACEHOLDER,
    }
}
