//! Change detection: diffing snapshots and classifying repository activity.
//!
//! [`ChangeDetector::detect`] takes the previous and current repository
//! snapshots, consults the commit fetcher for every surviving repository, and
//! produces an ordered list of [`ChangeEvent`]s:
//!
//! - Creations first, then per-repository events in snapshot iteration order.
//! - Within one repository: description change, then one `FileUpdated` per
//!   new commit ascending by author date, then the `GeneralUpdated` fallback.
//!
//! Commit-list and commit-detail fetches fan out concurrently across
//! repositories, bounded by a configurable cap; results are collected into
//! maps and re-emitted in snapshot order, so the event list is deterministic
//! regardless of fetch completion order. Cursor advancement happens in
//! memory here; persisting the table is the caller's job, once per pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::github::GitHubClient;
use crate::types::{ChangeEvent, CommitRecord, CursorTable, Snapshot};

/// Policy knobs for ambiguous classification behavior.
#[derive(Debug, Clone)]
pub struct DetectorPolicy {
    /// Emit a `GeneralUpdated` event when `updated_at` moved but the pass
    /// found neither a description change nor an attributable commit.
    pub general_update_fallback: bool,
}

impl Default for DetectorPolicy {
    fn default() -> Self {
        Self {
            general_update_fallback: true,
        }
    }
}

/// The change-detection engine.
///
/// Owns the in-memory cursor table between passes. Description and commit
/// checks are independent: both can contribute events for the same
/// repository within a single pass.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    cursors: CursorTable,
    policy: DetectorPolicy,
    max_concurrent_fetches: usize,
}

impl ChangeDetector {
    /// Creates a detector over a previously loaded cursor table.
    #[must_use]
    pub fn new(cursors: CursorTable, policy: DetectorPolicy, max_concurrent_fetches: usize) -> Self {
        Self {
            cursors,
            policy,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    /// Read access to the cursor table, for persistence after a pass.
    #[must_use]
    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    /// Mutable access to the cursor table, for one-time seeding.
    pub fn cursors_mut(&mut self) -> &mut CursorTable {
        &mut self.cursors
    }

    /// Diffs `previous` against `current` and returns the classified events.
    ///
    /// A first observation (`previous` is `None`) produces no events; the
    /// caller still records the snapshot so the next pass has a baseline.
    pub async fn detect(
        &mut self,
        previous: Option<&Snapshot>,
        current: &Snapshot,
        github: &GitHubClient,
    ) -> Vec<ChangeEvent> {
        let Some(previous) = previous else {
            debug!(repos = current.len(), "First observation, nothing to diff");
            return Vec::new();
        };

        let mut events = Vec::new();

        // Step 1: creations, in snapshot order.
        for (name, record) in current {
            if !previous.contains_key(name) {
                events.push(ChangeEvent::RepositoryCreated {
                    repo: name.clone(),
                    timestamp: record.created_at,
                });
            }
        }

        let existing: Vec<&str> = current
            .keys()
            .filter(|name| previous.contains_key(*name))
            .map(String::as_str)
            .collect();

        // Step 2: fan out commit-list fetches across repositories. A failed
        // fetch contributes no commits; the pass continues without it.
        let commits_by_repo = self.fetch_commits(&existing, github).await;

        // Step 3: resolve file lists the list endpoint omitted.
        let details = self.fetch_details(&commits_by_repo, github).await;

        // Step 4: emit per-repository events in snapshot order.
        for (name, record) in current {
            let Some(prev) = previous.get(name) else {
                continue;
            };

            let mut attributed = false;

            if prev.description != record.description {
                events.push(ChangeEvent::DescriptionUpdated {
                    repo: name.clone(),
                    description: record.description.clone(),
                    timestamp: record.updated_at,
                });
                attributed = true;
            }

            let mut max_seen: Option<DateTime<Utc>> = None;
            if let Some(commits) = commits_by_repo.get(name.as_str()) {
                for commit in commits {
                    max_seen = Some(max_seen.map_or(commit.author_date, |m| {
                        m.max(commit.author_date)
                    }));

                    let files = match &commit.files {
                        Some(files) => Some(files.clone()),
                        None => details
                            .get(&(name.clone(), commit.sha.clone()))
                            .cloned()
                            .flatten(),
                    };

                    match files {
                        Some(files) if !files.is_empty() => {
                            events.push(ChangeEvent::FileUpdated {
                                repo: name.clone(),
                                files,
                                timestamp: commit.author_date,
                            });
                            attributed = true;
                        }
                        _ => {
                            debug!(
                                repo = %name,
                                sha = %commit.sha,
                                "Skipping commit without resolvable file list"
                            );
                        }
                    }
                }
            }

            if let Some(max) = max_seen {
                self.cursors.insert(name.clone(), max);
            }

            if !attributed
                && self.policy.general_update_fallback
                && prev.updated_at != record.updated_at
            {
                events.push(ChangeEvent::GeneralUpdated {
                    repo: name.clone(),
                    timestamp: record.updated_at,
                });
            }
        }

        events
    }

    /// Fetches new commits for every existing repository, bounded fan-out.
    async fn fetch_commits(
        &self,
        repos: &[&str],
        github: &GitHubClient,
    ) -> HashMap<String, Vec<CommitRecord>> {
        stream::iter(repos.iter().map(|name| {
            let name = (*name).to_string();
            let cursor = self.cursors.get(&name).copied();
            async move {
                match github.commits_since(&name, cursor).await {
                    Ok(commits) => (name, commits),
                    Err(e) => {
                        warn!(
                            repo = %name,
                            error = %e,
                            "Commit fetch failed, treating as no changes this pass"
                        );
                        (name, Vec::new())
                    }
                }
            }
        }))
        .buffer_unordered(self.max_concurrent_fetches)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
    }

    /// Resolves file lists for commits the list endpoint returned without
    /// them. A failed detail fetch maps to `None`, which skips that single
    /// commit's event.
    async fn fetch_details(
        &self,
        commits_by_repo: &HashMap<String, Vec<CommitRecord>>,
        github: &GitHubClient,
    ) -> HashMap<(String, String), Option<Vec<String>>> {
        let targets: Vec<(String, String)> = commits_by_repo
            .iter()
            .flat_map(|(repo, commits)| {
                commits
                    .iter()
                    .filter(|c| c.files.is_none())
                    .map(|c| (repo.clone(), c.sha.clone()))
            })
            .collect();

        stream::iter(targets.into_iter().map(|(repo, sha)| async move {
            match github.files_for(&repo, &sha).await {
                Ok(files) => ((repo, sha), Some(files)),
                Err(e) => {
                    warn!(repo = %repo, sha = %sha, error = %e, "Commit detail fetch failed");
                    ((repo, sha), None)
                }
            }
        }))
        .buffer_unordered(self.max_concurrent_fetches)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepoRecord;
    use chrono::TimeZone;
    use std::time::Duration;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// A client pointed at a closed port; tests that must not touch the
    /// network use it to prove no fetch happens.
    fn offline_client() -> GitHubClient {
        GitHubClient::new(
            "http://127.0.0.1:1",
            "octocat",
            None,
            Duration::from_millis(100),
        )
    }

    fn record(name: &str, description: Option<&str>, updated: i64) -> RepoRecord {
        RepoRecord {
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: ts(100),
            updated_at: ts(updated),
        }
    }

    fn snapshot(records: Vec<RepoRecord>) -> Snapshot {
        records.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[tokio::test]
    async fn cold_start_is_silent() {
        let mut detector = ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4);
        let current = snapshot(vec![record("a", Some("x"), 1_000)]);

        let events = detector
            .detect(None, &current, &offline_client())
            .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn new_repository_emits_created_without_commit_fetch() {
        let mut detector = ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4);
        let previous = Snapshot::new();
        let current = snapshot(vec![record("a", Some("x"), 1_000)]);

        // No existing repositories, so the offline client is never used.
        let events = detector
            .detect(Some(&previous), &current, &offline_client())
            .await;

        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], ChangeEvent::RepositoryCreated { repo, timestamp }
                if repo == "a" && *timestamp == ts(100))
        );
    }

    #[tokio::test]
    async fn fallback_can_be_disabled_by_policy() {
        let policy = DetectorPolicy {
            general_update_fallback: false,
        };
        let mut detector = ChangeDetector::new(CursorTable::new(), policy, 4);

        // updated_at moved, but the commit fetch fails (offline) and the
        // description is unchanged: with the fallback off, nothing is emitted.
        let previous = snapshot(vec![record("a", Some("x"), 1_000)]);
        let current = snapshot(vec![record("a", Some("x"), 2_000)]);

        let events = detector
            .detect(Some(&previous), &current, &offline_client())
            .await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn fallback_fires_on_unattributed_activity() {
        let mut detector = ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4);

        let previous = snapshot(vec![record("a", Some("x"), 1_000)]);
        let current = snapshot(vec![record("a", Some("x"), 2_000)]);

        let events = detector
            .detect(Some(&previous), &current, &offline_client())
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChangeEvent::GeneralUpdated { repo, timestamp }
            if repo == "a" && *timestamp == ts(2_000)));
    }

    #[tokio::test]
    async fn unchanged_snapshot_emits_nothing() {
        let mut detector = ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4);

        let previous = snapshot(vec![record("a", Some("x"), 1_000)]);
        let current = previous.clone();

        let events = detector
            .detect(Some(&previous), &current, &offline_client())
            .await;
        assert!(events.is_empty());
        assert!(detector.cursors().is_empty());
    }

    #[tokio::test]
    async fn description_transition_to_none_is_a_change() {
        let mut detector = ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4);

        let previous = snapshot(vec![record("a", Some("x"), 1_000)]);
        let current = snapshot(vec![record("a", None, 1_000)]);

        let events = detector
            .detect(Some(&previous), &current, &offline_client())
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChangeEvent::DescriptionUpdated { repo, description, .. }
            if repo == "a" && description.is_none()));
    }
}
