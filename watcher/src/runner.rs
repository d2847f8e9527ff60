//! The pass runner: fetch, detect, persist, deliver.
//!
//! [`Watcher`] owns the session state (last snapshot and, through the
//! detector, the cursor table) and executes one detection pass at a time.
//! The scheduler loop in `main` drives it from a single task, so passes
//! never overlap and control commands are answered between passes, not
//! during them.
//!
//! A pass never returns an error: every failure mode is folded into the
//! [`PassReport`] and logged, so nothing can cross the scheduler boundary
//! and kill the timer loop.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::cursor::CursorStore;
use crate::detector::{ChangeDetector, DetectorPolicy};
use crate::github::GitHubClient;
use crate::notifier::Notifier;
use crate::session::{ControlCommand, PassReport, SharedSettings};
use crate::types::{snapshot_from_records, ChangeEvent, Snapshot};

/// Owns the detection pipeline and the session state it mutates.
pub struct Watcher {
    github: GitHubClient,
    store: CursorStore,
    detector: ChangeDetector,
    notifier: Notifier,
    settings: SharedSettings,
    last_snapshot: Option<Snapshot>,
}

impl Watcher {
    /// Builds the pipeline from configuration, loading persisted cursors.
    #[must_use]
    pub fn new(config: &Config, settings: SharedSettings) -> Self {
        let github = GitHubClient::new(
            config.github_api_url.as_str(),
            config.github_user.as_str(),
            config.github_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );
        let store = CursorStore::new(&config.cursor_path);
        let cursors = store.load();
        let detector = ChangeDetector::new(
            cursors,
            DetectorPolicy {
                general_update_fallback: config.general_update_fallback,
            },
            config.max_concurrent_fetches,
        );

        Self {
            github,
            store,
            detector,
            notifier: Notifier::new(),
            settings,
            last_snapshot: None,
        }
    }

    /// Runs one full pass and reports the outcome.
    pub async fn run_pass(&mut self) -> PassReport {
        self.run_once().await.0
    }

    /// Runs one full pass, returning the report together with the events it
    /// produced (used by the one-shot CLI mode).
    pub async fn run_once(&mut self) -> (PassReport, Vec<ChangeEvent>) {
        let records = self.github.fetch_repos().await;

        // An empty list after a non-empty snapshot is indistinguishable from
        // a failed fetch; diffing it would replay every repository as
        // created on recovery. Skip the pass instead.
        let had_repos = self.last_snapshot.as_ref().is_some_and(|s| !s.is_empty());
        if records.is_empty() && had_repos {
            warn!("Repository list came back empty, skipping pass");
            return (PassReport::skipped("empty snapshot, pass skipped"), Vec::new());
        }

        let current = snapshot_from_records(records);
        let first_observation = self.last_snapshot.is_none();

        if first_observation {
            if let Err(e) = self
                .store
                .initialize_if_empty(self.detector.cursors_mut(), &current)
            {
                warn!(error = %e, "Failed to seed cursor table");
            }
        }

        let events = self
            .detector
            .detect(self.last_snapshot.as_ref(), &current, &self.github)
            .await;

        if let Err(e) = self.store.save(self.detector.cursors()) {
            warn!(error = %e, "Failed to persist cursor table");
        }
        self.last_snapshot = Some(current);

        let (delivered, destination_missing) = self.deliver(&events).await;

        let note = if first_observation {
            Some("baseline recorded, nothing to diff yet".to_string())
        } else if destination_missing && !events.is_empty() {
            Some("no destination configured, events not delivered".to_string())
        } else {
            None
        };

        info!(
            events = events.len(),
            delivered,
            "Detection pass complete"
        );

        (
            PassReport {
                events: events.len(),
                delivered,
                note,
            },
            events,
        )
    }

    /// Delivers events in order, reading the destination fresh for each one
    /// so a concurrent channel change takes effect immediately.
    async fn deliver(&self, events: &[ChangeEvent]) -> (usize, bool) {
        let mut delivered = 0;
        let mut destination_missing = false;

        for event in events {
            let webhook = self.settings.read().await.webhook_url.clone();
            let Some(url) = webhook else {
                debug!("No destination configured, dropping remaining notifications");
                destination_missing = true;
                break;
            };

            match self.notifier.send(&url, event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        repo = event.repo(),
                        kind = event.kind_label(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }

        (delivered, destination_missing)
    }

    /// Repository names from the last snapshot, in iteration order.
    #[must_use]
    pub fn repo_names(&self) -> Vec<String> {
        self.last_snapshot
            .as_ref()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Answers one control command.
    pub async fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ForceCheck { reply } => {
                let report = self.run_pass().await;
                let _ = reply.send(report);
            }
            ControlCommand::ListRepos { reply } => {
                let _ = reply.send(self.repo_names());
            }
        }
    }
}
