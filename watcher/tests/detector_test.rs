//! Integration tests for the change-detection engine.
//!
//! These tests run the detector against a mocked GitHub API and verify the
//! classification, ordering, and cursor-advancement behavior end to end.

use std::time::Duration;

use chrono::{DateTime, Utc};
use octowatch_watcher::cursor::CursorStore;
use octowatch_watcher::detector::{ChangeDetector, DetectorPolicy};
use octowatch_watcher::github::GitHubClient;
use octowatch_watcher::types::{ChangeEvent, CursorTable, RepoRecord, Snapshot};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

fn date(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::new(server.uri(), "octocat", None, Duration::from_secs(2))
}

fn detector() -> ChangeDetector {
    ChangeDetector::new(CursorTable::new(), DetectorPolicy::default(), 4)
}

fn repo(name: &str, description: Option<&str>, created: &str, updated: &str) -> RepoRecord {
    RepoRecord {
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: date(created),
        updated_at: date(updated),
    }
}

fn snapshot(records: Vec<RepoRecord>) -> Snapshot {
    records.into_iter().map(|r| (r.name.clone(), r)).collect()
}

fn commit_json(sha: &str, date: &str) -> serde_json::Value {
    serde_json::json!({
        "sha": sha,
        "commit": { "author": { "name": "octocat", "date": date } }
    })
}

fn detail_json(sha: &str, date: &str, files: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "sha": sha,
        "commit": { "author": { "name": "octocat", "date": date } },
        "files": files.iter().map(|f| serde_json::json!({ "filename": f })).collect::<Vec<_>>()
    })
}

/// Mounts an empty commit list for a repository.
async fn mount_no_commits(server: &MockServer, repo: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/octocat/{repo}/commits")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(server)
        .await;
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn description_change_emits_exactly_one_event() {
    let server = MockServer::start().await;
    mount_no_commits(&server, "demo").await;

    let previous = snapshot(vec![repo(
        "demo",
        Some("x"),
        "2024-01-01T00:00:00Z",
        "2024-02-01T00:00:00Z",
    )]);
    let current = snapshot(vec![repo(
        "demo",
        Some("y"),
        "2024-01-01T00:00:00Z",
        "2024-02-02T00:00:00Z",
    )]);

    let mut detector = detector();
    let events = detector
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ChangeEvent::DescriptionUpdated { repo, description, .. }
        if repo == "demo" && description.as_deref() == Some("y")));
}

#[tokio::test]
async fn description_and_commits_both_fire_in_one_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            commit_json("c1", "2024-02-02T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(
            "c1",
            "2024-02-02T00:00:00Z",
            &["src/lib.rs"],
        )))
        .mount(&server)
        .await;

    let previous = snapshot(vec![repo(
        "demo",
        Some("x"),
        "2024-01-01T00:00:00Z",
        "2024-02-01T00:00:00Z",
    )]);
    let current = snapshot(vec![repo(
        "demo",
        Some("y"),
        "2024-01-01T00:00:00Z",
        "2024-02-02T00:00:00Z",
    )]);

    let mut detector = detector();
    let events = detector
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    // Independent checks: both the description and the commit are reported.
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ChangeEvent::DescriptionUpdated { .. }));
    assert!(matches!(&events[1], ChangeEvent::FileUpdated { files, .. }
        if files == &vec!["src/lib.rs".to_string()]));
}

#[tokio::test]
async fn creations_come_before_per_repository_events() {
    let server = MockServer::start().await;
    mount_no_commits(&server, "existing").await;

    let previous = snapshot(vec![repo(
        "existing",
        Some("x"),
        "2024-01-01T00:00:00Z",
        "2024-02-01T00:00:00Z",
    )]);
    let current = snapshot(vec![
        repo(
            "existing",
            Some("changed"),
            "2024-01-01T00:00:00Z",
            "2024-02-02T00:00:00Z",
        ),
        // Sorts before "existing" but must still be reported first as a
        // creation.
        repo(
            "brand-new",
            None,
            "2024-02-02T00:00:00Z",
            "2024-02-02T00:00:00Z",
        ),
    ]);

    let mut detector = detector();
    let events = detector
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ChangeEvent::RepositoryCreated { repo, timestamp }
        if repo == "brand-new" && *timestamp == date("2024-02-02T00:00:00Z")));
    assert!(matches!(&events[1], ChangeEvent::DescriptionUpdated { repo, .. }
        if repo == "existing"));
}

// =============================================================================
// Commit ordering and cursors
// =============================================================================

#[tokio::test]
async fn file_updates_are_emitted_in_ascending_date_order() {
    let server = MockServer::start().await;

    // The API answers newest-first; the detector must re-sort.
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            commit_json("c3", "2024-02-03T00:00:00Z"),
            commit_json("c2", "2024-02-02T00:00:00Z"),
            commit_json("c1", "2024-02-01T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    for (sha, when, file) in [
        ("c1", "2024-02-01T00:00:00Z", "one.rs"),
        ("c2", "2024-02-02T00:00:00Z", "two.rs"),
        ("c3", "2024-02-03T00:00:00Z", "three.rs"),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/repos/octocat/demo/commits/{sha}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(sha, when, &[file])))
            .mount(&server)
            .await;
    }

    let previous = snapshot(vec![repo(
        "demo",
        None,
        "2024-01-01T00:00:00Z",
        "2024-01-15T00:00:00Z",
    )]);
    let current = snapshot(vec![repo(
        "demo",
        None,
        "2024-01-01T00:00:00Z",
        "2024-02-03T00:00:00Z",
    )]);

    let mut table = CursorTable::new();
    table.insert("demo".to_string(), date("2024-01-15T00:00:00Z"));
    let mut detector = ChangeDetector::new(table, DetectorPolicy::default(), 4);

    let events = detector
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    let files: Vec<&str> = events
        .iter()
        .map(|e| match e {
            ChangeEvent::FileUpdated { files, .. } => files[0].as_str(),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(files, vec!["one.rs", "two.rs", "three.rs"]);

    // Cursor lands on the newest author date.
    assert_eq!(
        detector.cursors().get("demo"),
        Some(&date("2024-02-03T00:00:00Z"))
    );
}

#[tokio::test]
async fn noop_pass_emits_nothing_and_leaves_cursor_alone() {
    let server = MockServer::start().await;
    mount_no_commits(&server, "demo").await;

    let current = snapshot(vec![repo(
        "demo",
        Some("x"),
        "2024-01-01T00:00:00Z",
        "2024-02-01T00:00:00Z",
    )]);

    let mut table = CursorTable::new();
    table.insert("demo".to_string(), date("2024-02-01T00:00:00Z"));
    let mut detector = ChangeDetector::new(table.clone(), DetectorPolicy::default(), 4);

    let events = detector
        .detect(Some(&current), &current.clone(), &client_for(&server))
        .await;

    assert!(events.is_empty());
    assert_eq!(detector.cursors(), &table);
}

#[tokio::test]
async fn failed_detail_fetch_skips_only_that_commit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            commit_json("bad", "2024-02-01T00:00:00Z"),
            commit_json("good", "2024-02-02T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits/bad"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits/good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(
            "good",
            "2024-02-02T00:00:00Z",
            &["kept.rs"],
        )))
        .mount(&server)
        .await;

    let previous = snapshot(vec![repo(
        "demo",
        None,
        "2024-01-01T00:00:00Z",
        "2024-01-15T00:00:00Z",
    )]);
    let current = snapshot(vec![repo(
        "demo",
        None,
        "2024-01-01T00:00:00Z",
        "2024-02-02T00:00:00Z",
    )]);

    let mut detector = detector();
    let events = detector
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ChangeEvent::FileUpdated { files, .. }
        if files == &vec!["kept.rs".to_string()]));

    // The cursor still covers the skipped commit's window.
    assert_eq!(
        detector.cursors().get("demo"),
        Some(&date("2024-02-02T00:00:00Z"))
    );
}

#[tokio::test]
async fn identical_inputs_with_fixed_cursors_classify_identically() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            commit_json("c1", "2024-02-02T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(
            "c1",
            "2024-02-02T00:00:00Z",
            &["a.rs"],
        )))
        .mount(&server)
        .await;

    let previous = snapshot(vec![repo(
        "demo",
        Some("x"),
        "2024-01-01T00:00:00Z",
        "2024-01-15T00:00:00Z",
    )]);
    let current = snapshot(vec![repo(
        "demo",
        Some("y"),
        "2024-01-01T00:00:00Z",
        "2024-02-02T00:00:00Z",
    )]);

    let baseline = detector();

    // Run the same detection twice from clones so cursor state is held
    // fixed between runs.
    let mut first = baseline.clone();
    let mut second = baseline.clone();
    let events_first = first
        .detect(Some(&previous), &current, &client_for(&server))
        .await;
    let events_second = second
        .detect(Some(&previous), &current, &client_for(&server))
        .await;

    assert_eq!(events_first, events_second);
    assert_eq!(first.cursors(), second.cursors());
}

// =============================================================================
// First-run seeding
// =============================================================================

#[tokio::test]
async fn seeded_cursors_suppress_preexisting_history() {
    let server = MockServer::start().await;

    // History that predates (or coincides with) the seeded cursor.
    Mock::given(method("GET"))
        .and(path("/repos/octocat/demo/commits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            commit_json("old2", "2024-02-01T00:00:00Z"),
            commit_json("old1", "2024-01-20T00:00:00Z"),
        ])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = CursorStore::new(dir.path().join("cursors.json"));

    let updated = "2024-02-01T00:00:00Z";
    let current = snapshot(vec![repo("demo", None, "2024-01-01T00:00:00Z", updated)]);

    let mut table = store.load();
    assert!(table.is_empty());
    store.initialize_if_empty(&mut table, &current).unwrap();
    assert_eq!(table.get("demo"), Some(&date(updated)));

    let mut detector = ChangeDetector::new(table, DetectorPolicy::default(), 4);
    let events = detector
        .detect(Some(&current), &current.clone(), &client_for(&server))
        .await;

    // No spurious file updates for commits at or before the seed.
    assert!(events.is_empty());
}
