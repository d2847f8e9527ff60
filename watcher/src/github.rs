//! GitHub API client: repository snapshots and incremental commit fetching.
//!
//! Two fetch surfaces live here:
//!
//! - [`GitHubClient::fetch_repos`] reads the account's repository list. It is
//!   fail-soft: any transport error or non-success status is logged and
//!   yields an empty list, so a flaky API can never crash a pass.
//! - [`GitHubClient::commits_since`] / [`GitHubClient::files_for`] read
//!   commit history incrementally. The list endpoint does not inline touched
//!   files, so a second per-commit fetch resolves them; that amplification is
//!   the dominant cost driver and is bounded by only requesting commits
//!   strictly newer than the caller's cursor.
//!
//! The API base URL is injectable so tests can point the client at a mock
//! server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{CommitRecord, RepoRecord};

/// User agent sent with every request; the API rejects anonymous agents.
const USER_AGENT: &str = concat!("octowatch-watcher/", env!("CARGO_PKG_VERSION"));

/// Page size for list endpoints.
const PER_PAGE: u32 = 100;

/// Errors that can occur when talking to the GitHub API.
#[derive(Error, Debug)]
pub enum GitHubError {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("unexpected status {status} from {endpoint}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Endpoint path that produced it.
        endpoint: String,
    },
}

/// Commit-list and commit-detail wire shape (the fields we keep).
#[derive(Debug, Deserialize)]
struct CommitEnvelope {
    sha: String,
    commit: CommitMeta,
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    #[serde(default)]
    author: Option<CommitSignature>,
    #[serde(default)]
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
}

impl CommitEnvelope {
    /// Author date, falling back to the committer date when the author
    /// signature is absent.
    fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .or(self.commit.committer.as_ref())
            .map(|sig| sig.date)
    }

    fn into_record(self) -> Option<CommitRecord> {
        let author_date = self.date()?;
        Some(CommitRecord {
            author_date,
            files: self
                .files
                .map(|files| files.into_iter().map(|f| f.filename).collect()),
            sha: self.sha,
        })
    }
}

/// Client for the repository-list, commit-list, and commit-detail endpoints.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    user: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Creates a client for `user`'s repositories.
    ///
    /// Requests time out individually after `timeout`, so one slow endpoint
    /// cannot stall a whole detection pass.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            token,
        }
    }

    /// The account this client watches.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Fetches the current repository list.
    ///
    /// Fail-soft: transport errors and non-success statuses are logged and
    /// produce an empty list. Callers decide what an empty result means.
    pub async fn fetch_repos(&self) -> Vec<RepoRecord> {
        let endpoint = format!("{}/users/{}/repos", self.base_url, self.user);

        let request = self
            .authorized(self.client.get(&endpoint))
            .query(&[("per_page", PER_PAGE)]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Repository list fetch failed");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                endpoint = %endpoint,
                status = status.as_u16(),
                "Repository list fetch returned non-success status"
            );
            return Vec::new();
        }

        match response.json::<Vec<RepoRecord>>().await {
            Ok(repos) => {
                debug!(count = repos.len(), "Fetched repository list");
                repos
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Repository list failed to parse");
                Vec::new()
            }
        }
    }

    /// Fetches commits for `repo` strictly newer than `cursor`, ascending by
    /// author date.
    ///
    /// The cursor is also passed as the `since` filter to bound the response;
    /// commits at exactly the cursor are filtered out client-side so history
    /// is never replayed.
    ///
    /// # Errors
    ///
    /// Returns a `GitHubError` on transport failure or non-success status.
    pub async fn commits_since(
        &self,
        repo: &str,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>, GitHubError> {
        let endpoint = format!("{}/repos/{}/{}/commits", self.base_url, self.user, repo);

        let mut request = self
            .authorized(self.client.get(&endpoint))
            .query(&[("per_page", PER_PAGE)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("since", cursor.to_rfc3339())]);
        }

        let response = request.send().await?;
        let status = response.status();

        // An empty repository answers 409; treat it as no commits.
        if status == StatusCode::CONFLICT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(GitHubError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        let envelopes = response.json::<Vec<CommitEnvelope>>().await?;

        let mut commits: Vec<CommitRecord> = envelopes
            .into_iter()
            .filter_map(CommitEnvelope::into_record)
            .filter(|c| cursor.is_none_or(|cut| c.author_date > cut))
            .collect();
        commits.sort_by_key(|c| c.author_date);

        debug!(repo = %repo, count = commits.len(), "Fetched commits since cursor");
        Ok(commits)
    }

    /// Fetches the ordered file list touched by one commit.
    ///
    /// # Errors
    ///
    /// Returns a `GitHubError` on transport failure or non-success status.
    pub async fn files_for(&self, repo: &str, sha: &str) -> Result<Vec<String>, GitHubError> {
        let endpoint = format!(
            "{}/repos/{}/{}/commits/{}",
            self.base_url, self.user, repo, sha
        );

        let response = self.authorized(self.client.get(&endpoint)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GitHubError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        let envelope = response.json::<CommitEnvelope>().await?;
        Ok(envelope
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.filename)
            .collect())
    }

    /// Attaches the token header when one is configured.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("token {token}")) {
                    headers.insert(AUTHORIZATION, value);
                }
                request.headers(headers)
            }
            None => request,
        }
    }
}
