//! Webhook notifier: renders change events and delivers them to a channel.
//!
//! Rendering is driven entirely by the event kind: each kind gets its own
//! embed title, color, and field layout. Delivery posts the embed to a
//! Discord-compatible webhook URL and retries transient failures (connect
//! errors, timeouts, 5xx, 429 with `Retry-After`) with exponential backoff
//! and jitter. A delivery that still fails after all attempts returns an
//! error for the caller to log; it never takes the pass down with it.

use std::time::Duration;

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::types::{display_description, ChangeEvent};

/// Embed color for repository creations (green).
const COLOR_CREATED: u32 = 0x2ECC71;

/// Embed color for description updates (amber).
const COLOR_DESCRIPTION: u32 = 0xF1C40F;

/// Embed color for file updates (blue).
const COLOR_FILES: u32 = 0x3498DB;

/// Embed color for general updates (grey).
const COLOR_GENERAL: u32 = 0x95A5A6;

/// Footer text attached to every notification.
const FOOTER_TEXT: &str = "GitHub Activity Monitor";

/// Clock format used inside field values.
const TIME_FORMAT: &str = "%I:%M %p";

/// Maximum delivery attempts per event.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Initial retry delay in seconds.
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

/// Jitter factor applied to retry delays (±25%).
const JITTER_FACTOR: f64 = 0.25;

/// HTTP request timeout for webhook deliveries.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur while delivering a notification.
#[derive(Error, Debug)]
pub enum NotifierError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-retryable error status.
    #[error("webhook rejected delivery: {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// Maximum delivery attempts exceeded.
    #[error("delivery failed after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

/// One field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Embed footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// A single webhook embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

/// The webhook request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub embeds: Vec<Embed>,
}

/// Renders a change event into a webhook message.
#[must_use]
pub fn render(event: &ChangeEvent) -> WebhookMessage {
    let time = event.timestamp().format(TIME_FORMAT).to_string();

    let (color, fields) = match event {
        ChangeEvent::RepositoryCreated { repo, .. } => (
            COLOR_CREATED,
            vec![
                repo_field(repo, event.kind_label()),
                field("Time", time),
            ],
        ),
        ChangeEvent::DescriptionUpdated {
            repo, description, ..
        } => (
            COLOR_DESCRIPTION,
            vec![
                repo_field(repo, event.kind_label()),
                field(
                    "Description",
                    format!("**{}** | {time}", display_description(description.as_deref())),
                ),
            ],
        ),
        ChangeEvent::FileUpdated { repo, files, .. } => (
            COLOR_FILES,
            vec![
                repo_field(repo, event.kind_label()),
                field(
                    "Files Changed",
                    format!("**{}** | {time}", files.join(", ")),
                ),
            ],
        ),
        ChangeEvent::GeneralUpdated { repo, .. } => (
            COLOR_GENERAL,
            vec![
                repo_field(repo, event.kind_label()),
                field("Time", time),
            ],
        ),
    };

    WebhookMessage {
        embeds: vec![Embed {
            title: event.kind_label().to_string(),
            color,
            fields,
            footer: EmbedFooter {
                text: FOOTER_TEXT.to_string(),
            },
            timestamp: event.timestamp().to_rfc3339(),
        }],
    }
}

fn repo_field(repo: &str, kind: &str) -> EmbedField {
    field("Repository", format!("**{repo}** | **{kind}**"))
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline: false,
    }
}

/// Delivers rendered events to a webhook URL.
pub struct Notifier {
    client: Client,
}

impl Notifier {
    /// Creates a notifier with its own pooled HTTP client.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to create HTTP client");

        Self { client }
    }

    /// Renders `event` and posts it to `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns `NotifierError` when the webhook rejects the delivery or all
    /// retry attempts are exhausted.
    pub async fn send(&self, webhook_url: &str, event: &ChangeEvent) -> Result<(), NotifierError> {
        let message = render(event);
        let mut delay = Duration::from_secs(INITIAL_RETRY_DELAY_SECS);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = self.client.post(webhook_url).json(&message).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(repo = event.repo(), kind = event.kind_label(), "Notification sent");
                        return Ok(());
                    }

                    match status {
                        StatusCode::TOO_MANY_REQUESTS => {
                            let retry_after = response
                                .headers()
                                .get(RETRY_AFTER)
                                .and_then(|v| v.to_str().ok())
                                .and_then(|s| s.parse::<u64>().ok())
                                .map_or(delay, Duration::from_secs);
                            warn!(
                                retry_after_secs = retry_after.as_secs(),
                                "Webhook rate limited"
                            );

                            if attempts >= MAX_DELIVERY_ATTEMPTS {
                                return Err(NotifierError::MaxRetriesExceeded { attempts });
                            }
                            sleep(retry_after).await;
                        }
                        _ if status.is_server_error() => {
                            warn!(status = status.as_u16(), "Webhook server error, will retry");

                            if attempts >= MAX_DELIVERY_ATTEMPTS {
                                return Err(NotifierError::MaxRetriesExceeded { attempts });
                            }
                            sleep(with_jitter(delay)).await;
                            delay *= 2;
                        }
                        _ => {
                            return Err(NotifierError::Rejected {
                                status: status.as_u16(),
                            });
                        }
                    }
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempts < MAX_DELIVERY_ATTEMPTS {
                        warn!(error = %e, "Webhook connection error, will retry");
                        sleep(with_jitter(delay)).await;
                        delay *= 2;
                        continue;
                    }
                    return Err(NotifierError::Http(e));
                }
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Adds ±25% jitter to a duration.
fn with_jitter(duration: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_range = duration.as_secs_f64() * JITTER_FACTOR;
    let jitter = rng.random_range(-jitter_range..=jitter_range);
    Duration::from_secs_f64((duration.as_secs_f64() + jitter).max(0.1))
}
