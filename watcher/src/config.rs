//! Configuration module for the Octowatch Watcher.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `OCTOWATCH_GITHUB_USER` | Yes | - | Account whose repositories are watched |
//! | `OCTOWATCH_GITHUB_TOKEN` | No | - | Token attached to API requests |
//! | `OCTOWATCH_WEBHOOK_URL` | No | - | Initial destination webhook |
//! | `OCTOWATCH_INTERVAL_SECS` | No | 3600 | Poll interval (minimum 60) |
//! | `OCTOWATCH_CURSOR_PATH` | No | `~/.octowatch/cursors.json` | Cursor table location |
//! | `OCTOWATCH_CONTROL_ADDR` | No | `127.0.0.1:8787` | Control API bind address |
//! | `OCTOWATCH_MAX_CONCURRENT_FETCHES` | No | 4 | Commit fetch fan-out cap |
//! | `OCTOWATCH_REQUEST_TIMEOUT_SECS` | No | 10 | Per-call HTTP timeout |
//! | `OCTOWATCH_GENERAL_UPDATE_FALLBACK` | No | true | Emit fallback events on unattributed activity |
//! | `OCTOWATCH_GITHUB_API_URL` | No | `https://api.github.com` | API base override |
//!
//! # Example
//!
//! ```no_run
//! use octowatch_watcher::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching account: {}", config.github_user);
//! ```

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Default poll interval in seconds (one hour).
const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Minimum accepted poll interval in seconds.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Default cursor directory name relative to home.
const DEFAULT_CURSOR_DIR: &str = ".octowatch";

/// Default cursor file name.
const DEFAULT_CURSOR_FILE: &str = "cursors.json";

/// Default control API bind address.
const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:8787";

/// Default cap on concurrent commit and detail fetches.
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default GitHub API base URL.
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Octowatch Watcher.
#[derive(Debug, Clone)]
pub struct Config {
    /// GitHub account whose repositories are polled.
    pub github_user: String,

    /// Optional API token; requests go out unauthenticated without it.
    pub github_token: Option<String>,

    /// Initial destination webhook URL, changeable at runtime.
    pub webhook_url: Option<String>,

    /// Seconds between detection passes.
    pub interval_secs: u64,

    /// Path of the persisted cursor table.
    pub cursor_path: PathBuf,

    /// Bind address for the control API.
    pub control_addr: SocketAddr,

    /// Cap on concurrent commit-list and commit-detail fetches.
    pub max_concurrent_fetches: usize,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Whether unattributed repository activity emits a fallback event.
    pub general_update_fallback: bool,

    /// GitHub API base URL.
    pub github_api_url: String,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `OCTOWATCH_GITHUB_USER` is not set
    /// - A numeric variable cannot be parsed or is out of range
    /// - The home directory cannot be determined (needed for the default
    ///   cursor path)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Required: OCTOWATCH_GITHUB_USER
        let github_user = env::var("OCTOWATCH_GITHUB_USER")
            .map_err(|_| ConfigError::MissingEnvVar("OCTOWATCH_GITHUB_USER".to_string()))?;

        // Optional: OCTOWATCH_GITHUB_TOKEN
        let github_token = env::var("OCTOWATCH_GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        // Optional: OCTOWATCH_WEBHOOK_URL
        let webhook_url = env::var("OCTOWATCH_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        // Optional: OCTOWATCH_INTERVAL_SECS (default: 3600, minimum: 60)
        let interval_secs = match env::var("OCTOWATCH_INTERVAL_SECS") {
            Ok(val) => {
                let secs = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "OCTOWATCH_INTERVAL_SECS".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if secs < MIN_INTERVAL_SECS {
                    return Err(ConfigError::InvalidValue {
                        key: "OCTOWATCH_INTERVAL_SECS".to_string(),
                        message: format!(
                            "interval must be at least {MIN_INTERVAL_SECS} seconds, got {secs}"
                        ),
                    });
                }
                secs
            }
            Err(_) => DEFAULT_INTERVAL_SECS,
        };

        // Optional: OCTOWATCH_CURSOR_PATH (default: ~/.octowatch/cursors.json)
        let cursor_path = match env::var("OCTOWATCH_CURSOR_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs
                    .home_dir()
                    .join(DEFAULT_CURSOR_DIR)
                    .join(DEFAULT_CURSOR_FILE)
            }
        };

        // Optional: OCTOWATCH_CONTROL_ADDR (default: 127.0.0.1:8787)
        let control_addr = env::var("OCTOWATCH_CONTROL_ADDR")
            .unwrap_or_else(|_| DEFAULT_CONTROL_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "OCTOWATCH_CONTROL_ADDR".to_string(),
                message: format!("expected host:port, {e}"),
            })?;

        // Optional: OCTOWATCH_MAX_CONCURRENT_FETCHES (default: 4, must be > 0)
        let max_concurrent_fetches = match env::var("OCTOWATCH_MAX_CONCURRENT_FETCHES") {
            Ok(val) => {
                let cap = val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                    key: "OCTOWATCH_MAX_CONCURRENT_FETCHES".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if cap == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "OCTOWATCH_MAX_CONCURRENT_FETCHES".to_string(),
                        message: "fetch concurrency must be greater than 0".to_string(),
                    });
                }
                cap
            }
            Err(_) => DEFAULT_MAX_CONCURRENT_FETCHES,
        };

        // Optional: OCTOWATCH_REQUEST_TIMEOUT_SECS (default: 10, must be > 0)
        let request_timeout_secs = match env::var("OCTOWATCH_REQUEST_TIMEOUT_SECS") {
            Ok(val) => {
                let secs = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "OCTOWATCH_REQUEST_TIMEOUT_SECS".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "OCTOWATCH_REQUEST_TIMEOUT_SECS".to_string(),
                        message: "request timeout must be at least 1 second".to_string(),
                    });
                }
                secs
            }
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        // Optional: OCTOWATCH_GENERAL_UPDATE_FALLBACK (default: true)
        let general_update_fallback = match env::var("OCTOWATCH_GENERAL_UPDATE_FALLBACK") {
            Ok(val) => match val.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "OCTOWATCH_GENERAL_UPDATE_FALLBACK".to_string(),
                        message: format!("expected true or false, got '{val}'"),
                    })
                }
            },
            Err(_) => true,
        };

        // Optional: OCTOWATCH_GITHUB_API_URL (default: https://api.github.com)
        let github_api_url = env::var("OCTOWATCH_GITHUB_API_URL")
            .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            github_user,
            github_token,
            webhook_url,
            interval_secs,
            cursor_path,
            control_addr,
            max_concurrent_fetches,
            request_timeout_secs,
            general_update_fallback,
            github_api_url,
        })
    }
}
