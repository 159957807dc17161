//! Client configuration.
//!
//! The backend base URL is resolved once at startup (environment or CLI); there is
//! no runtime reconfiguration.
use std::env;
use std::time::Duration;

use quote_common::net::DEFAULT_BASE_URL;
use quote_common::{QuoteError, Result};
use url::Url;

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "QUOTE_API_URL";
/// Fallback variable name, checked when `QUOTE_API_URL` is unset.
pub const API_URL_FALLBACK_ENV: &str = "API_URL";

/// Interval of the liveness probe that polls while no healthy socket is open.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(3);
/// Timeout for pull requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a blocked socket read waits before checking for cancellation.
pub const DEFAULT_WS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Backoff for reopening the push connection after it failed or closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// When `false`, only a wanted-set change reopens the socket.
    pub enabled: bool,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the doubling delay.
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Policy that never schedules a retry on its own.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay that follows `current` after another failed attempt.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Settings for a `QuoteClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the market-data backend (`http` or `https`).
    pub base_url: Url,
    /// Liveness probe interval.
    pub probe_interval: Duration,
    /// Timeout applied to every pull request.
    pub http_timeout: Duration,
    /// Read timeout of the streaming socket, bounding how late a superseded
    /// connection notices it was cancelled.
    pub ws_poll_interval: Duration,
    /// Push reconnection backoff.
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Builds a config for `base_url` with default timings.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(QuoteError::Config(format!(
                    "base URL must be http or https, got {}",
                    other
                )));
            }
        }
        Ok(Self {
            base_url,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            ws_poll_interval: DEFAULT_WS_POLL_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Resolves the base URL from `QUOTE_API_URL`, then `API_URL`, then the default.
    pub fn from_env() -> Result<Self> {
        let base = env::var(API_URL_ENV)
            .or_else(|_| env::var(API_URL_FALLBACK_ENV))
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(base.as_deref().unwrap_or(DEFAULT_BASE_URL))
    }

    /// Overrides the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Overrides the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
