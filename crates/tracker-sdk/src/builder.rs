//! Builder pattern for constructing a [`SessionConfig`].

use std::time::Duration;

use at_domain::config::TrackerConfig;

use crate::reconnect::ReconnectPolicy;
use crate::session::SessionConfig;
use crate::types::TrackerError;

/// Fluent builder for [`SessionConfig`].
///
/// # Example
///
/// ```rust,no_run
/// # use at_tracker_sdk::SessionBuilder;
/// # async fn run() {
/// let session = SessionBuilder::new()
///     .host("localhost")
///     .port(23074)
///     .selection(["deaths", "bonks"])
///     .build()
///     .unwrap()
///     .spawn();
/// session.controller.start().unwrap();
/// # }
/// ```
pub struct SessionBuilder {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) app_name: Option<String>,
    pub(crate) selection: Vec<String>,
    pub(crate) poll_interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) stagger: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) reconnect: ReconnectPolicy,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            host: "localhost".into(),
            port: 23074,
            app_name: None,
            selection: Vec::new(),
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_millis(5000),
            stagger: Duration::from_millis(10),
            settle_delay: Duration::from_millis(500),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Seed every field from a loaded [`TrackerConfig`].
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            host: config.connection.host.clone(),
            port: config.connection.port,
            app_name: config.connection.app_name.clone(),
            selection: config.stats.selected.clone(),
            poll_interval: config.polling.interval(),
            timeout: config.polling.timeout(),
            stagger: config.polling.stagger(),
            settle_delay: config.polling.settle(),
            reconnect: ReconnectPolicy {
                close_delay: config.polling.reconnect_delay(),
            },
        }
    }

    // ── Target ───────────────────────────────────────────────────────

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Announce this name to the server after connecting.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Optional stats to poll alongside the mandatory ones.
    pub fn selection<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = keys.into_iter().map(Into::into).collect();
        self
    }

    // ── Timing ───────────────────────────────────────────────────────

    /// Poll cadence (default 500ms).
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Handshake and polling watchdog timeout (default 5s).
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Gap between consecutive reads of one cycle (default 10ms).
    pub fn stagger(mut self, d: Duration) -> Self {
        self.stagger = d;
        self
    }

    /// Delay between attach and the first poll cycle (default 500ms).
    pub fn settle_delay(mut self, d: Duration) -> Self {
        self.settle_delay = d;
        self
    }

    /// Backoff after an unexpected close (default 2s).
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect = ReconnectPolicy { close_delay: d };
        self
    }

    /// Build the [`SessionConfig`].
    pub fn build(self) -> Result<SessionConfig, TrackerError> {
        if self.host.trim().is_empty() {
            return Err(TrackerError::Config("host is required".into()));
        }
        if self.port == 0 {
            return Err(TrackerError::Config("port must be greater than 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(TrackerError::Config("poll interval must be greater than 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(TrackerError::Config("timeout must be greater than 0".into()));
        }

        Ok(SessionConfig {
            host: self.host,
            port: self.port,
            app_name: self.app_name,
            selection: self.selection,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
            stagger: self.stagger,
            settle_delay: self.settle_delay,
            reconnect: self.reconnect,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
