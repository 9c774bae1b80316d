//! Configuration settings for the user data stream client.

use std::time::Duration;

use crate::infrastructure::stream::HeartbeatConfig;

/// Production user data stream base URL.
pub const PRODUCTION_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Testnet user data stream base URL.
pub const TESTNET_WS_URL: &str = "wss://stream.binancefuture.com/ws";

/// Default deadline for a request's correlated response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchange environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production exchange.
    #[default]
    Production,
    /// Futures testnet.
    Testnet,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TESTNET" => Self::Testnet,
            _ => Self::Production,
        }
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Testnet => "testnet",
        }
    }

    /// Default user data stream base URL for this environment.
    #[must_use]
    pub const fn ws_base_url(&self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_WS_URL,
            Self::Testnet => TESTNET_WS_URL,
        }
    }
}

/// User data stream client configuration.
#[derive(Clone)]
pub struct StreamConfig {
    listen_key: String,
    api_key: Option<String>,
    environment: Environment,
    ws_base_url: String,
    keep_alive: bool,
    heartbeat: HeartbeatConfig,
    request_timeout: Duration,
}

impl StreamConfig {
    /// Create a production configuration for a listen key.
    #[must_use]
    pub fn new(listen_key: impl Into<String>) -> Self {
        Self {
            listen_key: listen_key.into(),
            api_key: None,
            environment: Environment::Production,
            ws_base_url: PRODUCTION_WS_URL.to_string(),
            keep_alive: true,
            heartbeat: HeartbeatConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Switch environment, resetting the base URL to that environment's default.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self.ws_base_url = environment.ws_base_url().to_string();
        self
    }

    /// Override the WebSocket base URL.
    #[must_use]
    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into();
        self
    }

    /// Set the API key carried for REST calls.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Enable or disable the liveness monitor.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set ping interval and pong timeout.
    #[must_use]
    pub const fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Set the per-request response deadline.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `USER_STREAM_LISTEN_KEY` is missing or empty, or
    /// if any `*_SECS` duration is set to zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_key = lookup("USER_STREAM_LISTEN_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("USER_STREAM_LISTEN_KEY".to_string()))?;
        if listen_key.is_empty() {
            return Err(ConfigError::EmptyValue(
                "USER_STREAM_LISTEN_KEY".to_string(),
            ));
        }

        let environment = lookup("USER_STREAM_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let mut config = Self::new(listen_key).with_environment(environment);

        if let Some(api_key) = lookup("USER_STREAM_API_KEY").filter(|k| !k.is_empty()) {
            config = config.with_api_key(api_key);
        }
        if let Some(url) = lookup("USER_STREAM_WS_URL").filter(|u| !u.is_empty()) {
            config = config.with_ws_base_url(url);
        }

        let defaults = HeartbeatConfig::default();
        let heartbeat = HeartbeatConfig::new(
            parse_duration_secs(&lookup, "USER_STREAM_PING_INTERVAL_SECS", defaults.ping_interval)?,
            parse_duration_secs(&lookup, "USER_STREAM_PONG_TIMEOUT_SECS", defaults.pong_timeout)?,
        );

        Ok(config
            .with_keep_alive(parse_bool(&lookup, "USER_STREAM_KEEP_ALIVE", true))
            .with_heartbeat(heartbeat)
            .with_request_timeout(parse_duration_secs(
                &lookup,
                "USER_STREAM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )?))
    }

    /// Listen key identifying the user data stream.
    #[must_use]
    pub fn listen_key(&self) -> &str {
        &self.listen_key
    }

    /// API key, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Exchange environment.
    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    /// WebSocket base URL; the listen key is appended as a path segment.
    #[must_use]
    pub fn ws_base_url(&self) -> &str {
        &self.ws_base_url
    }

    /// Whether the liveness monitor runs.
    #[must_use]
    pub const fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Heartbeat settings.
    #[must_use]
    pub const fn heartbeat(&self) -> &HeartbeatConfig {
        &self.heartbeat
    }

    /// Per-request response deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("listen_key", &"[REDACTED]")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("ws_base_url", &self.ws_base_url)
            .field("keep_alive", &self.keep_alive)
            .field("heartbeat", &self.heartbeat)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set to a value that cannot be used.
    #[error("environment variable {key} is invalid: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Unparsable values fall back to `default`; zero is rejected.
fn parse_duration_secs<F>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).and_then(|v| v.parse::<u64>().ok()) {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be at least 1 second",
        }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}
