// Client configuration: defaults, TOML loading, env overrides, validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::api::ResponseEnvelope;
use crate::chat::DEFAULT_TYPING_IDLE;
use crate::connection::PushConfig;

/// Environment variable that overrides [`ClientConfig::api_url`].
pub const API_URL_ENV: &str = "LIVE_MATCH_API_URL";

/// Environment variable that overrides [`ClientConfig::push_url`].
pub const PUSH_URL_ENV: &str = "LIVE_MATCH_PUSH_URL";

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_PUSH_URL: &str = "http://localhost:3000";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Path used in parse errors for configuration that did not come from a file.
const INLINE_SOURCE: &str = "<inline>";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

/// Chat tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Idle time after the last keystroke before `typing_stop` is sent.
    pub typing_idle: Duration,
    /// Where the display name and anonymous user id are persisted.
    /// `None` keeps them in memory only.
    pub identity_path: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_idle: DEFAULT_TYPING_IDLE,
            identity_path: None,
        }
    }
}

/// Everything needed to reach the match service.
///
/// # Example
///
/// ```
/// use live_match_client::config::ClientConfig;
///
/// let config = ClientConfig::from_toml_str(r#"
///     api_url = "https://scores.example.com/api"
///     push_url = "https://scores.example.com"
///     envelope = "wrapped"
///
///     [push]
///     reconnection_attempts = 3
/// "#).unwrap();
///
/// assert_eq!(config.push.reconnection_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the read-only HTTP API.
    pub api_url: String,
    /// Base URL of the push server. `http`/`https` are mapped to `ws`/`wss`.
    pub push_url: String,
    /// Response shape of the HTTP API.
    pub envelope: ResponseEnvelope,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub push: PushConfig,
    pub chat: ChatConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            push_url: DEFAULT_PUSH_URL.to_string(),
            envelope: ResponseEnvelope::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            push: PushConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the two service URLs replaced.
    pub fn new(api_url: impl Into<String>, push_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            push_url: push_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_envelope(mut self, envelope: ResponseEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_push(mut self, push: PushConfig) -> Self {
        self.push = push;
        self
    }

    #[must_use]
    pub fn with_typing_idle(mut self, idle: Duration) -> Self {
        self.chat.typing_idle = idle;
        self
    }

    #[must_use]
    pub fn with_identity_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chat.identity_path = Some(path.into());
        self
    }

    /// Parse and validate TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        parse(text, Path::new(INLINE_SOURCE))
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_file(path)?;
        parse(&text, path)
    }

    /// Replace the service URLs with `LIVE_MATCH_API_URL` / `LIVE_MATCH_PUSH_URL`
    /// when set, then re-validate.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Like [`apply_env_overrides`](Self::apply_env_overrides) with a custom lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(url) = lookup(PUSH_URL_ENV) {
            self.push_url = url;
        }
        self.validate()
    }

    /// Check URLs and numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("api_url", &self.api_url)?;
        validate_url("push_url", &self.push_url)?;

        let durations: &[(&str, Duration)] = &[
            ("request_timeout_ms", self.request_timeout),
            ("push.handshake_timeout_ms", self.push.handshake_timeout),
            ("push.shutdown_timeout_ms", self.push.shutdown_timeout),
            ("chat.typing_idle_ms", self.chat.typing_idle),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ValidationError {
                    field: (*name).to_string(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if self.push.event_channel_capacity == 0 {
            return Err(ConfigError::ValidationError {
                field: "push.event_channel_capacity".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TOML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    push_url: Option<String>,
    envelope: Option<ResponseEnvelope>,
    request_timeout_ms: Option<u64>,
    push: PushSection,
    chat: ChatSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PushSection {
    reconnection: Option<bool>,
    reconnection_attempts: Option<u32>,
    reconnection_delay_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    event_channel_capacity: Option<usize>,
    shutdown_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ChatSection {
    typing_idle_ms: Option<u64>,
    identity_path: Option<PathBuf>,
}

impl ConfigFile {
    fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::default();

        if let Some(url) = self.api_url {
            config.api_url = url;
        }
        if let Some(url) = self.push_url {
            config.push_url = url;
        }
        if let Some(envelope) = self.envelope {
            config.envelope = envelope;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }

        let push = &mut config.push;
        if let Some(enabled) = self.push.reconnection {
            push.reconnection = enabled;
        }
        if let Some(attempts) = self.push.reconnection_attempts {
            push.reconnection_attempts = attempts;
        }
        if let Some(ms) = self.push.reconnection_delay_ms {
            push.reconnection_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.push.handshake_timeout_ms {
            push.handshake_timeout = Duration::from_millis(ms);
        }
        // Not clamped here so that validation can reject 0.
        if let Some(capacity) = self.push.event_channel_capacity {
            push.event_channel_capacity = capacity;
        }
        if let Some(ms) = self.push.shutdown_timeout_ms {
            push.shutdown_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = self.chat.typing_idle_ms {
            config.chat.typing_idle = Duration::from_millis(ms);
        }
        if self.chat.identity_path.is_some() {
            config.chat.identity_path = self.chat.identity_path;
        }

        config
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse(text: &str, path: &Path) -> Result<ClientConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config = file.into_config();
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
    let url = Url::parse(value).map_err(|e| ConfigError::ValidationError {
        field: field.into(),
        message: format!("not a valid URL: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(ConfigError::ValidationError {
            field: field.into(),
            message: format!("unsupported scheme `{other}`"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.chat.typing_idle, Duration::from_millis(2000));
        assert_eq!(config.envelope, ResponseEnvelope::Bare);
    }

    #[test]
    fn full_document_overrides_every_section() {
        let text = r#"
            api_url = "https://scores.example.com/api"
            push_url = "wss://scores.example.com"
            envelope = "wrapped"
            request_timeout_ms = 2500

            [push]
            reconnection = false
            reconnection_attempts = 2
            reconnection_delay_ms = 250
            handshake_timeout_ms = 3000
            event_channel_capacity = 16
            shutdown_timeout_ms = 500

            [chat]
            typing_idle_ms = 1500
            identity_path = "/tmp/identity.json"
        "#;
        let config = ClientConfig::from_toml_str(text).unwrap();

        assert_eq!(config.api_url, "https://scores.example.com/api");
        assert_eq!(config.push_url, "wss://scores.example.com");
        assert_eq!(config.envelope, ResponseEnvelope::Wrapped);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert!(!config.push.reconnection);
        assert_eq!(config.push.reconnection_attempts, 2);
        assert_eq!(config.push.reconnection_delay, Duration::from_millis(250));
        assert_eq!(config.push.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.push.event_channel_capacity, 16);
        assert_eq!(config.push.shutdown_timeout, Duration::from_millis(500));
        assert_eq!(config.chat.typing_idle, Duration::from_millis(1500));
        assert_eq!(
            config.chat.identity_path,
            Some(PathBuf::from("/tmp/identity.json"))
        );
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let err = ClientConfig::from_toml_str("colour = \"green\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ClientConfig::from_toml_str("[push]\nevent_channel_capacity = 0").unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "push.event_channel_capacity");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn bad_url_is_rejected() {
        let err = ClientConfig::from_toml_str("api_url = \"not a url\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "api_url"));

        let err = ClientConfig::from_toml_str("push_url = \"ftp://host\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "push_url"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::load("/definitely/not/here.toml").unwrap_err();
        match err {
            ConfigError::FileNotFound { path } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.toml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_urls() {
        let vars: HashMap<&str, &str> = [
            (API_URL_ENV, "https://api.example.com"),
            (PUSH_URL_ENV, "https://push.example.com"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.push_url, "https://push.example.com");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut config = ClientConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == API_URL_ENV).then(String::new)
        });
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn builder_methods() {
        let config = ClientConfig::new("https://a.example", "https://b.example")
            .with_envelope(ResponseEnvelope::Wrapped)
            .with_request_timeout(Duration::from_secs(3))
            .with_typing_idle(Duration::from_millis(900))
            .with_identity_path("id.json");

        assert_eq!(config.api_url, "https://a.example");
        assert_eq!(config.envelope, ResponseEnvelope::Wrapped);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.chat.typing_idle, Duration::from_millis(900));
        assert_eq!(config.chat.identity_path, Some(PathBuf::from("id.json")));
        assert!(config.validate().is_ok());
    }
}
