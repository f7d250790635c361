//! Configuration loading, validation, and management for feedreply.
//!
//! Loads configuration from `~/.feedreply/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Scenario names understood by the prompt builder.
pub const KNOWN_SCENARIOS: [&str; 4] = ["interview", "social", "business", "general"];

/// The root configuration structure.
///
/// Maps directly to `~/.feedreply/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider ("openai", "backend", or any configured name)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for text replies
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per text reply
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Reply generation settings
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Loop cadence, filters and set capacities
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Feed adapter settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// HTTP front-end configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    150
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("reply", &self.reply)
            .field("monitor", &self.monitor)
            .field("feed", &self.feed)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("verify_token", &redact(&self.verify_token))
            .field("app_secret", &redact(&self.app_secret))
            .field("backend_url", &self.backend_url)
            .field("backend_timeout_secs", &self.backend_timeout_secs)
            .field("suggest_max_tokens", &self.suggest_max_tokens)
            .finish()
    }
}

/// How replies are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Consume the generation service as a token stream
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Echo streamed fragments to the terminal while they arrive
    #[serde(default)]
    pub echo_stream: bool,

    /// One of `interview`, `social`, `business`, `general`
    #[serde(default = "default_scenario")]
    pub scenario: String,

    /// Free-form description of the user, appended to the instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_background: Option<String>,

    /// What the user wants out of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_goal: Option<String>,

    /// Model for image entries (falls back to the default model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,

    #[serde(default = "default_vision_temperature")]
    pub vision_temperature: f32,

    #[serde(default = "default_vision_max_tokens")]
    pub vision_max_tokens: u32,
}

fn default_scenario() -> String {
    "general".into()
}
fn default_vision_temperature() -> f32 {
    0.3
}
fn default_vision_max_tokens() -> u32 {
    300
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            stream: true,
            echo_stream: false,
            scenario: default_scenario(),
            user_background: None,
            conversation_goal: None,
            vision_model: None,
            vision_temperature: default_vision_temperature(),
            vision_max_tokens: default_vision_max_tokens(),
        }
    }
}

/// Loop cadence, content filters and dedup capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Fixed wait after a failed iteration
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Entries longer than this (in characters) are ignored
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Case-insensitive markers of platform system events
    #[serde(default = "default_system_keywords")]
    pub system_keywords: Vec<String>,

    #[serde(default = "default_processed_capacity")]
    pub processed_capacity: usize,

    #[serde(default = "default_own_output_capacity")]
    pub own_output_capacity: usize,

    /// Skip the self-echo check (single-account testing)
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_adapter_timeout_secs")]
    pub adapter_timeout_secs: u64,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,

    /// Horizontal boundary between peer (left) and own (right) bubbles
    #[serde(default = "default_sender_split_x")]
    pub sender_split_x: f64,
}

fn default_poll_interval_ms() -> u64 {
    3000
}
fn default_error_backoff_ms() -> u64 {
    3000
}
fn default_max_text_len() -> usize {
    500
}
fn default_system_keywords() -> Vec<String> {
    ["created", "removed", "added", "left", "joined", "changed", "renamed"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_processed_capacity() -> usize {
    50
}
fn default_own_output_capacity() -> usize {
    100
}
fn default_adapter_timeout_secs() -> u64 {
    15
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_delivery_timeout_secs() -> u64 {
    30
}
fn default_sender_split_x() -> f64 {
    500.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            max_text_len: default_max_text_len(),
            system_keywords: default_system_keywords(),
            processed_capacity: default_processed_capacity(),
            own_output_capacity: default_own_output_capacity(),
            test_mode: false,
            adapter_timeout_secs: default_adapter_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            sender_split_x: default_sender_split_x(),
        }
    }
}

/// Feed adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// "chromium" or "console"
    #[serde(default = "default_feed_kind")]
    pub kind: String,

    #[serde(default = "default_url")]
    pub default_url: String,

    #[serde(default = "default_message_selector")]
    pub message_selector: String,

    #[serde(default = "default_input_selector")]
    pub input_selector: String,

    #[serde(default)]
    pub headless: bool,

    /// Cookie file; relative paths resolve against the config directory
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Landing-URL fragments that mean the session is not authenticated
    #[serde(default = "default_login_markers")]
    pub login_markers: Vec<String>,

    /// Wait after navigation before the first read
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Pause after each delivered segment
    #[serde(default = "default_segment_delay_ms")]
    pub segment_delay_ms: u64,

    #[serde(default = "default_cookie_domains")]
    pub cookie_domains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
}

fn default_feed_kind() -> String {
    "chromium".into()
}
fn default_url() -> String {
    "https://www.messenger.com/".into()
}
fn default_message_selector() -> String {
    r#"div[dir="auto"]"#.into()
}
fn default_input_selector() -> String {
    r#"div[contenteditable="true"]"#.into()
}
fn default_session_file() -> String {
    "messenger_auth.json".into()
}
fn default_login_markers() -> Vec<String> {
    vec!["login".into(), "checkpoint".into()]
}
fn default_settle_secs() -> u64 {
    5
}
fn default_segment_delay_ms() -> u64 {
    500
}
fn default_cookie_domains() -> Vec<String> {
    vec![".facebook.com".into(), ".messenger.com".into()]
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            kind: default_feed_kind(),
            default_url: default_url(),
            message_selector: default_message_selector(),
            input_selector: default_input_selector(),
            headless: false,
            session_file: default_session_file(),
            login_markers: default_login_markers(),
            settle_secs: default_settle_secs(),
            segment_delay_ms: default_segment_delay_ms(),
            cookie_domains: default_cookie_domains(),
            user_agent: None,
            chrome_path: None,
        }
    }
}

impl FeedConfig {
    /// Absolute path of the session file.
    pub fn session_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.session_file);
        if path.is_absolute() {
            path
        } else {
            AppConfig::config_dir().join(path)
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Token expected in `hub.verify_token` during webhook verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,

    /// Shared secret for `X-Hub-Signature-256`; unset disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    /// Base URL of the suggestion backend used by the "backend" provider
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    /// Token ceiling for structured suggestions
    #[serde(default = "default_suggest_max_tokens")]
    pub suggest_max_tokens: u32,
}

fn default_port() -> u16 {
    5001
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_backend_url() -> String {
    "http://localhost:5001".into()
}
fn default_backend_timeout_secs() -> u64 {
    10
}
fn default_suggest_max_tokens() -> u32 {
    500
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            verify_token: None,
            app_secret: None,
            backend_url: default_backend_url(),
            backend_timeout_secs: default_backend_timeout_secs(),
            suggest_max_tokens: default_suggest_max_tokens(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.feedreply/config.toml).
    ///
    /// Also checks environment variables:
    /// - `FEEDREPLY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `FEEDREPLY_PROVIDER`, `FEEDREPLY_MODEL`
    /// - `FEEDREPLY_TEST_MODE` (`1`/`true`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FEEDREPLY_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("FEEDREPLY_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("FEEDREPLY_MODEL") {
            self.default_model = model;
        }

        if let Some(flag) = lookup("FEEDREPLY_TEST_MODE") {
            self.monitor.test_mode = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".feedreply")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("default_temperature", self.default_temperature),
            ("reply.vision_temperature", self.reply.vision_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.poll_interval_ms must be > 0".into(),
            ));
        }

        if self.monitor.processed_capacity == 0 || self.monitor.own_output_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "monitor capacities must be > 0".into(),
            ));
        }

        if self.monitor.max_text_len == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.max_text_len must be > 0".into(),
            ));
        }

        if !KNOWN_SCENARIOS.contains(&self.reply.scenario.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown reply.scenario '{}' (expected one of {})",
                self.reply.scenario,
                KNOWN_SCENARIOS.join(", ")
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            reply: ReplyConfig::default(),
            monitor: MonitorConfig::default(),
            feed: FeedConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_max_tokens, 150);
        assert_eq!(config.monitor.poll_interval_ms, 3000);
        assert_eq!(config.monitor.processed_capacity, 50);
        assert_eq!(config.monitor.own_output_capacity, 100);
        assert_eq!(config.gateway.port, 5001);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.feed.message_selector, config.feed.message_selector);
        assert_eq!(parsed.monitor.system_keywords, config.monitor.system_keywords);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.monitor.own_output_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_scenario_rejected() {
        let mut config = AppConfig::default();
        config.reply.scenario = "dating".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dating"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "backend"

[monitor]
poll_interval_ms = 1000
test_mode = true

[reply]
scenario = "interview"
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "backend");
        assert_eq!(config.monitor.poll_interval_ms, 1000);
        assert!(config.monitor.test_mode);
        assert_eq!(config.monitor.max_text_len, 500);
        assert_eq!(config.reply.scenario, "interview");
        assert!(config.reply.stream);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("FEEDREPLY_MODEL", "gpt-4o"),
            ("FEEDREPLY_TEST_MODE", "1"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.default_provider, "openai");
        assert!(config.monitor.test_mode);
    }

    #[test]
    fn feedreply_key_wins_over_openai_key() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| match k {
            "FEEDREPLY_API_KEY" => Some("sk-own".into()),
            "OPENAI_API_KEY" => Some("sk-openai".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("sk-own"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.gateway.app_secret = Some("hush".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("hush"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("messenger.com"));
    }

    #[test]
    fn relative_session_path_resolves_under_config_dir() {
        let feed = FeedConfig::default();
        assert!(feed.session_path().ends_with(".feedreply/messenger_auth.json"));
    }
}
