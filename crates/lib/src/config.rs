//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.chatline/config.json`) and environment.
//! Every field has a default, so a missing file or an empty `{}` is a valid config.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote assistant service settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Where the session identifier is persisted.
    #[serde(default)]
    pub session: SessionConfig,

    /// Texts and timings shown by the chat widget.
    #[serde(default)]
    pub ui: UiConfig,
}

/// Remote service base URL and transport timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL the chat endpoints hang off (default "http://localhost:8000/api").
    /// Overridden by CHATLINE_API_URL env.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Transport timeout in seconds for every request (default 60; LLM replies are slow).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Session identifier persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// File holding the session id. Default ~/.chatline/session_id.
    pub path: Option<PathBuf>,
}

/// Widget texts and the unavailability notice lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Assistant message seeded at startup.
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,

    /// Assistant message seeded after history is cleared.
    #[serde(default = "default_cleared_text")]
    pub cleared_text: String,

    /// How long the service-unavailable notice stays up, in milliseconds (default 5000).
    #[serde(default = "default_notice_dismiss_ms")]
    pub notice_dismiss_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_welcome_text() -> String {
    "Hello! I am your AI assistant. How can I help you today?".to_string()
}

fn default_cleared_text() -> String {
    "Chat history cleared. How can I help you today?".to_string()
}

fn default_notice_dismiss_ms() -> u64 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            welcome_text: default_welcome_text(),
            cleared_text: default_cleared_text(),
            notice_dismiss_ms: default_notice_dismiss_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl UiConfig {
    pub fn notice_dismiss_after(&self) -> Duration {
        Duration::from_millis(self.notice_dismiss_ms)
    }
}

/// Resolve the API base URL: env CHATLINE_API_URL overrides config. Trailing slashes are dropped.
pub fn resolve_api_base_url(config: &Config) -> String {
    let url = std::env::var("CHATLINE_API_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            Some(config.api.base_url.trim().to_string()).filter(|s| !s.is_empty())
        })
        .unwrap_or_else(default_base_url);
    url.trim_end_matches('/').to_string()
}

/// Per-user directory holding the config file and the session id.
fn chatline_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".chatline"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config file: CHATLINE_CONFIG_PATH when set and non-blank, else ~/.chatline/config.json.
pub fn default_config_path() -> PathBuf {
    std::env::var("CHATLINE_CONFIG_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| chatline_dir().join("config.json"))
}

/// Default path for the persisted session id.
pub fn default_session_path() -> PathBuf {
    chatline_dir().join("session_id")
}

/// Resolve the session file: `session.path` when set, otherwise the default.
pub fn resolve_session_path(config: &Config) -> PathBuf {
    config
        .session
        .path
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(default_session_path)
}

impl Config {
    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("api.baseUrl must be an http(s) URL, got {:?}", url);
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeoutSecs must be greater than zero");
        }
        Ok(())
    }
}

/// Load config from `path`, or from `default_config_path`. A missing file gives the
/// defaults. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config: Config = match std::fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no config at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config from {}", path.display()));
        }
    };
    config
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    log::debug!(
        "chat service {}, session file {}",
        resolve_api_base_url(&config),
        resolve_session_path(&config).display()
    );
    Ok((config, path))
}
