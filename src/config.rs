//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. a `--config` CLI flag)
//! 2. `~/.footprint/config.toml` (user)
//! 3. `/etc/footprint/config.toml` (system)
//!
//! Every field has a default, so a missing file is not an error for
//! [`Config::load_or_default`].
//!
//! The API key is never part of the config file. It comes from
//! `~/.footprint/secrets.toml` (must be 0600) or the environment, and is
//! resolved on every call through [`ApiKeySource`].

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::gateway::{QueueConfig, RetryConfig};
use crate::gemini::DEFAULT_ENDPOINT;
use crate::sanitize::{HistoryLimits, MAX_CHARS_PER_PART, MAX_TURNS};
use crate::{FootprintError, Result};

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

/// Generation service endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// Full `generateContent` URL, without the key.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable the key is read from when no secrets file has one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request HTTP timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_api_key_env() -> String {
    API_KEY_ENV.to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Admission queue limits.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Concurrent calls to the service (default: 1).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Minimum spacing between call starts in milliseconds (default: 600).
    #[serde(default = "default_min_gap_ms")]
    pub min_gap_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            min_gap_ms: default_min_gap_ms(),
        }
    }
}

fn default_max_concurrent() -> usize {
    1
}

fn default_min_gap_ms() -> u64 {
    600
}

impl From<&QueueSettings> for QueueConfig {
    fn from(s: &QueueSettings) -> Self {
        QueueConfig::new()
            .max_concurrent(s.max_concurrent)
            .min_gap(Duration::from_millis(s.min_gap_ms))
    }
}

/// Retry schedule. Unset fields keep the [`RetryConfig`] defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySettings {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub rate_limit_base_ms: Option<u64>,
    #[serde(default)]
    pub server_base_ms: Option<u64>,
    #[serde(default)]
    pub network_base_ms: Option<u64>,
    #[serde(default)]
    pub jitter: Option<bool>,
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        let mut config = RetryConfig::default();
        if let Some(n) = s.max_attempts {
            config = config.max_attempts(n);
        }
        if let Some(ms) = s.max_delay_ms {
            config = config.max_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = s.rate_limit_base_ms {
            config = config.rate_limit_base(Duration::from_millis(ms));
        }
        if let Some(ms) = s.server_base_ms {
            config = config.server_base(Duration::from_millis(ms));
        }
        if let Some(ms) = s.network_base_ms {
            config = config.network_base(Duration::from_millis(ms));
        }
        if let Some(jitter) = s.jitter {
            config = config.jitter(jitter);
        }
        config
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Entry lifetime in seconds (default: 4 hours).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum entries (default: 10,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    4 * 3600
}

fn default_max_entries() -> u64 {
    10_000
}

impl From<&CacheSettings> for CacheConfig {
    fn from(s: &CacheSettings) -> Self {
        CacheConfig::new()
            .max_entries(s.max_entries)
            .ttl(Duration::from_secs(s.ttl_secs))
    }
}

/// Conversation history bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_turns() -> usize {
    MAX_TURNS
}

fn default_max_chars() -> usize {
    MAX_CHARS_PER_PART
}

impl From<&HistorySettings> for HistoryLimits {
    fn from(s: &HistorySettings) -> Self {
        HistoryLimits {
            max_turns: s.max_turns,
            max_chars: s.max_chars,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.footprint/config.toml`
    /// 3. `/etc/footprint/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`Config::load`], but an absent file yields the defaults.
    ///
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => Self::load_from_file(&path),
            Err(_) if explicit_path.is_none() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FootprintError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FootprintError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(FootprintError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".footprint").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/footprint/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(FootprintError::Configuration(
            "No config file found. Create ~/.footprint/config.toml or /etc/footprint/config.toml"
                .to_string(),
        ))
    }
}

/// Secrets file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load `~/.footprint/secrets.toml` if it exists (must be 0600 or 0400).
    ///
    /// Returns empty secrets when there is no file; the key then comes from
    /// the environment.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".footprint").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }
        Ok(Secrets::default())
    }

    /// Load a specific secrets file, checking its permissions first.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            FootprintError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FootprintError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            FootprintError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(FootprintError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Where the gateway should read its key from.
    ///
    /// A key in the secrets file wins; otherwise the named environment
    /// variable is consulted on every call.
    pub fn api_key_source(&self, env_var: &str) -> ApiKeySource {
        match &self.gemini {
            Some(secret) => ApiKeySource::Static(secret.api_key.clone()),
            None => ApiKeySource::Env(env_var.to_string()),
        }
    }
}

/// Where the service credential comes from.
///
/// Resolution happens at call time, so a missing key surfaces as a
/// [`FootprintError::Configuration`] on the call that needs it rather than
/// at startup.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    Static(String),
    Env(String),
}

impl Default for ApiKeySource {
    fn default() -> Self {
        ApiKeySource::Env(API_KEY_ENV.to_string())
    }
}

impl std::fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKeySource::Static(_) => f.write_str("Static(<redacted>)"),
            ApiKeySource::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

impl ApiKeySource {
    /// Read the key now. Blank values count as missing.
    pub fn resolve(&self) -> Result<String> {
        let (key, origin) = match self {
            ApiKeySource::Static(key) => (Some(key.clone()), "static key"),
            ApiKeySource::Env(var) => (std::env::var(var).ok(), var.as_str()),
        };
        key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            FootprintError::Configuration(format!("Gemini API key not configured ({origin} missing)"))
        })
    }
}
