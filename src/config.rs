//! Configuration management for Hikkoshi.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories. Credentials can also be supplied
//! through the environment (or a `.env` file loaded by the binary).

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory.
const APP_NAME: &str = "Hikkoshi";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Placeholder value for unconfigured credentials.
const PLACEHOLDER: &str = "CHANGE_ME";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source service (MangaDex) settings.
    pub mangadex: MangaDexConfig,

    /// Destination service (AniList) settings.
    pub anilist: AniListConfig,

    /// Retry behaviour for throttled requests.
    pub retry: RetryConfig,

    /// Reconciliation settings.
    pub sync: SyncConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Request budget for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Budget the service grants per window.
    pub ceiling: u32,
    /// Throttle once the reported remaining budget drops to this.
    pub low_water: u32,
    /// Window length in seconds.
    pub window_sec: u64,
}

/// MangaDex API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MangaDexConfig {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,

    /// Base URL for the REST API.
    pub api_url: String,

    /// OAuth2 token endpoint (password and refresh grants).
    pub auth_url: String,

    pub rate_limit: RateLimitConfig,
}

impl Default for MangaDexConfig {
    fn default() -> Self {
        Self {
            username: PLACEHOLDER.to_string(),
            password: PLACEHOLDER.to_string(),
            client_id: PLACEHOLDER.to_string(),
            client_secret: PLACEHOLDER.to_string(),
            api_url: "https://api.mangadex.org".to_string(),
            auth_url: "https://auth.mangadex.org/realms/mangadex/protocol/openid-connect/token"
                .to_string(),
            rate_limit: RateLimitConfig {
                ceiling: 40,
                low_water: 13,
                window_sec: 60,
            },
        }
    }
}

/// AniList API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AniListConfig {
    pub client_id: String,

    /// Redirect URI registered for the client; the login listener binds here.
    pub redirect_uri: String,

    pub authorize_url: String,

    /// GraphQL endpoint.
    pub api_url: String,

    /// How long to wait for the browser login to come back.
    pub login_timeout_sec: u64,

    pub rate_limit: RateLimitConfig,
}

impl Default for AniListConfig {
    fn default() -> Self {
        Self {
            client_id: PLACEHOLDER.to_string(),
            redirect_uri: "http://localhost:8080".to_string(),
            authorize_url: "https://anilist.co/api/v2/oauth/authorize".to_string(),
            api_url: "https://graphql.anilist.co".to_string(),
            login_timeout_sec: 300,
            // 90/min nominal, 30/min while the API runs degraded
            rate_limit: RateLimitConfig {
                ceiling: 90,
                low_water: 61,
                window_sec: 60,
            },
        }
    }
}

/// Retry configuration for 429 responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Cooldown after a 429 in seconds.
    pub cooldown_sec: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown_sec: 60,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.cooldown_sec))
    }
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding progress, snapshot and report files.
    pub data_dir: PathBuf,

    /// Courtesy delay between batches and between destination writes.
    pub pacing_delay_sec: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pacing_delay_sec: 1.0,
        }
    }
}

/// Longest pacing delay accepted by `validate()`.
const MAX_PACING_DELAY_SEC: f64 = 3600.0;

impl SyncConfig {
    /// Pacing delay as a `Duration`. Values `validate()` would reject
    /// collapse to zero.
    pub fn pacing_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.pacing_delay_sec).unwrap_or(Duration::ZERO)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` level filter (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn is_set(value: &str) -> bool {
    !value.trim().is_empty() && value != PLACEHOLDER
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from `path`, writing a default file there first
    /// if none exists.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overrides values from environment variables.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 7] = [
            ("MANGADEX_USERNAME", &mut self.mangadex.username),
            ("MANGADEX_PASSWORD", &mut self.mangadex.password),
            ("MANGADEX_CLIENT_ID", &mut self.mangadex.client_id),
            ("MANGADEX_CLIENT_SECRET", &mut self.mangadex.client_secret),
            ("ANILIST_CLIENT_ID", &mut self.anilist.client_id),
            ("ANILIST_REDIRECT_URI", &mut self.anilist.redirect_uri),
            ("LOG_LEVEL", &mut self.logging.level),
        ];

        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("mangadex.username (or MANGADEX_USERNAME)", &self.mangadex.username),
            ("mangadex.password (or MANGADEX_PASSWORD)", &self.mangadex.password),
            ("mangadex.client_id (or MANGADEX_CLIENT_ID)", &self.mangadex.client_id),
            (
                "mangadex.client_secret (or MANGADEX_CLIENT_SECRET)",
                &self.mangadex.client_secret,
            ),
            ("anilist.client_id (or ANILIST_CLIENT_ID)", &self.anilist.client_id),
        ];

        for (key, value) in required {
            if !is_set(value) {
                return Err(ConfigError::MissingValue(key.to_string()));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        for (key, limits) in [
            ("mangadex.rate_limit", &self.mangadex.rate_limit),
            ("anilist.rate_limit", &self.anilist.rate_limit),
        ] {
            if limits.low_water > limits.ceiling {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "low_water cannot exceed ceiling".to_string(),
                });
            }
        }

        let redirect = url::Url::parse(&self.anilist.redirect_uri).map_err(|e| {
            ConfigError::InvalidValue {
                key: "anilist.redirect_uri".to_string(),
                message: e.to_string(),
            }
        })?;
        if redirect.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                key: "anilist.redirect_uri".to_string(),
                message: "must include a host".to_string(),
            });
        }

        let pacing = self.sync.pacing_delay_sec;
        if !pacing.is_finite() || !(0.0..=MAX_PACING_DELAY_SEC).contains(&pacing) {
            return Err(ConfigError::InvalidValue {
                key: "sync.pacing_delay_sec".to_string(),
                message: format!("must be between 0 and {} seconds", MAX_PACING_DELAY_SEC),
            });
        }

        if self.anilist.login_timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "anilist.login_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Path of the checkpoint file.
    pub fn progress_path(&self) -> PathBuf {
        self.sync.data_dir.join("sync_progress.json")
    }

    /// Path of the cached follow-status snapshot.
    pub fn statuses_path(&self) -> PathBuf {
        self.sync.data_dir.join("manga_statuses.json")
    }

    /// Path of the end-of-run manual review report.
    pub fn non_matched_path(&self) -> PathBuf {
        self.sync.data_dir.join("non_matched_manga.json")
    }
}
