//! Typhoon configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TyphoonError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TyphoonConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TyphoonConfig {
    /// Load config from the default path (~/.typhoon/config.toml), then apply
    /// `TYPHOON_*` environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TyphoonError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TyphoonError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TYPHOON_DATABASE") {
            self.database.path = v;
        }
        if let Some(v) = lookup("TYPHOON_STORE") {
            self.store.path = v;
        }
        if let Some(v) = lookup("TYPHOON_TEMPLATES") {
            self.templates.dir = v;
        }
        if let Some(v) = lookup("TYPHOON_SMTP_HOST") {
            self.email.smtp_host = v;
        }
        if let Some(v) = lookup("TYPHOON_SMTP_PORT") {
            match v.parse() {
                Ok(port) => self.email.smtp_port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid TYPHOON_SMTP_PORT: {v}"),
            }
        }
        if let Some(v) = lookup("TYPHOON_LOG") {
            self.logging.level = v;
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Typhoon home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".typhoon")
    }
}

/// Expand `~` in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Scheduled-task database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String { "~/.typhoon/tasks.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

/// Key-value blob store holding results and generated scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String { "sqlite".into() }
fn default_store_path() -> String { "~/.typhoon/store.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

/// Where allow-listed templates are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_dir")]
    pub dir: String,
}

fn default_template_dir() -> String { "~/.typhoon/templates".into() }

impl Default for TemplateConfig {
    fn default() -> Self {
        Self { dir: default_template_dir() }
    }
}

/// Outbound SMTP settings for the notify operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub starttls: bool,
}

fn default_smtp_host() -> String { "localhost".into() }
fn default_smtp_port() -> u16 { 8025 }
fn default_from() -> String { "typhoon@example.com".into() }

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            from: default_from(),
            username: None,
            password: None,
            starttls: false,
        }
    }
}

/// Task executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Age after which an unfinished claim may be taken over.
    #[serde(default = "default_lease")]
    pub lease_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_poll_interval() -> u64 { 30 }
fn default_http_timeout() -> u64 { 30 }
fn default_lease() -> u64 { 300 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_backoff() -> u64 { 500 }
fn default_concurrency() -> usize { 4 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            http_timeout_secs: default_http_timeout(),
            lease_secs: default_lease(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
