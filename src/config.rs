use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use config;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Redb,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // These fields are populated from the .env file
    pub database_path: String,
    pub uploads_path: String,
    pub storage_backend: StorageBackend,
    pub allowed_origins: String,
    pub log_level: String,
    pub admin_url_prefix: String,
    /// Comma-separated client IPs allowed on the admin API, `*` for any.
    /// Empty denies everyone.
    pub admin_accept_ip: String,
    pub change_poll_interval_ms: u64,
    pub max_upload_size_mb: u64,
}

fn missing(key: &str) -> config::ConfigError {
    config::ConfigError::Message(format!(
        "FATAL: Environment variable '{}' is not set in your .env file.",
        key
    ))
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        // Load the specified .env file. Propagate an error if it fails.
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("DATABASE_PATH").ok_or_else(|| missing("DATABASE_PATH"))?;
        let uploads_path = lookup("UPLOADS_PATH").ok_or_else(|| missing("UPLOADS_PATH"))?;

        let admin_url_prefix = lookup("ADMIN_URL_PREFIX").ok_or_else(|| missing("ADMIN_URL_PREFIX"))?;
        if admin_url_prefix.is_empty()
            || !admin_url_prefix.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(config::ConfigError::Message(
                "FATAL: 'ADMIN_URL_PREFIX' must not be empty and can only contain letters, numbers, underscores, and hyphens.".to_string()
            ));
        }

        let storage_backend = lookup("STORAGE_BACKEND")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "redb".to_string());
        if storage_backend != "redb" && storage_backend != "json" {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'STORAGE_BACKEND' must be 'redb' or 'json', got '{}'.",
                storage_backend
            )));
        }

        let allowed_origins = lookup("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let admin_accept_ip = lookup("ADMIN_ACCEPT_IP").unwrap_or_default();

        let change_poll_interval_ms = parse_number(&lookup, "CHANGE_POLL_INTERVAL_MS", 500)?;
        if change_poll_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "FATAL: 'CHANGE_POLL_INTERVAL_MS' must be greater than zero.".to_string(),
            ));
        }
        let max_upload_size_mb = parse_number(&lookup, "MAX_UPLOAD_SIZE_MB", 5)?;

        // Check that the paths are absolute.
        for (key, value) in [("DATABASE_PATH", &database_path), ("UPLOADS_PATH", &uploads_path)] {
            if Path::new(value).is_relative() {
                return Err(config::ConfigError::Message(format!(
                    "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                    key, value
                )));
            }
        }

        let builder = config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080_i64)?
            // Base settings (web host/port) from the TOML file, when present.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_override("database_path", database_path)?
            .set_override("uploads_path", uploads_path)?
            .set_override("storage_backend", storage_backend)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("admin_url_prefix", admin_url_prefix)?
            .set_override("admin_accept_ip", admin_accept_ip)?
            .set_override("change_poll_interval_ms", change_poll_interval_ms as i64)?
            .set_override("max_upload_size_mb", max_upload_size_mb as i64)?
            .build()?;

        builder.try_deserialize()
    }

    /// Returns the full path to the redb content database inside its own folder.
    pub fn content_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("content").join("content.db")
    }

    /// Returns the full path to the JSON content document.
    pub fn content_json_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("content").join("content.json")
    }

    pub fn change_poll_interval(&self) -> Duration {
        Duration::from_millis(self.change_poll_interval_ms)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, config::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            config::ConfigError::Message(format!("FATAL: '{}' must be a whole number, got '{}'.", key, raw))
        }),
    }
}
