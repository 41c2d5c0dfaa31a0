//! Layered configuration
//!
//! Resolution priority: environment variables override the optional TOML
//! file, which overrides compiled defaults. The identity service URL and API
//! key have no sensible default and fail startup when missing.
//!
//! | Setting | Env var | TOML key | Default |
//! |---|---|---|---|
//! | listen port | `SPEAKSMART_PORT` | `port` | 5000 |
//! | database path | `SPEAKSMART_DATABASE_PATH` | `database_path` | `data/speaksmart.db` |
//! | upload dir | `SPEAKSMART_UPLOAD_DIR` | `upload_dir` | `uploads` |
//! | max upload (MB) | `SPEAKSMART_MAX_UPLOAD_MB` | `max_upload_mb` | 50 |
//! | scripts dir | `SPEAKSMART_SCRIPTS_DIR` | `scripts_dir` | `scripts` |
//! | interpreter | `SPEAKSMART_PYTHON_BIN` | `python_bin` | `python3` |
//! | analysis timeout (s) | `SPEAKSMART_ANALYSIS_TIMEOUT_SECS` | `analysis_timeout_secs` | 120 |
//! | identity URL | `SPEAKSMART_IDENTITY_URL` | `identity_url` | (required) |
//! | identity API key | `SPEAKSMART_IDENTITY_API_KEY` | `identity_api_key` | (required) |

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default TOML config file path, relative to the working directory.
const DEFAULT_CONFIG_FILE: &str = "speaksmart.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Optional settings loadable from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub max_upload_mb: Option<u64>,
    pub scripts_dir: Option<PathBuf>,
    pub python_bin: Option<PathBuf>,
    pub analysis_timeout_secs: Option<u64>,
    pub identity_url: Option<String>,
    pub identity_api_key: Option<String>,
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_mb: u64,
    pub scripts_dir: PathBuf,
    pub python_bin: PathBuf,
    pub analysis_timeout_secs: u64,
    pub identity_url: String,
    pub identity_api_key: String,
}

impl AppConfig {
    /// Resolve configuration from the environment and the default TOML file
    /// location (`SPEAKSMART_CONFIG` or `./speaksmart.toml`).
    pub fn load() -> Result<Self, ConfigError> {
        let toml_path = std::env::var("SPEAKSMART_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::load_from(&toml_path)
    }

    /// Resolve configuration using the TOML file at `toml_path` (skipped if
    /// the file does not exist) with environment variables taking priority.
    pub fn load_from(toml_path: &Path) -> Result<Self, ConfigError> {
        let file = load_toml(toml_path)?;

        let identity_url = resolve_string("SPEAKSMART_IDENTITY_URL", file.identity_url.clone())
            .ok_or_else(|| missing_identity("identity service URL", "SPEAKSMART_IDENTITY_URL", "identity_url"))?;
        let identity_api_key =
            resolve_string("SPEAKSMART_IDENTITY_API_KEY", file.identity_api_key.clone())
                .ok_or_else(|| {
                    missing_identity(
                        "identity service API key",
                        "SPEAKSMART_IDENTITY_API_KEY",
                        "identity_api_key",
                    )
                })?;

        let config = Self {
            port: resolve_parsed("SPEAKSMART_PORT", file.port)?.unwrap_or(5000),
            database_path: resolve_path("SPEAKSMART_DATABASE_PATH", file.database_path)
                .unwrap_or_else(|| PathBuf::from("data/speaksmart.db")),
            upload_dir: resolve_path("SPEAKSMART_UPLOAD_DIR", file.upload_dir)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_upload_mb: resolve_parsed("SPEAKSMART_MAX_UPLOAD_MB", file.max_upload_mb)?
                .unwrap_or(50),
            scripts_dir: resolve_path("SPEAKSMART_SCRIPTS_DIR", file.scripts_dir)
                .unwrap_or_else(|| PathBuf::from("scripts")),
            python_bin: resolve_path("SPEAKSMART_PYTHON_BIN", file.python_bin)
                .unwrap_or_else(|| PathBuf::from("python3")),
            analysis_timeout_secs: resolve_parsed(
                "SPEAKSMART_ANALYSIS_TIMEOUT_SECS",
                file.analysis_timeout_secs,
            )?
            .unwrap_or(120),
            identity_url,
            identity_api_key,
        };

        if config.max_upload_mb == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_mb must be greater than zero".to_string(),
            ));
        }
        if config.analysis_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "analysis_timeout_secs must be greater than zero".to_string(),
            ));
        }

        info!(
            port = config.port,
            database = %config.database_path.display(),
            uploads = %config.upload_dir.display(),
            scripts = %config.scripts_dir.display(),
            "configuration resolved"
        );

        Ok(config)
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb as usize * 1024 * 1024
    }
}

fn load_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Read {} failed: {e}", path.display())))?;

    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("Parse {} failed: {e}", path.display())))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Env value if set and non-empty, else the TOML value.
fn resolve_string(env_var: &str, file_value: Option<String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_var) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
        warn!(env_var, "ignoring empty environment variable");
    }
    file_value.filter(|v| !v.trim().is_empty())
}

fn resolve_path(env_var: &str, file_value: Option<PathBuf>) -> Option<PathBuf> {
    resolve_string(env_var, file_value.map(|p| p.display().to_string())).map(PathBuf::from)
}

fn resolve_parsed<T: std::str::FromStr>(
    env_var: &str,
    file_value: Option<T>,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(env_var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{env_var} is not a valid number: {value}"))),
        Err(_) => Ok(file_value),
    }
}

fn missing_identity(what: &str, env_var: &str, toml_key: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "{what} not configured. Please configure using one of:\n\
         1. Environment: {env_var}=<value>\n\
         2. TOML config: speaksmart.toml ({toml_key} = \"<value>\")"
    ))
}
