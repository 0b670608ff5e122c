//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type, which reads the optional
//! YAML configuration file and then applies environment variable overrides.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

use super::types::{ServiceConfig, StorageBackend};

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "EXAM_CONFIG";

/// Loads and validates the service configuration.
///
/// Sources are applied in order, later ones winning:
///
/// 1. built-in defaults,
/// 2. the YAML file named by `EXAM_CONFIG` (if set),
/// 3. environment variables (after loading `.env`).
///
/// # Example
///
/// ```no_run
/// use exam_data_manager::config::ConfigLoader;
///
/// let loader = ConfigLoader::from_env()?;
/// println!("Listening on port {}", loader.config().server.port);
/// # Ok::<(), exam_data_manager::error::ServiceError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: ServiceConfig,
}

impl ConfigLoader {
    /// Wraps an already-built configuration after validating it.
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        validate(&config)?;
        Ok(Self { config })
    }

    /// Loads configuration from a YAML file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` if the file cannot be read, `ConfigParse` if
    /// it is not valid YAML for [`ServiceConfig`], or `InvalidConfig` if a
    /// value fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let config = Self::load_yaml(path.as_ref())?;
        Self::new(config)
    }

    /// Loads `.env`, the optional YAML file and environment overrides.
    pub fn from_env() -> ServiceResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load_yaml(Path::new(&path))?,
            _ => ServiceConfig::default(),
        };
        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Self::new(config)
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// `from_env` uses the process environment; tests pass a map.
    pub fn with_overrides<F>(mut config: ServiceConfig, lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        apply_overrides(&mut config, lookup)?;
        Self::new(config)
    }

    /// Loads and parses a YAML file.
    fn load_yaml(path: &Path) -> ServiceResult<ServiceConfig> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| ServiceError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        debug!(path = %path_str, "Loaded configuration file");

        serde_yaml::from_str(&content).map_err(|e| ServiceError::ConfigParse {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> ServiceConfig {
        self.config
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> ServiceResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ServiceError::InvalidConfig {
        key: key.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}

fn apply_overrides<F>(config: &mut ServiceConfig, lookup: F) -> ServiceResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("HOST") {
        config.server.host = v;
    }
    if let Some(v) = get("PORT") {
        config.server.port = parse_value("PORT", &v)?;
    }
    if let Some(v) = get("MAX_UPLOAD_BYTES") {
        config.server.max_upload_bytes = parse_value("MAX_UPLOAD_BYTES", &v)?;
    }

    if let Some(v) = get("STORAGE_BACKEND") {
        config.storage.backend = match v.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => StorageBackend::Mongodb,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ServiceError::InvalidConfig {
                    key: "STORAGE_BACKEND".to_string(),
                    message: format!("unknown backend '{}'", other),
                });
            }
        };
    }
    if let Some(v) = get("MONGODB_URL") {
        config.storage.uri = v;
    }
    if let Some(v) = get("MONGODB_DB_NAME") {
        config.storage.database = v;
    }
    if let Some(v) = get("MONGODB_COLLECTION") {
        config.storage.collection = v;
    }
    if let Some(v) = get("MONGODB_CONNECT_TIMEOUT_SECS") {
        config.storage.connect_timeout_secs = parse_value("MONGODB_CONNECT_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get("OPENAI_API_KEY") {
        config.fee.api_key = Some(v);
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        config.fee.base_url = v;
    }
    if let Some(v) = get("OPENAI_MODEL") {
        config.fee.model = v;
    }
    if let Some(v) = get("FEE_BATCH_SIZE") {
        config.fee.batch_size = parse_value("FEE_BATCH_SIZE", &v)?;
    }
    if let Some(v) = get("FEE_TIMEOUT_SECS") {
        config.fee.timeout_secs = parse_value("FEE_TIMEOUT_SECS", &v)?;
    }

    if let Some(v) = get("INGEST_MAX_ROW_ERROR_RATIO") {
        config.ingestion.max_row_error_ratio = Some(parse_value("INGEST_MAX_ROW_ERROR_RATIO", &v)?);
    }
    if let Some(v) = get("INGEST_PROGRESS_INTERVAL") {
        config.ingestion.progress_interval = parse_value("INGEST_PROGRESS_INTERVAL", &v)?;
    }
    if let Some(v) = get("JOB_RETENTION_SECS") {
        config.ingestion.job_retention_secs = parse_value("JOB_RETENTION_SECS", &v)?;
    }

    if let Some(v) = get("LOG_LEVEL") {
        config.logging.level = v.to_ascii_lowercase();
    }

    Ok(())
}

fn validate(config: &ServiceConfig) -> ServiceResult<()> {
    let invalid = |key: &str, message: &str| ServiceError::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    };

    if config.server.port == 0 {
        return Err(invalid("server.port", "must be non-zero"));
    }
    if config.fee.batch_size == 0 {
        return Err(invalid("fee.batch_size", "must be at least 1"));
    }
    if config.ingestion.progress_interval == 0 {
        return Err(invalid("ingestion.progress_interval", "must be at least 1"));
    }
    if let Some(ratio) = config.ingestion.max_row_error_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(invalid("ingestion.max_row_error_ratio", "must be between 0 and 1"));
        }
    }
    Ok(())
}
