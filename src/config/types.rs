//! Configuration types for the service.
//!
//! This module contains the strongly-typed configuration structures that are
//! deserialized from the optional YAML file and overridden from the environment.
//! Every field has a default so an empty file (or no file) is a valid config.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Document store settings.
    pub storage: StorageConfig,
    /// External fee estimation settings.
    pub fee: FeeConfig,
    /// Spreadsheet ingestion policy.
    pub ingestion: IngestionConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Which store implementation backs the employee repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// MongoDB via the official driver.
    #[default]
    Mongodb,
    /// Process-local map, for development and tests.
    Memory,
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageBackend,
    /// MongoDB connection string.
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Collection holding employee documents.
    pub collection: String,
    /// Server selection timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Mongodb,
            uri: "mongodb://localhost:27017".to_string(),
            database: "excel_app".to_string(),
            collection: "employee_collection".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// External fee estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// API key; estimation is disabled when absent.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API, including the version segment.
    pub base_url: String,
    /// Chat model name.
    pub model: String,
    /// Distinct fee queries per request.
    pub batch_size: usize,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Replaces the built-in system prompt when set.
    pub prompt: Option<String>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            batch_size: 30,
            timeout_secs: 60,
            prompt: None,
        }
    }
}

/// Spreadsheet ingestion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Fail the job when `rows_failed / rows_total` exceeds this ratio.
    /// `None` never fails a job because of row errors.
    pub max_row_error_ratio: Option<f64>,
    /// Publish progress every this many rows.
    pub progress_interval: usize,
    /// Seconds a finished job stays queryable.
    pub job_retention_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_row_error_ratio: None,
            progress_interval: 25,
            job_retention_secs: 3600,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config: ServiceConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.database, "excel_app");
        assert_eq!(config.fee.batch_size, 30);
        assert!(config.ingestion.max_row_error_ratio.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
storage:
  backend: memory
ingestion:
  max_row_error_ratio: 0.25
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.collection, "employee_collection");
        assert_eq!(config.ingestion.max_row_error_ratio, Some(0.25));
        assert_eq!(config.ingestion.progress_interval, 25);
    }
}
