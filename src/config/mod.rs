//! Configuration loading and management for the Exam Data Manager.
//!
//! This module loads the service configuration from an optional YAML file and
//! environment variables (including a `.env` file), covering the HTTP
//! listener, the document store, the fee estimator and the ingestion policy.
//!
//! # Example
//!
//! ```no_run
//! use exam_data_manager::config::ConfigLoader;
//!
//! let config = ConfigLoader::from_env().unwrap().into_config();
//! println!("MongoDB at {}", config.storage.uri);
//! ```

mod loader;
mod types;

pub use loader::{CONFIG_PATH_ENV, ConfigLoader};
pub use types::{
    FeeConfig, IngestionConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageBackend,
    StorageConfig,
};
