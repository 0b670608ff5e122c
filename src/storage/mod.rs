//! Document store access for employee records.
//!
//! The [`EmployeeStore`] trait is the contract the repository is written
//! against. [`MongoGateway`] implements it over MongoDB; [`InMemoryStore`]
//! implements it over a process-local map for tests and local runs.

mod memory;
mod mongo;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::ServiceError;
use crate::models::{Employee, EmployeePatch};

pub use memory::InMemoryStore;
pub use mongo::MongoGateway;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed in transit.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A unique index rejected the write.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// A stored document could not be (de)serialized.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(message) => ServiceError::ServiceUnavailable {
                service: "document store",
                message,
            },
            StoreError::DuplicateKey(message) => ServiceError::Conflict { message },
            StoreError::Malformed(message) => ServiceError::Internal { message },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for employee records.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Short backend name for logs and the service info endpoint.
    fn backend(&self) -> &'static str;

    /// Checks the store is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Fetches one employee by id.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Employee>>;

    /// Fetches every employee whose stored name is one of `names`.
    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Employee>>;

    /// Fetches the employee holding an identity card number, if any.
    async fn find_by_id_card(&self, id_card: &str) -> StoreResult<Option<Employee>>;

    /// Inserts a new employee.
    async fn insert(&self, employee: &Employee) -> StoreResult<()>;

    /// Applies a patch atomically, returning the updated record.
    async fn update(
        &self,
        id: Uuid,
        patch: &EmployeePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Employee>>;

    /// Removes an employee, returning the deleted record.
    async fn delete(&self, id: Uuid) -> StoreResult<Option<Employee>>;
}

/// An opened store plus an optional handle for shutting MongoDB down.
pub struct OpenedStore {
    /// The store behind the repository.
    pub store: Arc<dyn EmployeeStore>,
    /// Present when the MongoDB backend is in use.
    pub gateway: Option<MongoGateway>,
}

/// Opens the backend named by the configuration.
///
/// # Errors
///
/// Returns `ServiceUnavailable` when MongoDB cannot be reached.
pub async fn open(config: &StorageConfig) -> Result<OpenedStore, ServiceError> {
    match config.backend {
        StorageBackend::Memory => Ok(OpenedStore {
            store: Arc::new(InMemoryStore::new()),
            gateway: None,
        }),
        StorageBackend::Mongodb => {
            let gateway = MongoGateway::connect(config).await?;
            Ok(OpenedStore {
                store: Arc::new(gateway.clone()),
                gateway: Some(gateway),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_service_errors() {
        let unavailable: ServiceError = StoreError::Unavailable("timeout".to_string()).into();
        assert!(matches!(
            unavailable,
            ServiceError::ServiceUnavailable { service: "document store", .. }
        ));

        let duplicate: ServiceError = StoreError::DuplicateKey("id_card".to_string()).into();
        assert!(matches!(duplicate, ServiceError::Conflict { .. }));

        let malformed: ServiceError = StoreError::Malformed("bad uuid".to_string()).into();
        assert!(matches!(malformed, ServiceError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let opened = open(&config).await.unwrap();
        assert_eq!(opened.store.backend(), "memory");
        assert!(opened.gateway.is_none());
        assert!(opened.store.ping().await.is_ok());
    }
}
