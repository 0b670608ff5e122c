//! Application state for the Exam Data Manager API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::ServiceResult;
use crate::fee::{ChatFeeEstimator, FeeEstimator, FeeService};
use crate::jobs::{IngestionPipeline, JobTracker};
use crate::repository::EmployeeRepository;
use crate::storage::EmployeeStore;

/// Shared application state.
///
/// Cheap to clone; every clone shares the same repository, job registry
/// and pipeline.
#[derive(Clone)]
pub struct AppState {
    repository: EmployeeRepository,
    pipeline: IngestionPipeline,
    max_upload_bytes: usize,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates a new application state from its parts.
    pub fn new(
        repository: EmployeeRepository,
        pipeline: IngestionPipeline,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            repository,
            pipeline,
            max_upload_bytes,
            started_at: Utc::now(),
        }
    }

    /// Wires the repository, fee service and pipeline from configuration.
    ///
    /// Fee estimation is disabled when no API key is configured.
    pub fn from_config(
        config: &ServiceConfig,
        store: Arc<dyn EmployeeStore>,
        shutdown: CancellationToken,
    ) -> ServiceResult<Self> {
        let repository = EmployeeRepository::new(store);
        let estimator = ChatFeeEstimator::from_config(&config.fee)?
            .map(|estimator| Arc::new(estimator) as Arc<dyn FeeEstimator>);
        let fees = FeeService::new(estimator, config.fee.batch_size);
        if !fees.is_enabled() {
            info!("No API key configured; fee estimation disabled");
        }
        let pipeline = IngestionPipeline::new(
            JobTracker::new(),
            repository.clone(),
            fees,
            config.ingestion.clone(),
            shutdown,
        );
        Ok(Self::new(repository, pipeline, config.server.max_upload_bytes))
    }

    /// The employee repository.
    pub fn repository(&self) -> &EmployeeRepository {
        &self.repository
    }

    /// The ingestion pipeline.
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// The job registry.
    pub fn tracker(&self) -> &JobTracker {
        self.pipeline.tracker()
    }

    /// Largest accepted request body, in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// When the state was built.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_from_default_config() {
        let state = AppState::from_config(
            &ServiceConfig::default(),
            Arc::new(InMemoryStore::new()),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(state.repository().backend(), "memory");
        assert_eq!(state.max_upload_bytes(), 50 * 1024 * 1024);
        assert!(!state.pipeline().fees_enabled());
    }
}
