//! Batching and merging of fee estimates into fee records.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::estimator::{FeeEstimator, FeeQuery};
use crate::models::{FeeRecord, FeeSource};

/// Counts produced by [`FeeService::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSummary {
    /// Records whose amount came from the sheet.
    pub from_sheet: u64,
    /// Records whose amount was estimated.
    pub estimated: u64,
    /// Records the estimator could not price.
    pub failed: u64,
}

/// Fills in missing fees using an optional [`FeeEstimator`].
#[derive(Clone)]
pub struct FeeService {
    estimator: Option<Arc<dyn FeeEstimator>>,
    batch_size: usize,
}

impl FeeService {
    /// Creates a service. `batch_size` is clamped to at least 1.
    pub fn new(estimator: Option<Arc<dyn FeeEstimator>>, batch_size: usize) -> Self {
        Self {
            estimator,
            batch_size: batch_size.max(1),
        }
    }

    /// A service that never estimates.
    pub fn disabled() -> Self {
        Self::new(None, 1)
    }

    /// Returns true if an estimator is configured.
    pub fn is_enabled(&self) -> bool {
        self.estimator.is_some()
    }

    /// Estimates fees for records that need one.
    ///
    /// Records with a sheet amount keep it. Records lacking sessions or a
    /// standard stay `Missing`. Identical (sessions, standard) pairs are asked
    /// once. A failed batch sets `fee_error` on its records only.
    pub async fn apply(&self, records: &mut [FeeRecord]) -> FeeSummary {
        let mut summary = FeeSummary {
            from_sheet: records
                .iter()
                .filter(|r| r.fee_source == FeeSource::Sheet)
                .count() as u64,
            ..FeeSummary::default()
        };
        let Some(estimator) = &self.estimator else {
            return summary;
        };

        let mut queries: Vec<FeeQuery> = Vec::new();
        let mut positions: HashMap<FeeQuery, usize> = HashMap::new();
        for record in records.iter().filter(|r| r.needs_estimate()) {
            let query = query_for(record);
            if !positions.contains_key(&query) {
                positions.insert(query.clone(), queries.len());
                queries.push(query);
            }
        }
        if queries.is_empty() {
            return summary;
        }

        let mut answers: Vec<Result<Option<Decimal>, String>> = Vec::with_capacity(queries.len());
        for (index, batch) in queries.chunks(self.batch_size).enumerate() {
            match estimator.estimate_batch(batch).await {
                Ok(amounts) if amounts.len() == batch.len() => {
                    answers.extend(amounts.into_iter().map(Ok));
                }
                Ok(amounts) => {
                    let reason = format!("expected {} amounts, got {}", batch.len(), amounts.len());
                    warn!(batch = index, %reason, "Fee estimation batch discarded");
                    answers.extend(batch.iter().map(|_| Err(reason.clone())));
                }
                Err(e) => {
                    warn!(batch = index, error = %e, "Fee estimation batch failed");
                    let reason = e.to_string();
                    answers.extend(batch.iter().map(|_| Err(reason.clone())));
                }
            }
        }

        for record in records.iter_mut().filter(|r| r.needs_estimate()) {
            let Some(&position) = positions.get(&query_for(record)) else {
                continue;
            };
            match &answers[position] {
                Ok(Some(amount)) => {
                    record.fee = Some(*amount);
                    record.fee_source = FeeSource::Estimated;
                    summary.estimated += 1;
                }
                Ok(None) => {
                    record.fee_error = Some("estimator returned no amount".to_string());
                    summary.failed += 1;
                }
                Err(reason) => {
                    record.fee_error = Some(reason.clone());
                    summary.failed += 1;
                }
            }
        }

        info!(
            distinct_queries = queries.len(),
            estimated = summary.estimated,
            failed = summary.failed,
            "Fee estimation finished"
        );
        summary
    }
}

fn query_for(record: &FeeRecord) -> FeeQuery {
    FeeQuery {
        sessions: record.sessions.clone().unwrap_or_default(),
        standard: record.standard.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeeError;
    use crate::models::{MatchStatus, SheetRow};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Prices a query by the length of its sessions text; records every batch.
    #[derive(Default)]
    struct RecordingEstimator {
        batches: Mutex<Vec<Vec<FeeQuery>>>,
        fail_batch: Option<usize>,
    }

    #[async_trait]
    impl FeeEstimator for RecordingEstimator {
        async fn estimate_batch(&self, queries: &[FeeQuery]) -> Result<Vec<Option<Decimal>>, FeeError> {
            let mut batches = self.batches.lock().unwrap();
            let index = batches.len();
            batches.push(queries.to_vec());
            if self.fail_batch == Some(index) {
                return Err(FeeError::Parse("garbled".to_string()));
            }
            Ok(queries
                .iter()
                .map(|q| Some(Decimal::from(q.sessions.chars().count() as u64 * 100)))
                .collect())
        }
    }

    fn record(name: &str, sessions: Option<&str>, standard: Option<&str>, amount: Option<i64>) -> FeeRecord {
        let row = SheetRow {
            row: 2,
            name: name.to_string(),
            sessions: sessions.map(str::to_string),
            standard: standard.map(str::to_string),
            amount: amount.map(Decimal::from),
            ..SheetRow::default()
        };
        FeeRecord::from_row(&row, None, MatchStatus::Unmatched)
    }

    #[tokio::test]
    async fn test_disabled_service_leaves_fees_missing() {
        let mut records = vec![record("a", Some("8场"), Some("150"), None), record("b", None, None, Some(350))];
        let service = FeeService::disabled();
        assert!(!service.is_enabled());
        let summary = service.apply(&mut records).await;
        assert_eq!(summary, FeeSummary { from_sheet: 1, estimated: 0, failed: 0 });
        assert_eq!(records[0].fee_source, FeeSource::Missing);
        assert!(records[0].fee_error.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_queries_are_sent_once_in_first_seen_order() {
        let estimator = Arc::new(RecordingEstimator::default());
        let service = FeeService::new(Some(estimator.clone()), 30);
        assert!(service.is_enabled());
        let mut records = vec![
            record("a", Some("8场"), Some("150"), None),
            record("b", Some("4场"), Some("50"), None),
            record("c", Some("8场"), Some("150"), None),
            record("d", Some("2.5天"), Some("650"), Some(1650)),
            record("e", Some("4场"), None, None),
        ];
        let summary = service.apply(&mut records).await;

        let batches = estimator.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].iter().map(|q| q.sessions.as_str()).collect::<Vec<_>>(),
            vec!["8场", "4场"]
        );
        assert_eq!(summary, FeeSummary { from_sheet: 1, estimated: 3, failed: 0 });
        assert_eq!(records[0].fee, Some(Decimal::from(200)));
        assert_eq!(records[2].fee, Some(Decimal::from(200)));
        assert_eq!(records[2].fee_source, FeeSource::Estimated);
        assert_eq!(records[3].fee, Some(Decimal::from(1650)));
        assert_eq!(records[3].fee_source, FeeSource::Sheet);
        assert_eq!(records[4].fee_source, FeeSource::Missing);
    }

    #[tokio::test]
    async fn test_failed_batch_only_marks_its_rows() {
        let estimator = Arc::new(RecordingEstimator {
            fail_batch: Some(1),
            ..RecordingEstimator::default()
        });
        let service = FeeService::new(Some(estimator.clone()), 2);
        let mut records: Vec<FeeRecord> = (1..=5)
            .map(|n| record("x", Some(&"场".repeat(n)), Some("50"), None))
            .collect();
        let summary = service.apply(&mut records).await;

        assert_eq!(estimator.batches.lock().unwrap().len(), 3);
        assert_eq!(summary.estimated, 3);
        assert_eq!(summary.failed, 2);
        assert!(records[2].fee_error.as_deref().unwrap().contains("garbled"));
        assert!(records[3].fee_error.is_some());
        assert_eq!(records[4].fee, Some(Decimal::from(500)));
        assert!(records[0].fee_error.is_none());
    }
}
