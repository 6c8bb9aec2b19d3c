use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use drill_core::model::ResultRecord;
use reqwest::Client;
use storage::repository::ResultQueueRepository;
use tracing::warn;

use crate::error::ReportingError;

/// External sink for finished and interim session results.
#[async_trait]
pub trait ResultAggregator: Send + Sync {
    /// Submit one record. The aggregator upserts by (session id, name);
    /// repeated pushes for the same session must not accumulate duplicates.
    ///
    /// # Errors
    ///
    /// Returns `ReportingError` when the submission does not reach the
    /// aggregator.
    async fn push(&self, record: &ResultRecord) -> Result<(), ReportingError>;
}

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    pub endpoint: String,
}

impl AggregatorConfig {
    /// Read the aggregator endpoint from `DRILL_RESULTS_URL`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("DRILL_RESULTS_URL").ok()?;
        if endpoint.trim().is_empty() {
            return None;
        }
        Some(Self { endpoint })
    }
}

/// JSON POST submission to the remote results aggregator.
#[derive(Clone)]
pub struct HttpAggregator {
    client: Client,
    config: AggregatorConfig,
}

impl HttpAggregator {
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        AggregatorConfig::from_env().map(Self::new)
    }
}

#[async_trait]
impl ResultAggregator for HttpAggregator {
    async fn push(&self, record: &ResultRecord) -> Result<(), ReportingError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(record)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ReportingError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

/// Pushes results to the aggregator, falling back to a locally persisted
/// queue when the network is unavailable. Reporting never blocks or fails
/// the participant's flow; failures are logged and queued for later
/// reconciliation.
#[derive(Clone)]
pub struct ResultReporter {
    aggregator: Option<Arc<dyn ResultAggregator>>,
    queue: Arc<dyn ResultQueueRepository>,
}

impl ResultReporter {
    #[must_use]
    pub fn new(
        aggregator: Option<Arc<dyn ResultAggregator>>,
        queue: Arc<dyn ResultQueueRepository>,
    ) -> Self {
        Self { aggregator, queue }
    }

    /// A reporter with no external aggregator; every push goes to the local
    /// queue.
    #[must_use]
    pub fn local_only(queue: Arc<dyn ResultQueueRepository>) -> Self {
        Self::new(None, queue)
    }

    /// Push a record, queuing it locally when the aggregator is missing or
    /// unreachable. Returns whether the record reached the aggregator.
    pub async fn push(&self, record: &ResultRecord) -> bool {
        match &self.aggregator {
            Some(aggregator) => match aggregator.push(record).await {
                Ok(()) => {
                    // A stale queued copy from an earlier failed push is now
                    // superseded.
                    if let Err(e) = self.queue.remove_result(&record.id, &record.name).await {
                        warn!(session_id = %record.id, error = %e, "failed to clear queued result");
                    }
                    true
                }
                Err(e) => {
                    warn!(session_id = %record.id, error = %e, "result push failed, queuing locally");
                    self.enqueue(record).await;
                    false
                }
            },
            None => {
                self.enqueue(record).await;
                false
            }
        }
    }

    /// Drain the local queue into the aggregator. Stops at the first failed
    /// push, leaving the remainder queued. Returns how many records were
    /// delivered.
    pub async fn reconcile(&self) -> usize {
        let Some(aggregator) = &self.aggregator else {
            return 0;
        };
        let queued = match self.queue.list_results().await {
            Ok(queued) => queued,
            Err(e) => {
                warn!(error = %e, "failed to read queued results");
                return 0;
            }
        };
        let mut delivered = 0;
        for record in queued {
            if let Err(e) = aggregator.push(&record).await {
                warn!(session_id = %record.id, error = %e, "reconcile push failed, keeping queued");
                break;
            }
            if let Err(e) = self.queue.remove_result(&record.id, &record.name).await {
                warn!(session_id = %record.id, error = %e, "failed to remove reconciled result");
            }
            delivered += 1;
        }
        delivered
    }

    async fn enqueue(&self, record: &ResultRecord) {
        if let Err(e) = self.queue.upsert_result(record).await {
            // Both the aggregator and local storage failed; the record only
            // lives in memory now. Log loudly, keep the session running.
            warn!(session_id = %record.id, error = %e, "failed to queue result locally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::InMemoryRepository;

    /// Records pushes; optionally refuses them to exercise the fallback.
    #[derive(Default)]
    pub(crate) struct RecordingAggregator {
        pub(crate) pushed: Mutex<Vec<ResultRecord>>,
        pub(crate) fail: AtomicBool,
    }

    #[async_trait]
    impl ResultAggregator for RecordingAggregator {
        async fn push(&self, record: &ResultRecord) -> Result<(), ReportingError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ReportingError::Disabled);
            }
            let mut guard = self.pushed.lock().expect("aggregator lock");
            if let Some(existing) = guard
                .iter_mut()
                .find(|r| r.id == record.id && r.name == record.name)
            {
                *existing = record.clone();
            } else {
                guard.push(record.clone());
            }
            Ok(())
        }
    }

    fn record(score: u32) -> ResultRecord {
        ResultRecord {
            id: "s-1".into(),
            name: "Lena".into(),
            score,
            base_score: score,
            time_bonus: 0,
            total_time: 60_000,
            time_in_minutes: 1,
            questions_answered: 1,
            correct_answers: 1,
            progress_percent: 25,
        }
    }

    #[tokio::test]
    async fn push_prefers_aggregator_and_skips_queue() {
        let aggregator = Arc::new(RecordingAggregator::default());
        let queue = Arc::new(InMemoryRepository::new());
        let reporter = ResultReporter::new(Some(aggregator.clone()), queue.clone());

        assert!(reporter.push(&record(10)).await);
        assert_eq!(aggregator.pushed.lock().unwrap().len(), 1);
        assert!(queue.list_results().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_push_falls_back_to_local_queue() {
        let aggregator = Arc::new(RecordingAggregator::default());
        aggregator.fail.store(true, Ordering::SeqCst);
        let queue = Arc::new(InMemoryRepository::new());
        let reporter = ResultReporter::new(Some(aggregator.clone()), queue.clone());

        assert!(!reporter.push(&record(10)).await);
        assert!(!reporter.push(&record(25)).await);

        let queued = queue.list_results().await.unwrap();
        assert_eq!(queued.len(), 1, "repeated pushes upsert, not append");
        assert_eq!(queued[0].score, 25);
    }

    #[tokio::test]
    async fn reconcile_drains_the_queue_once_reachable() {
        let aggregator = Arc::new(RecordingAggregator::default());
        aggregator.fail.store(true, Ordering::SeqCst);
        let queue = Arc::new(InMemoryRepository::new());
        let reporter = ResultReporter::new(Some(aggregator.clone()), queue.clone());

        reporter.push(&record(40)).await;
        aggregator.fail.store(false, Ordering::SeqCst);

        assert_eq!(reporter.reconcile().await, 1);
        assert!(queue.list_results().await.unwrap().is_empty());
        assert_eq!(aggregator.pushed.lock().unwrap()[0].score, 40);
    }

    #[tokio::test]
    async fn local_only_reporter_always_queues() {
        let queue = Arc::new(InMemoryRepository::new());
        let reporter = ResultReporter::local_only(queue.clone());
        assert!(!reporter.push(&record(10)).await);
        assert_eq!(queue.list_results().await.unwrap().len(), 1);
        assert_eq!(reporter.reconcile().await, 0);
    }
}
