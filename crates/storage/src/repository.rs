use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drill_core::model::{ResultRecord, SessionId, SessionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for a session, one row per session id.
///
/// This mirrors the domain `SessionState` so repositories can
/// serialize/deserialize without leaking storage concerns into the domain
/// layer. `total_time_ms` is derived at save time and is informational on
/// load; session timing is always recomputed from the two epochs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub participant_name: String,
    pub current_item_index: u32,
    pub score: u32,
    pub total_time_ms: i64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub game_start_time: DateTime<Utc>,
    pub last_activity_time: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            participant_name: state.participant_name().to_owned(),
            current_item_index: state.current_item_index(),
            score: state.score(),
            total_time_ms: state.total_elapsed_ms(),
            questions_answered: state.items_answered(),
            correct_answers: state.correct_count(),
            game_start_time: state.session_started_at(),
            last_activity_time: state.last_activity_at(),
        }
    }

    /// Convert the record back into a domain `SessionState`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the persisted counters
    /// violate the state invariants.
    pub fn into_state(self) -> Result<SessionState, StorageError> {
        SessionState::from_persisted(
            self.participant_name,
            self.current_item_index,
            self.score,
            self.questions_answered,
            self.correct_answers,
            self.game_start_time,
            self.last_activity_time,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Repository contract for persisted session state.
///
/// One record per session id, upserted on save. Records are never evicted;
/// they persist until externally cleared.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or update the state for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_session(
        &self,
        id: &SessionId,
        record: &SessionRecord,
    ) -> Result<(), StorageError>;

    /// Fetch the persisted state for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for connection or decoding failures. A missing
    /// record is `Ok(None)`, not an error.
    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError>;
}

/// Locally queued result records awaiting reconciliation with the external
/// aggregator. Keyed by (session id, participant name); a later record for
/// the same key replaces the earlier one.
#[async_trait]
pub trait ResultQueueRepository: Send + Sync {
    /// Insert or replace the queued record for its (id, name) key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_result(&self, record: &ResultRecord) -> Result<(), StorageError>;

    /// All queued records, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for connection or decoding failures.
    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError>;

    /// Drop a queued record once it reached the aggregator.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails. Removing a missing record
    /// is not an error.
    async fn remove_result(&self, session_id: &str, name: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
    results: Arc<Mutex<Vec<ResultRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn save_session(
        &self,
        id: &SessionId,
        record: &SessionRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(id.as_str().to_owned(), record.clone());
        Ok(())
    }

    async fn load_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id.as_str()).cloned())
    }
}

#[async_trait]
impl ResultQueueRepository for InMemoryRepository {
    async fn upsert_result(&self, record: &ResultRecord) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
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

    async fn list_results(&self) -> Result<Vec<ResultRecord>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn remove_result(&self, session_id: &str, name: &str) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|r| !(r.id == session_id && r.name == name));
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub result_queue: Arc<dyn ResultQueueRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let result_queue: Arc<dyn ResultQueueRepository> = Arc::new(repo);
        Self {
            sessions,
            result_queue,
        }
    }
}
