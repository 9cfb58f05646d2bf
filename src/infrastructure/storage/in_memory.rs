//! In-memory run store

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::provider_log::{CreatedProviderLog, NewProviderLog, ProviderLog, ProviderLogRepository};
use crate::domain::run_error::{NewRunError, RunError, RunErrorRepository};
use crate::domain::runs::{
    DocumentLog, EvaluationResult, NewDocumentLog, NewEvaluationResult, RunRecordRepository,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct RunStoreState {
    last_id: i64,
    run_errors: Vec<RunError>,
    provider_logs: Vec<ProviderLog>,
    document_logs: Vec<DocumentLog>,
    evaluation_results: Vec<EvaluationResult>,
    provider_key_last_used: HashMap<i64, DateTime<Utc>>,
    api_key_last_used: HashMap<i64, DateTime<Utc>>,
}

impl RunStoreState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

fn run_error_row(id: i64, error: NewRunError) -> RunError {
    RunError {
        id,
        errorable_uuid: error.errorable.errorable_uuid,
        errorable_type: error.errorable.errorable_type,
        code: error.code,
        message: error.message,
        details: error.details,
        created_at: Utc::now(),
    }
}

/// Thread-safe in-memory store for every run pipeline record
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    state: RwLock<RunStoreState>,
    #[cfg(test)]
    fail_provider_log_writes: AtomicBool,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every provider log write fail after its run error is staged
    #[cfg(test)]
    pub(crate) fn fail_provider_log_writes(&self, fail: bool) {
        self.fail_provider_log_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, RunStoreState>, DomainError> {
        self.state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, RunStoreState>, DomainError> {
        self.state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }

    pub fn run_errors(&self) -> Result<Vec<RunError>, DomainError> {
        Ok(self.read()?.run_errors.clone())
    }

    pub fn provider_logs(&self) -> Result<Vec<ProviderLog>, DomainError> {
        Ok(self.read()?.provider_logs.clone())
    }

    pub fn document_logs(&self) -> Result<Vec<DocumentLog>, DomainError> {
        Ok(self.read()?.document_logs.clone())
    }

    pub fn evaluation_results(&self) -> Result<Vec<EvaluationResult>, DomainError> {
        Ok(self.read()?.evaluation_results.clone())
    }

    pub fn provider_key_last_used(&self, provider_id: i64) -> Result<Option<DateTime<Utc>>, DomainError> {
        Ok(self.read()?.provider_key_last_used.get(&provider_id).copied())
    }

    pub fn api_key_last_used(&self, api_key_id: i64) -> Result<Option<DateTime<Utc>>, DomainError> {
        Ok(self.read()?.api_key_last_used.get(&api_key_id).copied())
    }
}

#[async_trait]
impl RunErrorRepository for InMemoryRunStore {
    async fn create(&self, error: NewRunError) -> Result<RunError, DomainError> {
        let mut state = self.write()?;
        let id = state.next_id();
        let row = run_error_row(id, error);

        state.run_errors.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl ProviderLogRepository for InMemoryRunStore {
    async fn create(
        &self,
        log: NewProviderLog,
        cost_in_millicents: u64,
    ) -> Result<CreatedProviderLog, DomainError> {
        // The lock is held for the whole unit; nothing is committed until every step succeeded
        let mut state = self.write()?;
        #[cfg(test)]
        let first_id = state.last_id;

        let run_error = log.provider_error.as_ref().map(|link| {
            let id = state.next_id();
            let errorable = crate::domain::run_error::Errorable::new(
                link.errorable_type,
                link.errorable_uuid,
            );
            run_error_row(id, NewRunError::new(errorable, link.error_code, link.message.clone()))
        });

        #[cfg(test)]
        if self.fail_provider_log_writes.load(Ordering::SeqCst) {
            state.last_id = first_id;
            return Err(DomainError::storage("Failed to insert provider log"));
        }

        let id = state.next_id();
        let provider_log = ProviderLog::from_new(
            id,
            &log,
            cost_in_millicents,
            run_error.as_ref().map(|e| e.id),
        );

        let now = Utc::now();
        state.provider_key_last_used.insert(log.data.provider_id, now);
        if let Some(api_key_id) = log.data.api_key_id {
            state.api_key_last_used.insert(api_key_id, now);
        }

        if let Some(error) = &run_error {
            state.run_errors.push(error.clone());
        }
        state.provider_logs.push(provider_log.clone());

        Ok(CreatedProviderLog {
            provider_log,
            run_error,
        })
    }

    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<ProviderLog>, DomainError> {
        Ok(self
            .read()?
            .provider_logs
            .iter()
            .find(|log| &log.uuid == uuid)
            .cloned())
    }

    async fn list_by_document_log(
        &self,
        document_log_uuid: &Uuid,
    ) -> Result<Vec<ProviderLog>, DomainError> {
        Ok(self
            .read()?
            .provider_logs
            .iter()
            .filter(|log| log.document_log_uuid.as_ref() == Some(document_log_uuid))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RunRecordRepository for InMemoryRunStore {
    async fn create_document_log(&self, log: NewDocumentLog) -> Result<DocumentLog, DomainError> {
        let mut state = self.write()?;

        if state.document_logs.iter().any(|existing| existing.uuid == log.uuid) {
            return Err(DomainError::storage(format!(
                "Document log with uuid {} already exists",
                log.uuid
            )));
        }

        let row = DocumentLog {
            id: state.next_id(),
            uuid: log.uuid,
            document_uuid: log.document_uuid,
            commit_uuid: log.commit_uuid,
            parameters: log.parameters,
            resolved_content: log.resolved_content,
            duration_ms: log.duration_ms,
            source: log.source,
            created_at: Utc::now(),
        };

        state.document_logs.push(row.clone());
        Ok(row)
    }

    async fn find_document_log(&self, uuid: &Uuid) -> Result<Option<DocumentLog>, DomainError> {
        Ok(self
            .read()?
            .document_logs
            .iter()
            .find(|log| &log.uuid == uuid)
            .cloned())
    }

    async fn create_evaluation_result(
        &self,
        result: NewEvaluationResult,
    ) -> Result<EvaluationResult, DomainError> {
        let mut state = self.write()?;

        let row = EvaluationResult {
            id: state.next_id(),
            uuid: result.uuid,
            evaluation_id: result.evaluation_id,
            document_log_uuid: result.document_log_uuid,
            provider_log_uuid: result.provider_log_uuid,
            result_type: result.result_type,
            result: result.result,
            reason: result.reason,
            source: result.source,
            created_at: Utc::now(),
        };

        state.evaluation_results.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider_log::fixtures::new_provider_log;
    use crate::domain::provider_log::ProviderErrorLink;
    use crate::domain::run_error::{ErrorableType, RunErrorCode};
    use crate::domain::workspace::LogSources;
    use serde_json::Map;

    fn error_link(errorable_uuid: Uuid) -> ProviderErrorLink {
        ProviderErrorLink {
            errorable_type: ErrorableType::DocumentLog,
            errorable_uuid,
            error_code: RunErrorCode::AiRunError,
            message: "Rate limit reached".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_provider_log_touches_keys() {
        let store = InMemoryRunStore::new();
        let mut log = new_provider_log();
        log.data.api_key_id = Some(77);

        let created = ProviderLogRepository::create(&store, log.clone(), 25).await.unwrap();

        assert_eq!(created.provider_log.uuid, log.data.uuid);
        assert_eq!(created.provider_log.cost_in_millicents, 25);
        assert!(created.run_error.is_none());
        assert!(store.provider_key_last_used(10).unwrap().is_some());
        assert!(store.api_key_last_used(77).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provider_error_is_linked() {
        let store = InMemoryRunStore::new();
        let errorable_uuid = Uuid::new_v4();
        let log = new_provider_log().with_provider_error(error_link(errorable_uuid));

        let created = ProviderLogRepository::create(&store, log, 0).await.unwrap();

        let run_error = created.run_error.unwrap();
        assert_eq!(run_error.errorable_uuid, errorable_uuid);
        assert_eq!(run_error.code, RunErrorCode::AiRunError);
        assert_eq!(created.provider_log.error_id, Some(run_error.id));
        assert_eq!(store.run_errors().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_run_error() {
        let store = InMemoryRunStore::new();
        store.fail_provider_log_writes(true);

        let log = new_provider_log().with_provider_error(error_link(Uuid::new_v4()));
        let result = ProviderLogRepository::create(&store, log, 0).await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert!(store.run_errors().unwrap().is_empty());
        assert!(store.provider_logs().unwrap().is_empty());
        assert!(store.provider_key_last_used(10).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_document_log_keeps_insertion_order() {
        let store = InMemoryRunStore::new();
        let document_log_uuid = Uuid::new_v4();

        let mut first = new_provider_log();
        first.data.document_log_uuid = Some(document_log_uuid);
        let mut second = new_provider_log();
        second.data.document_log_uuid = Some(document_log_uuid);

        ProviderLogRepository::create(&store, first.clone(), 0).await.unwrap();
        ProviderLogRepository::create(&store, new_provider_log(), 0).await.unwrap();
        ProviderLogRepository::create(&store, second.clone(), 0).await.unwrap();

        let logs = store.list_by_document_log(&document_log_uuid).await.unwrap();
        let uuids: Vec<_> = logs.iter().map(|l| l.uuid).collect();
        assert_eq!(uuids, vec![first.data.uuid, second.data.uuid]);

        let found = store.find_by_uuid(&second.data.uuid).await.unwrap();
        assert_eq!(found.map(|l| l.uuid), Some(second.data.uuid));
    }

    #[tokio::test]
    async fn test_document_log_uuid_is_unique() {
        let store = InMemoryRunStore::new();
        let log = NewDocumentLog {
            uuid: Uuid::new_v4(),
            document_uuid: Uuid::new_v4(),
            commit_uuid: Uuid::new_v4(),
            parameters: Map::new(),
            resolved_content: "Hello".to_string(),
            duration_ms: 10,
            source: LogSources::Api,
        };

        store.create_document_log(log.clone()).await.unwrap();
        assert!(store.create_document_log(log.clone()).await.is_err());

        let found = store.find_document_log(&log.uuid).await.unwrap().unwrap();
        assert_eq!(found.resolved_content, "Hello");
    }
}
