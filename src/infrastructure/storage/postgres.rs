//! PostgreSQL run store with connection pooling

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use super::migrations::run_storage_migrations;
use crate::domain::llm::{FinishReason, Message, PromptConfig, ToolCall};
use crate::domain::provider_log::{CreatedProviderLog, NewProviderLog, ProviderLog, ProviderLogRepository};
use crate::domain::run_error::{Errorable, NewRunError, RunError, RunErrorRepository};
use crate::domain::runs::{
    DocumentLog, EvaluationResult, NewDocumentLog, NewEvaluationResult, RunRecordRepository,
};
use crate::domain::workspace::LogSources;
use crate::domain::DomainError;

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/prompt_chain_runner".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

fn storage_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| DomainError::storage(format!("{}: {}", context, e))
}

/// Enum columns hold the serde name of the variant
fn parse_enum<T: DeserializeOwned>(value: String) -> Result<T, DomainError> {
    serde_json::from_value(Value::String(value.clone()))
        .map_err(|e| DomainError::storage(format!("Invalid stored value '{}': {}", value, e)))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Store for run errors, provider logs, document logs and evaluation results
#[derive(Clone)]
pub struct PostgresRunStore {
    pool: PgPool,
}

impl Debug for PostgresRunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRunStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(storage_error("Failed to connect to PostgreSQL"))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending migrations
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        run_storage_migrations(&self.pool).await.map(|_| ())
    }
}

async fn insert_run_error<'e, E: PgExecutor<'e>>(
    executor: E,
    error: NewRunError,
) -> Result<RunError, DomainError> {
    let row = sqlx::query(
        r#"
        INSERT INTO run_errors (errorable_uuid, errorable_type, code, message, details)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, created_at
        "#,
    )
    .bind(error.errorable.errorable_uuid)
    .bind(error.errorable.errorable_type.as_str())
    .bind(error.code.as_str())
    .bind(&error.message)
    .bind(error.details.as_ref().map(Json))
    .fetch_one(executor)
    .await
    .map_err(storage_error("Failed to insert run error"))?;

    Ok(RunError {
        id: row.try_get("id").map_err(storage_error("Failed to read run error id"))?,
        errorable_uuid: error.errorable.errorable_uuid,
        errorable_type: error.errorable.errorable_type,
        code: error.code,
        message: error.message,
        details: error.details,
        created_at: row
            .try_get("created_at")
            .map_err(storage_error("Failed to read run error timestamp"))?,
    })
}

fn provider_log_from_row(row: &PgRow) -> Result<ProviderLog, DomainError> {
    let source: String = row.try_get("source").map_err(storage_error("Failed to read source"))?;
    let finish_reason: String = row
        .try_get("finish_reason")
        .map_err(storage_error("Failed to read finish reason"))?;

    let decode = || -> Result<ProviderLog, sqlx::Error> {
        Ok(ProviderLog {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            document_log_uuid: row.try_get("document_log_uuid")?,
            provider_id: row.try_get("provider_id")?,
            model: row.try_get("model")?,
            config: row.try_get::<Json<PromptConfig>, _>("config")?.0,
            messages: row.try_get::<Json<Vec<Message>>, _>("messages")?.0,
            response_text: row.try_get("response_text")?,
            response_object: row.try_get("response_object")?,
            tool_calls: row.try_get::<Json<Vec<ToolCall>>, _>("tool_calls")?.0,
            tokens: to_u64(row.try_get("tokens")?),
            cost_in_millicents: to_u64(row.try_get("cost_in_millicents")?),
            duration_ms: to_u64(row.try_get("duration_ms")?),
            source: LogSources::Api,
            api_key_id: row.try_get("api_key_id")?,
            finish_reason: FinishReason::Other,
            error_id: row.try_get("error_id")?,
            generated_at: row.try_get("generated_at")?,
            created_at: row.try_get("created_at")?,
        })
    };

    Ok(ProviderLog {
        source: parse_enum(source)?,
        finish_reason: parse_enum(finish_reason)?,
        ..decode().map_err(storage_error("Failed to read provider log"))?
    })
}

const PROVIDER_LOG_COLUMNS: &str = "id, uuid, document_log_uuid, provider_id, model, config, \
    messages, response_text, response_object, tool_calls, tokens, cost_in_millicents, \
    duration_ms, source, api_key_id, finish_reason, error_id, generated_at, created_at";

#[async_trait]
impl RunErrorRepository for PostgresRunStore {
    async fn create(&self, error: NewRunError) -> Result<RunError, DomainError> {
        insert_run_error(&self.pool, error).await
    }
}

#[async_trait]
impl ProviderLogRepository for PostgresRunStore {
    async fn create(
        &self,
        log: NewProviderLog,
        cost_in_millicents: u64,
    ) -> Result<CreatedProviderLog, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_error("Failed to begin transaction"))?;

        let run_error = match &log.provider_error {
            Some(link) => {
                let errorable = Errorable::new(link.errorable_type, link.errorable_uuid);
                let error = NewRunError::new(errorable, link.error_code, link.message.clone());
                Some(insert_run_error(&mut *tx, error).await?)
            }
            None => None,
        };

        let data = &log.data;
        let row = sqlx::query(
            r#"
            INSERT INTO provider_logs (
                uuid, document_log_uuid, provider_id, model, config, messages,
                response_text, response_object, tool_calls, tokens, cost_in_millicents,
                duration_ms, source, api_key_id, finish_reason, error_id, generated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id, created_at
            "#,
        )
        .bind(data.uuid)
        .bind(data.document_log_uuid)
        .bind(data.provider_id)
        .bind(&data.model)
        .bind(Json(&data.config))
        .bind(Json(&data.messages))
        .bind(&data.response_text)
        .bind(&data.response_object)
        .bind(Json(&data.tool_calls))
        .bind(i64::from(data.usage.total_tokens))
        .bind(to_i64(cost_in_millicents))
        .bind(to_i64(data.duration_ms))
        .bind(data.source.as_str())
        .bind(data.api_key_id)
        .bind(log.finish_reason.as_str())
        .bind(run_error.as_ref().map(|e| e.id))
        .bind(data.generated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error("Failed to insert provider log"))?;

        sqlx::query("UPDATE provider_api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(data.provider_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error("Failed to touch provider api key"))?;

        if let Some(api_key_id) = data.api_key_id {
            sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
                .bind(api_key_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_error("Failed to touch api key"))?;
        }

        tx.commit()
            .await
            .map_err(storage_error("Failed to commit provider log"))?;

        let id: i64 = row.try_get("id").map_err(storage_error("Failed to read provider log id"))?;
        let mut provider_log =
            ProviderLog::from_new(id, &log, cost_in_millicents, run_error.as_ref().map(|e| e.id));
        provider_log.created_at = row
            .try_get("created_at")
            .map_err(storage_error("Failed to read provider log timestamp"))?;

        Ok(CreatedProviderLog {
            provider_log,
            run_error,
        })
    }

    async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<ProviderLog>, DomainError> {
        let query = format!("SELECT {} FROM provider_logs WHERE uuid = $1", PROVIDER_LOG_COLUMNS);

        let row = sqlx::query(&query)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("Failed to get provider log"))?;

        row.as_ref().map(provider_log_from_row).transpose()
    }

    async fn list_by_document_log(
        &self,
        document_log_uuid: &Uuid,
    ) -> Result<Vec<ProviderLog>, DomainError> {
        let query = format!(
            "SELECT {} FROM provider_logs WHERE document_log_uuid = $1 ORDER BY created_at, id",
            PROVIDER_LOG_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(document_log_uuid)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("Failed to list provider logs"))?;

        rows.iter().map(provider_log_from_row).collect()
    }
}

fn document_log_from_row(row: &PgRow) -> Result<DocumentLog, DomainError> {
    let source: String = row.try_get("source").map_err(storage_error("Failed to read source"))?;

    let decode = || -> Result<DocumentLog, sqlx::Error> {
        Ok(DocumentLog {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            document_uuid: row.try_get("document_uuid")?,
            commit_uuid: row.try_get("commit_uuid")?,
            parameters: row.try_get::<Json<Map<String, Value>>, _>("parameters")?.0,
            resolved_content: row.try_get("resolved_content")?,
            duration_ms: to_u64(row.try_get("duration_ms")?),
            source: LogSources::Api,
            created_at: row.try_get("created_at")?,
        })
    };

    Ok(DocumentLog {
        source: parse_enum(source)?,
        ..decode().map_err(storage_error("Failed to read document log"))?
    })
}

#[async_trait]
impl RunRecordRepository for PostgresRunStore {
    async fn create_document_log(&self, log: NewDocumentLog) -> Result<DocumentLog, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_logs (
                uuid, document_uuid, commit_uuid, parameters, resolved_content, duration_ms, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, uuid, document_uuid, commit_uuid, parameters, resolved_content,
                      duration_ms, source, created_at
            "#,
        )
        .bind(log.uuid)
        .bind(log.document_uuid)
        .bind(log.commit_uuid)
        .bind(Json(&log.parameters))
        .bind(&log.resolved_content)
        .bind(to_i64(log.duration_ms))
        .bind(log.source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("Failed to insert document log"))?;

        document_log_from_row(&row)
    }

    async fn find_document_log(&self, uuid: &Uuid) -> Result<Option<DocumentLog>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, uuid, document_uuid, commit_uuid, parameters, resolved_content,
                   duration_ms, source, created_at
            FROM document_logs WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("Failed to get document log"))?;

        row.as_ref().map(document_log_from_row).transpose()
    }

    async fn create_evaluation_result(
        &self,
        result: NewEvaluationResult,
    ) -> Result<EvaluationResult, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO evaluation_results (
                uuid, evaluation_id, document_log_uuid, provider_log_uuid, result_type,
                result, reason, source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
            "#,
        )
        .bind(result.uuid)
        .bind(result.evaluation_id)
        .bind(result.document_log_uuid)
        .bind(result.provider_log_uuid)
        .bind(result.result_type.as_str())
        .bind(&result.result)
        .bind(&result.reason)
        .bind(result.source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("Failed to insert evaluation result"))?;

        Ok(EvaluationResult {
            id: row.try_get("id").map_err(storage_error("Failed to read evaluation result id"))?,
            uuid: result.uuid,
            evaluation_id: result.evaluation_id,
            document_log_uuid: result.document_log_uuid,
            provider_log_uuid: result.provider_log_uuid,
            result_type: result.result_type,
            result: result.result,
            reason: result.reason,
            source: result.source,
            created_at: row
                .try_get("created_at")
                .map_err(storage_error("Failed to read evaluation result timestamp"))?,
        })
    }
}
