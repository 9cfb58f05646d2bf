//! Database migrations infrastructure

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// PostgreSQL migrator tracking applied versions in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))
    }

    /// Runs a single migration unless already applied
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        info!(version = migration.version, description = migration.description, "Applied migration");
        Ok(true)
    }

    /// Reverts a single migration if applied
    pub async fn revert_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if !self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::raw_sql(migration.down)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit revert: {}", e)))?;

        info!(version = migration.version, "Reverted migration");
        Ok(true)
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations WHERE success = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

impl Migration {
    pub const fn new(
        version: i64,
        description: &'static str,
        up: &'static str,
        down: &'static str,
    ) -> Self {
        Self {
            version,
            description,
            up,
            down,
        }
    }
}

/// Schema of the run pipeline tables
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create provider credential tables",
            r#"
            CREATE TABLE IF NOT EXISTS provider_api_keys (
                id BIGSERIAL PRIMARY KEY,
                workspace_id BIGINT NOT NULL,
                provider VARCHAR(32) NOT NULL,
                name VARCHAR(255) NOT NULL,
                token TEXT NOT NULL,
                url TEXT,
                last_used_at TIMESTAMPTZ,
                UNIQUE (workspace_id, name)
            );
            CREATE TABLE IF NOT EXISTS api_keys (
                id BIGSERIAL PRIMARY KEY,
                workspace_id BIGINT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                last_used_at TIMESTAMPTZ
            );
            "#,
            r#"
            DROP TABLE IF EXISTS api_keys;
            DROP TABLE IF EXISTS provider_api_keys;
            "#,
        ),
        Migration::new(
            2,
            "Create run_errors table",
            r#"
            CREATE TABLE IF NOT EXISTS run_errors (
                id BIGSERIAL PRIMARY KEY,
                errorable_uuid UUID NOT NULL,
                errorable_type VARCHAR(64) NOT NULL,
                code VARCHAR(64) NOT NULL,
                message TEXT NOT NULL,
                details JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_run_errors_errorable ON run_errors(errorable_uuid);
            "#,
            r#"
            DROP TABLE IF EXISTS run_errors;
            "#,
        ),
        Migration::new(
            3,
            "Create provider_logs table",
            r#"
            CREATE TABLE IF NOT EXISTS provider_logs (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE,
                document_log_uuid UUID,
                provider_id BIGINT NOT NULL,
                model VARCHAR(255) NOT NULL,
                config JSONB NOT NULL,
                messages JSONB NOT NULL,
                response_text TEXT,
                response_object JSONB,
                tool_calls JSONB NOT NULL DEFAULT '[]',
                tokens BIGINT NOT NULL,
                cost_in_millicents BIGINT NOT NULL,
                duration_ms BIGINT NOT NULL,
                source VARCHAR(32) NOT NULL,
                api_key_id BIGINT,
                finish_reason VARCHAR(32) NOT NULL,
                error_id BIGINT REFERENCES run_errors(id),
                generated_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_provider_logs_document_log ON provider_logs(document_log_uuid, created_at);
            "#,
            r#"
            DROP TABLE IF EXISTS provider_logs;
            "#,
        ),
        Migration::new(
            4,
            "Create document_logs and evaluation_results tables",
            r#"
            CREATE TABLE IF NOT EXISTS document_logs (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE,
                document_uuid UUID NOT NULL,
                commit_uuid UUID NOT NULL,
                parameters JSONB NOT NULL,
                resolved_content TEXT NOT NULL,
                duration_ms BIGINT NOT NULL,
                source VARCHAR(32) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE TABLE IF NOT EXISTS evaluation_results (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE,
                evaluation_id BIGINT NOT NULL,
                document_log_uuid UUID NOT NULL,
                provider_log_uuid UUID,
                result_type VARCHAR(16) NOT NULL,
                result JSONB,
                reason TEXT,
                source VARCHAR(32) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"
            DROP TABLE IF EXISTS evaluation_results;
            DROP TABLE IF EXISTS document_logs;
            "#,
        ),
    ]
}

/// Applies every pending migration in order
pub async fn run_storage_migrations(pool: &PgPool) -> Result<usize, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());
    let mut applied = 0;

    for migration in storage_migrations() {
        if migrator.run_migration(&migration).await? {
            applied += 1;
        }
    }

    Ok(applied)
}

/// Reverts the latest applied migration, returning its version
pub async fn revert_last_migration(pool: &PgPool) -> Result<Option<i64>, DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());

    let Some(version) = migrator.current_version().await? else {
        return Ok(None);
    };

    match storage_migrations().iter().find(|m| m.version == version) {
        Some(migration) => {
            migrator.revert_migration(migration).await?;
            Ok(Some(version))
        }
        None => Err(DomainError::storage(format!(
            "Applied migration {} is unknown to this build",
            version
        ))),
    }
}
