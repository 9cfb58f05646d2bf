use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    pub quota: QuotaSettings,
    pub runner: RunnerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Counting cache backing the free-runs quota
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `in_memory` or `redis`
    #[serde(rename = "type")]
    pub cache_type: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_type: "in_memory".to_string(),
            redis_url: None,
            key_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `in_memory` or `postgres`
    #[serde(rename = "type")]
    pub storage_type: String,
    pub postgres_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_type: "in_memory".to_string(),
            postgres_url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub max_free_runs: i64,
    /// Token of the shared provider whose runs are metered
    pub default_provider_api_key: Option<String>,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            max_free_runs: 1000,
            default_provider_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub save_sync_provider_logs: bool,
    pub job_queue_capacity: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            save_sync_provider_logs: true,
            job_queue_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
