/// Configuration management for app-tests
///
/// Loads configuration from environment variables with sensible defaults.
use resilience::{presets, RetryConfig};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Largest accepted `ELASTICSEARCH_BULK_CHUNK_SIZE`
pub const MAX_BULK_CHUNK_SIZE: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub harness: HarnessConfig,
    pub elastic: ElasticConfig,
}

#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Working directory of the managed application
    pub scope_path: PathBuf,
    /// Where subprocess logs and the run report are written
    pub logs_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ElasticConfig {
    pub host: String,
    pub port: u16,
    pub entrypoint: String,
    pub start_wait: Duration,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
    pub request_timeout: Duration,
    pub documents: usize,
    pub bulk_chunk_size: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scope_path: PathBuf::from("."),
            logs_path: PathBuf::from("./logs"),
        }
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        let connect = presets::search_connect_config();
        let retry = connect.retry.unwrap_or_default();

        Self {
            host: "localhost".to_string(),
            port: 9200,
            entrypoint: "/usr/local/bin/docker-entrypoint.sh".to_string(),
            start_wait: Duration::from_secs(15),
            connect_attempts: retry.max_attempts,
            connect_delay: retry.initial_backoff,
            request_timeout: connect.timeout.duration,
            documents: 1000,
            bulk_chunk_size: 500,
        }
    }
}

impl ElasticConfig {
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}:{}", self.host, self.port))
    }

    pub fn connect_retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.connect_attempts, self.connect_delay)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let harness_defaults = HarnessConfig::default();
        let elastic_defaults = ElasticConfig::default();

        let harness = HarnessConfig {
            scope_path: lookup("APP_TESTS_SCOPE_PATH")
                .map(PathBuf::from)
                .unwrap_or(harness_defaults.scope_path),
            logs_path: lookup("APP_TESTS_LOGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(harness_defaults.logs_path),
        };

        let elastic = ElasticConfig {
            host: lookup("ELASTICSEARCH_HOST").unwrap_or(elastic_defaults.host),
            port: parse_or(&lookup, "ELASTICSEARCH_PORT", elastic_defaults.port)?,
            entrypoint: lookup("ELASTICSEARCH_ENTRYPOINT").unwrap_or(elastic_defaults.entrypoint),
            start_wait: Duration::from_secs(parse_or(
                &lookup,
                "ELASTICSEARCH_START_WAIT_SECS",
                elastic_defaults.start_wait.as_secs(),
            )?),
            connect_attempts: parse_or(
                &lookup,
                "ELASTICSEARCH_CONNECT_ATTEMPTS",
                elastic_defaults.connect_attempts,
            )?,
            connect_delay: Duration::from_millis(parse_or(
                &lookup,
                "ELASTICSEARCH_CONNECT_DELAY_MS",
                elastic_defaults.connect_delay.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ELASTICSEARCH_REQUEST_TIMEOUT_SECS",
                elastic_defaults.request_timeout.as_secs(),
            )?),
            documents: parse_or(&lookup, "ELASTICSEARCH_DOCUMENTS", elastic_defaults.documents)?,
            bulk_chunk_size: parse_or(
                &lookup,
                "ELASTICSEARCH_BULK_CHUNK_SIZE",
                elastic_defaults.bulk_chunk_size,
            )?,
        };

        if !(1..=MAX_BULK_CHUNK_SIZE).contains(&elastic.bulk_chunk_size) {
            return Err(ConfigError::Invalid {
                key: "ELASTICSEARCH_BULK_CHUNK_SIZE",
                value: elastic.bulk_chunk_size.to_string(),
                reason: format!("must be between 1 and {MAX_BULK_CHUNK_SIZE}"),
            });
        }

        Ok(Self { harness, elastic })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
