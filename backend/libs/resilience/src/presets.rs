/// Preset configurations for the external dependencies the harness talks to
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a dependency type
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: Option<RetryConfig>,
}

/// Search engine connection (Elasticsearch ping on startup)
///
/// - Timeout: 30s per request
/// - Retry: 5 attempts, fixed 5s delay
pub fn search_connect_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(30),
        },
        retry: Some(RetryConfig::fixed(5, Duration::from_secs(5))),
    }
}

/// Managed subprocess shutdown
///
/// - Timeout: 10s for kill + reap
/// - No retry (a second kill will not help)
pub fn process_stop_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: None,
    }
}
