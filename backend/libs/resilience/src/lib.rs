/// Resilience helpers for talking to external services
///
/// This library provides the small set of patterns the application tests need:
/// - **Retry**: Bounded attempts with a fixed or exponentially growing delay
/// - **Timeout**: Enforces time limits on async operations
/// - **Preset Configurations**: Pre-tuned settings for search connects and process shutdown
///
/// # Example: Connect with a fixed retry policy
///
/// ```rust,no_run
/// use resilience::{with_retry, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig::fixed(5, Duration::from_secs(5));
///
///     let result = with_retry(config, || async {
///         // Your connect + ping here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use presets::{process_stop_config, search_connect_config, ServiceConfig};
pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
