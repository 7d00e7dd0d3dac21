use radar_core::{ContentApiError, CoreError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the Reddit content API.
    pub fn content_api() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a delay the upstream asked for
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::ContentApi(api_error) => match api_error {
            ContentApiError::RateLimited { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            ContentApiError::ServerError { .. } => RetryStrategy::Retry,
            ContentApiError::RequestTimeout => RetryStrategy::Retry,
            ContentApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            ContentApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            ContentApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            ContentApiError::NotFound { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = Duration::from_millis(config.base_delay_ms);
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let exponential_delay = if attempt == 0 {
        base_delay
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    // Jitter prevents synchronized retries across callers
    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);
    let final_delay = exponential_delay + Duration::from_millis(jitter);

    final_delay.min(max_delay)
}

/// Run `operation` with bounded retries according to `config`.
///
/// Permanent failures (auth, 4xx) are returned immediately; transient ones
/// back off exponentially with jitter until the attempt budget runs out.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut last_error: Option<CoreError> = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            debug!("retry attempt {} for {}", attempt, operation_name);
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                let strategy = get_retry_strategy(&error);
                let attempts_left = attempt + 1 < config.max_attempts;

                match strategy {
                    RetryStrategy::NoRetry => {
                        debug!(
                            "not retrying {} due to error type: {}",
                            operation_name, error
                        );
                        return Err(error);
                    }
                    RetryStrategy::Retry if attempts_left => {
                        let delay = calculate_delay(attempt, config);
                        warn!("retrying {} in {:?} due to: {}", operation_name, delay, error);
                        last_error = Some(error);
                        sleep(delay).await;
                    }
                    RetryStrategy::RetryWithDelay(delay) if attempts_left => {
                        warn!(
                            "retrying {} after upstream-requested delay of {:?} due to: {}",
                            operation_name, delay, error
                        );
                        last_error = Some(error);
                        sleep(delay).await;
                    }
                    _ => {
                        debug!("max retry attempts reached for {}", operation_name);
                        last_error = Some(error);
                        break;
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| CoreError::Internal {
        message: format!("{operation_name} failed without a recorded error"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert!(config.jitter_factor <= 1.0);
    }

    #[test]
    fn retry_config_content_api() {
        let config = RetryConfig::content_api();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn delay_is_bounded_by_max() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 10.0,
            jitter_factor: 0.5,
        };
        for attempt in 0..10 {
            assert!(calculate_delay(attempt, &config) <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn strategy_for_permanent_errors_is_no_retry() {
        let err = CoreError::ContentApi(ContentApiError::Forbidden {
            resource: "/r/private/new".to_string(),
        });
        assert_eq!(get_retry_strategy(&err), RetryStrategy::NoRetry);
    }

    #[test]
    fn strategy_honors_upstream_retry_after() {
        let err = CoreError::ContentApi(ContentApiError::RateLimited { retry_after: 7 });
        assert_eq!(
            get_retry_strategy(&err),
            RetryStrategy::RetryWithDelay(Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        };

        let counter = attempts.clone();
        let result = with_retry(&config, "flaky_fetch", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CoreError::ContentApi(ContentApiError::ServerError {
                        status: 503,
                    }))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_short_circuit() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig::default();

        let counter = attempts.clone();
        let result: Result<u32, CoreError> = with_retry(&config, "forbidden_fetch", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CoreError::ContentApi(ContentApiError::Forbidden {
                    resource: "/r/private/new".to_string(),
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
