//! Bounded retry with exponential backoff for transient engine failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreSessionError;
use crate::Result;

/// Backoff policy for store open and load calls.
///
/// Only [`EngineError::Unavailable`](crate::EngineError::Unavailable) is
/// retried. Waits double from `base_delay_ms` and stop growing at
/// `max_delay_ms`. The default never retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }

    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self { max_retries, ..self }
    }

    pub fn with_base_delay_ms(self, base_delay_ms: u64) -> Self {
        Self { base_delay_ms, ..self }
    }

    pub fn with_max_delay_ms(self, max_delay_ms: u64) -> Self {
        Self { max_delay_ms, ..self }
    }

    /// Wait before retry number `attempt + 1`.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|a| 1u64.checked_shl(a))
            .unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Run `f`, retrying transient engine errors according to `config`.
pub(crate) async fn retrying<T, F, Fut>(config: &RetryConfig, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Err(StoreSessionError::Engine(e)) if e.is_transient() && attempt < config.max_retries => {
                let delay = config.calculate_delay(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient engine failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_is_no_retry() {
        assert_eq!(RetryConfig::default().max_retries, 0);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::no_retry()
            .with_base_delay_ms(10)
            .with_max_delay_ms(50);
        assert_eq!(config.calculate_delay(0), Duration::from_millis(10));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(20));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(50));
        assert_eq!(config.calculate_delay(200), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_no_retry_surfaces_first_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retrying(&RetryConfig::default(), "open", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Unavailable("down".into()).into()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::no_retry()
            .with_max_retries(3)
            .with_base_delay_ms(1);
        let result = retrying(&config, "load", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::Unavailable("flaky".into()).into())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::no_retry().with_max_retries(5);
        let result: Result<()> = retrying(&config, "open", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::AddressNotFound("/orbitdb/x/y".into()).into()) }
        })
        .await;
        assert!(matches!(
            result,
            Err(StoreSessionError::Engine(EngineError::AddressNotFound(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
