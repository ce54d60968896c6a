//! Retry with exponential back-off and jitter for image searches.
//!
//! Only 429 responses and network failures are retried. Everything else,
//! including other non-2xx statuses, fails the search on the first try.
//! A 429 with `Retry-After` waits at least that long.

use std::future::Future;
use std::time::Duration;

use crate::error::SearchError;

const MAX_DELAY_MS: u64 = 60_000;

fn is_retriable(err: &SearchError) -> bool {
    matches!(err, SearchError::RateLimited { .. } | SearchError::Http(_))
}

/// Wait before retry `attempt` (1-based): the jittered back-off, or the
/// server's `Retry-After` when longer, capped at 60 s.
fn retry_delay_ms(attempt: u32, backoff_base_ms: u64, err: &SearchError) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let backoff_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    let requested_ms = match err {
        SearchError::RateLimited {
            retry_after_secs: Some(secs),
        } => secs.saturating_mul(1000),
        _ => 0,
    };
    backoff_ms.max(requested_ms).min(MAX_DELAY_MS)
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The wait before retry `n` is `backoff_base_ms * 2^(n-1)` with ±25 %
/// jitter, raised to any `Retry-After` and capped at 60 s. With
/// `max_retries = 0` the operation runs once.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = retry_delay_ms(attempt, backoff_base_ms, &err);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient image search error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn rate_limited() -> SearchError {
        SearchError::RateLimited {
            retry_after_secs: None,
        }
    }

    #[test]
    fn retry_after_raises_the_wait() {
        let err = SearchError::RateLimited {
            retry_after_secs: Some(12),
        };
        assert_eq!(retry_delay_ms(1, 0, &err), 12_000);
        assert_eq!(retry_delay_ms(1, 1000, &err), 12_000);
    }

    #[test]
    fn retry_after_is_capped() {
        let err = SearchError::RateLimited {
            retry_after_secs: Some(3600),
        };
        assert_eq!(retry_delay_ms(1, 0, &err), MAX_DELAY_MS);
    }

    #[test]
    fn without_retry_after_back_off_alone_applies() {
        assert_eq!(retry_delay_ms(1, 0, &rate_limited()), 0);
        let delay = retry_delay_ms(2, 1000, &rate_limited());
        assert!((1500..=2500).contains(&delay), "{delay}");
    }

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SearchError>("hit")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "hit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(0, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rate_limited())
            }
        })
        .await;
        assert!(matches!(result, Err(SearchError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_statuses_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(SearchError::UnexpectedStatus {
                    status: 403,
                    query: "dog leash".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(SearchError::UnexpectedStatus { status: 403, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
