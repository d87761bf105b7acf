use std::future::Future;
use std::time::Duration;

use rand::Rng;

use tally_types::{RetryConfig, TallyError};

/// `base_ms` plus a random extra of at most `percent` percent of it.
fn jittered(base_ms: u64, percent: u8) -> u64 {
    let span = base_ms.saturating_mul(u64::from(percent.min(100))) / 100;
    if span == 0 {
        return base_ms;
    }
    base_ms.saturating_add(rand::rng().random_range(0..span))
}

/// Delay before retry number `attempt` (0-based) for `err`.
///
/// A rate-limit response that names a wait time is honored when it is longer
/// than the computed backoff, up to `max_retry_after_ms`.
#[must_use]
pub fn retry_delay(cfg: &RetryConfig, attempt: u32, err: &TallyError) -> Duration {
    let backoff = jittered(cfg.base_delay_ms(attempt), cfg.jitter_percent);
    let floor = match err {
        TallyError::RateLimited {
            retry_after_secs, ..
        } => retry_after_secs
            .saturating_mul(1_000)
            .min(cfg.max_retry_after_ms),
        _ => 0,
    };
    Duration::from_millis(backoff.max(floor))
}

/// Run `op`, retrying transient failures with bounded exponential backoff.
///
/// Non-transient errors and the error of the final attempt are returned as-is.
///
/// # Errors
/// Returns the last error produced by `op`.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "tally::retry::with_retry",
        skip(cfg, op),
        fields(source = %source, max_retries = cfg.max_retries),
    )
)]
pub async fn with_retry<T, F, Fut>(
    source: &str,
    cfg: &RetryConfig,
    mut op: F,
) -> Result<T, TallyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TallyError>>,
{
    #[cfg(not(feature = "tracing"))]
    let _ = source;
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < cfg.max_retries => {
                let delay = retry_delay(cfg, attempt, &e);
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    source = %source,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
