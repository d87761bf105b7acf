use std::future::Future;
use std::time::Duration;

use tally_types::{RetryConfig, TallyError, continuation_token_of};

use crate::retry::with_retry;

/// Follow a cursor-paginated listing to its end.
///
/// `fetch` is called with the current token (`None` first) and returns the
/// items of that page plus the next token. The loop stops on a missing or
/// empty token and sleeps `delay` after every call. Transient failures are
/// retried per `retry`.
///
/// # Errors
/// Returns the first non-retried error from `fetch`, or `TallyError::Data` if
/// the upstream hands back the token it was just given.
pub async fn drain_pages<T, F, Fut>(
    label: &str,
    delay: Duration,
    retry: &RetryConfig,
    mut fetch: F,
) -> Result<Vec<T>, TallyError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), TallyError>>,
{
    let mut out = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let current = token.clone();
        let (items, next) = with_retry(label, retry, || fetch(current.clone())).await?;
        tokio::time::sleep(delay).await;
        out.extend(items);
        match continuation_token_of(next.as_deref()) {
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(TallyError::Data(format!(
                    "{label} repeated continuation token '{next}'"
                )));
            }
            Some(next) => token = Some(next),
            None => return Ok(out),
        }
    }
}
