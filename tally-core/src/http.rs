//! Mapping of reqwest results onto `TallyError`.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde_json::Value;

use tally_types::TallyError;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_BODY_IN_ERROR: usize = 512;

/// Build the HTTP client shared by the reqwest-backed adapters.
///
/// # Errors
/// Returns `TallyError::Transport` if the TLS backend cannot be initialized.
pub fn build_client(source: &str, timeout: Duration) -> Result<reqwest::Client, TallyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| transport_error(source, &e))
}

/// Classify a reqwest failure that happened before a status was available.
#[must_use]
pub fn transport_error(source: &str, e: &reqwest::Error) -> TallyError {
    if e.is_decode() {
        return TallyError::Data(format!("{source}: {e}"));
    }
    TallyError::transport(source, e.to_string())
}

/// Check the status of `resp` and decode its JSON body.
///
/// 401/403 map to `Auth`, 429 to `RateLimited` (honoring `Retry-After`), any
/// other non-success status to `Status` carrying a truncated body.
///
/// # Errors
/// Returns the mapped error, or `Data` when the body is not valid JSON.
pub async fn read_json(source: &str, resp: Response) -> Result<Value, TallyError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<Value>().await.map_err(|e| transport_error(source, &e));
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TallyError::auth(
            source,
            format!("status {}", status.as_u16()),
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(TallyError::rate_limited(source, retry_after))
        }
        _ => {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_BODY_IN_ERROR {
                let cut = (0..=MAX_BODY_IN_ERROR)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            Err(TallyError::status(source, status.as_u16(), body))
        }
    }
}
