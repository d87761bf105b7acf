use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use tally_core::http::{build_client, read_json, transport_error};
use tally_core::normalize::str_at;
use tally_core::{RequestWindow, TallyError};

/// Label used in errors raised by the chat adapter.
pub const SOURCE_NAME: &str = "chat";

/// Conversations API abstraction (so we can inject fakes in tests).
///
/// Every method returns the raw response envelope, already checked for
/// `ok: true`.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// List public and private channels.
    async fn list_channels(&self, cursor: Option<&str>) -> Result<Value, TallyError>;

    /// Messages posted in `channel` during `window`, newest first.
    async fn history(
        &self,
        channel: &str,
        window: RequestWindow,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Value, TallyError>;

    /// The parent message at `ts` and its replies.
    async fn replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
    ) -> Result<Value, TallyError>;
}

/// Slack-style `{secs}.{micros}` timestamp for an instant.
#[must_use]
pub fn ts_of(t: DateTime<Utc>) -> String {
    format!("{}.{:06}", t.timestamp(), t.timestamp_subsec_micros())
}

/// Last timestamp the API can represent before `end`.
///
/// `inclusive` applies to both bounds, so a half-open window is sent as
/// `[start, end - 1µs]`.
#[must_use]
pub fn last_instant_before(end: DateTime<Utc>) -> DateTime<Utc> {
    end - TimeDelta::microseconds(1)
}

/// Cursor of the next page, if the envelope says there is one.
#[must_use]
pub fn next_cursor(raw: &Value) -> Option<String> {
    if raw.get("has_more").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    str_at(raw, &["response_metadata", "next_cursor"])
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Map an `ok: false` envelope to an error.
///
/// # Errors
/// `ratelimited` becomes `RateLimited`; credential problems become `Auth`;
/// anything else is a `Data` error naming the upstream code.
pub fn check_ok(raw: Value) -> Result<Value, TallyError> {
    if raw.get("ok").and_then(Value::as_bool) != Some(false) {
        return Ok(raw);
    }
    let code = str_at(&raw, &["error"]).unwrap_or("unknown_error");
    Err(match code {
        "ratelimited" => TallyError::rate_limited(SOURCE_NAME, 60),
        "invalid_auth" | "not_authed" | "token_revoked" | "token_expired"
        | "account_inactive" | "missing_scope" => TallyError::auth(SOURCE_NAME, code),
        other => TallyError::Data(format!("{SOURCE_NAME} api error '{other}'")),
    })
}

/// Production adapter over the `conversations.*` methods.
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpChatApi {
    /// Public Web API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://slack.com/api";

    /// Build an adapter for `base_url` authenticating with `token`.
    ///
    /// # Errors
    /// Returns `TallyError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TallyError> {
        Ok(Self {
            client: build_client(SOURCE_NAME, Duration::from_secs(30))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Adapter for the public endpoint.
    ///
    /// # Errors
    /// Returns `TallyError::Transport` if the HTTP client cannot be built.
    pub fn with_token(token: impl Into<String>) -> Result<Self, TallyError> {
        Self::new(Self::DEFAULT_BASE_URL, token)
    }

    async fn call(
        &self,
        method: &str,
        mut query: Vec<(&str, String)>,
        cursor: Option<&str>,
    ) -> Result<Value, TallyError> {
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        let resp = self
            .client
            .get(format!("{}/{method}", self.base_url))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| transport_error(SOURCE_NAME, &e))?;
        check_ok(read_json(SOURCE_NAME, resp).await?)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_channels(&self, cursor: Option<&str>) -> Result<Value, TallyError> {
        let query = vec![
            ("types", "public_channel,private_channel".to_string()),
            ("exclude_archived", "true".to_string()),
        ];
        self.call("conversations.list", query, cursor).await
    }

    async fn history(
        &self,
        channel: &str,
        window: RequestWindow,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Value, TallyError> {
        let query = vec![
            ("channel", channel.to_string()),
            ("oldest", ts_of(window.start)),
            ("latest", ts_of(last_instant_before(window.last))),
            ("inclusive", "true".to_string()),
            ("limit", limit.to_string()),
        ];
        self.call("conversations.history", query, cursor).await
    }

    async fn replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
    ) -> Result<Value, TallyError> {
        let query = vec![("channel", channel.to_string()), ("ts", ts.to_string())];
        self.call("conversations.replies", query, cursor).await
    }
}

type ListFn = dyn Fn(Option<&str>) -> Result<Value, TallyError> + Send + Sync;
type HistoryFn = dyn Fn(&str, RequestWindow, Option<&str>) -> Result<Value, TallyError> + Send + Sync;
type RepliesFn = dyn Fn(&str, &str, Option<&str>) -> Result<Value, TallyError> + Send + Sync;

impl dyn ChatApi {
    /// Build a `ChatApi` from one closure per method (tests and demos).
    ///
    /// Responses pass through [`check_ok`] like the HTTP adapter's do.
    pub fn from_fns<FL, FH, FR>(channels: FL, history: FH, replies: FR) -> Arc<dyn ChatApi>
    where
        FL: Fn(Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static,
        FH: Fn(&str, RequestWindow, Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static,
        FR: Fn(&str, &str, Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static,
    {
        struct FnChat {
            channels: Box<ListFn>,
            history: Box<HistoryFn>,
            replies: Box<RepliesFn>,
        }
        #[async_trait]
        impl ChatApi for FnChat {
            async fn list_channels(&self, cursor: Option<&str>) -> Result<Value, TallyError> {
                check_ok((self.channels)(cursor)?)
            }
            async fn history(
                &self,
                channel: &str,
                window: RequestWindow,
                cursor: Option<&str>,
                _limit: usize,
            ) -> Result<Value, TallyError> {
                check_ok((self.history)(channel, window, cursor)?)
            }
            async fn replies(
                &self,
                channel: &str,
                ts: &str,
                cursor: Option<&str>,
            ) -> Result<Value, TallyError> {
                check_ok((self.replies)(channel, ts, cursor)?)
            }
        }
        Arc::new(FnChat {
            channels: Box::new(channels),
            history: Box::new(history),
            replies: Box::new(replies),
        })
    }
}
