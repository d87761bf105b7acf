use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use tally_core::normalize::{array_at, convert_metrics, lookup, scalar_text, str_at};
use tally_core::{
    CollectorConfig, DedupPolicy, NormalizedRow, PageRequest, PageResponse, PageSource,
    RequestWindow, RetryConfig, TallyError, drain_pages,
};

use crate::adapter::{ChatApi, SOURCE_NAME, next_cursor};
use crate::model::Channel;

const DIMENSION_COUNT: usize = 2;

fn is_message(v: &Value) -> bool {
    str_at(v, &["type"]) == Some("message")
}

/// Message history of one channel.
///
/// Messages are identified by their timestamp. A message that belongs to a
/// thread is replaced by the whole thread (parent included), fetched through
/// the replies listing. Records of any type other than `message` are dropped.
pub struct ChannelHistorySource {
    api: Arc<dyn ChatApi>,
    channel: Channel,
    reply_delay: Duration,
    reply_retry: RetryConfig,
}

impl ChannelHistorySource {
    /// History of `channel`; thread listings sleep one second between calls.
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>, channel: Channel) -> Self {
        Self {
            api,
            channel,
            reply_delay: Duration::from_secs(1),
            reply_retry: RetryConfig::default(),
        }
    }

    /// Delay and retry policy for the thread-replies listing.
    #[must_use]
    pub fn with_reply_policy(mut self, delay: Duration, retry: RetryConfig) -> Self {
        self.reply_delay = delay;
        self.reply_retry = retry;
        self
    }

    async fn thread(&self, ts: &str) -> Result<Vec<Value>, TallyError> {
        let label = format!("{SOURCE_NAME} replies");
        drain_pages(&label, self.reply_delay, &self.reply_retry, |cursor| {
            let api = Arc::clone(&self.api);
            let channel = self.channel.id.clone();
            let ts = ts.to_string();
            async move {
                let raw = api.replies(&channel, &ts, cursor.as_deref()).await?;
                let messages: Vec<Value> = array_at(&raw, &["messages"])
                    .iter()
                    .filter(|m| is_message(m))
                    .cloned()
                    .collect();
                Ok::<_, TallyError>((messages, next_cursor(&raw)))
            }
        })
        .await
    }
}

#[async_trait]
impl PageSource for ChannelHistorySource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::SetByIdentity
    }

    fn validate(&self, config: &CollectorConfig) -> Result<(), TallyError> {
        if config.dimensions.len() != DIMENSION_COUNT {
            return Err(TallyError::descriptor_mismatch(
                "chat dimension descriptors",
                DIMENSION_COUNT,
                config.dimensions.len(),
            ));
        }
        Ok(())
    }

    fn build_request(
        &self,
        config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError> {
        let mut params = Map::new();
        params.insert("channel".into(), json!(self.channel.id));
        params.insert("oldest".into(), json!(window.start.to_rfc3339()));
        params.insert("latest".into(), json!(window.last.to_rfc3339()));
        params.insert("limit".into(), json!(config.page_size));
        Ok(PageRequest::new(params, token.map(str::to_string)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError> {
        let window = window_of(request)?;
        let limit = request
            .source_params
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(200);
        let raw = self
            .api
            .history(
                &self.channel.id,
                window,
                request.continuation_token.as_deref(),
                limit,
            )
            .await?;

        let mut rows = Vec::new();
        for message in array_at(&raw, &["messages"]).iter().filter(|m| is_message(m)) {
            match str_at(message, &["thread_ts"]) {
                Some(thread_ts) => rows.extend(self.thread(thread_ts).await?),
                None => rows.push(message.clone()),
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(channel = %self.channel.name, rows = rows.len(), "history page expanded");
        let next = next_cursor(&raw);
        Ok(PageResponse::new(rows, next.as_deref(), raw))
    }

    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError> {
        page.rows
            .iter()
            .map(|message| {
                let ts = message
                    .get("ts")
                    .and_then(scalar_text)
                    .ok_or_else(|| TallyError::Data(format!("message without ts: {message}")))?;
                let values: Vec<Value> = config
                    .metrics
                    .iter()
                    .map(|m| {
                        lookup(message, &[m.expression.as_str()])
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                let metrics = convert_metrics(&values, &config.metrics)?;
                Ok(NormalizedRow::new(vec![self.channel.name.clone(), ts], metrics))
            })
            .collect()
    }
}

fn window_of(request: &PageRequest) -> Result<RequestWindow, TallyError> {
    let parse = |key: &str| {
        request
            .param_str(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| TallyError::Data(format!("history request without {key}")))
    };
    Ok(RequestWindow {
        start: parse("oldest")?,
        last: parse("latest")?,
    })
}
