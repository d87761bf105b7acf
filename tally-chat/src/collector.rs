use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use polars::prelude::{Column, DataFrame};

use tally_core::driver;
use tally_core::normalize::array_at;
use tally_core::table::{archive_to_frame, rows_to_frame, table_error, union_frames};
use tally_core::{
    CollectorConfig, DimensionDescriptor, MetricDescriptor, TallyError, ValueKind, drain_pages,
};

use crate::adapter::{ChatApi, next_cursor};
use crate::model::Channel;
use crate::source::ChannelHistorySource;

/// Column holding the channel name on message rows.
pub const CHANNEL_COLUMN: &str = "Channel";

/// Tables produced by one chat run.
#[derive(Debug, Clone)]
pub struct ChatTables {
    /// Every listed channel: `Id`, `Name`, `IsPrivate`, `NumMembers`.
    pub channels: DataFrame,
    /// Messages of the selected channels, one row per timestamp.
    pub messages: DataFrame,
    /// Raw history pages `{Date, Channel, JsonString}` when archiving was requested.
    pub archive: Option<DataFrame>,
}

impl ChatTables {
    /// Tables in sink order: channels, messages, then the archive if present.
    #[must_use]
    pub fn into_frames(self) -> Vec<DataFrame> {
        [self.channels, self.messages]
            .into_iter()
            .chain(self.archive)
            .collect()
    }
}

/// Lists channels and collects message history for the selected ones.
///
/// `entity_paths` selects channels by id or name; an empty list selects every
/// listed channel. Naming a channel that is not listed is an error.
pub struct ChatCollector {
    api: Arc<dyn ChatApi>,
}

impl ChatCollector {
    /// Collector calling through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    /// Scheduled-run configuration over `[start, end)` for `channels`.
    #[must_use]
    pub fn default_config<I, S>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        channels: I,
    ) -> CollectorConfig
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text = |expr: &str, col: &str| {
            MetricDescriptor::new(expr, col, ValueKind::String).missing_as_zero(true)
        };
        CollectorConfig::new(start, end)
            .with_dimensions(vec![
                DimensionDescriptor::new("channel", CHANNEL_COLUMN),
                DimensionDescriptor::new("ts", "TS"),
            ])
            .with_metrics(vec![
                text("text", "Text"),
                text("thread_ts", "ThreadTs"),
                text("user", "User"),
            ])
            .with_entity_paths(channels)
            .with_page_size(200)
            .with_inter_call_delay(Duration::from_millis(1200))
    }

    async fn channels(&self, config: &CollectorConfig) -> Result<Vec<Channel>, TallyError> {
        let delay = config.inter_call_delay;
        let records = drain_pages("chat channels", delay, &config.retry, |cursor| {
            let api = Arc::clone(&self.api);
            async move {
                let raw = api.list_channels(cursor.as_deref()).await?;
                let channels = array_at(&raw, &["channels"]).to_vec();
                Ok::<_, TallyError>((channels, next_cursor(&raw)))
            }
        })
        .await?;
        records.iter().map(Channel::from_json).collect()
    }

    fn select<'a>(
        channels: &'a [Channel],
        selectors: &[String],
    ) -> Result<Vec<&'a Channel>, TallyError> {
        if selectors.is_empty() {
            return Ok(channels.iter().collect());
        }
        selectors
            .iter()
            .map(|s| {
                channels
                    .iter()
                    .find(|c| c.matches(s))
                    .ok_or_else(|| TallyError::InvalidArg(format!("channel '{s}' is not visible")))
            })
            .collect()
    }

    fn channel_frame(channels: &[Channel]) -> Result<DataFrame, TallyError> {
        let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
        let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
        let private: Vec<bool> = channels.iter().map(|c| c.is_private).collect();
        let members: Vec<i64> = channels.iter().map(|c| c.num_members).collect();
        DataFrame::new(vec![
            Column::new("Id".into(), ids),
            Column::new("Name".into(), names),
            Column::new("IsPrivate".into(), private),
            Column::new("NumMembers".into(), members),
        ])
        .map_err(|e| table_error(&e))
    }

    /// List channels, then run one history driver per selected channel.
    ///
    /// # Errors
    /// Returns the first validation, listing, fetch, or assembly error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tally::chat::collect",
            skip(self, config),
            fields(channels = config.entity_paths.len(), start = %config.start),
        )
    )]
    pub async fn collect(&self, config: &CollectorConfig) -> Result<ChatTables, TallyError> {
        config.validate()?;
        let listed = self.channels(config).await?;
        let selected = Self::select(&listed, &config.entity_paths)?;

        let mut frames = Vec::with_capacity(selected.len());
        let mut archives = Vec::new();
        for channel in selected {
            let source = ChannelHistorySource::new(Arc::clone(&self.api), channel.clone())
                .with_reply_policy(config.inter_call_delay, config.retry);
            let set = driver::run(&source, config).await?;
            if config.archive_raw {
                let extra = [(CHANNEL_COLUMN, channel.name.as_str())];
                archives.push(archive_to_frame(&set.archive, &extra)?);
            }
            frames.push(rows_to_frame(&set, &[])?);
        }

        let messages = union_frames(frames)?;
        let archive = if config.archive_raw {
            Some(union_frames(archives)?)
        } else {
            None
        };
        #[cfg(feature = "tracing")]
        tracing::info!(channels = listed.len(), messages = messages.height(), "chat collected");
        Ok(ChatTables {
            channels: Self::channel_frame(&listed)?,
            messages,
            archive,
        })
    }
}
