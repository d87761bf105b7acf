use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use tally_ads::{AdsApi, AdsCollector};
use tally_analytics::{AnalyticsCollector, ReportingApi};
use tally_chat::{ChatApi, ChatCollector};
use tally_core::{RetryConfig, TallyError};

use crate::schedule::ScheduleWindow;
use crate::sink::{Dataset, ParquetSink};

struct AnalyticsStage {
    api: Arc<dyn ReportingApi>,
    view_id: String,
    paths: Vec<String>,
    archive: bool,
}

struct AdsStage {
    api: Arc<dyn AdsApi>,
    account: String,
}

struct ChatStage {
    api: Arc<dyn ChatApi>,
    channels: Vec<String>,
}

/// Tables collected by one run, grouped by dataset in collection order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Partition date of the run.
    pub date: NaiveDate,
    /// Tables per dataset.
    pub datasets: Vec<(Dataset, Vec<DataFrame>)>,
    /// Data-quality warnings raised during assembly.
    pub warnings: Vec<String>,
}

impl RunOutput {
    /// Tables collected for `dataset`, if that stage ran.
    #[must_use]
    pub fn tables(&self, dataset: Dataset) -> Option<&[DataFrame]> {
        self.datasets
            .iter()
            .find(|(d, _)| *d == dataset)
            .map(|(_, frames)| frames.as_slice())
    }
}

/// Scheduled collection across the configured sources.
///
/// Stages run one after another (analytics, ads, chat), each with its own
/// default delays. Nothing is written until every stage has succeeded.
pub struct Pipeline {
    analytics: Option<AnalyticsStage>,
    ads: Option<AdsStage>,
    chat: Option<ChatStage>,
    retry: RetryConfig,
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    analytics: Option<AnalyticsStage>,
    ads: Option<AdsStage>,
    chat: Option<ChatStage>,
    retry: RetryConfig,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Builder with no stages and the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            analytics: None,
            ads: None,
            chat: None,
            retry: RetryConfig::default(),
        }
    }

    /// Collect page metrics for `paths` of analytics view `view_id`.
    #[must_use]
    pub fn with_analytics<I, S>(
        mut self,
        api: Arc<dyn ReportingApi>,
        view_id: impl Into<String>,
        paths: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analytics = Some(AnalyticsStage {
            api,
            view_id: view_id.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            archive: false,
        });
        self
    }

    /// Also write the raw analytics pages. No effect without an analytics stage.
    #[must_use]
    pub fn archive_analytics(mut self, yes: bool) -> Self {
        if let Some(stage) = self.analytics.as_mut() {
            stage.archive = yes;
        }
        self
    }

    /// Collect ads stats for `account` (id or name); empty means every account.
    #[must_use]
    pub fn with_ads(mut self, api: Arc<dyn AdsApi>, account: impl Into<String>) -> Self {
        self.ads = Some(AdsStage {
            api,
            account: account.into(),
        });
        self
    }

    /// Collect messages of `channels` (ids or names); empty means every channel.
    #[must_use]
    pub fn with_chat<I, S>(mut self, api: Arc<dyn ChatApi>, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat = Some(ChatStage {
            api,
            channels: channels.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Retry policy applied to every stage.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no stage has been configured, or if the
    /// analytics stage has no paths.
    pub fn build(self) -> Result<Pipeline, TallyError> {
        if self.analytics.is_none() && self.ads.is_none() && self.chat.is_none() {
            return Err(TallyError::InvalidArg(
                "no sources configured; add at least one via with_analytics/with_ads/with_chat"
                    .to_string(),
            ));
        }
        if self.analytics.as_ref().is_some_and(|s| s.paths.is_empty()) {
            return Err(TallyError::InvalidArg("analytics stage has no paths".into()));
        }
        Ok(Pipeline {
            analytics: self.analytics,
            ads: self.ads,
            chat: self.chat,
            retry: self.retry,
        })
    }
}

impl Pipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Collect every configured source over `window`.
    ///
    /// # Errors
    /// Returns the first error of any stage; later stages do not run.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tally::pipeline::collect",
            skip(self),
            fields(start = %window.start, end = %window.end),
        )
    )]
    pub async fn collect(&self, window: &ScheduleWindow) -> Result<RunOutput, TallyError> {
        let mut out = RunOutput {
            date: window.partition_date(),
            datasets: Vec::new(),
            warnings: Vec::new(),
        };

        if let Some(stage) = &self.analytics {
            let config = AnalyticsCollector::default_config(
                window.start,
                window.end,
                &stage.view_id,
                stage.paths.iter().cloned(),
            )
            .with_archive_raw(stage.archive)
            .with_retry(self.retry);
            let tables = AnalyticsCollector::new(Arc::clone(&stage.api))
                .collect(&config)
                .await?;
            out.warnings.extend(tables.report.warnings.iter().cloned());
            out.datasets.push((Dataset::Google, tables.into_frames()));
        }

        if let Some(stage) = &self.ads {
            let config = AdsCollector::default_config(window.start, window.end)
                .with_target(stage.account.as_str())
                .with_retry(self.retry);
            let tables = AdsCollector::new(Arc::clone(&stage.api))
                .collect(&config)
                .await?;
            out.datasets.push((Dataset::Twitter, tables.into_frames()));
        }

        if let Some(stage) = &self.chat {
            let config = ChatCollector::default_config(
                window.start,
                window.end,
                stage.channels.iter().cloned(),
            )
            .with_retry(self.retry);
            let tables = ChatCollector::new(Arc::clone(&stage.api))
                .collect(&config)
                .await?;
            out.datasets.push((Dataset::SlackChannels, vec![tables.channels]));
            let mut messages = vec![tables.messages];
            messages.extend(tables.archive);
            out.datasets.push((Dataset::SlackMessages, messages));
        }

        #[cfg(feature = "tracing")]
        for w in &out.warnings {
            tracing::warn!(warning = %w, "data quality");
        }
        Ok(out)
    }

    /// Collect, then write every table through `sink`.
    ///
    /// # Errors
    /// Returns the first collection or write error. A collection error means
    /// nothing was written.
    pub async fn run(
        &self,
        window: &ScheduleWindow,
        sink: &ParquetSink,
    ) -> Result<Vec<PathBuf>, TallyError> {
        let output = self.collect(window).await?;
        let mut written = Vec::new();
        for (dataset, mut frames) in output.datasets {
            written.extend(sink.write(output.date, dataset, &mut frames)?);
        }
        #[cfg(feature = "tracing")]
        tracing::info!(files = written.len(), date = %output.date, "run written");
        Ok(written)
    }
}
