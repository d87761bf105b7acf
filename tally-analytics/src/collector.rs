use std::sync::Arc;

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;

use tally_core::driver;
use tally_core::table::{archive_to_frame, join_on_keys, rows_to_frame, union_frames};
use tally_core::{
    AssemblyReport, CollectorConfig, DimensionDescriptor, MetricDescriptor, TallyError, ValueKind,
};

use crate::adapter::ReportingApi;
use crate::source::{MAX_METRICS_PER_REQUEST, ReportSource};

/// Name of the constant column recording the filter path of each row.
pub const PATH_COLUMN: &str = "Path";

/// Tables produced by one analytics run.
#[derive(Debug, Clone)]
pub struct AnalyticsTables {
    /// Metrics for every path: `Date`, dimensions, `Path`, metric columns.
    pub metrics: DataFrame,
    /// Raw pages `{Date, Path, JsonString}` when archiving was requested.
    pub archive: Option<DataFrame>,
    /// Data-quality notes from joining metric groups.
    pub report: AssemblyReport,
}

impl AnalyticsTables {
    /// Tables in sink order: metrics first, then the archive if present.
    #[must_use]
    pub fn into_frames(self) -> Vec<DataFrame> {
        std::iter::once(self.metrics).chain(self.archive).collect()
    }
}

/// Collects page metrics for a list of paths.
///
/// One driver runs per (path, metric group); groups hold at most ten metric
/// expressions. Groups of one path are joined on `Date` + dimensions + `Path`
/// and the per-path tables are stacked.
pub struct AnalyticsCollector {
    api: Arc<dyn ReportingApi>,
}

impl AnalyticsCollector {
    /// Collector calling through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ReportingApi>) -> Self {
        Self { api }
    }

    /// Metrics collected by the scheduled run.
    #[must_use]
    pub fn default_metrics() -> Vec<MetricDescriptor> {
        vec![
            MetricDescriptor::new("ga:pageViews", "PageViews", ValueKind::Int),
            MetricDescriptor::new("ga:uniquePageViews", "UniqueViews", ValueKind::Float),
            MetricDescriptor::new("ga:bounceRate", "BounceRate", ValueKind::Float),
        ]
    }

    /// Dimensions collected by the scheduled run.
    #[must_use]
    pub fn default_dimensions() -> Vec<DimensionDescriptor> {
        vec![DimensionDescriptor::path("ga:pagePath", "URL")]
    }

    /// Scheduled-run configuration for `view_id` and `paths` over `[start, end)`.
    #[must_use]
    pub fn default_config<I, S>(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        view_id: &str,
        paths: I,
    ) -> CollectorConfig
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CollectorConfig::new(start, end)
            .with_target(view_id)
            .with_dimensions(Self::default_dimensions())
            .with_metrics(Self::default_metrics())
            .with_entity_paths(paths)
    }

    /// Run every (path, metric group) and assemble the result.
    ///
    /// # Errors
    /// Returns the first validation, fetch, or assembly error; nothing is
    /// returned for a partially collected run.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tally::analytics::collect",
            skip(self, config),
            fields(view_id = %config.target_identifier, paths = config.entity_paths.len()),
        )
    )]
    pub async fn collect(&self, config: &CollectorConfig) -> Result<AnalyticsTables, TallyError> {
        config.validate()?;
        if config.entity_paths.is_empty() {
            return Err(TallyError::InvalidArg("no analytics paths configured".into()));
        }
        if config.metrics.is_empty() {
            return Err(TallyError::InvalidArg("no analytics metrics configured".into()));
        }

        let mut keys = config.schema().key_columns();
        keys.push(PATH_COLUMN.to_string());

        let mut report = AssemblyReport::default();
        let mut per_path = Vec::with_capacity(config.entity_paths.len());
        let mut archives = Vec::new();

        for path in &config.entity_paths {
            let source = ReportSource::new(Arc::clone(&self.api), path.as_str());
            let extra = [(PATH_COLUMN, path.as_str())];
            let mut groups = Vec::new();
            for chunk in config.metrics.chunks(MAX_METRICS_PER_REQUEST) {
                let group_cfg = config.clone().with_metrics(chunk.to_vec());
                let set = driver::run(&source, &group_cfg).await?;
                if config.archive_raw {
                    archives.push(archive_to_frame(&set.archive, &extra)?);
                }
                groups.push(rows_to_frame(&set, &extra)?);
            }
            let (joined, r) = join_on_keys(groups, &keys)?;
            for w in &r.warnings {
                report.warnings.push(format!("{path}: {w}"));
            }
            per_path.push(joined);
        }

        let metrics = union_frames(per_path)?;
        let archive = if config.archive_raw {
            Some(union_frames(archives)?)
        } else {
            None
        };
        #[cfg(feature = "tracing")]
        tracing::info!(
            rows = metrics.height(),
            warnings = report.warnings.len(),
            "analytics collected"
        );
        Ok(AnalyticsTables {
            metrics,
            archive,
            report,
        })
    }
}
