//! Configuration types shared across collectors and the driver.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::{DimensionDescriptor, MetricDescriptor};
use crate::error::TallyError;
use crate::page::{DATE_COLUMN, TableSchema};
use crate::window::TimeWindow;

/// A query-string marker whose presence collapses the query to a fixed sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingMarker {
    /// Substring searched for in the query, e.g. `twclid`.
    pub marker: String,
    /// Replacement for the whole query when the marker is present.
    pub sentinel: String,
}

impl TrackingMarker {
    /// Build a marker/sentinel pair.
    pub fn new(marker: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            sentinel: sentinel.into(),
        }
    }
}

/// What to do with a query string that carries no tracking marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenericQuery {
    /// Replace the query with this fixed token.
    Sentinel(String),
    /// Keep the query as received.
    Verbatim,
}

impl Default for GenericQuery {
    fn default() -> Self {
        Self::Sentinel("some_query_string".to_string())
    }
}

/// Rules for canonicalizing URL-shaped dimension values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStringConfig {
    /// Drop query strings entirely.
    pub ignore_query_strings: bool,
    /// Markers checked in order; the first match wins.
    pub tracking_markers: Vec<TrackingMarker>,
    /// Fallback for queries without a marker.
    pub generic: GenericQuery,
}

impl Default for QueryStringConfig {
    fn default() -> Self {
        Self {
            ignore_query_strings: true,
            tracking_markers: vec![TrackingMarker::new("twclid", "twitter")],
            generic: GenericQuery::default(),
        }
    }
}

/// Bounded exponential backoff applied by the driver to transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero fails the run on the first error.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor applied per attempt (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
    /// Longest wait honored from an upstream rate-limit hint, in milliseconds.
    pub max_retry_after_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
            max_retry_after_ms: 300_000,
        }
    }
}

impl RetryConfig {
    /// Fail on the first error, matching a no-retry contract.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Base delay (before jitter) ahead of retry number `attempt` (0-based).
    #[must_use]
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let factor = u64::from(self.factor.max(1));
        let mut delay = self.min_backoff_ms;
        for _ in 0..attempt {
            delay = delay.saturating_mul(factor);
            if delay >= self.max_backoff_ms {
                return self.max_backoff_ms;
            }
        }
        delay.min(self.max_backoff_ms)
    }
}

/// The whole declarative specification for one collector run.
///
/// Constructed once per scheduled run and passed by reference into the driver;
/// nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Inclusive start of the collection range.
    pub start: DateTime<Utc>,
    /// Exclusive end of the collection range.
    pub end: DateTime<Utc>,
    /// Window length.
    pub increment: Duration,
    /// Rows requested per page.
    pub page_size: u32,
    /// Analytics view id, ad account id, or workspace name.
    pub target_identifier: String,
    /// Requested dimensions in output order.
    pub dimensions: Vec<DimensionDescriptor>,
    /// Requested metrics in output order.
    pub metrics: Vec<MetricDescriptor>,
    /// Paths, entities, or channels to collect for.
    pub entity_paths: Vec<String>,
    /// Canonicalization of URL-shaped dimensions.
    pub query_strings: QueryStringConfig,
    /// Pause after every upstream call.
    pub inter_call_delay: Duration,
    /// Keep each raw page for the archival JSON column.
    pub archive_raw: bool,
    /// Backoff for transient failures.
    pub retry: RetryConfig,
}

impl CollectorConfig {
    /// Config covering `[start, end)` with daily windows and conservative defaults.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            increment: Duration::from_secs(86_400),
            page_size: 100_000,
            target_identifier: String::new(),
            dimensions: Vec::new(),
            metrics: Vec::new(),
            entity_paths: Vec::new(),
            query_strings: QueryStringConfig::default(),
            inter_call_delay: Duration::from_secs(1),
            archive_raw: false,
            retry: RetryConfig::default(),
        }
    }

    /// Set the window length.
    #[must_use]
    pub const fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the view/account identifier.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_identifier = target.into();
        self
    }

    /// Replace the dimension descriptors.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Vec<DimensionDescriptor>) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Replace the metric descriptors.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<MetricDescriptor>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the entity/path list.
    #[must_use]
    pub fn with_entity_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle stripping of query strings.
    #[must_use]
    pub const fn with_ignore_query_strings(mut self, yes: bool) -> Self {
        self.query_strings.ignore_query_strings = yes;
        self
    }

    /// Replace the full canonicalization rules.
    #[must_use]
    pub fn with_query_strings(mut self, rules: QueryStringConfig) -> Self {
        self.query_strings = rules;
        self
    }

    /// Set the pause applied after every upstream call.
    #[must_use]
    pub const fn with_inter_call_delay(mut self, delay: Duration) -> Self {
        self.inter_call_delay = delay;
        self
    }

    /// Keep raw pages for the archival column.
    #[must_use]
    pub const fn with_archive_raw(mut self, yes: bool) -> Self {
        self.archive_raw = yes;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The collection range as a window.
    ///
    /// # Errors
    /// Returns `TallyError::InvalidArg` unless `start < end`.
    pub fn range(&self) -> Result<TimeWindow, TallyError> {
        TimeWindow::new(self.start, self.end)
    }

    /// The window length as a signed time delta.
    ///
    /// # Errors
    /// Returns `TallyError::InvalidArg` for a zero or out-of-range increment.
    pub fn increment_delta(&self) -> Result<TimeDelta, TallyError> {
        if self.increment.is_zero() {
            return Err(TallyError::InvalidArg("date increment must be positive".into()));
        }
        TimeDelta::from_std(self.increment)
            .map_err(|e| TallyError::InvalidArg(format!("date increment out of range: {e}")))
    }

    /// Output layout implied by the descriptors.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        TableSchema {
            dimensions: self
                .dimensions
                .iter()
                .map(|d| d.output_column.clone())
                .collect(),
            metrics: self
                .metrics
                .iter()
                .map(|m| (m.output_column.clone(), m.value_kind))
                .collect(),
        }
    }

    /// Check the configuration before any network call is made.
    ///
    /// # Errors
    /// Returns `TallyError::InvalidArg` for an empty range, non-positive
    /// increment, zero page size, or duplicate/reserved output column names.
    pub fn validate(&self) -> Result<(), TallyError> {
        self.range()?;
        self.increment_delta()?;
        if self.page_size == 0 {
            return Err(TallyError::InvalidArg("page size must be positive".into()));
        }
        let mut seen = HashSet::new();
        let columns = self
            .dimensions
            .iter()
            .map(|d| d.output_column.as_str())
            .chain(self.metrics.iter().map(|m| m.output_column.as_str()));
        for column in columns {
            if column.is_empty() || column == DATE_COLUMN {
                return Err(TallyError::InvalidArg(format!(
                    "invalid output column name '{column}'"
                )));
            }
            if !seen.insert(column) {
                return Err(TallyError::InvalidArg(format!(
                    "duplicate output column '{column}'"
                )));
            }
        }
        Ok(())
    }
}
