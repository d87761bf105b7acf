//! tally-analytics
//!
//! Web-analytics connector. Builds `reports:batchGet` requests per page path
//! and metric group, sums rows by canonical dimensions within each window, and
//! assembles one metrics table (plus an optional raw archive) per run.
#![warn(missing_docs)]

/// Adapter definitions and the production adapter backed by `reqwest`.
pub mod adapter;
mod collector;
mod source;

pub use adapter::{HttpReportingApi, ReportingApi};
pub use collector::{AnalyticsCollector, AnalyticsTables, PATH_COLUMN};
pub use source::{MAX_METRICS_PER_REQUEST, MAX_PAGE_SIZE, ReportSource};
