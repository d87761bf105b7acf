//! Tally runs scheduled analytics ingestion across web-analytics, ads and
//! team-messaging sources and writes the results as partitioned Parquet.
//!
//! Overview
//! - [`ScheduleWindow`] turns "now" into the `[start, end)` range of a run.
//! - [`Pipeline`] runs each configured collector in turn over that range.
//! - [`ParquetSink`] writes the collected tables as
//!   `{root}/{YYYY-MM-DD}/{dataset}/{index}.parquet`; [`read_tables`] reads a
//!   directory of them back.
//!
//! A run either writes everything it collected or nothing: any stage error
//! aborts the run before the sink is touched.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally::{HttpReportingApi, ParquetSink, Pipeline, ScheduleWindow};
//!
//! let ga = Arc::new(HttpReportingApi::with_token(token)?);
//! let pipeline = Pipeline::builder()
//!     .with_analytics(ga, "181392643", ["/docs/"])
//!     .build()?;
//! let window = ScheduleWindow::daily(chrono::Utc::now(), 8, 1)?;
//! pipeline.run(&window, &ParquetSink::new("/data")).await?;
//! ```
#![warn(missing_docs)]

mod pipeline;
mod schedule;
mod sink;

pub use pipeline::{Pipeline, PipelineBuilder, RunOutput};
pub use schedule::ScheduleWindow;
pub use sink::{Dataset, ParquetSink, read_tables};

pub use tally_ads::{AdsApi, AdsCollector, HttpAdsApi};
pub use tally_analytics::{AnalyticsCollector, HttpReportingApi, ReportingApi};
pub use tally_chat::{ChatApi, ChatCollector, HttpChatApi};
pub use tally_core::{CollectorConfig, RetryConfig, TallyError};
