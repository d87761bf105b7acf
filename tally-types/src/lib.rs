//! Tally-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod config;
mod descriptor;
mod error;
mod page;
mod window;

pub use config::{CollectorConfig, GenericQuery, QueryStringConfig, RetryConfig, TrackingMarker};
pub use descriptor::{DimensionDescriptor, DimensionKind, MetricDescriptor, MetricValue, ValueKind};
pub use error::TallyError;
pub use page::{
    ArchivedPage, DATE_COLUMN, DatedRow, DedupPolicy, JSON_COLUMN, NormalizedRow, PageRequest,
    PageResponse, RowSet, TableSchema, continuation_token_of,
};
pub use window::{EndSemantics, RequestWindow, TimeWindow};
