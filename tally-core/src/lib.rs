//! tally-core
//!
//! The collector engine shared by every tally source.
//!
//! - `source`: the `PageSource` capability trait a connector implements.
//! - `driver`: the generic date-window driver that walks a range, follows
//!   continuation tokens, deduplicates and tags rows with their window.
//! - `normalize` / `canonical`: helpers for flattening raw pages.
//! - `table`: polars assembly (frames, joins, unions, group-by sums).
//!
//! Async runtime (Tokio)
//! ---------------------
//! Inter-call delays and retry backoffs use `tokio::time::sleep`, so drivers
//! must run under a Tokio 1.x runtime. Tests can pause the clock to make the
//! delays virtual.
#![warn(missing_docs)]

/// Deduplicating accumulator for the rows of one window.
pub mod accumulator;
pub mod canonical;
pub mod driver;
pub mod http;
pub mod normalize;
/// Cursor-listing helper for non-windowed endpoints.
pub mod pagination;
/// Bounded exponential backoff for transient failures.
pub mod retry;
/// The per-source capability trait.
pub mod source;
pub mod table;
/// Window tiling of a collection range.
pub mod window;

pub use accumulator::Accumulator;
pub use canonical::{canonicalize_dimensions, canonicalize_path};
pub use pagination::drain_pages;
pub use retry::{retry_delay, with_retry};
pub use source::PageSource;
pub use table::{AssemblyReport, join_on_keys, rows_to_frame, sum_by, union_frames};
pub use window::Windows;

pub use tally_types::*;
