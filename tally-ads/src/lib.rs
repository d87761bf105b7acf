//! tally-ads
//!
//! Ads-platform connector. Lists accounts and their campaigns, line items,
//! funding instruments and creatives, then fetches daily engagement stats for
//! the entities active in each window, per placement. Produces a detail
//! table, a per-entity summary with placements collapsed, and a raw archive.
#![warn(missing_docs)]

/// Adapter definitions and the production adapter backed by `reqwest`.
pub mod adapter;
mod collector;
pub mod model;
mod source;

pub use adapter::{AdsApi, HttpAdsApi, StatsQuery};
pub use collector::{ACCOUNT_COLUMN, AdsCollector, AdsTables, PLACEMENT_COLUMN, TYPE_COLUMN};
pub use model::{Account, Entity, EntityKind, Placement};
pub use source::{EntityStatsSource, MAX_IDS_PER_REQUEST};
