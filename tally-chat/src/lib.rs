//! tally-chat
//!
//! Team-messaging connector. Lists channels, walks each selected channel's
//! history window by window, expands threads through the replies listing and
//! keeps one row per message timestamp.
#![warn(missing_docs)]

/// Adapter definitions and the production adapter backed by `reqwest`.
pub mod adapter;
mod collector;
/// Channel records.
pub mod model;
mod source;

pub use adapter::{ChatApi, HttpChatApi};
pub use collector::{CHANNEL_COLUMN, ChatCollector, ChatTables};
pub use model::Channel;
pub use source::ChannelHistorySource;
