//! Ads-platform entities and the values used to address them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::normalize::{scalar_text, str_at};
use tally_core::{TallyError, TimeWindow};

/// Kinds of ad entities whose stats are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A campaign.
    Campaign,
    /// A line item (shown as an ad group).
    LineItem,
    /// A funding instrument.
    FundingInstrument,
    /// A media creative.
    MediaCreative,
}

impl EntityKind {
    /// Every kind, in collection order.
    pub const ALL: [Self; 4] = [
        Self::Campaign,
        Self::LineItem,
        Self::FundingInstrument,
        Self::MediaCreative,
    ];

    /// Value of the `entity` stats parameter.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Campaign => "CAMPAIGN",
            Self::LineItem => "LINE_ITEM",
            Self::FundingInstrument => "FUNDING_INSTRUMENT",
            Self::MediaCreative => "MEDIA_CREATIVE",
        }
    }

    /// Label written to the `AnalyticsType` column.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Campaign => "Campaign",
            Self::LineItem => "AdGroup",
            Self::FundingInstrument => "FundingInstrument",
            Self::MediaCreative => "MediaCreative",
        }
    }

    /// Path segment of the listing endpoint under an account.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Campaign => "campaigns",
            Self::LineItem => "line_items",
            Self::FundingInstrument => "funding_instruments",
            Self::MediaCreative => "media_creatives",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Where an ad was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    /// On the platform itself.
    AllOnTwitter,
    /// On the publisher network.
    PublisherNetwork,
}

impl Placement {
    /// Both placements, in collection order.
    pub const ALL: [Self; 2] = [Self::PublisherNetwork, Self::AllOnTwitter];

    /// Value of the `placement` stats parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllOnTwitter => "ALL_ON_TWITTER",
            Self::PublisherNetwork => "PUBLISHER_NETWORK",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ads account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl Account {
    /// Read an account from a listing record.
    ///
    /// # Errors
    /// Returns `TallyError::Data` if the record has no id.
    pub fn from_json(v: &Value) -> Result<Self, TallyError> {
        let id = v
            .get("id")
            .and_then(scalar_text)
            .ok_or_else(|| TallyError::Data(format!("account record without id: {v}")))?;
        let name = str_at(v, &["name"]).unwrap_or(id.as_str()).to_string();
        Ok(Self { id, name })
    }
}

/// One campaign, line item, funding instrument or creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity id.
    pub id: String,
    /// Display name; the id when the platform has none.
    pub name: String,
    /// When the entity starts serving. `None` means it was never activated.
    pub start_time: Option<DateTime<Utc>>,
    /// When it stops serving. `None` means open-ended.
    pub end_time: Option<DateTime<Utc>>,
}

fn parse_time(v: &Value, key: &str) -> Result<Option<DateTime<Utc>>, TallyError> {
    match str_at(v, &[key]) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| TallyError::Data(format!("bad {key} '{s}': {e}"))),
    }
}

impl Entity {
    /// Read an entity from a listing record.
    ///
    /// # Errors
    /// Returns `TallyError::Data` for a missing id or an unparsable timestamp.
    pub fn from_json(v: &Value) -> Result<Self, TallyError> {
        let id = v
            .get("id")
            .and_then(scalar_text)
            .ok_or_else(|| TallyError::Data(format!("entity record without id: {v}")))?;
        let name = str_at(v, &["name"]).unwrap_or(id.as_str()).to_string();
        Ok(Self {
            start_time: parse_time(v, "start_time")?,
            end_time: parse_time(v, "end_time")?,
            id,
            name,
        })
    }

    /// Whether the entity was active at some point during `window`.
    ///
    /// Without a start time it never ran. Without an end time it is active from
    /// its start onward. Otherwise it is inactive only when the window lies
    /// entirely after its end or entirely before its start.
    #[must_use]
    pub fn active_during(&self, window: &TimeWindow) -> bool {
        let Some(start) = self.start_time else {
            return false;
        };
        let Some(end) = self.end_time else {
            return start <= window.end();
        };
        let after = window.start() >= start && window.start() >= end;
        let before = window.end() <= start && window.end() <= end;
        !(after || before)
    }
}
