//! tally-mock
//!
//! Deterministic stand-ins for the upstream APIs, for CI-safe tests and demos.
//! [`MockReporting`], [`MockAds`] and [`MockChat`] answer from static fixtures;
//! [`ScriptedSource`] is a `PageSource` whose pages are scripted per window
//! and token by a [`ScriptedController`].
//!
//! Any analytics path, ads account or chat channel containing `FAIL` makes
//! the corresponding call fail with a transport error.

use async_trait::async_trait;
use serde_json::Value;

use tally_ads::{AdsApi, EntityKind, StatsQuery};
use tally_analytics::ReportingApi;
use tally_chat::ChatApi;
use tally_core::normalize::str_at;
use tally_core::{RequestWindow, TallyError};

mod dynamic;
mod fixtures;

pub use dynamic::{MockBehavior, PageCall, ScriptedController, ScriptedPage, ScriptedSource};

fn maybe_fail(source: &str, key: &str) -> Result<(), TallyError> {
    if key.contains("FAIL") {
        return Err(TallyError::transport(source, format!("forced failure for '{key}'")));
    }
    Ok(())
}

/// Reporting API answering from fixtures.
///
/// Each path has two pages; the second repeats the path with a tracking
/// parameter and doubles the values.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockReporting;

impl MockReporting {
    /// New mock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportingApi for MockReporting {
    async fn batch_get(&self, body: &Value) -> Result<Value, TallyError> {
        let request = &body["reportRequests"][0];
        let path = request["dimensionFilterClauses"][0]["filters"][0]["expressions"][0]
            .as_str()
            .unwrap_or("/");
        maybe_fail("google-analytics", path)?;
        let metric_count = request["metrics"].as_array().map_or(0, Vec::len);
        Ok(fixtures::analytics::report(
            path,
            metric_count,
            str_at(request, &["pageToken"]),
        ))
    }
}

/// Ads API with one account, two campaigns (one never started) and one line item.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAds;

impl MockAds {
    /// New mock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AdsApi for MockAds {
    async fn accounts(&self, _cursor: Option<&str>) -> Result<Value, TallyError> {
        Ok(fixtures::ads::accounts())
    }

    async fn entities(
        &self,
        account_id: &str,
        kind: EntityKind,
        _cursor: Option<&str>,
    ) -> Result<Value, TallyError> {
        maybe_fail("ads", account_id)?;
        Ok(fixtures::ads::entities(kind.endpoint()))
    }

    async fn stats(&self, account_id: &str, query: &StatsQuery) -> Result<Value, TallyError> {
        maybe_fail("ads", account_id)?;
        Ok(fixtures::ads::stats(&query.entity_ids))
    }
}

/// Chat API with two channels; every window holds a message, a thread and a
/// join notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockChat;

impl MockChat {
    /// New mock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn list_channels(&self, _cursor: Option<&str>) -> Result<Value, TallyError> {
        Ok(fixtures::chat::channels())
    }

    async fn history(
        &self,
        channel: &str,
        window: RequestWindow,
        _cursor: Option<&str>,
        _limit: usize,
    ) -> Result<Value, TallyError> {
        maybe_fail("chat", channel)?;
        Ok(fixtures::chat::history(window.start.timestamp()))
    }

    async fn replies(
        &self,
        channel: &str,
        ts: &str,
        _cursor: Option<&str>,
    ) -> Result<Value, TallyError> {
        maybe_fail("chat", channel)?;
        Ok(fixtures::chat::replies(ts))
    }
}
