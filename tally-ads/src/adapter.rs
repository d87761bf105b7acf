use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::TallyError;
use tally_core::http::{build_client, read_json, transport_error};

use crate::model::{EntityKind, Placement};

/// Label used in errors raised by the ads adapter.
pub const SOURCE_NAME: &str = "ads";

/// Parameters of one synchronous stats request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsQuery {
    /// Entity kind the ids belong to.
    pub entity: EntityKind,
    /// Entity ids (at most 20 per request).
    pub entity_ids: Vec<String>,
    /// Inclusive start, RFC 3339.
    pub start_time: String,
    /// Exclusive end, RFC 3339.
    pub end_time: String,
    /// `DAY`, `HOUR` or `TOTAL`.
    pub granularity: String,
    /// Placement to report on.
    pub placement: Placement,
    /// Comma-separated metric groups, e.g. `ENGAGEMENT`.
    pub metric_groups: String,
}

/// Ads API abstraction (so we can inject fakes in tests).
///
/// Listing calls return the raw `{data, next_cursor}` envelope.
#[async_trait]
pub trait AdsApi: Send + Sync {
    /// List accessible accounts.
    async fn accounts(&self, cursor: Option<&str>) -> Result<Value, TallyError>;

    /// List entities of `kind` under an account.
    async fn entities(
        &self,
        account_id: &str,
        kind: EntityKind,
        cursor: Option<&str>,
    ) -> Result<Value, TallyError>;

    /// Fetch stats for a batch of entities.
    async fn stats(&self, account_id: &str, query: &StatsQuery) -> Result<Value, TallyError>;
}

/// Production adapter over the REST endpoints, authenticated with a bearer token.
pub struct HttpAdsApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpAdsApi {
    /// Public endpoint, versioned.
    pub const DEFAULT_BASE_URL: &'static str = "https://ads-api.twitter.com/12";

    /// Build an adapter for `base_url` authenticating with `token`.
    ///
    /// # Errors
    /// Returns `TallyError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TallyError> {
        Ok(Self {
            client: build_client(SOURCE_NAME, Duration::from_secs(60))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Adapter for the public endpoint.
    ///
    /// # Errors
    /// Returns `TallyError::Transport` if the HTTP client cannot be built.
    pub fn with_token(token: impl Into<String>) -> Result<Self, TallyError> {
        Self::new(Self::DEFAULT_BASE_URL, token)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TallyError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(SOURCE_NAME, &e))?;
        read_json(SOURCE_NAME, resp).await
    }
}

fn cursor_param(cursor: Option<&str>) -> Vec<(&'static str, String)> {
    cursor
        .map(|c| vec![("cursor", c.to_string())])
        .unwrap_or_default()
}

#[async_trait]
impl AdsApi for HttpAdsApi {
    async fn accounts(&self, cursor: Option<&str>) -> Result<Value, TallyError> {
        self.get("/accounts", &cursor_param(cursor)).await
    }

    async fn entities(
        &self,
        account_id: &str,
        kind: EntityKind,
        cursor: Option<&str>,
    ) -> Result<Value, TallyError> {
        let path = format!("/accounts/{account_id}/{}", kind.endpoint());
        self.get(&path, &cursor_param(cursor)).await
    }

    async fn stats(&self, account_id: &str, query: &StatsQuery) -> Result<Value, TallyError> {
        let params = [
            ("entity", query.entity.api_name().to_string()),
            ("entity_ids", query.entity_ids.join(",")),
            ("start_time", query.start_time.clone()),
            ("end_time", query.end_time.clone()),
            ("granularity", query.granularity.clone()),
            ("placement", query.placement.as_str().to_string()),
            ("metric_groups", query.metric_groups.clone()),
        ];
        self.get(&format!("/stats/accounts/{account_id}"), &params)
            .await
    }
}

type AccountsFn = dyn Fn(Option<&str>) -> Result<Value, TallyError> + Send + Sync;
type EntitiesFn = dyn Fn(&str, EntityKind, Option<&str>) -> Result<Value, TallyError> + Send + Sync;
type StatsFn = dyn Fn(&str, &StatsQuery) -> Result<Value, TallyError> + Send + Sync;

impl dyn AdsApi {
    /// Build an `AdsApi` from one closure per endpoint (tests and demos).
    pub fn from_fns<FA, FE, FS>(accounts: FA, entities: FE, stats: FS) -> Arc<dyn AdsApi>
    where
        FA: Fn(Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static,
        FE: Fn(&str, EntityKind, Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static,
        FS: Fn(&str, &StatsQuery) -> Result<Value, TallyError> + Send + Sync + 'static,
    {
        struct FnAds {
            accounts: Box<AccountsFn>,
            entities: Box<EntitiesFn>,
            stats: Box<StatsFn>,
        }
        #[async_trait]
        impl AdsApi for FnAds {
            async fn accounts(&self, cursor: Option<&str>) -> Result<Value, TallyError> {
                (self.accounts)(cursor)
            }
            async fn entities(
                &self,
                account_id: &str,
                kind: EntityKind,
                cursor: Option<&str>,
            ) -> Result<Value, TallyError> {
                (self.entities)(account_id, kind, cursor)
            }
            async fn stats(
                &self,
                account_id: &str,
                query: &StatsQuery,
            ) -> Result<Value, TallyError> {
                (self.stats)(account_id, query)
            }
        }
        Arc::new(FnAds {
            accounts: Box::new(accounts),
            entities: Box::new(entities),
            stats: Box::new(stats),
        })
    }
}
