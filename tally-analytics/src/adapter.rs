use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use tally_core::TallyError;
use tally_core::http::{build_client, read_json, transport_error};

/// Label used in errors raised by the reporting adapter.
pub const SOURCE_NAME: &str = "google-analytics";

/// Reporting API abstraction (so we can inject fakes in tests).
#[async_trait]
pub trait ReportingApi: Send + Sync {
    /// Execute one `reports:batchGet` call and return the raw JSON response.
    async fn batch_get(&self, body: &Value) -> Result<Value, TallyError>;
}

/// Production adapter: POSTs to `{base_url}/v4/reports:batchGet` with a bearer token.
pub struct HttpReportingApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpReportingApi {
    /// Public endpoint of the reporting API.
    pub const DEFAULT_BASE_URL: &'static str = "https://analyticsreporting.googleapis.com";

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
}

#[async_trait]
impl ReportingApi for HttpReportingApi {
    async fn batch_get(&self, body: &Value) -> Result<Value, TallyError> {
        let resp = self
            .client
            .post(format!("{}/v4/reports:batchGet", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(SOURCE_NAME, &e))?;
        read_json(SOURCE_NAME, resp).await
    }
}

impl dyn ReportingApi {
    /// Build a `ReportingApi` from a closure (tests and demos).
    pub fn from_fn<F>(f: F) -> Arc<dyn ReportingApi>
    where
        F: Send + Sync + 'static + Fn(&Value) -> Result<Value, TallyError>,
    {
        struct FnReporting<F>(F);
        #[async_trait]
        impl<F> ReportingApi for FnReporting<F>
        where
            F: Send + Sync + 'static + Fn(&Value) -> Result<Value, TallyError>,
        {
            async fn batch_get(&self, body: &Value) -> Result<Value, TallyError> {
                (self.0)(body)
            }
        }
        Arc::new(FnReporting(f))
    }
}
