use std::time::Duration;

use async_trait::async_trait;

use tally_types::{
    CollectorConfig, DedupPolicy, EndSemantics, NormalizedRow, PageRequest, PageResponse,
    RequestWindow, TallyError, TimeWindow,
};

/// Per-source capability consumed by the generic date-window driver.
///
/// An implementation knows how to shape one request for a window and page
/// token, how to execute it against its upstream client, and how to flatten a
/// raw page into rows. Everything else (windowing, pagination, dedup, delays,
/// retries) lives in [`crate::driver`].
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Short source label used in errors and log fields.
    fn name(&self) -> &str;

    /// How rows sharing a key are merged across pages of one window.
    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::SumByKey
    }

    /// How the upstream interprets the end of a requested range.
    fn end_semantics(&self) -> EndSemantics {
        EndSemantics::Exclusive
    }

    /// Pause applied after every successful upstream call.
    fn inter_call_delay(&self, config: &CollectorConfig) -> Duration {
        config.inter_call_delay
    }

    /// Whether this source has anything to report for `window`.
    ///
    /// A window that is not covered issues no call and emits no rows.
    fn covers(&self, _window: &TimeWindow) -> bool {
        true
    }

    /// Source-specific configuration checks, run before any network call.
    ///
    /// # Errors
    /// Returns a validation error when `config` cannot be served by this source.
    fn validate(&self, _config: &CollectorConfig) -> Result<(), TallyError> {
        Ok(())
    }

    /// Build the request for one page of `window`.
    ///
    /// # Errors
    /// Returns an error if the request cannot be expressed for this source.
    fn build_request(
        &self,
        config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError>;

    /// Execute one request and return the page it produced.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError>;

    /// Flatten one page into date-less rows of the configured schema.
    ///
    /// # Errors
    /// Returns `DescriptorMismatch` or `Data` when the page does not fit the
    /// declared descriptors.
    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError>;
}
