use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use tally_core::normalize::{array_at, build_row, scalar_text, str_at};
use tally_core::{
    CollectorConfig, DedupPolicy, DimensionKind, EndSemantics, NormalizedRow, PageRequest,
    PageResponse, PageSource, RequestWindow, TallyError,
};

use crate::adapter::{ReportingApi, SOURCE_NAME};

/// Metric expressions the reporting API accepts in one request.
pub const MAX_METRICS_PER_REQUEST: usize = 10;

/// Largest page the reporting API serves.
pub const MAX_PAGE_SIZE: u32 = 100_000;

/// Reports for one filtered page path.
///
/// The request filters the first `Path` dimension (or `ga:pagePath`) on the
/// path expression. Rows with the same canonical dimensions are summed across
/// pages.
pub struct ReportSource {
    api: Arc<dyn ReportingApi>,
    path: String,
}

impl ReportSource {
    /// Source filtering on `path`.
    pub fn new(api: Arc<dyn ReportingApi>, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
        }
    }

    /// The path filter expression.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn filter_dimension(config: &CollectorConfig) -> &str {
        config
            .dimensions
            .iter()
            .find(|d| d.kind == DimensionKind::Path)
            .map_or("ga:pagePath", |d| d.expression.as_str())
    }
}

#[async_trait]
impl PageSource for ReportSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::SumByKey
    }

    fn end_semantics(&self) -> EndSemantics {
        EndSemantics::inclusive_days()
    }

    fn validate(&self, config: &CollectorConfig) -> Result<(), TallyError> {
        if config.target_identifier.is_empty() {
            return Err(TallyError::InvalidArg("analytics view id is required".into()));
        }
        if config.dimensions.is_empty() {
            return Err(TallyError::InvalidArg("at least one dimension is required".into()));
        }
        if config.metrics.is_empty() || config.metrics.len() > MAX_METRICS_PER_REQUEST {
            return Err(TallyError::InvalidArg(format!(
                "between 1 and {MAX_METRICS_PER_REQUEST} metrics per request, got {}",
                config.metrics.len()
            )));
        }
        if config.page_size > MAX_PAGE_SIZE {
            return Err(TallyError::InvalidArg(format!(
                "page size {} exceeds {MAX_PAGE_SIZE}",
                config.page_size
            )));
        }
        Ok(())
    }

    fn build_request(
        &self,
        config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError> {
        let dimensions: Vec<Value> = config
            .dimensions
            .iter()
            .map(|d| json!({ "name": d.expression }))
            .collect();
        let metrics: Vec<Value> = config
            .metrics
            .iter()
            .map(|m| json!({ "expression": m.expression }))
            .collect();
        let mut report = json!({
            "viewId": config.target_identifier,
            "pageSize": config.page_size,
            "dimensions": dimensions,
            "dateRanges": [{
                "startDate": window.start_date(),
                "endDate": window.last_date(),
            }],
            "metrics": metrics,
            "dimensionFilterClauses": [{
                "filters": [{
                    "dimensionName": Self::filter_dimension(config),
                    "expressions": [self.path],
                }]
            }],
        });
        if let (Some(t), Some(obj)) = (token, report.as_object_mut()) {
            obj.insert("pageToken".into(), Value::String(t.to_string()));
        }
        let mut params = Map::new();
        params.insert("reportRequests".into(), Value::Array(vec![report]));
        Ok(PageRequest::new(params, token.map(str::to_string)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError> {
        let body = Value::Object(request.source_params.clone());
        let raw = self.api.batch_get(&body).await?;
        let rows: Vec<Value> = array_at(&raw, &["reports"])
            .iter()
            .flat_map(|r| array_at(r, &["data", "rows"]).iter().cloned())
            .collect();
        let token = array_at(&raw, &["reports"])
            .first()
            .and_then(|r| str_at(r, &["nextPageToken"]));
        Ok(PageResponse::new(rows, token, raw.clone()))
    }

    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError> {
        page.rows
            .iter()
            .map(|row| {
                let dims = array_at(row, &["dimensions"])
                    .iter()
                    .map(|v| {
                        scalar_text(v).ok_or_else(|| {
                            TallyError::Data(format!("non-scalar dimension value {v}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let values = array_at(row, &["metrics"])
                    .first()
                    .map_or(&[][..], |m| array_at(m, &["values"]));
                build_row(
                    dims,
                    &config.dimensions,
                    values,
                    &config.metrics,
                    &config.query_strings,
                )
            })
            .collect()
    }
}
