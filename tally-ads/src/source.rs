use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use tally_core::normalize::{array_at, convert_metrics, lookup, scalar_text};
use tally_core::{
    CollectorConfig, DedupPolicy, NormalizedRow, PageRequest, PageResponse, PageSource,
    RequestWindow, TallyError, TimeWindow,
};

use crate::adapter::{AdsApi, SOURCE_NAME, StatsQuery};
use crate::model::{Account, Entity, EntityKind, Placement};

/// Entity ids the stats endpoint accepts per request.
pub const MAX_IDS_PER_REQUEST: usize = 20;

const DIMENSION_COUNT: usize = 5;

const OFFSET_PARAM: &str = "offset";
const NEXT_OFFSET_PARAM: &str = "next_offset";

/// Stats for one (account, entity kind, placement).
///
/// Each window requests only the entities active in it, twenty ids at a time;
/// the continuation token is the offset of the next id batch. A window in
/// which no entity is active is skipped without a call.
pub struct EntityStatsSource {
    api: Arc<dyn AdsApi>,
    account: Account,
    kind: EntityKind,
    placement: Placement,
    entities: Vec<Entity>,
    names: HashMap<String, String>,
}

impl EntityStatsSource {
    /// Source over `entities` of `kind` under `account`.
    #[must_use]
    pub fn new(
        api: Arc<dyn AdsApi>,
        account: Account,
        kind: EntityKind,
        placement: Placement,
        entities: Vec<Entity>,
    ) -> Self {
        let names = entities
            .iter()
            .map(|e| (e.id.clone(), e.name.clone()))
            .collect();
        Self {
            api,
            account,
            kind,
            placement,
            entities,
            names,
        }
    }

    fn active_ids(&self, window: &TimeWindow) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.active_during(window))
            .map(|e| e.id.as_str())
            .collect()
    }

    fn rfc3339(t: DateTime<Utc>) -> String {
        t.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Sum a metric series; `None` when the metric is absent or all-null.
    ///
    /// Integer series saturate at the `i64` bounds, like summed metric values.
    fn series_total(series: Option<&Value>) -> Option<Value> {
        match series? {
            Value::Array(items) => {
                let nums: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
                if nums.is_empty() {
                    return None;
                }
                let all_int = items.iter().all(|v| v.is_null() || v.is_i64() || v.is_u64());
                if all_int {
                    let total = items
                        .iter()
                        .filter_map(|v| {
                            v.as_i64()
                                .or_else(|| v.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                        })
                        .fold(0i64, i64::saturating_add);
                    Some(json!(total))
                } else {
                    Some(json!(nums.iter().sum::<f64>()))
                }
            }
            Value::Null => None,
            scalar => Some(scalar.clone()),
        }
    }
}

#[async_trait]
impl PageSource for EntityStatsSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy::SumByKey
    }

    fn covers(&self, window: &TimeWindow) -> bool {
        self.entities.iter().any(|e| e.active_during(window))
    }

    fn validate(&self, config: &CollectorConfig) -> Result<(), TallyError> {
        if config.dimensions.len() != DIMENSION_COUNT {
            return Err(TallyError::descriptor_mismatch(
                "ads dimension descriptors",
                DIMENSION_COUNT,
                config.dimensions.len(),
            ));
        }
        if config.metrics.is_empty() {
            return Err(TallyError::InvalidArg("at least one ads metric is required".into()));
        }
        Ok(())
    }

    fn build_request(
        &self,
        _config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError> {
        let span = TimeWindow::new(window.start, window.last)?;
        let ids = self.active_ids(&span);
        let offset = match token {
            None => 0,
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| TallyError::Data(format!("bad id offset token '{t}'")))?,
        };
        let stop = (offset + MAX_IDS_PER_REQUEST).min(ids.len());
        let batch = ids.get(offset..stop).unwrap_or_default();

        let mut params = Map::new();
        params.insert("entity_ids".into(), json!(batch));
        params.insert("start_time".into(), json!(Self::rfc3339(window.start)));
        params.insert("end_time".into(), json!(Self::rfc3339(window.last)));
        params.insert(OFFSET_PARAM.into(), json!(offset));
        if stop < ids.len() {
            params.insert(NEXT_OFFSET_PARAM.into(), json!(stop.to_string()));
        }
        Ok(PageRequest::new(params, token.map(str::to_string)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError> {
        let entity_ids: Vec<String> = request
            .source_params
            .get("entity_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(scalar_text).collect())
            .unwrap_or_default();
        let query = StatsQuery {
            entity: self.kind,
            entity_ids,
            start_time: request.param_str("start_time").unwrap_or_default().to_string(),
            end_time: request.param_str("end_time").unwrap_or_default().to_string(),
            granularity: "DAY".to_string(),
            placement: self.placement,
            metric_groups: "ENGAGEMENT".to_string(),
        };
        let raw = self.api.stats(&self.account.id, &query).await?;
        let rows = array_at(&raw, &["data"]).to_vec();
        Ok(PageResponse::new(
            rows,
            request.param_str(NEXT_OFFSET_PARAM),
            raw,
        ))
    }

    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError> {
        let mut out = Vec::new();
        for item in &page.rows {
            let id = item
                .get("id")
                .and_then(scalar_text)
                .ok_or_else(|| TallyError::Data(format!("stats record without id: {item}")))?;
            let name = self.names.get(&id).cloned().unwrap_or_else(|| id.clone());
            for segment in array_at(item, &["id_data"]) {
                let values: Vec<Value> = config
                    .metrics
                    .iter()
                    .map(|m| {
                        Self::series_total(lookup(segment, &["metrics", m.expression.as_str()]))
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                let metrics = convert_metrics(&values, &config.metrics)?;
                let dimensions = vec![
                    self.account.name.clone(),
                    self.kind.label().to_string(),
                    self.placement.as_str().to_string(),
                    id.clone(),
                    name.clone(),
                ];
                out.push(NormalizedRow::new(dimensions, metrics));
            }
        }
        Ok(out)
    }
}
