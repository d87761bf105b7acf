use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use tally_core::driver::run;
use tally_core::normalize::{array_at, build_row, str_at};
use tally_core::{
    CollectorConfig, DedupPolicy, DimensionDescriptor, EndSemantics, MetricDescriptor,
    MetricValue, NormalizedRow, PageRequest, PageResponse, PageSource, RequestWindow, RetryConfig,
    TallyError, TimeWindow, ValueKind,
};

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Serves scripted pages keyed by (window start date, token).
struct Scripted {
    pages: HashMap<(String, Option<String>), Result<Value, TallyError>>,
    policy: DedupPolicy,
    semantics: EndSemantics,
    calls: Mutex<Vec<(String, String, Option<String>)>>,
    skip_before: Option<DateTime<Utc>>,
}

impl Scripted {
    fn new(policy: DedupPolicy) -> Self {
        Self {
            pages: HashMap::new(),
            policy,
            semantics: EndSemantics::Exclusive,
            calls: Mutex::new(Vec::new()),
            skip_before: None,
        }
    }

    fn page(mut self, day: &str, token: Option<&str>, body: Value) -> Self {
        self.pages
            .insert((day.to_string(), token.map(str::to_string)), Ok(body));
        self
    }

    fn fail(mut self, day: &str, token: Option<&str>, err: TallyError) -> Self {
        self.pages
            .insert((day.to_string(), token.map(str::to_string)), Err(err));
        self
    }

    fn calls(&self) -> Vec<(String, String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn dedup_policy(&self) -> DedupPolicy {
        self.policy
    }

    fn end_semantics(&self) -> EndSemantics {
        self.semantics
    }

    fn covers(&self, window: &TimeWindow) -> bool {
        self.skip_before.is_none_or(|t| window.start() >= t)
    }

    fn build_request(
        &self,
        _config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError> {
        let mut params = serde_json::Map::new();
        params.insert("start".into(), json!(window.start_date()));
        params.insert("last".into(), json!(window.last_date()));
        Ok(PageRequest::new(params, token.map(str::to_string)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError> {
        let start = request.param_str("start").unwrap_or_default().to_string();
        let last = request.param_str("last").unwrap_or_default().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((start.clone(), last, request.continuation_token.clone()));
        let body = self
            .pages
            .get(&(start, request.continuation_token.clone()))
            .cloned()
            .unwrap_or_else(|| Ok(json!({})))?;
        let rows = array_at(&body, &["rows"]).to_vec();
        let next = str_at(&body, &["next"]);
        Ok(PageResponse::new(rows, next, body.clone()))
    }

    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError> {
        page.rows
            .iter()
            .map(|r| {
                let dims = array_at(r, &["d"])
                    .iter()
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .collect();
                build_row(
                    dims,
                    &config.dimensions,
                    array_at(r, &["m"]),
                    &config.metrics,
                    &config.query_strings,
                )
            })
            .collect()
    }
}

fn config(start: DateTime<Utc>, end: DateTime<Utc>) -> CollectorConfig {
    CollectorConfig::new(start, end)
        .with_dimensions(vec![DimensionDescriptor::path("page", "URL")])
        .with_metrics(vec![MetricDescriptor::new("views", "PageViews", ValueKind::Int)])
        .with_inter_call_delay(Duration::from_secs(1))
        .with_retry(RetryConfig::disabled())
}

#[tokio::test(start_paused = true)]
async fn two_pages_of_same_key_are_summed() {
    let src = Scripted::new(DedupPolicy::SumByKey)
        .page(
            "2022-03-01",
            None,
            json!({"rows": [{"d": ["/x"], "m": ["5"]}], "next": "p2"}),
        )
        .page(
            "2022-03-01",
            Some("p2"),
            json!({"rows": [{"d": ["/x"], "m": ["5"]}], "next": ""}),
        );
    let set = run(&src, &config(ts(2022, 3, 1), ts(2022, 3, 2))).await.unwrap();

    assert_eq!(set.rows.len(), 1);
    assert_eq!(set.rows[0].date, ts(2022, 3, 1));
    assert_eq!(set.rows[0].dimensions, vec!["/x".to_string()]);
    assert_eq!(set.rows[0].metrics, vec![MetricValue::Int(10)]);
    assert_eq!(src.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn set_by_identity_keeps_first_row() {
    let src = Scripted::new(DedupPolicy::SetByIdentity)
        .page(
            "2022-03-01",
            None,
            json!({"rows": [{"d": ["/x"], "m": ["5"]}], "next": "p2"}),
        )
        .page("2022-03-01", Some("p2"), json!({"rows": [{"d": ["/x"], "m": ["7"]}]}));
    let set = run(&src, &config(ts(2022, 3, 1), ts(2022, 3, 2))).await.unwrap();
    assert_eq!(set.rows.len(), 1);
    assert_eq!(set.rows[0].metrics, vec![MetricValue::Int(5)]);
}

#[tokio::test(start_paused = true)]
async fn one_request_per_daily_window() {
    let src = Scripted::new(DedupPolicy::SumByKey);
    let set = run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 4))).await.unwrap();
    assert!(set.is_empty());
    let starts: Vec<String> = src.calls().into_iter().map(|c| c.0).collect();
    assert_eq!(starts, vec!["2022-01-01", "2022-01-02", "2022-01-03"]);
}

#[tokio::test(start_paused = true)]
async fn inclusive_end_sends_previous_day() {
    let mut src = Scripted::new(DedupPolicy::SumByKey);
    src.semantics = EndSemantics::inclusive_days();
    run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 3))).await.unwrap();
    let calls = src.calls();
    assert_eq!(calls[0].0, "2022-01-01");
    assert_eq!(calls[0].1, "2022-01-01");
    assert_eq!(calls[1].1, "2022-01-02");
}

#[tokio::test(start_paused = true)]
async fn sleeps_after_every_call() {
    let src = Scripted::new(DedupPolicy::SumByKey)
        .page("2022-01-01", None, json!({"rows": [], "next": "t"}))
        .page("2022-01-01", Some("t"), json!({"rows": []}));
    let begin = tokio::time::Instant::now();
    run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 3))).await.unwrap();
    // two pages on day one, one on day two
    assert_eq!(src.calls().len(), 3);
    assert!(begin.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn uncovered_windows_issue_no_calls() {
    let mut src = Scripted::new(DedupPolicy::SumByKey);
    src.skip_before = Some(ts(2022, 1, 3));
    run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 4))).await.unwrap();
    let starts: Vec<String> = src.calls().into_iter().map(|c| c.0).collect();
    assert_eq!(starts, vec!["2022-01-03"]);
}

#[tokio::test(start_paused = true)]
async fn invalid_range_fails_before_any_call() {
    let src = Scripted::new(DedupPolicy::SumByKey);
    let err = run(&src, &config(ts(2022, 1, 2), ts(2022, 1, 1)))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(src.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn extra_metric_values_abort_the_run() {
    let src = Scripted::new(DedupPolicy::SumByKey).page(
        "2022-01-01",
        None,
        json!({"rows": [{"d": ["/x"], "m": ["1", "2"]}]}),
    );
    let err = run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::DescriptorMismatch { .. }));
}

#[tokio::test(start_paused = true)]
async fn fatal_error_discards_partial_window() {
    let src = Scripted::new(DedupPolicy::SumByKey)
        .page(
            "2022-01-01",
            None,
            json!({"rows": [{"d": ["/x"], "m": ["1"]}], "next": "t"}),
        )
        .fail("2022-01-01", Some("t"), TallyError::auth("scripted", "expired"));
    let err = run(&src, &config(ts(2022, 1, 1), ts(2022, 1, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Auth { .. }));
}

#[tokio::test(start_paused = true)]
async fn archive_keeps_every_raw_page() {
    let src = Scripted::new(DedupPolicy::SumByKey)
        .page("2022-01-01", None, json!({"rows": [], "next": "t"}))
        .page("2022-01-01", Some("t"), json!({"rows": []}));
    let cfg = config(ts(2022, 1, 1), ts(2022, 1, 2)).with_archive_raw(true);
    let set = run(&src, &cfg).await.unwrap();
    assert_eq!(set.archive.len(), 2);
    assert!(set.archive[0].json.contains("\"next\":\"t\""));
    assert_eq!(set.archive[1].date, ts(2022, 1, 1));
}
