use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tally_analytics::{AnalyticsCollector, PATH_COLUMN, ReportingApi};
use tally_core::{CollectorConfig, MetricDescriptor, RetryConfig, TallyError, ValueKind};

fn report(rows: Value, next: Option<&str>) -> Value {
    let mut r = json!({ "data": { "rows": rows } });
    if let Some(t) = next {
        r["nextPageToken"] = json!(t);
    }
    json!({ "reports": [r] })
}

fn row(url: &str, values: &[&str]) -> Value {
    json!({ "dimensions": [url], "metrics": [{ "values": values }] })
}

fn config(paths: &[&str]) -> CollectorConfig {
    AnalyticsCollector::default_config(
        Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2022, 3, 2, 0, 0, 0).unwrap(),
        "181392643",
        paths.iter().copied(),
    )
    .with_metrics(vec![MetricDescriptor::new("ga:pageViews", "PageViews", ValueKind::Int)])
    .with_inter_call_delay(Duration::from_secs(1))
    .with_retry(RetryConfig::disabled())
}

fn filter_path(body: &Value) -> String {
    body["reportRequests"][0]["dimensionFilterClauses"][0]["filters"][0]["expressions"][0]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test(start_paused = true)]
async fn pages_are_summed_per_canonical_url() {
    let api = <dyn ReportingApi>::from_fn(|body| {
        let token = body["reportRequests"][0]["pageToken"].as_str();
        Ok(match token {
            None => report(json!([row("/x?twclid=1", &["5"])]), Some("p2")),
            Some(_) => report(json!([row("/x", &["5"])]), None),
        })
    });
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/x"]))
        .await
        .unwrap();

    let df = &tables.metrics;
    assert_eq!(df.height(), 1);
    assert_eq!(df.column("URL").unwrap().str().unwrap().get(0), Some("/x"));
    assert_eq!(df.column(PATH_COLUMN).unwrap().str().unwrap().get(0), Some("/x"));
    assert_eq!(df.column("PageViews").unwrap().i64().unwrap().get(0), Some(10));
    assert!(tables.archive.is_none());
    assert!(tables.report.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn paths_are_unioned() {
    let api = <dyn ReportingApi>::from_fn(|body| {
        let path = filter_path(body);
        Ok(report(json!([row(&path, &["3"])]), None))
    });
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/a", "/b"]))
        .await
        .unwrap();
    assert_eq!(tables.metrics.height(), 2);
    assert_eq!(tables.into_frames().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn wide_metric_lists_are_split_and_joined() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let api = <dyn ReportingApi>::from_fn(move |body| {
        let n = body["reportRequests"][0]["metrics"]
            .as_array()
            .map_or(0, Vec::len);
        seen_in.lock().unwrap().push(n);
        let values: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        Ok(report(json!([row("/x", &refs)]), None))
    });
    let metrics = (0..12)
        .map(|i| MetricDescriptor::new(format!("ga:m{i}"), format!("M{i}"), ValueKind::Int))
        .collect();
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/x"]).with_metrics(metrics))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![10, 2]);
    assert_eq!(tables.metrics.height(), 1);
    // Date, URL, Path and twelve metrics
    assert_eq!(tables.metrics.width(), 15);
    assert_eq!(tables.metrics.column("M11").unwrap().i64().unwrap().get(0), Some(1));
}

#[tokio::test(start_paused = true)]
async fn rows_lost_in_join_are_reported() {
    let api = <dyn ReportingApi>::from_fn(|body| {
        let n = body["reportRequests"][0]["metrics"]
            .as_array()
            .map_or(0, Vec::len);
        let values: Vec<String> = (0..n).map(|_| "1".to_string()).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let rows = if n == 10 {
            json!([row("/x", &refs), row("/y", &refs)])
        } else {
            json!([row("/x", &refs)])
        };
        Ok(report(rows, None))
    });
    let metrics = (0..11)
        .map(|i| MetricDescriptor::new(format!("ga:m{i}"), format!("M{i}"), ValueKind::Int))
        .collect();
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/"]).with_metrics(metrics))
        .await
        .unwrap();
    assert_eq!(tables.metrics.height(), 1);
    assert_eq!(tables.report.warnings.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn archive_table_keeps_raw_pages() {
    let api = <dyn ReportingApi>::from_fn(|_| Ok(report(json!([row("/x", &["1"])]), None)));
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/x"]).with_archive_raw(true))
        .await
        .unwrap();
    let archive = tables.archive.clone().unwrap();
    assert_eq!(archive.height(), 1);
    let json = archive.column("JsonString").unwrap().str().unwrap().get(0).unwrap();
    assert!(json.contains("\"reports\""));
    assert_eq!(tables.into_frames().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_rows_give_empty_table() {
    let api = <dyn ReportingApi>::from_fn(|_| Ok(json!({ "reports": [{ "columnHeader": {} }] })));
    let tables = AnalyticsCollector::new(api)
        .collect(&config(&["/x"]))
        .await
        .unwrap();
    assert_eq!(tables.metrics.height(), 0);
}

#[tokio::test(start_paused = true)]
async fn upstream_errors_abort_the_run() {
    let api = <dyn ReportingApi>::from_fn(|_| Err(TallyError::auth("google-analytics", "expired")));
    let err = AnalyticsCollector::new(api)
        .collect(&config(&["/x"]))
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Auth { .. }));
}

#[tokio::test(start_paused = true)]
async fn descriptor_mismatch_fails_before_any_request() {
    let calls = Arc::new(Mutex::new(0usize));
    let calls_in = Arc::clone(&calls);
    let api = <dyn ReportingApi>::from_fn(move |_| {
        *calls_in.lock().unwrap() += 1;
        Ok(json!({}))
    });
    let err = MetricDescriptor::zip(
        &["ga:pageViews", "ga:bounceRate"],
        &["PageViews"],
        &[ValueKind::Int, ValueKind::Float],
    )
    .and_then(|metrics| {
        let cfg = config(&["/x"]).with_metrics(metrics);
        cfg.validate().map(|()| cfg)
    })
    .unwrap_err();
    assert!(err.is_validation());

    let empty = config(&["/x"]).with_metrics(Vec::new());
    assert!(AnalyticsCollector::new(api).collect(&empty).await.is_err());
    assert_eq!(*calls.lock().unwrap(), 0);
}
