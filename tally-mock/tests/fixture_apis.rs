use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tally_ads::AdsCollector;
use tally_analytics::AnalyticsCollector;
use tally_chat::ChatCollector;
use tally_core::{RetryConfig, TallyError};
use tally_mock::{MockAds, MockChat, MockReporting};

fn span() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2022, 3, 2, 0, 0, 0).unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn reporting_pages_sum_to_one_row_per_path() {
    let (start, end) = span();
    let cfg = AnalyticsCollector::default_config(start, end, "1", ["/", "/blog"]);
    let tables = AnalyticsCollector::new(Arc::new(MockReporting::new()))
        .collect(&cfg)
        .await
        .unwrap();
    assert_eq!(tables.metrics.height(), 2);
    let views = tables.metrics.column("PageViews").unwrap().i64().unwrap();
    // 120 on the first page, 240 on the tracking-parameter page
    assert_eq!(views.get(0), Some(360));
}

#[tokio::test(start_paused = true)]
async fn ads_fixture_skips_never_started_entities() {
    let (start, end) = span();
    let tables = AdsCollector::new(Arc::new(MockAds::new()))
        .collect(&AdsCollector::default_config(start, end))
        .await
        .unwrap();
    // Launch campaign and one line item, two placements each
    assert_eq!(tables.detail.height(), 4);
    assert_eq!(tables.summary.height(), 2);
    let impressions = tables.summary.column("Impressions").unwrap().i64().unwrap();
    assert_eq!(impressions.get(0), Some(600));
}

#[tokio::test(start_paused = true)]
async fn chat_fixture_expands_threads() {
    let (start, end) = span();
    let tables = ChatCollector::new(Arc::new(MockChat::new()))
        .collect(&ChatCollector::default_config(start, end, ["general"]))
        .await
        .unwrap();
    assert_eq!(tables.channels.height(), 2);
    // plain message, thread parent, one reply
    assert_eq!(tables.messages.height(), 3);
}

#[tokio::test(start_paused = true)]
async fn forced_failures_surface() {
    let (start, end) = span();
    let cfg = AnalyticsCollector::default_config(start, end, "1", ["/FAIL"])
        .with_retry(RetryConfig::disabled());
    let err = AnalyticsCollector::new(Arc::new(MockReporting::new()))
        .collect(&cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, TallyError::Transport { .. }));
}
