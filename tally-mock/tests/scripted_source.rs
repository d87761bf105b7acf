use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use tally_core::driver;
use tally_core::{
    CollectorConfig, DedupPolicy, DimensionDescriptor, MetricDescriptor, RetryConfig, TallyError,
    ValueKind,
};
use tally_mock::{MockBehavior, PageCall, ScriptedPage, ScriptedSource};

fn config(days: u32) -> CollectorConfig {
    CollectorConfig::new(
        Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2022, 3, 1 + days, 0, 0, 0).unwrap(),
    )
    .with_dimensions(vec![DimensionDescriptor::path("path", "URL")])
    .with_metrics(vec![MetricDescriptor::new("views", "Views", ValueKind::Int)])
    .with_retry(RetryConfig {
        max_retries: 2,
        ..RetryConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn flaky_pages_are_retried() {
    let (source, controller) = ScriptedSource::new_with_controller("scripted");
    controller
        .set_page(
            "2022-03-01",
            None,
            MockBehavior::Flaky {
                failures: 2,
                error: TallyError::status("scripted", 503, "busy"),
                value: ScriptedPage::new().row(&["/x"], json!([4])),
            },
        )
        .await;
    let set = driver::run(&source, &config(1)).await.unwrap();
    assert_eq!(set.rows.len(), 1);
    assert_eq!(controller.calls().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_failures_are_not_retried() {
    let (source, controller) = ScriptedSource::new_with_controller("scripted");
    controller
        .set_page(
            "2022-03-02",
            None,
            MockBehavior::Fail(TallyError::auth("scripted", "expired")),
        )
        .await;
    let err = driver::run(&source, &config(3)).await.unwrap_err();
    assert!(matches!(err, TallyError::Auth { .. }));
    let calls = controller.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1],
        PageCall {
            date: "2022-03-02".into(),
            token: None
        }
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_upstream_is_bounded_by_caller_timeout() {
    let (source, controller) = ScriptedSource::new_with_controller("scripted");
    controller
        .set_page("2022-03-01", None, MockBehavior::Hang)
        .await;
    let cfg = config(1);
    let res = tokio::time::timeout(Duration::from_secs(30), driver::run(&source, &cfg)).await;
    assert!(res.is_err());
}

#[tokio::test(start_paused = true)]
async fn identity_policy_and_uncovered_windows() {
    let (source, controller) = ScriptedSource::new_with_controller("scripted");
    let source = source
        .with_dedup_policy(DedupPolicy::SetByIdentity)
        .with_uncovered(["2022-03-02"]);
    for date in ["2022-03-01", "2022-03-02", "2022-03-03"] {
        controller
            .set_page(
                date,
                None,
                MockBehavior::Return(ScriptedPage::new().row(&["/x"], json!([1])).next("t")),
            )
            .await;
        controller
            .set_page(
                date,
                Some("t"),
                MockBehavior::Return(ScriptedPage::new().row(&["/x"], json!([9]))),
            )
            .await;
    }
    let set = driver::run(&source, &config(3)).await.unwrap();
    assert_eq!(set.rows.len(), 2);
    assert!(set.rows.iter().all(|r| r.metrics[0].as_int() == Some(1)));
    assert!(
        controller
            .calls()
            .await
            .iter()
            .all(|c| c.date != "2022-03-02")
    );

    controller.clear_all().await;
    assert!(controller.calls().await.is_empty());
}
