use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tally_ads::{AdsApi, AdsCollector, EntityKind, Placement};
use tally_core::{CollectorConfig, RetryConfig, TallyError};

fn config(days: u32) -> CollectorConfig {
    AdsCollector::default_config(
        Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2022, 3, 1 + days, 0, 0, 0).unwrap(),
    )
    .with_retry(RetryConfig::disabled())
}

fn accounts(cursor: Option<&str>) -> Result<Value, TallyError> {
    Ok(match cursor {
        None => json!({ "data": [{ "id": "a1", "name": "Acme" }], "next_cursor": "c2" }),
        Some(_) => json!({ "data": [{ "id": "a2", "name": "Other" }], "next_cursor": null }),
    })
}

fn campaigns(
    start: &'static str,
    n: usize,
) -> impl Fn(&str, EntityKind, Option<&str>) -> Result<Value, TallyError> + Send + Sync + 'static {
    move |_, kind, _| {
        if kind != EntityKind::Campaign {
            return Ok(json!({ "data": [] }));
        }
        let data: Vec<Value> = (0..n)
            .map(|i| {
                json!({ "id": format!("c{i}"), "name": format!("Spring {i}"), "start_time": start })
            })
            .collect();
        Ok(json!({ "data": data }))
    }
}

fn stats_for(ids: &[String]) -> Value {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "id_data": [{ "metrics": { "impressions": [4, 6], "clicks": [1], "engagements": null } }]
            })
        })
        .collect();
    json!({ "data": data })
}

#[tokio::test(start_paused = true)]
async fn detail_summary_and_archive_are_assembled() {
    let api = <dyn AdsApi>::from_fns(accounts, campaigns("2022-03-01T00:00:00Z", 1), |_, q| {
        Ok(stats_for(&q.entity_ids))
    });
    let tables = AdsCollector::new(api)
        .collect(&config(2).with_target("Acme"))
        .await
        .unwrap();

    // two days, two placements
    assert_eq!(tables.detail.height(), 4);
    assert_eq!(tables.summary.height(), 2);
    let impressions = tables.summary.column("Impressions").unwrap().i64().unwrap();
    assert_eq!(impressions.get(0), Some(20));
    let engagements = tables.detail.column("Engagements").unwrap().i64().unwrap();
    assert_eq!(engagements.get(0), Some(0));
    assert_eq!(
        tables.detail.column("AnalyticsType").unwrap().str().unwrap().get(0),
        Some("Campaign")
    );
    assert_eq!(
        tables.detail.column("EntityName").unwrap().str().unwrap().get(0),
        Some("Spring 0")
    );
    assert!(tables.summary.column("Placement").is_err());

    let archive = tables.archive.clone().unwrap();
    assert_eq!(archive.height(), 4);
    assert!(archive.column("Placement").is_ok());
    assert_eq!(tables.into_frames().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn accounts_are_filtered_by_target() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let api = <dyn AdsApi>::from_fns(
        accounts,
        move |account, _, _| {
            seen_in.lock().unwrap().push(account.to_string());
            Ok(json!({ "data": [] }))
        },
        |_, _| Ok(json!({})),
    );
    AdsCollector::new(api)
        .collect(&config(1).with_target("a2"))
        .await
        .unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), EntityKind::ALL.len());
    assert!(seen.iter().all(|a| a == "a2"));
}

#[tokio::test(start_paused = true)]
async fn inactive_entities_are_not_requested() {
    let calls = Arc::new(Mutex::new(0usize));
    let calls_in = Arc::clone(&calls);
    let api = <dyn AdsApi>::from_fns(accounts, campaigns("2022-04-01T00:00:00Z", 3), move |_, q| {
        *calls_in.lock().unwrap() += 1;
        Ok(stats_for(&q.entity_ids))
    });
    let tables = AdsCollector::new(api).collect(&config(3)).await.unwrap();
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(tables.detail.height(), 0);
}

#[tokio::test(start_paused = true)]
async fn entity_ids_are_requested_in_batches() {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let batches_in = Arc::clone(&batches);
    let api = <dyn AdsApi>::from_fns(accounts, campaigns("2022-02-01T00:00:00Z", 25), move |_, q| {
        assert_eq!(q.granularity, "DAY");
        assert_eq!(q.placement, Placement::AllOnTwitter);
        batches_in.lock().unwrap().push(q.entity_ids.len());
        Ok(stats_for(&q.entity_ids))
    });
    let tables = AdsCollector::new(api)
        .with_placements([Placement::AllOnTwitter])
        .collect(&config(1).with_target("a1"))
        .await
        .unwrap();
    assert_eq!(*batches.lock().unwrap(), vec![20, 5]);
    assert_eq!(tables.detail.height(), 25);
}

#[tokio::test(start_paused = true)]
async fn listing_errors_abort_the_run() {
    let api = <dyn AdsApi>::from_fns(
        |_| Err(TallyError::auth("ads", "token revoked")),
        |_, _, _| Ok(json!({})),
        |_, _| Ok(json!({})),
    );
    let err = AdsCollector::new(api).collect(&config(1)).await.unwrap_err();
    assert!(matches!(err, TallyError::Auth { .. }));
}
