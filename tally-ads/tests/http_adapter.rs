use httpmock::prelude::*;
use serde_json::json;
use tally_ads::{AdsApi, EntityKind, HttpAdsApi, Placement, StatsQuery};
use tally_core::TallyError;

#[tokio::test]
async fn entity_listing_sends_cursor_and_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/accounts/a1/line_items")
                .query_param("cursor", "abc")
                .header("authorization", "Bearer secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "data": [{ "id": "l1" }], "next_cursor": null }));
        })
        .await;
    let api = HttpAdsApi::new(server.base_url(), "secret").unwrap();
    let got = api
        .entities("a1", EntityKind::LineItem, Some("abc"))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(got["data"][0]["id"], "l1");
}

#[tokio::test]
async fn stats_query_is_encoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/stats/accounts/a1")
                .query_param("entity", "CAMPAIGN")
                .query_param("entity_ids", "c1,c2")
                .query_param("granularity", "DAY")
                .query_param("placement", "PUBLISHER_NETWORK")
                .query_param("metric_groups", "ENGAGEMENT");
            then.status(200).json_body(json!({ "data": [] }));
        })
        .await;
    let api = HttpAdsApi::new(server.base_url(), "t").unwrap();
    let query = StatsQuery {
        entity: EntityKind::Campaign,
        entity_ids: vec!["c1".into(), "c2".into()],
        start_time: "2022-03-01T00:00:00Z".into(),
        end_time: "2022-03-02T00:00:00Z".into(),
        granularity: "DAY".into(),
        placement: Placement::PublisherNetwork,
        metric_groups: "ENGAGEMENT".into(),
    };
    api.stats("a1", &query).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn rate_limit_defaults_retry_after() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/accounts");
            then.status(429);
        })
        .await;
    let api = HttpAdsApi::new(server.base_url(), "t").unwrap();
    let err = api.accounts(None).await.unwrap_err();
    assert_eq!(err, TallyError::rate_limited("ads", 60));
}
