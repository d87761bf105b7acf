use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tally::{Dataset, ParquetSink, Pipeline, RetryConfig, ScheduleWindow, TallyError, read_tables};
use tally_mock::{MockAds, MockChat, MockReporting};

fn window() -> ScheduleWindow {
    let now = Utc.with_ymd_and_hms(2022, 3, 2, 14, 0, 0).unwrap();
    ScheduleWindow::daily(now, 8, 1).unwrap()
}

fn full_pipeline() -> Pipeline {
    Pipeline::builder()
        .with_analytics(Arc::new(MockReporting::new()), "1", ["/", "/blog"])
        .with_ads(Arc::new(MockAds::new()), "")
        .with_chat(Arc::new(MockChat::new()), ["general"])
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn collect_groups_tables_by_dataset() {
    let out = full_pipeline().collect(&window()).await.unwrap();
    assert_eq!(out.date, NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());

    let google = out.tables(Dataset::Google).unwrap();
    assert_eq!(google.len(), 1);
    assert_eq!(google[0].height(), 2);

    // summary, detail, archive
    let twitter = out.tables(Dataset::Twitter).unwrap();
    assert_eq!(twitter.len(), 3);
    assert_eq!(twitter[0].height(), 2);
    assert_eq!(twitter[1].height(), 4);

    assert_eq!(out.tables(Dataset::SlackChannels).unwrap()[0].height(), 2);
    assert_eq!(out.tables(Dataset::SlackMessages).unwrap()[0].height(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_writes_partitioned_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());
    let written = full_pipeline().run(&window(), &sink).await.unwrap();
    assert_eq!(written.len(), 6);

    let date = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    let twitter_dir = sink.dataset_dir(date, Dataset::Twitter);
    assert!(twitter_dir.ends_with("2022-03-01/twitter"));
    assert!(twitter_dir.join("0.parquet").is_file());

    let twitter = read_tables(&twitter_dir).unwrap();
    assert_eq!(twitter.len(), 3);
    assert_eq!(twitter[0].height(), 2);

    let google = read_tables(sink.dataset_dir(date, Dataset::Google)).unwrap();
    assert_eq!(google[0].height(), 2);
    let views = google[0].column("PageViews").unwrap().i64().unwrap();
    assert_eq!(views.get(0), Some(360));

    let everything = read_tables(dir.path()).unwrap();
    assert_eq!(everything.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn failed_stage_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());
    let pipeline = Pipeline::builder()
        .with_analytics(Arc::new(MockReporting::new()), "1", ["/FAIL"])
        .with_chat(Arc::new(MockChat::new()), Vec::<String>::new())
        .retry(RetryConfig::disabled())
        .build()
        .unwrap();

    let err = pipeline.run(&window(), &sink).await.unwrap_err();
    assert!(matches!(err, TallyError::Transport { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn builder_requires_a_source() {
    let err = Pipeline::builder().build().err().unwrap();
    assert!(matches!(err, TallyError::InvalidArg(_)));

    let err = Pipeline::builder()
        .with_analytics(Arc::new(MockReporting::new()), "1", Vec::<String>::new())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TallyError::InvalidArg(_)));
}

#[test]
fn empty_frames_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let sink = ParquetSink::new(dir.path());
    let date = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    let mut frames = vec![polars::prelude::DataFrame::empty()];
    let written = sink.write(date, Dataset::SlackMessages, &mut frames).unwrap();
    assert!(written.is_empty());
    assert!(read_tables(sink.dataset_dir(date, Dataset::SlackMessages)).unwrap().is_empty());
}
