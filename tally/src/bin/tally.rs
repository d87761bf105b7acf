//! Scheduled collection entry point.
//!
//! Each source runs only when its credentials are present. Intended to be
//! run once a day, well after the day boundary, so upstream numbers have
//! settled.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tally::{
    HttpAdsApi, HttpChatApi, HttpReportingApi, ParquetSink, Pipeline, RetryConfig, ScheduleWindow,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Collect yesterday's analytics, ads and chat data into Parquet files.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root directory for the Parquet output
    #[arg(long, env = "TALLY_DATA_DIR", default_value = "/data")]
    data_dir: PathBuf,

    /// Number of days to collect, ending at the last day boundary
    #[arg(long, env = "DAYS_OFFSET", default_value_t = 1)]
    days_back: u32,

    /// Hours past midnight UTC at which a collection day begins
    #[arg(long, env = "TALLY_DAY_OFFSET_HOURS", default_value_t = ScheduleWindow::DEFAULT_OFFSET_HOURS)]
    day_offset_hours: i64,

    /// Analytics view id
    #[arg(long, env = "GA_VIEW_ID")]
    ga_view_id: Option<String>,

    /// Analytics bearer token
    #[arg(long, env = "GA_ACCESS_TOKEN", hide_env_values = true)]
    ga_access_token: Option<String>,

    /// Page paths to collect, comma separated
    #[arg(long, env = "GA_PATHS", value_delimiter = ',')]
    ga_paths: Vec<String>,

    /// Ads bearer token
    #[arg(long, env = "ADS_ACCESS_TOKEN", hide_env_values = true)]
    ads_access_token: Option<String>,

    /// Ads account id or name; every account when unset
    #[arg(long, env = "ADS_ACCOUNT", default_value = "")]
    ads_account: String,

    /// Chat bearer token
    #[arg(long, env = "SLACK_API_TOKEN", hide_env_values = true)]
    slack_api_token: Option<String>,

    /// Channels to collect (ids or names), comma separated; every channel when unset
    #[arg(long, env = "SLACK_CHANNELS", value_delimiter = ',')]
    slack_channels: Vec<String>,

    /// Retries per call for transient failures
    #[arg(long, env = "TALLY_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Log output format
    #[arg(long, env = "TALLY_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let _ = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };
}

fn pipeline(cli: &Cli) -> Result<Pipeline, tally::TallyError> {
    let mut builder = Pipeline::builder().retry(RetryConfig {
        max_retries: cli.max_retries,
        ..RetryConfig::default()
    });
    if let (Some(view_id), Some(token)) = (&cli.ga_view_id, &cli.ga_access_token) {
        let api = Arc::new(HttpReportingApi::with_token(token.as_str())?);
        builder = builder.with_analytics(api, view_id.as_str(), cli.ga_paths.iter().cloned());
    }
    if let Some(token) = &cli.ads_access_token {
        let api = Arc::new(HttpAdsApi::with_token(token.as_str())?);
        builder = builder.with_ads(api, cli.ads_account.as_str());
    }
    if let Some(token) = &cli.slack_api_token {
        let api = Arc::new(HttpChatApi::with_token(token.as_str())?);
        builder = builder.with_chat(api, cli.slack_channels.iter().cloned());
    }
    builder.build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let window = ScheduleWindow::daily(chrono::Utc::now(), cli.day_offset_hours, cli.days_back)?;
    let pipeline = pipeline(&cli)?;
    tracing::info!(start = %window.start, end = %window.end, "collection starting");

    let written = pipeline
        .run(&window, &ParquetSink::new(&cli.data_dir))
        .await?;
    tracing::info!(files = written.len(), "collection finished");
    Ok(())
}
