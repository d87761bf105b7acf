//! The date-window driver.
//!
//! One generic loop walks `[start, end)` in fixed increments and, for each
//! window, follows continuation tokens until the source reports the terminal
//! page. Rows from every page of a window are merged by the source's dedup
//! policy and emitted tagged with the window start. The driver sleeps the
//! source's inter-call delay after every successful upstream call.
//!
//! The loop is an explicit phase machine:
//!
//! ```text
//! Idle -> Windowing -> FetchingPage(window, token) -> ... -> Emitting(window)
//!            ^                                                   |
//!            +---------------------------------------------------+
//! Windowing -> Done once the range is exhausted
//! ```
//!
//! Any error aborts the run; rows of the window in progress are discarded
//! along with everything else.

use tally_types::{
    ArchivedPage, CollectorConfig, DatedRow, RowSet, TallyError, TimeWindow,
};

use crate::accumulator::Accumulator;
use crate::retry::with_retry;
use crate::source::PageSource;
use crate::window::Windows;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Windowing,
    FetchingPage {
        window: TimeWindow,
        token: Option<String>,
    },
    Emitting {
        window: TimeWindow,
    },
    Done,
}

/// Per-window scratch state, dropped at every `Emitting` transition.
struct WindowState {
    acc: Accumulator,
    archive: Vec<ArchivedPage>,
    pages: usize,
}

/// Run `source` over the configured range and collect its rows.
///
/// The configuration is validated (generic and source-specific checks) before
/// any call is issued.
///
/// # Errors
/// Returns a validation error for a bad configuration, or the first
/// non-retried fetch, parse, or dedup error.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "tally::driver::run",
        skip(source, config),
        fields(source = %source.name(), start = %config.start, end = %config.end),
    )
)]
pub async fn run<S>(source: &S, config: &CollectorConfig) -> Result<RowSet, TallyError>
where
    S: PageSource + ?Sized,
{
    config.validate()?;
    source.validate(config)?;

    let mut windows = Windows::new(config.range()?, config.increment_delta()?)?;
    let semantics = source.end_semantics();
    let delay = source.inter_call_delay(config);
    let mut out = RowSet::new(config.schema());
    let mut state: Option<WindowState> = None;
    let mut phase = Phase::Idle;

    loop {
        phase = match phase {
            Phase::Idle => Phase::Windowing,
            Phase::Windowing => match windows.next() {
                None => Phase::Done,
                Some(window) if !source.covers(&window) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(window_start = %window.start(), "window not covered, skipping");
                    Phase::Windowing
                }
                Some(window) => {
                    state = Some(WindowState {
                        acc: Accumulator::new(source.dedup_policy()),
                        archive: Vec::new(),
                        pages: 0,
                    });
                    Phase::FetchingPage {
                        window,
                        token: None,
                    }
                }
            },
            Phase::FetchingPage { window, token } => {
                let ws = state
                    .as_mut()
                    .ok_or_else(|| TallyError::Data("fetch without an open window".into()))?;
                let request =
                    source.build_request(config, window.for_request(semantics), token.as_deref())?;
                let page = with_retry(source.name(), &config.retry, || source.fetch_page(&request))
                    .await?;
                tokio::time::sleep(delay).await;

                ws.pages += 1;
                ws.acc.extend(source.parse_page(config, &page)?)?;
                if config.archive_raw {
                    ws.archive.push(ArchivedPage {
                        date: window.start(),
                        json: page.raw.to_string(),
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    window_start = %window.start(),
                    page = ws.pages,
                    records = page.rows.len(),
                    has_more = page.has_more(),
                    "page fetched"
                );

                match page.continuation_token {
                    Some(next) if token.as_deref() == Some(next.as_str()) => {
                        return Err(TallyError::Data(format!(
                            "{} repeated continuation token '{next}'",
                            source.name()
                        )));
                    }
                    Some(next) => Phase::FetchingPage {
                        window,
                        token: Some(next),
                    },
                    None => Phase::Emitting { window },
                }
            }
            Phase::Emitting { window } => {
                if let Some(ws) = state.take() {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        window_start = %window.start(),
                        pages = ws.pages,
                        rows = ws.acc.len(),
                        "window emitted"
                    );
                    let date = window.start();
                    out.rows.extend(ws.acc.into_rows().into_iter().map(|r| DatedRow {
                        date,
                        dimensions: r.dimensions,
                        metrics: r.metrics,
                    }));
                    out.archive.extend(ws.archive);
                }
                Phase::Windowing
            }
            Phase::Done => break,
        };
    }
    Ok(out)
}
