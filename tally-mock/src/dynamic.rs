use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use tally_core::normalize::{array_at, build_row, scalar_text};
use tally_core::{
    CollectorConfig, DedupPolicy, EndSemantics, NormalizedRow, PageRequest, PageResponse,
    PageSource, RequestWindow, TallyError, TimeWindow,
};

/// Instruction for how a page fetch should behave.
#[derive(Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(TallyError),
    /// Fail the first `failures` attempts, then return the value.
    Flaky {
        /// Attempts that fail before the value is returned.
        failures: u32,
        /// Error returned by the failing attempts.
        error: TallyError,
        /// Value returned afterwards.
        value: T,
    },
    /// Never complete (simulate a stalled upstream).
    Hang,
}

/// One scripted page: rows of `(dimensions, metric values)` and the next token.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    rows: Vec<Value>,
    next: Option<String>,
}

impl ScriptedPage {
    /// Empty terminal page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    #[must_use]
    pub fn row(mut self, dimensions: &[&str], values: Value) -> Self {
        self.rows.push(json!({ "dimensions": dimensions, "values": values }));
        self
    }

    /// Continuation token handed back with this page.
    #[must_use]
    pub fn next(mut self, token: impl Into<String>) -> Self {
        self.next = Some(token.into());
        self
    }
}

/// A fetch observed by the scripted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCall {
    /// Window start, `YYYY-MM-DD`.
    pub date: String,
    /// Token the fetch was made with.
    pub token: Option<String>,
}

type PageKey = (String, Option<String>);

#[derive(Default)]
struct InternalState {
    pages: HashMap<PageKey, MockBehavior<ScriptedPage>>,
    attempts: HashMap<PageKey, u32>,
    calls: Vec<PageCall>,
}

/// Controller handle used by tests to script a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptedController {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedController {
    /// Script the fetch of the window starting on `date` (`YYYY-MM-DD`) with `token`.
    ///
    /// Unscripted fetches return an empty terminal page.
    pub async fn set_page(
        &self,
        date: &str,
        token: Option<&str>,
        behavior: MockBehavior<ScriptedPage>,
    ) {
        let mut guard = self.state.lock().await;
        guard
            .pages
            .insert((date.to_string(), token.map(str::to_string)), behavior);
    }

    /// Every fetch attempt so far, in order.
    pub async fn calls(&self) -> Vec<PageCall> {
        self.state.lock().await.calls.clone()
    }

    /// Clear all scripted pages and the call log.
    pub async fn clear_all(&self) {
        let mut guard = self.state.lock().await;
        guard.pages.clear();
        guard.attempts.clear();
        guard.calls.clear();
    }
}

/// A `PageSource` that defers every page to a [`ScriptedController`].
///
/// Rows are `{dimensions, values}` records normalized against the run's
/// descriptors, so canonicalization and conversion behave as for real sources.
pub struct ScriptedSource {
    name: &'static str,
    policy: DedupPolicy,
    semantics: EndSemantics,
    uncovered: HashSet<String>,
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedSource {
    /// Create a scripted source and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Self, ScriptedController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = ScriptedController {
            state: Arc::clone(&state),
        };
        let me = Self {
            name,
            policy: DedupPolicy::default(),
            semantics: EndSemantics::Exclusive,
            uncovered: HashSet::new(),
            state,
        };
        (me, controller)
    }

    /// Merge policy reported to the driver.
    #[must_use]
    pub const fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// End-date semantics reported to the driver.
    #[must_use]
    pub const fn with_end_semantics(mut self, semantics: EndSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Windows starting on these dates are reported as not applicable.
    #[must_use]
    pub fn with_uncovered<'a>(mut self, dates: impl IntoIterator<Item = &'a str>) -> Self {
        self.uncovered = dates.into_iter().map(str::to_string).collect();
        self
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    fn name(&self) -> &str {
        self.name
    }

    fn dedup_policy(&self) -> DedupPolicy {
        self.policy
    }

    fn end_semantics(&self) -> EndSemantics {
        self.semantics
    }

    fn covers(&self, window: &TimeWindow) -> bool {
        let date = window.start().format("%Y-%m-%d").to_string();
        !self.uncovered.contains(&date)
    }

    fn build_request(
        &self,
        _config: &CollectorConfig,
        window: RequestWindow,
        token: Option<&str>,
    ) -> Result<PageRequest, TallyError> {
        let mut params = Map::new();
        params.insert("date".into(), json!(window.start_date()));
        params.insert("last".into(), json!(window.last_date()));
        Ok(PageRequest::new(params, token.map(str::to_string)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, TallyError> {
        let date = request.param_str("date").unwrap_or_default().to_string();
        let key = (date.clone(), request.continuation_token.clone());
        // Resolve the behavior without holding the lock across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.calls.push(PageCall {
                date,
                token: request.continuation_token.clone(),
            });
            let attempt = {
                let n = guard.attempts.entry(key.clone()).or_insert(0);
                *n += 1;
                *n
            };
            match guard.pages.get(&key) {
                Some(MockBehavior::Flaky {
                    failures,
                    error,
                    value,
                }) => {
                    if attempt <= *failures {
                        MockBehavior::Fail(error.clone())
                    } else {
                        MockBehavior::Return(value.clone())
                    }
                }
                Some(other) => other.clone(),
                None => MockBehavior::Return(ScriptedPage::new()),
            }
        };
        match behavior {
            MockBehavior::Return(page) => {
                let raw = json!({ "rows": page.rows, "next": page.next });
                Ok(PageResponse::new(page.rows, page.next.as_deref(), raw))
            }
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::Flaky { error, .. } => Err(error),
            MockBehavior::Hang => std::future::pending().await,
        }
    }

    fn parse_page(
        &self,
        config: &CollectorConfig,
        page: &PageResponse,
    ) -> Result<Vec<NormalizedRow>, TallyError> {
        page.rows
            .iter()
            .map(|row| {
                let dimensions = array_at(row, &["dimensions"])
                    .iter()
                    .filter_map(scalar_text)
                    .collect();
                build_row(
                    dimensions,
                    &config.dimensions,
                    array_at(row, &["values"]),
                    &config.metrics,
                    &config.query_strings,
                )
            })
            .collect()
    }
}
