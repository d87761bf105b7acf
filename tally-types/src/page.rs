//! Page-level request/response envelopes and the flat rows produced from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::{MetricValue, ValueKind};

/// One request for a single page of results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// Source-specific parameters (request body or query parameters).
    pub source_params: Map<String, Value>,
    /// Opaque token copied verbatim from the previous page, if any.
    pub continuation_token: Option<String>,
}

impl PageRequest {
    /// Build a request from source parameters and an optional token.
    #[must_use]
    pub const fn new(source_params: Map<String, Value>, continuation_token: Option<String>) -> Self {
        Self {
            source_params,
            continuation_token,
        }
    }

    /// Read a string parameter.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.source_params.get(key).and_then(Value::as_str)
    }
}

/// One page of upstream results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageResponse {
    /// Raw records on this page.
    pub rows: Vec<Value>,
    /// Token for the next page; `None` on the terminal page.
    pub continuation_token: Option<String>,
    /// The complete raw response, kept for the archival JSON column.
    pub raw: Value,
}

impl PageResponse {
    /// Build a page, normalizing an empty token to `None`.
    #[must_use]
    pub fn new(rows: Vec<Value>, continuation_token: Option<&str>, raw: Value) -> Self {
        Self {
            rows,
            continuation_token: continuation_token_of(continuation_token),
            raw,
        }
    }

    /// Whether another page follows this one.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.continuation_token.is_some()
    }
}

/// Normalize an upstream continuation token.
///
/// APIs spell "no more pages" as either a missing/null token or an empty string;
/// both map to `None`.
#[must_use]
pub fn continuation_token_of(token: Option<&str>) -> Option<String> {
    match token {
        Some(t) if !t.trim().is_empty() => Some(t.to_string()),
        _ => None,
    }
}

/// Selects how rows that share a dedup key are merged within one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DedupPolicy {
    /// Numeric metrics of rows with the same key are summed.
    #[default]
    SumByKey,
    /// The first row seen for a key is kept; later ones are ignored.
    SetByIdentity,
}

/// A flat, date-less row: dimension values followed by metric values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Dimension values in descriptor order; together they form the dedup key.
    pub dimensions: Vec<String>,
    /// Metric values in descriptor order.
    pub metrics: Vec<MetricValue>,
}

impl NormalizedRow {
    /// Build a row.
    #[must_use]
    pub const fn new(dimensions: Vec<String>, metrics: Vec<MetricValue>) -> Self {
        Self {
            dimensions,
            metrics,
        }
    }
}

/// A row tagged with the start of the window it was collected for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedRow {
    /// Logical date of the row (window start).
    pub date: DateTime<Utc>,
    /// Dimension values.
    pub dimensions: Vec<String>,
    /// Metric values.
    pub metrics: Vec<MetricValue>,
}

/// Raw page retained for audit, tagged with its window start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPage {
    /// Window start the page was fetched for.
    pub date: DateTime<Utc>,
    /// Serialized raw response.
    pub json: String,
}

/// Output column layout of one collector run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Dimension column names (string typed).
    pub dimensions: Vec<String>,
    /// Metric column names and kinds.
    pub metrics: Vec<(String, ValueKind)>,
}

impl TableSchema {
    /// Names of the join key columns: `Date` followed by every dimension column.
    #[must_use]
    pub fn key_columns(&self) -> Vec<String> {
        std::iter::once(DATE_COLUMN.to_string())
            .chain(self.dimensions.iter().cloned())
            .collect()
    }
}

/// Name of the logical date column present in every output table.
pub const DATE_COLUMN: &str = "Date";

/// Name of the archival raw-response column.
pub const JSON_COLUMN: &str = "JsonString";

/// Everything one driver run produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    /// Column layout of `rows`.
    pub schema: TableSchema,
    /// Emitted rows, ordered by window then dedup key.
    pub rows: Vec<DatedRow>,
    /// Raw pages kept when archiving is enabled.
    pub archive: Vec<ArchivedPage>,
}

impl RowSet {
    /// Empty row set with the given schema.
    #[must_use]
    pub const fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            archive: Vec::new(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were emitted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
