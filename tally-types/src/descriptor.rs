//! Metric and dimension descriptors: which expressions to request and how their
//! values are named and typed in the output schema.

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Closed set of column value kinds produced by collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueKind {
    /// 64-bit signed integer counts (page views, clicks).
    #[default]
    Int,
    /// 64-bit floating point ratios and averages (bounce rate).
    Float,
    /// Free text (message bodies, identifiers).
    String,
}

/// 2^63; integral floats in `[-2^63, 2^63)` convert to `i64` exactly.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

impl ValueKind {
    /// Convert one raw API string into a typed value of this kind.
    ///
    /// Integers accept an integral float spelling (`"12.0"`), since some APIs
    /// render every metric as a decimal string.
    ///
    /// # Errors
    /// Returns `TallyError::Data` if the raw string does not parse as this kind.
    pub fn convert(self, raw: &str) -> Result<MetricValue, TallyError> {
        let trimmed = raw.trim();
        match self {
            Self::Int => {
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(MetricValue::Int(v));
                }
                match trimmed.parse::<f64>() {
                    #[allow(clippy::cast_possible_truncation)]
                    Ok(f) if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) => {
                        Ok(MetricValue::Int(f as i64))
                    }
                    Ok(f) if f.fract() == 0.0 && f.is_finite() => Err(TallyError::Data(format!(
                        "integer '{raw}' is out of range"
                    ))),
                    _ => Err(TallyError::Data(format!("expected integer, got '{raw}'"))),
                }
            }
            Self::Float => trimmed
                .parse::<f64>()
                .map(MetricValue::Float)
                .map_err(|_| TallyError::Data(format!("expected number, got '{raw}'"))),
            Self::String => Ok(MetricValue::Text(raw.to_string())),
        }
    }

    /// The zero-equivalent value of this kind.
    #[must_use]
    pub const fn zero(self) -> MetricValue {
        match self {
            Self::Int => MetricValue::Int(0),
            Self::Float => MetricValue::Float(0.0),
            Self::String => MetricValue::Text(String::new()),
        }
    }
}

/// One typed metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl MetricValue {
    /// The kind this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::String,
        }
    }

    /// Fold `other` into `self` for sum-by-key accumulation.
    ///
    /// Numbers of the same kind are added (integers saturate). Text keeps the
    /// first value seen. Mixed kinds are a schema violation.
    ///
    /// # Errors
    /// Returns `TallyError::Data` when the two values have different kinds.
    pub fn accumulate(&mut self, other: &Self) -> Result<(), TallyError> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => *a = a.saturating_add(*b),
            (Self::Float(a), Self::Float(b)) => *a += *b,
            (Self::Text(_), Self::Text(_)) => {}
            (a, b) => {
                return Err(TallyError::Data(format!(
                    "cannot accumulate {:?} into {:?}",
                    b.kind(),
                    a.kind()
                )));
            }
        }
        Ok(())
    }

    /// Integer payload, if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload, if this is a `Float`.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Declares how one requested metric is named and typed in the output schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Upstream metric expression, e.g. `ga:pageviews` or `impressions`.
    pub expression: String,
    /// Output column name, e.g. `PageViews`.
    pub output_column: String,
    /// Column value kind; selects the conversion applied to raw values.
    pub value_kind: ValueKind,
    /// When true, a value missing from the response is read as the kind's zero.
    /// When false, a missing value is a data-shape error.
    #[serde(default)]
    pub missing_as_zero: bool,
}

impl MetricDescriptor {
    /// Build a descriptor; missing values are treated as errors.
    pub fn new(
        expression: impl Into<String>,
        output_column: impl Into<String>,
        value_kind: ValueKind,
    ) -> Self {
        Self {
            expression: expression.into(),
            output_column: output_column.into(),
            value_kind,
            missing_as_zero: false,
        }
    }

    /// Treat values missing from a response as zero.
    #[must_use]
    pub const fn missing_as_zero(mut self, yes: bool) -> Self {
        self.missing_as_zero = yes;
        self
    }

    /// Build descriptors from parallel lists of expressions, column names and kinds.
    ///
    /// # Errors
    /// Returns `TallyError::DescriptorMismatch` if the lists differ in length.
    pub fn zip<E, C>(expressions: &[E], columns: &[C], kinds: &[ValueKind]) -> Result<Vec<Self>, TallyError>
    where
        E: AsRef<str>,
        C: AsRef<str>,
    {
        if expressions.len() != columns.len() {
            return Err(TallyError::descriptor_mismatch(
                "metric expressions vs output columns",
                expressions.len(),
                columns.len(),
            ));
        }
        if expressions.len() != kinds.len() {
            return Err(TallyError::descriptor_mismatch(
                "metric expressions vs value kinds",
                expressions.len(),
                kinds.len(),
            ));
        }
        Ok(expressions
            .iter()
            .zip(columns)
            .zip(kinds)
            .map(|((e, c), k)| Self::new(e.as_ref(), c.as_ref(), *k))
            .collect())
    }
}

/// How a dimension's raw values are treated before becoming dedup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DimensionKind {
    /// Value is used verbatim.
    #[default]
    Plain,
    /// URL-shaped value; query strings are canonicalized.
    Path,
}

/// Declares how one requested dimension is named in the output schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    /// Upstream dimension expression, e.g. `ga:pagePath`.
    pub expression: String,
    /// Output column name, e.g. `URL`.
    pub output_column: String,
    /// Treatment of raw values.
    #[serde(default)]
    pub kind: DimensionKind,
}

impl DimensionDescriptor {
    /// Build a plain dimension descriptor.
    pub fn new(expression: impl Into<String>, output_column: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            output_column: output_column.into(),
            kind: DimensionKind::Plain,
        }
    }

    /// Build a URL-shaped dimension descriptor whose values are canonicalized.
    pub fn path(expression: impl Into<String>, output_column: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            output_column: output_column.into(),
            kind: DimensionKind::Path,
        }
    }
}
