//! Columnar assembly of collector output.
//!
//! Row sets become polars frames with a millisecond UTC `Date` column, string
//! dimension columns and typed metric columns. Frames sharing a key layout are
//! inner-joined; frames sharing a full schema are stacked.

use polars::prelude::*;

use tally_types::{
    ArchivedPage, DATE_COLUMN, JSON_COLUMN, MetricValue, RowSet, TallyError, ValueKind,
};

/// Map a polars failure into the workspace error.
#[must_use]
pub fn table_error(e: &PolarsError) -> TallyError {
    TallyError::Table(e.to_string())
}

/// Outcome notes from joining per-metric-group frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Human-readable data-quality warnings, e.g. rows dropped by a join.
    pub warnings: Vec<String>,
}

impl AssemblyReport {
    /// Append the warnings of `other`.
    pub fn merge(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }
}

fn date_column(dates_ms: Vec<i64>) -> Result<Column, TallyError> {
    Series::new(DATE_COLUMN.into(), dates_ms)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map(Column::from)
        .map_err(|e| table_error(&e))
}

fn metric_column(
    name: &str,
    kind: ValueKind,
    values: Vec<&MetricValue>,
) -> Result<Column, TallyError> {
    let mismatch = |v: &MetricValue| {
        TallyError::Table(format!(
            "column '{name}' expects {kind:?}, found {:?}",
            v.kind()
        ))
    };
    let column = match kind {
        ValueKind::Int => {
            let data = values
                .into_iter()
                .map(|v| v.as_int().ok_or_else(|| mismatch(v)))
                .collect::<Result<Vec<i64>, _>>()?;
            Column::new(name.into(), data)
        }
        ValueKind::Float => {
            let data = values
                .into_iter()
                .map(|v| v.as_float().ok_or_else(|| mismatch(v)))
                .collect::<Result<Vec<f64>, _>>()?;
            Column::new(name.into(), data)
        }
        ValueKind::String => {
            let data = values
                .into_iter()
                .map(|v| v.as_text().map(str::to_string).ok_or_else(|| mismatch(v)))
                .collect::<Result<Vec<String>, _>>()?;
            Column::new(name.into(), data)
        }
    };
    Ok(column)
}

/// Build a frame from the emitted rows of one driver run.
///
/// `extra` adds constant string columns (e.g. the path or placement a run was
/// made for) after the dimension columns.
///
/// # Errors
/// Returns `TallyError::Table` when a row does not match the schema.
pub fn rows_to_frame(set: &RowSet, extra: &[(&str, &str)]) -> Result<DataFrame, TallyError> {
    let schema = &set.schema;
    let height = set.rows.len();
    for row in &set.rows {
        if row.dimensions.len() != schema.dimensions.len()
            || row.metrics.len() != schema.metrics.len()
        {
            return Err(TallyError::Table(format!(
                "row width {}+{} does not match schema {}+{}",
                row.dimensions.len(),
                row.metrics.len(),
                schema.dimensions.len(),
                schema.metrics.len()
            )));
        }
    }

    let mut columns = Vec::with_capacity(1 + schema.dimensions.len() + extra.len() + schema.metrics.len());
    columns.push(date_column(
        set.rows.iter().map(|r| r.date.timestamp_millis()).collect(),
    )?);
    for (i, name) in schema.dimensions.iter().enumerate() {
        let data: Vec<&str> = set.rows.iter().map(|r| r.dimensions[i].as_str()).collect();
        columns.push(Column::new(name.as_str().into(), data));
    }
    for (name, value) in extra {
        columns.push(Column::new((*name).into(), vec![*value; height]));
    }
    for (i, (name, kind)) in schema.metrics.iter().enumerate() {
        let values: Vec<&MetricValue> = set.rows.iter().map(|r| &r.metrics[i]).collect();
        columns.push(metric_column(name, *kind, values)?);
    }
    DataFrame::new(columns).map_err(|e| table_error(&e))
}

/// Build the archival frame `{Date, <extra...>, JsonString}` from raw pages.
///
/// # Errors
/// Returns `TallyError::Table` if the frame cannot be constructed.
pub fn archive_to_frame(
    pages: &[ArchivedPage],
    extra: &[(&str, &str)],
) -> Result<DataFrame, TallyError> {
    let height = pages.len();
    let mut columns = vec![date_column(
        pages.iter().map(|p| p.date.timestamp_millis()).collect(),
    )?];
    for (name, value) in extra {
        columns.push(Column::new((*name).into(), vec![*value; height]));
    }
    let json: Vec<&str> = pages.iter().map(|p| p.json.as_str()).collect();
    columns.push(Column::new(JSON_COLUMN.into(), json));
    DataFrame::new(columns).map_err(|e| table_error(&e))
}

fn key_exprs(keys: &[String]) -> Vec<Expr> {
    keys.iter().map(|k| col(k.as_str())).collect()
}

/// Inner-join frames on `keys`, reporting rows lost on either side.
///
/// The result is sorted by `keys`. An empty input yields an empty frame.
///
/// # Errors
/// Returns `TallyError::Table` if a join fails (e.g. a key column is missing).
pub fn join_on_keys(
    frames: Vec<DataFrame>,
    keys: &[String],
) -> Result<(DataFrame, AssemblyReport), TallyError> {
    let mut report = AssemblyReport::default();
    let mut iter = frames.into_iter();
    let Some(mut joined) = iter.next() else {
        return Ok((DataFrame::empty(), report));
    };
    let on = key_exprs(keys);
    for (idx, right) in iter.enumerate() {
        let (left_h, right_h) = (joined.height(), right.height());
        joined = joined
            .lazy()
            .join(right.lazy(), &on, &on, JoinArgs::new(JoinType::Inner))
            .collect()
            .map_err(|e| table_error(&e))?;
        let kept = joined.height();
        if kept != left_h || kept != right_h {
            let msg = format!(
                "join of metric group {} kept {kept} rows (left {left_h}, right {right_h})",
                idx + 1
            );
            #[cfg(feature = "tracing")]
            tracing::warn!(left = left_h, right = right_h, kept, "rows dropped by key join");
            report.warnings.push(msg);
        }
    }
    let sorted = joined
        .lazy()
        .sort_by_exprs(&on, SortMultipleOptions::default())
        .collect()
        .map_err(|e| table_error(&e))?;
    Ok((sorted, report))
}

/// Stack frames that share one schema. An empty input yields an empty frame.
///
/// # Errors
/// Returns `TallyError::Table` when schemas differ.
pub fn union_frames(frames: Vec<DataFrame>) -> Result<DataFrame, TallyError> {
    let mut iter = frames.into_iter().filter(|f| f.width() > 0);
    let Some(mut out) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    for df in iter {
        out.vstack_mut(&df).map_err(|e| table_error(&e))?;
    }
    Ok(out)
}

/// Group by `keys` and sum `values`, sorted by `keys`.
///
/// # Errors
/// Returns `TallyError::Table` when a column is missing or not summable.
pub fn sum_by(frame: &DataFrame, keys: &[String], values: &[String]) -> Result<DataFrame, TallyError> {
    let by = key_exprs(keys);
    let aggs: Vec<Expr> = values.iter().map(|v| col(v.as_str()).sum()).collect();
    frame
        .clone()
        .lazy()
        .group_by(&by)
        .agg(aggs)
        .sort_by_exprs(&by, SortMultipleOptions::default())
        .collect()
        .map_err(|e| table_error(&e))
}
