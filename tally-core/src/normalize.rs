//! Helpers shared by every response normalizer.
//!
//! Upstream payloads are read tolerantly: a missing container (`data`, `rows`,
//! `messages`) means "nothing here", not an error. Anything that is present but
//! does not line up with the declared descriptors is fatal.

use serde_json::Value;

use tally_types::{
    DimensionDescriptor, MetricDescriptor, MetricValue, NormalizedRow, QueryStringConfig,
    TallyError,
};

use crate::canonical::canonicalize_dimensions;

/// Follow `path` through nested objects; `None` as soon as a key is missing.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

/// The array at `path`, or an empty slice when it is missing or not an array.
#[must_use]
pub fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    lookup(value, path)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// The string at `path`, if present.
#[must_use]
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path).and_then(Value::as_str)
}

/// Render a scalar JSON value as the raw string a converter expects.
///
/// Nulls, arrays and objects have no scalar spelling and return `None`.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Convert positional raw metric values using their descriptors.
///
/// More values than descriptors is a descriptor mismatch. A value that is
/// missing (or null) becomes the kind's zero when the descriptor allows it and
/// a data error otherwise.
///
/// # Errors
/// Returns `DescriptorMismatch` or `Data` as described above.
pub fn convert_metrics(
    values: &[Value],
    descriptors: &[MetricDescriptor],
) -> Result<Vec<MetricValue>, TallyError> {
    if values.len() > descriptors.len() {
        return Err(TallyError::descriptor_mismatch(
            "metric values vs metric descriptors",
            descriptors.len(),
            values.len(),
        ));
    }
    descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| match values.get(i).and_then(scalar_text) {
            Some(raw) => d.value_kind.convert(&raw),
            None if d.missing_as_zero => Ok(d.value_kind.zero()),
            None => Err(TallyError::Data(format!(
                "missing value for metric '{}'",
                d.expression
            ))),
        })
        .collect()
}

/// Assemble one normalized row, canonicalizing path dimensions.
///
/// # Errors
/// Returns `DescriptorMismatch` if the number of dimension values differs
/// from the number of dimension descriptors, or any error from
/// [`convert_metrics`].
pub fn build_row(
    mut dimensions: Vec<String>,
    dimension_descriptors: &[DimensionDescriptor],
    metric_values: &[Value],
    metric_descriptors: &[MetricDescriptor],
    rules: &QueryStringConfig,
) -> Result<NormalizedRow, TallyError> {
    if dimensions.len() != dimension_descriptors.len() {
        return Err(TallyError::descriptor_mismatch(
            "dimension values vs dimension descriptors",
            dimension_descriptors.len(),
            dimensions.len(),
        ));
    }
    canonicalize_dimensions(&mut dimensions, dimension_descriptors, rules);
    let metrics = convert_metrics(metric_values, metric_descriptors)?;
    Ok(NormalizedRow::new(dimensions, metrics))
}
