//! Canonicalization of URL-shaped dimension values.

use tally_types::{DimensionDescriptor, DimensionKind, GenericQuery, QueryStringConfig};

/// Collapse the query string of `raw` according to `rules`.
///
/// The value is split on the first `?`. Without a query it is returned
/// unchanged. With `ignore_query_strings` only the base survives. Otherwise the
/// first tracking marker found in the query replaces it with that marker's
/// sentinel, and any other query goes through the generic policy.
#[must_use]
pub fn canonicalize_path(raw: &str, rules: &QueryStringConfig) -> String {
    let Some((base, query)) = raw.split_once('?') else {
        return raw.to_string();
    };
    if rules.ignore_query_strings {
        return base.to_string();
    }
    if let Some(m) = rules
        .tracking_markers
        .iter()
        .find(|m| query.contains(m.marker.as_str()))
    {
        return format!("{base}?{}", m.sentinel);
    }
    match &rules.generic {
        GenericQuery::Sentinel(s) => format!("{base}?{s}"),
        GenericQuery::Verbatim => raw.to_string(),
    }
}

/// Canonicalize every `Path` dimension in `values` in place.
///
/// `values` is positionally aligned with `descriptors`; extra values are left alone.
pub fn canonicalize_dimensions(
    values: &mut [String],
    descriptors: &[DimensionDescriptor],
    rules: &QueryStringConfig,
) {
    for (value, d) in values.iter_mut().zip(descriptors) {
        if d.kind == DimensionKind::Path {
            *value = canonicalize_path(value, rules);
        }
    }
}
