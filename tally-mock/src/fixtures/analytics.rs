use serde_json::{Value, json};

/// Page views per fixture path; the second page repeats the path with a
/// tracking parameter so that summing and canonicalization both show up.
pub fn report(path: &str, metric_count: usize, token: Option<&str>) -> Value {
    let base = match path {
        "/" => 120,
        "/blog" => 40,
        "/docs" => 75,
        _ => 1,
    };
    let values = |scale: i64| -> Vec<String> {
        (0..metric_count)
            .map(|i| (base * scale + i as i64).to_string())
            .collect()
    };
    match token {
        None => json!({
            "reports": [{
                "data": { "rows": [{ "dimensions": [path], "metrics": [{ "values": values(1) }] }] },
                "nextPageToken": "2"
            }]
        }),
        Some(_) => json!({
            "reports": [{
                "data": { "rows": [{
                    "dimensions": [format!("{path}?twclid=abc")],
                    "metrics": [{ "values": values(2) }]
                }] }
            }]
        }),
    }
}
