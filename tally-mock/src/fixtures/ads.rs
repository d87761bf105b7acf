use serde_json::{Value, json};

pub fn accounts() -> Value {
    json!({ "data": [{ "id": "18ce54d4x5t", "name": "Mock Ads" }], "next_cursor": null })
}

pub fn entities(endpoint: &str) -> Value {
    let data = match endpoint {
        "campaigns" => json!([
            { "id": "8wku2", "name": "Launch", "start_time": "2022-01-01T00:00:00Z", "end_time": null },
            { "id": "8wku3", "name": "Draft", "start_time": null, "end_time": null }
        ]),
        "line_items" => json!([
            { "id": "9hd1a", "name": "Launch / Devs", "start_time": "2022-01-01T00:00:00Z", "end_time": "2030-01-01T00:00:00Z" }
        ]),
        _ => json!([]),
    };
    json!({ "data": data, "next_cursor": null })
}

pub fn stats(ids: &[String]) -> Value {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "id_data": [{
                    "segment": null,
                    "metrics": { "impressions": [300], "clicks": [12], "engagements": [20] }
                }]
            })
        })
        .collect();
    json!({ "data": data, "request": {} })
}
