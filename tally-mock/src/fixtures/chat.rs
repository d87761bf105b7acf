use serde_json::{Value, json};

pub fn channels() -> Value {
    json!({
        "ok": true,
        "channels": [
            { "id": "C01", "name": "general", "is_private": false, "num_members": 48 },
            { "id": "C02", "name": "releases", "is_private": false, "num_members": 17 }
        ],
        "response_metadata": { "next_cursor": "" }
    })
}

/// One plain message, one thread parent, and a join notice, offset from the
/// window start.
pub fn history(oldest_secs: i64) -> Value {
    json!({
        "ok": true,
        "messages": [
            { "type": "message", "ts": format!("{}.000100", oldest_secs + 60), "user": "U1", "text": "morning" },
            { "type": "message", "ts": format!("{}.000200", oldest_secs + 120), "thread_ts": format!("{}.000200", oldest_secs + 120), "user": "U2", "text": "release?" },
            { "type": "channel_join", "ts": format!("{}.000300", oldest_secs + 180) }
        ],
        "has_more": false
    })
}

pub fn replies(ts: &str) -> Value {
    let secs = ts
        .split_once('.')
        .and_then(|(secs, _)| secs.parse::<i64>().ok())
        .unwrap_or_default();
    json!({
        "ok": true,
        "messages": [
            { "type": "message", "ts": ts, "thread_ts": ts, "user": "U2", "text": "release?" },
            { "type": "message", "ts": format!("{}.000900", secs + 30), "thread_ts": ts, "user": "U1", "text": "shipping today" }
        ],
        "has_more": false
    })
}
