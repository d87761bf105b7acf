use serde::{Deserialize, Serialize};
use serde_json::Value;

use tally_core::TallyError;
use tally_core::normalize::{lookup, scalar_text, str_at};

/// A conversation the token can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id, e.g. `C024BE91L`.
    pub id: String,
    /// Name without the leading `#`.
    pub name: String,
    /// Private channel flag.
    pub is_private: bool,
    /// Member count; zero when not reported.
    pub num_members: i64,
}

impl Channel {
    /// Read a channel from a listing record.
    ///
    /// # Errors
    /// Returns `TallyError::Data` if the record has no id.
    pub fn from_json(v: &Value) -> Result<Self, TallyError> {
        let id = v
            .get("id")
            .and_then(scalar_text)
            .ok_or_else(|| TallyError::Data(format!("channel record without id: {v}")))?;
        Ok(Self {
            name: str_at(v, &["name"]).unwrap_or(id.as_str()).to_string(),
            is_private: lookup(v, &["is_private"])
                .and_then(Value::as_bool)
                .unwrap_or(false),
            num_members: lookup(v, &["num_members"])
                .and_then(Value::as_i64)
                .unwrap_or(0),
            id,
        })
    }

    /// Whether `selector` names this channel, by id or by name (`#` optional).
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        selector == self.id || selector.trim_start_matches('#') == self.name
    }
}
