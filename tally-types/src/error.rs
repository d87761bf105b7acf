use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the tally workspace.
///
/// This wraps configuration and descriptor validation failures, response-shape
/// problems, source-tagged transport failures, and table assembly errors.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TallyError {
    /// Invalid input argument or configuration value.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The declared descriptors do not line up with what was requested or returned.
    #[error("descriptor mismatch: {what} (expected {expected}, got {actual})")]
    DescriptorMismatch {
        /// What was being compared, e.g. "metric expressions vs output columns".
        what: String,
        /// Number of entries on the declaring side.
        expected: usize,
        /// Number of entries actually supplied.
        actual: usize,
    },

    /// Issues with the returned data (unexpected shape, unparsable values).
    #[error("data issue: {0}")]
    Data(String),

    /// A source failed at the transport layer (connect, timeout, body read).
    #[error("{source_name} transport failed: {msg}")]
    Transport {
        /// Source name that failed.
        source_name: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A source answered with a non-success HTTP status.
    #[error("{source_name} returned status {status}: {msg}")]
    Status {
        /// Source name that failed.
        source_name: String,
        /// HTTP status code.
        status: u16,
        /// Response body or API error code.
        msg: String,
    },

    /// The upstream API reported that the caller is being rate limited.
    #[error("{source_name} rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        /// Source name that was throttled.
        source_name: String,
        /// Seconds the upstream asked us to wait, when provided.
        retry_after_secs: u64,
    },

    /// Credentials were rejected by the upstream API.
    #[error("{source_name} rejected credentials: {msg}")]
    Auth {
        /// Source name that rejected the call.
        source_name: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Table construction, join, or columnar I/O failed.
    #[error("table error: {0}")]
    Table(String),

    /// Local filesystem failure while persisting or reading tables.
    #[error("io error: {0}")]
    Io(String),
}

impl TallyError {
    /// Helper: build a `Transport` error tagged with the source name.
    pub fn transport(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transport {
            source_name: source_name.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Status` error tagged with the source name.
    pub fn status(source_name: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Status {
            source_name: source_name.into(),
            status,
            msg: msg.into(),
        }
    }

    /// Helper: build an `Auth` error tagged with the source name.
    pub fn auth(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Auth {
            source_name: source_name.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `RateLimited` error tagged with the source name.
    pub fn rate_limited(source_name: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimited {
            source_name: source_name.into(),
            retry_after_secs,
        }
    }

    /// Helper: build a `DescriptorMismatch` error.
    pub fn descriptor_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DescriptorMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Transport failures, throttling and 5xx statuses are transient. Validation,
    /// descriptor, shape, and credential errors are not: repeating the call
    /// would fail the same way.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true for errors raised before any network call was made.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArg(_) | Self::DescriptorMismatch { .. })
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Data(e.to_string())
    }
}

impl From<std::io::Error> for TallyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
