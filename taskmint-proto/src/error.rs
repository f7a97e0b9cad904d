//! Error body returned by both REST backends.
//!
//! The backends answer failures with `{"detail": ...}`. `detail` is
//! usually a string, but request validation failures carry a list of
//! objects with a `msg` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure payload of a non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason, or a structured validation report.
    pub detail: Value,
}

impl ErrorBody {
    /// Creates an error body with a plain string detail.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Value::String(detail.into()),
        }
    }

    /// Flattens `detail` into a single user-facing line.
    ///
    /// String details are returned verbatim. Validation lists are joined
    /// by `"; "` using each entry's `msg`. Anything else is rendered as
    /// compact JSON.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
