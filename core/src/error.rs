//! Error types for the medicine tracker API client.
//!
//! # Design
//! Every failure a caller can see collapses into `ApiError`, and every
//! variant can produce a human-readable line via `ApiError::message` for
//! direct display. Non-2xx responses keep their status so callers can still
//! tell "not signed in" from "bad input" when they need to.

use serde_json::Value;

use crate::http::HttpResponse;

/// Message shown when the server gives nothing more specific.
pub const GENERIC_FAILURE: &str = "Request failed";

/// Errors returned by `MedicineClient` parse methods and by transports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// A 2xx body was not JSON or lacked the expected envelope.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Build a `Rejected` error from a non-2xx response, deriving the
    /// message from its body.
    pub fn from_failure(response: &HttpResponse) -> Self {
        ApiError::Rejected {
            status: response.status,
            message: failure_message(&response.body),
        }
    }

    /// Text suitable for a user-facing notification.
    pub fn message(&self) -> String {
        match self {
            ApiError::Transport(msg) => msg.clone(),
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Malformed(_) | ApiError::Serialization(_) => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Derive a message from a failure body.
///
/// Order: a non-empty `error` field, then the first value in document
/// order (which may be the empty `error` entry itself), then
/// [`GENERIC_FAILURE`]. Bodies that are not JSON at all get the
/// generic message.
pub fn failure_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return GENERIC_FAILURE.to_string();
    };

    if let Some(message) = value.get("error").and_then(render_value) {
        return message;
    }

    let first = match &value {
        Value::Object(map) => map.values().next(),
        Value::Array(items) => items.first(),
        _ => None,
    };
    first
        .and_then(render_value)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// Render a JSON value as message text. Empty and null values yield `None`
/// so the caller falls through to the next candidate.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        other => Some(other.to_string()),
    }
}
