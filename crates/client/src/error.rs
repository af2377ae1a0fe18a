//! Error types for the FortiSASE client

use thiserror::Error;

/// Result type alias using the client Error
pub type Result<T> = std::result::Result<T, Error>;

/// FortiSASE client error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    #[error("Resource not found: {kind} with key {mkey}")]
    NotFound { kind: String, mkey: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// True when the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Structured detail reported by the API, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Extract a readable error detail from an API error body.
///
/// The resource API is not consistent about where it puts the reason, so
/// this looks at the known shapes in order: `error`, `message`, `detail`,
/// then every `errors[].message`.
pub fn error_detail(body: &serde_json::Value) -> Option<String> {
    let obj = body.as_object()?;

    for key in ["error", "message", "detail"] {
        match obj.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Object(inner)) => {
                if let Some(serde_json::Value::String(s)) = inner.get("message") {
                    return Some(s.clone());
                }
            }
            _ => {}
        }
    }

    let messages: Vec<String> = obj
        .get("errors")?
        .as_array()?
        .iter()
        .filter_map(|e| match e {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(o) => o
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| match o.get("field").and_then(|f| f.as_str()) {
                    Some(field) => format!("{}: {}", field, m),
                    None => m.to_string(),
                }),
            _ => None,
        })
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
