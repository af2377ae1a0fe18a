//! Error types for the provider

use thiserror::Error;

use crate::poll::PollError;

/// Result type alias using the provider Error
pub type Result<T> = std::result::Result<T, Error>;

/// Provider error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Client(#[from] fortisase_client::Error),

    #[error("State error: {0}")]
    State(String),

    #[error("{0}")]
    Poll(#[from] PollError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider is not configured")]
    NotConfigured,

    #[error("Unknown resource type: {0}")]
    UnknownType(String),
}

impl Error {
    pub fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    /// Text placed in the diagnostic detail: the error plus whatever
    /// structured detail the API attached to it
    pub fn detail(&self) -> String {
        match self {
            Error::Client(e) => match e.detail() {
                Some(detail) => format!("{}\n\n{}", e, detail),
                None => e.to_string(),
            },
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::State(format!("invalid JSON value: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_includes_api_detail() {
        let err = Error::Client(fortisase_client::Error::Api {
            status: 400,
            message: "Bad Request".to_string(),
            detail: Some("email: invalid format".to_string()),
        });
        let detail = err.detail();
        assert!(detail.contains("API error (400): Bad Request"));
        assert!(detail.ends_with("email: invalid format"));
    }

    #[test]
    fn test_detail_plain() {
        assert_eq!(
            Error::InvalidConfig("primary_key is required".to_string()).detail(),
            "Invalid configuration: primary_key is required"
        );
    }
}
