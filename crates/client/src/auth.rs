//! FortiCloud IAM token acquisition

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{error_detail, ClientConfig, Error, Result};

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct PasswordGrant<'a> {
    username: &'a str,
    password: &'a str,
    client_id: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Bearer token with its local expiry
#[derive(Clone)]
pub(crate) struct Token {
    pub value: String,
    expires_at: Option<Instant>,
}

impl Token {
    /// A token supplied by configuration; never refreshed
    pub fn fixed(value: String) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

/// Exchange the configured credentials for an access token
pub(crate) async fn request_token(http: &reqwest::Client, config: &ClientConfig) -> Result<Token> {
    let (username, password) = match (&config.username, &config.password) {
        (Some(u), Some(p)) => (u.as_str(), p.as_str()),
        _ => {
            return Err(Error::Auth(
                "username and password are required to request a token".to_string(),
            ))
        }
    };

    debug!("Requesting access token from {}", config.auth_url);

    let response = http
        .post(&config.auth_url)
        .json(&PasswordGrant {
            username,
            password,
            client_id: &config.client_id,
            grant_type: "password",
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| error_detail(&v))
            .unwrap_or_else(|| status.to_string());
        return Err(Error::Auth(detail));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;

    info!("Obtained access token for {}", username);

    Ok(Token {
        value: token.access_token,
        expires_at: token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_token_is_always_fresh() {
        assert!(Token::fixed("abc".to_string()).is_fresh());
    }

    #[test]
    fn test_token_inside_margin_is_stale() {
        let token = Token {
            value: "abc".to_string(),
            expires_at: Some(Instant::now() + Duration::from_secs(30)),
        };
        assert!(!token.is_fresh());

        let token = Token {
            value: "abc".to_string(),
            expires_at: Some(Instant::now() + Duration::from_secs(3600)),
        };
        assert!(token.is_fresh());
    }

    #[test]
    fn test_token_response_parsing() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "xyz", "expires_in": 3600, "token_type": "Bearer"}"#)
                .unwrap();
        assert_eq!(token.access_token, "xyz");
        assert_eq!(token.expires_in, Some(3600));
    }
}
