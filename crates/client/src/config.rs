//! Client configuration

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Default FortiSASE portal host
pub const DEFAULT_HOSTNAME: &str = "portal.prod.fortisase.com";

/// Default FortiCloud IAM token endpoint
pub const DEFAULT_AUTH_URL: &str = "https://customerapiauth.fortinet.com/api/v1/oauth/token/";

/// Client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Portal host name, without scheme
    pub hostname: String,

    /// FortiCloud IAM API user
    pub username: Option<String>,

    /// FortiCloud IAM API password
    pub password: Option<String>,

    /// Pre-issued access token; skips the password grant when set
    pub access_token: Option<String>,

    /// OAuth token endpoint
    pub auth_url: String,

    /// OAuth client id
    pub client_id: String,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            username: None,
            password: None,
            access_token: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            client_id: "FortiSASE".to_string(),
            insecure: false,
            timeout_secs: 60,
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("insecure", &self.insecure)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Defaults overlaid with the `FORTISASE_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values looked up through `lookup`; empty values are ignored
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(hostname) = get("FORTISASE_HOSTNAME") {
            self.hostname = hostname;
        }
        if let Some(username) = get("FORTISASE_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = get("FORTISASE_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(token) = get("FORTISASE_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(insecure) = get("FORTISASE_INSECURE") {
            self.insecure = matches!(insecure.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Check that enough is configured to authenticate
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::InvalidConfig("hostname must not be empty".to_string()));
        }
        if self.access_token.is_some() {
            return Ok(());
        }
        match (&self.username, &self.password) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(Error::InvalidConfig(
                "either access_token or both username and password are required".to_string(),
            )),
        }
    }

    /// Base URL every endpoint path is appended to
    pub fn base_url(&self) -> String {
        let host = self.hostname.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}
