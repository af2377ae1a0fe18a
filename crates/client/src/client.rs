//! REST client for the FortiSASE resource API

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::{request_token, Token};
use crate::endpoint::{Endpoint, EndpointKind, ResolvedPath};
use crate::lock::{LockRegistry, ResourceGuard};
use crate::{error_detail, ClientConfig, Error, Result};

/// A JSON object as sent to or received from the API
pub type JsonObject = Map<String, Value>;

/// Generic request shape shared by every endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputModel {
    /// Primary key addressing one object
    pub mkey: Option<String>,
    /// Path template values; anything unused becomes a query parameter
    pub url_params: BTreeMap<String, String>,
    /// Request body
    pub body_params: JsonObject,
}

impl InputModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mkey(mut self, mkey: impl Into<String>) -> Self {
        self.mkey = Some(mkey.into());
        self
    }

    pub fn with_url_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: JsonObject) -> Self {
        self.body_params = body;
        self
    }
}

/// Operations the provider needs from the API.
///
/// Every call takes the endpoint descriptor and an [`InputModel`] and
/// returns the JSON object the API answered with.
#[async_trait]
pub trait RestApi: Send + Sync {
    async fn create(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject>;

    async fn read(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject>;

    async fn update(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject>;

    async fn delete(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject>;

    /// Invoke a one-shot action endpoint
    async fn action(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject>;

    /// Registry handing out per-resource-type locks
    fn locks(&self) -> &LockRegistry;

    /// Acquire the lock for a resource type
    async fn lock(&self, name: &str) -> ResourceGuard {
        self.locks().lock(name).await
    }
}

/// HTTP session against one FortiSASE portal
pub struct FortiClient {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: String,
    token: RwLock<Token>,
    locks: LockRegistry,
}

impl FortiClient {
    /// Build the HTTP session and authenticate
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!("terraform-provider-fortisase/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let token = match &config.access_token {
            Some(token) => Token::fixed(token.clone()),
            None => request_token(&http, &config).await?,
        };

        debug!("Client configured for {}", config.base_url());

        Ok(Self {
            base_url: config.base_url(),
            http,
            config,
            token: RwLock::new(token),
            locks: LockRegistry::new(),
        })
    }

    async fn bearer(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let mut token = self.token.write().await;
        if !token.is_fresh() {
            debug!("Access token close to expiry, refreshing");
            *token = request_token(&self.http, &self.config).await?;
        }
        Ok(token.value.clone())
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &Endpoint,
        mkey: Option<&str>,
        resolved: ResolvedPath,
        body: Option<&JsonObject>,
    ) -> Result<JsonObject> {
        let url = format!("{}{}", self.base_url, resolved.path);
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(self.bearer().await?)
            .query(&resolved.query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                kind: endpoint.name.to_string(),
                mkey: mkey.unwrap_or_default().to_string(),
            });
        }

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| error_detail(&v))
                .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()));
            warn!("{} returned {}: {:?}", endpoint.name, status, detail);
            return Err(Error::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
                detail,
            });
        }

        parse_object(endpoint, &text)
    }
}

fn parse_object(endpoint: &Endpoint, text: &str) -> Result<JsonObject> {
    if text.trim().is_empty() {
        return Ok(JsonObject::new());
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonObject::new()),
        other => Err(Error::InvalidResponse(format!(
            "{} returned {} instead of an object",
            endpoint.name,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl RestApi for FortiClient {
    async fn create(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        let mkey = input.mkey.as_deref();
        match endpoint.kind {
            EndpointKind::Collection => {
                let path = endpoint.create_path(&input.url_params)?;
                self.send(Method::POST, endpoint, mkey, path, Some(&input.body_params))
                    .await
            }
            // Singletons always exist; creating one means configuring it.
            EndpointKind::Singleton => self.update(endpoint, input).await,
            EndpointKind::Action => self.action(endpoint, input).await,
        }
    }

    async fn read(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        let mkey = input.mkey.as_deref();
        let path = endpoint.object_path(mkey, &input.url_params)?;
        self.send(Method::GET, endpoint, mkey, path, None).await
    }

    async fn update(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        let mkey = input.mkey.as_deref();
        let path = endpoint.object_path(mkey, &input.url_params)?;
        self.send(Method::PUT, endpoint, mkey, path, Some(&input.body_params))
            .await
    }

    async fn delete(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        let mkey = input.mkey.as_deref();
        let path = endpoint.object_path(mkey, &input.url_params)?;
        self.send(Method::DELETE, endpoint, mkey, path, None).await
    }

    async fn action(&self, endpoint: &Endpoint, input: &InputModel) -> Result<JsonObject> {
        let path = endpoint.create_path(&input.url_params)?;
        self.send(
            Method::POST,
            endpoint,
            input.mkey.as_deref(),
            path,
            Some(&input.body_params),
        )
        .await
    }

    fn locks(&self) -> &LockRegistry {
        &self.locks
    }
}
