//! FortiSASE Terraform Provider Implementation
//!
//! Implements the Terraform Plugin Protocol v6 Provider service. Every
//! handler failure is reported to Terraform as a diagnostic; the gRPC status
//! is reserved for transport problems.

use std::collections::HashMap;
use std::sync::Arc;

use fortisase_client::{ClientConfig, FortiClient, RestApi};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use crate::data_sources::{self, DataSource};
use crate::diagnostics::{AttrPath, Diagnostics};
use crate::error::{Error, Result};
use crate::poll::PollPolicy;
use crate::resources::{self, Resource, ResourceContext};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{decode_json, decode_optional, encode_dynamic_value, DynamicValue};
use crate::tfplugin6 as tf;
use crate::tfplugin6::provider_server::Provider;
use crate::value::{attr, Value};

/// Schema of the `provider "fortisase"` block
pub fn provider_schema() -> Schema {
    Schema::new(
        Block::new("Manage FortiSASE through its resource API.")
            .attribute(
                Attribute::string("hostname")
                    .optional()
                    .describe("Portal host name. Falls back to FORTISASE_HOSTNAME."),
            )
            .attribute(
                Attribute::string("username")
                    .optional()
                    .describe("API user. Falls back to FORTISASE_USERNAME."),
            )
            .attribute(
                Attribute::string("password")
                    .optional()
                    .sensitive()
                    .describe("API user password. Falls back to FORTISASE_PASSWORD."),
            )
            .attribute(
                Attribute::string("access_token")
                    .optional()
                    .sensitive()
                    .describe("Pre-issued bearer token. Falls back to FORTISASE_ACCESS_TOKEN."),
            )
            .attribute(Attribute::string("auth_url").optional().describe("OAuth token endpoint."))
            .attribute(Attribute::string("client_id").optional().describe("OAuth client id."))
            .attribute(
                Attribute::bool("insecure")
                    .optional()
                    .describe("Skip TLS verification. Falls back to FORTISASE_INSECURE."),
            )
            .attribute(
                Attribute::number("timeout")
                    .optional()
                    .int_between(1, 3600)
                    .describe("HTTP timeout in seconds."),
            ),
    )
}

/// Overlay the provider block onto `base`
pub fn client_config(config: &DynamicValue, base: ClientConfig) -> Result<ClientConfig> {
    if config.contains_unknown() {
        return Err(Error::InvalidConfig(
            "the provider configuration depends on values that are not known until apply"
                .to_string(),
        ));
    }

    let mut out = base;
    if let Value::Known(hostname) = attr::<String>(config, "hostname")? {
        out.hostname = hostname;
    }
    if let Value::Known(username) = attr::<String>(config, "username")? {
        out.username = Some(username);
    }
    if let Value::Known(password) = attr::<String>(config, "password")? {
        out.password = Some(password);
    }
    if let Value::Known(token) = attr::<String>(config, "access_token")? {
        out.access_token = Some(token);
    }
    if let Value::Known(auth_url) = attr::<String>(config, "auth_url")? {
        out.auth_url = auth_url;
    }
    if let Value::Known(client_id) = attr::<String>(config, "client_id")? {
        out.client_id = client_id;
    }
    if let Value::Known(insecure) = attr::<bool>(config, "insecure")? {
        out.insecure = insecure;
    }
    if let Value::Known(timeout) = attr::<i64>(config, "timeout")? {
        out.timeout_secs = u64::try_from(timeout)
            .map_err(|_| Error::InvalidConfig(format!("timeout must be positive, got {}", timeout)))?;
    }
    Ok(out)
}

/// FortiSASE Terraform Provider
pub struct FortiSaseProvider {
    /// API client, installed by ConfigureProvider
    client: RwLock<Option<Arc<dyn RestApi>>>,
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    poll: PollPolicy,
    /// Cancelled by StopProvider
    cancel: CancellationToken,
}

impl Default for FortiSaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FortiSaseProvider {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            poll: PollPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// A provider already talking to `client`
    pub fn with_client(client: Arc<dyn RestApi>) -> Self {
        let provider = Self::new();
        Self {
            client: RwLock::new(Some(client)),
            ..provider
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    async fn context(&self) -> Result<ResourceContext> {
        let client = self.client.read().await.clone().ok_or(Error::NotConfigured)?;
        Ok(ResourceContext {
            client,
            poll: self.poll,
            cancel: self.cancel.clone(),
        })
    }

    fn resource(&self, type_name: &str) -> Result<Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    async fn configure(&self, config: &DynamicValue) -> Result<()> {
        let config = client_config(config, ClientConfig::from_env())?;
        info!("Connecting to {}", config.base_url());
        let client = FortiClient::connect(config).await?;
        *self.client.write().await = Some(Arc::new(client));
        Ok(())
    }

    async fn plan(
        &self,
        req: &tf::plan_resource_change::Request,
    ) -> Result<(DynamicValue, Vec<AttrPath>)> {
        let resource = self.resource(&req.type_name)?;
        let prior = decode_optional(req.prior_state.as_ref())?;
        let proposed = decode_optional(req.proposed_new_state.as_ref())?;
        let config = decode_optional(req.config.as_ref())?;

        if proposed.is_null() {
            debug!("{}: planning destroy", req.type_name);
            return Ok((DynamicValue::Null, Vec::new()));
        }

        let block = resource.schema().block;
        let mut planned = block.conform(proposed);
        if prior.is_null() || planned != prior {
            block.mark_computed_unknown(&mut planned, &config);
        }
        let replace = block.replace_paths(&prior, &planned);
        Ok((planned, replace))
    }

    async fn apply(
        &self,
        req: &tf::apply_resource_change::Request,
        prior: &DynamicValue,
    ) -> Result<DynamicValue> {
        let resource = self.resource(&req.type_name)?;
        let planned = decode_optional(req.planned_state.as_ref())?;
        let ctx = self.context().await?;

        if planned.is_null() {
            resource.delete(&ctx, prior).await?;
            return Ok(DynamicValue::Null);
        }

        let new_state = if prior.is_null() {
            resource.create(&ctx, &planned).await?
        } else {
            resource.update(&ctx, prior, &planned).await?
        };
        Ok(resource.schema().block.conform(new_state))
    }

    async fn read(&self, req: &tf::read_resource::Request) -> Result<DynamicValue> {
        let resource = self.resource(&req.type_name)?;
        let current = decode_optional(req.current_state.as_ref())?;
        if current.is_null() {
            return Ok(DynamicValue::Null);
        }
        let ctx = self.context().await?;
        match resource.read(&ctx, &current).await? {
            Some(state) => Ok(resource.schema().block.conform(state)),
            None => Ok(DynamicValue::Null),
        }
    }

    async fn import(&self, req: &tf::import_resource_state::Request) -> Result<DynamicValue> {
        let resource = self.resource(&req.type_name)?;
        let ctx = self.context().await?;
        let state = resource.import(&ctx, &req.id).await?;
        Ok(resource.schema().block.conform(state))
    }

    async fn read_data(&self, req: &tf::read_data_source::Request) -> Result<DynamicValue> {
        let data_source = self.data_source(&req.type_name)?;
        let config = decode_optional(req.config.as_ref())?;
        let ctx = self.context().await?;
        let state = data_source.read(&ctx, &config).await?;
        Ok(data_source.schema().block.conform(state))
    }

    fn upgrade(&self, req: &tf::upgrade_resource_state::Request) -> Result<DynamicValue> {
        let schema = self.resource(&req.type_name)?.schema();
        if req.version > schema.version {
            return Err(Error::state(format!(
                "state version {} is newer than this provider understands ({})",
                req.version, schema.version
            )));
        }
        let raw = req
            .raw_state
            .as_ref()
            .ok_or_else(|| Error::state("no raw state to upgrade"))?;
        if raw.json.is_empty() && !raw.flatmap.is_empty() {
            return Err(Error::state("flatmap state is not supported"));
        }
        Ok(schema.block.conform(decode_json(&raw.json)?))
    }
}

/// Encode a state value; null stays null on the wire too
fn encode(value: &DynamicValue) -> Result<Option<tf::DynamicValue>> {
    encode_dynamic_value(value).map(Some)
}

#[tonic::async_trait]
impl Provider for FortiSaseProvider {
    async fn get_provider_schema(
        &self,
        _request: Request<tf::get_provider_schema::Request>,
    ) -> std::result::Result<Response<tf::get_provider_schema::Response>, Status> {
        info!("GetProviderSchema called");

        let response = tf::get_provider_schema::Response {
            provider: Some(tf::Schema::from(&provider_schema())),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, r)| (name.to_string(), tf::Schema::from(&r.schema())))
                .collect(),
            data_source_schemas: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.to_string(), tf::Schema::from(&d.schema())))
                .collect(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(tf::ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
                move_resource_state: false,
            }),
        };

        Ok(Response::new(response))
    }

    async fn validate_provider_config(
        &self,
        request: Request<tf::validate_provider_config::Request>,
    ) -> std::result::Result<Response<tf::validate_provider_config::Response>, Status> {
        debug!("ValidateProviderConfig called");
        let req = request.into_inner();

        let mut diags = Diagnostics::new();
        match decode_optional(req.config.as_ref()) {
            Ok(config) => provider_schema()
                .block
                .validate(&config, &AttrPath::default(), &mut diags),
            Err(e) => diags.from_error("Invalid provider configuration", &e),
        }

        Ok(Response::new(tf::validate_provider_config::Response {
            diagnostics: diags.into(),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<tf::validate_resource_config::Request>,
    ) -> std::result::Result<Response<tf::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateResourceConfig called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let checked = self.resource(&req.type_name).and_then(|resource| {
            let config = decode_optional(req.config.as_ref())?;
            resource
                .schema()
                .block
                .validate(&config, &AttrPath::default(), &mut diags);
            Ok(())
        });
        if let Err(e) = checked {
            diags.from_error("Invalid resource configuration", &e);
        }

        Ok(Response::new(tf::validate_resource_config::Response {
            diagnostics: diags.into(),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<tf::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<tf::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!("ValidateDataResourceConfig called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let checked = self.data_source(&req.type_name).and_then(|data_source| {
            let config = decode_optional(req.config.as_ref())?;
            data_source
                .schema()
                .block
                .validate(&config, &AttrPath::default(), &mut diags);
            Ok(())
        });
        if let Err(e) = checked {
            diags.from_error("Invalid data source configuration", &e);
        }

        Ok(Response::new(tf::validate_data_resource_config::Response {
            diagnostics: diags.into(),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<tf::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<tf::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!("UpgradeResourceState called for {} (version {})", req.type_name, req.version);

        let mut diags = Diagnostics::new();
        let upgraded_state = match self.upgrade(&req).and_then(|v| encode(&v)) {
            Ok(state) => state,
            Err(e) => {
                diags.from_error("Failed to upgrade resource state", &e);
                None
            }
        };

        Ok(Response::new(tf::upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: diags.into(),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<tf::configure_provider::Request>,
    ) -> std::result::Result<Response<tf::configure_provider::Response>, Status> {
        let req = request.into_inner();
        info!("ConfigureProvider called (Terraform {})", req.terraform_version);

        let mut diags = Diagnostics::new();
        let configured = match decode_optional(req.config.as_ref()) {
            Ok(config) => self.configure(&config).await,
            Err(e) => Err(e),
        };
        if let Err(e) = configured {
            error!("Failed to configure provider: {}", e);
            diags.from_error("Failed to configure the FortiSASE client", &e);
        }

        Ok(Response::new(tf::configure_provider::Response {
            diagnostics: diags.into(),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<tf::read_resource::Request>,
    ) -> std::result::Result<Response<tf::read_resource::Response>, Status> {
        let req = request.into_inner();
        info!("ReadResource called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let new_state = match self.read(&req).await.and_then(|v| encode(&v)) {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to read {}: {}", req.type_name, e);
                diags.from_error("Failed to read resource", &e);
                req.current_state.clone()
            }
        };

        Ok(Response::new(tf::read_resource::Response {
            new_state,
            diagnostics: diags.into(),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<tf::plan_resource_change::Request>,
    ) -> std::result::Result<Response<tf::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!("PlanResourceChange called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let (planned_state, requires_replace) =
            match self.plan(&req).await.and_then(|(v, paths)| Ok((encode(&v)?, paths))) {
                Ok((state, paths)) => (state, paths.iter().map(Into::into).collect()),
                Err(e) => {
                    diags.from_error("Failed to plan resource change", &e);
                    (req.proposed_new_state.clone(), vec![])
                }
            };

        Ok(Response::new(tf::plan_resource_change::Response {
            planned_state,
            requires_replace,
            planned_private: req.prior_private,
            diagnostics: diags.into(),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<tf::apply_resource_change::Request>,
    ) -> std::result::Result<Response<tf::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        info!("ApplyResourceChange called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let new_state = match decode_optional(req.prior_state.as_ref()) {
            Ok(prior) => match self.apply(&req, &prior).await.and_then(|v| encode(&v)) {
                Ok(state) => state,
                Err(e) => {
                    error!("Failed to apply {}: {}", req.type_name, e);
                    diags.from_error("Failed to apply resource change", &e);
                    // Whatever existed before is still there.
                    if prior.is_null() {
                        None
                    } else {
                        req.prior_state.clone()
                    }
                }
            },
            Err(e) => {
                diags.from_error("Failed to apply resource change", &e);
                req.prior_state.clone()
            }
        };

        Ok(Response::new(tf::apply_resource_change::Response {
            new_state,
            private: req.planned_private,
            diagnostics: diags.into(),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<tf::import_resource_state::Request>,
    ) -> std::result::Result<Response<tf::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!("ImportResourceState called for {} with ID {}", req.type_name, req.id);

        let mut diags = Diagnostics::new();
        let imported_resources = match self.import(&req).await.and_then(|v| encode(&v)) {
            Ok(state) => vec![tf::import_resource_state::ImportedResource {
                type_name: req.type_name.clone(),
                state,
                private: vec![],
            }],
            Err(e) => {
                diags.from_error("Failed to import resource", &e);
                vec![]
            }
        };

        Ok(Response::new(tf::import_resource_state::Response {
            imported_resources,
            diagnostics: diags.into(),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<tf::read_data_source::Request>,
    ) -> std::result::Result<Response<tf::read_data_source::Response>, Status> {
        let req = request.into_inner();
        info!("ReadDataSource called for {}", req.type_name);

        let mut diags = Diagnostics::new();
        let state = match self.read_data(&req).await.and_then(|v| encode(&v)) {
            Ok(state) => state,
            Err(e) => {
                diags.from_error("Failed to read data source", &e);
                None
            }
        };

        Ok(Response::new(tf::read_data_source::Response {
            state,
            diagnostics: diags.into(),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<tf::stop_provider::Request>,
    ) -> std::result::Result<Response<tf::stop_provider::Response>, Status> {
        warn!("StopProvider called, cancelling in-flight operations");
        self.cancel.cancel();
        Ok(Response::new(tf::stop_provider::Response {
            error: String::new(),
        }))
    }
}
