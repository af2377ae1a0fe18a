//! fortisase_auth_vpn_saml_server
//!
//! A singleton whose changes are applied asynchronously: the object carries
//! `$meta.state`, which reads `done` once a change has been rolled out and
//! disappears once the configuration has been removed.

use async_trait::async_trait;
use fortisase_client::{Endpoint, InputModel, JsonObject, RestApi};
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{fetch, fetch_existing, lock_for, Model, ObjectModel, Resource, ResourceContext};
use crate::error::{Error, Result};
use crate::poll::{poll_until, Probe};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{attr, parse_bool_value, parse_string_value, RequestBody, Value};

/// State id of the singleton
pub const SINGLETON_ID: &str = "VpnSamlServer";

const STATE_DONE: &str = "done";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpnSamlServer {
    pub id: Value<String>,
    pub enabled: Value<bool>,
    pub idp_entity_id: Value<String>,
    pub idp_single_sign_on_url: Value<String>,
    pub idp_single_logout_url: Value<String>,
    pub idp_certificate: Value<String>,
    pub username: Value<String>,
    pub group_name: Value<String>,
    pub entity_id: Value<String>,
    pub single_sign_on_url: Value<String>,
    pub single_logout_url: Value<String>,
}

impl Model for VpnSamlServer {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            enabled: attr(v, "enabled")?,
            idp_entity_id: attr(v, "idp_entity_id")?,
            idp_single_sign_on_url: attr(v, "idp_single_sign_on_url")?,
            idp_single_logout_url: attr(v, "idp_single_logout_url")?,
            idp_certificate: attr(v, "idp_certificate")?,
            username: attr(v, "username")?,
            group_name: attr(v, "group_name")?,
            entity_id: attr(v, "entity_id")?,
            single_sign_on_url: attr(v, "single_sign_on_url")?,
            single_logout_url: attr(v, "single_logout_url")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("enabled", self.enabled.to_dynamic()),
            ("idp_entity_id", self.idp_entity_id.to_dynamic()),
            ("idp_single_sign_on_url", self.idp_single_sign_on_url.to_dynamic()),
            ("idp_single_logout_url", self.idp_single_logout_url.to_dynamic()),
            ("idp_certificate", self.idp_certificate.to_dynamic()),
            ("username", self.username.to_dynamic()),
            ("group_name", self.group_name.to_dynamic()),
            ("entity_id", self.entity_id.to_dynamic()),
            ("single_sign_on_url", self.single_sign_on_url.to_dynamic()),
            ("single_logout_url", self.single_logout_url.to_dynamic()),
        ])
    }
}

fn status(enabled: &Value<bool>) -> Value<String> {
    enabled
        .clone()
        .map(|on| if on { "enable" } else { "disable" }.to_string())
}

impl ObjectModel for VpnSamlServer {
    const TYPE_NAME: &'static str = "fortisase_auth_vpn_saml_server";
    const ENDPOINT: Endpoint = Endpoint::AUTH_VPN_SAML_SERVER;
    const LOCKED: bool = true;
    const LOOKUP_KEY: Option<&'static str> = None;

    fn schema() -> Schema {
        Schema::new(
            Block::new("SAML identity provider used to authenticate VPN users.")
                .attribute(Attribute::id())
                .attribute(Attribute::bool("enabled").optional_computed())
                .attribute(
                    Attribute::string("idp_entity_id")
                        .required()
                        .length_between(1, 255),
                )
                .attribute(
                    Attribute::string("idp_single_sign_on_url")
                        .required()
                        .length_between(1, 255),
                )
                .attribute(
                    Attribute::string("idp_single_logout_url")
                        .optional_computed()
                        .length_between(0, 255),
                )
                .attribute(
                    Attribute::string("idp_certificate")
                        .required()
                        .describe("Name of the IdP certificate."),
                )
                .attribute(
                    Attribute::string("username")
                        .optional_computed()
                        .describe("SAML attribute carrying the user name."),
                )
                .attribute(
                    Attribute::string("group_name")
                        .optional_computed()
                        .describe("SAML attribute carrying the group name."),
                )
                .attribute(Attribute::string("entity_id").computed().stable())
                .attribute(Attribute::string("single_sign_on_url").computed().stable())
                .attribute(Attribute::string("single_logout_url").computed().stable()),
        )
    }

    fn mkey(&self) -> Option<String> {
        Some(SINGLETON_ID.to_string())
    }

    fn set_id(&mut self, id: &str) {
        self.id = Value::from(id);
    }

    fn flatten(obj: &JsonObject) -> Self {
        Self {
            id: Value::Null,
            enabled: parse_bool_value(obj.get("status")),
            idp_entity_id: parse_string_value(obj.get("idpEntityId")),
            idp_single_sign_on_url: parse_string_value(obj.get("idpSingleSignOnUrl")),
            idp_single_logout_url: parse_string_value(obj.get("idpSingleLogoutUrl")),
            idp_certificate: parse_string_value(obj.get("idpCertificate")),
            username: parse_string_value(obj.get("username")),
            group_name: parse_string_value(obj.get("groupName")),
            entity_id: parse_string_value(obj.get("entityId")),
            single_sign_on_url: parse_string_value(obj.get("singleSignOnUrl")),
            single_logout_url: parse_string_value(obj.get("singleLogoutUrl")),
        }
    }

    fn expand(&self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put("status", &status(&self.enabled))
            .put("idpEntityId", &self.idp_entity_id)
            .put("idpSingleSignOnUrl", &self.idp_single_sign_on_url)
            .put("idpSingleLogoutUrl", &self.idp_single_logout_url)
            .put("idpCertificate", &self.idp_certificate)
            .put("username", &self.username)
            .put("groupName", &self.group_name);
        body.into_inner()
    }

    fn expand_update(&self, prior: &Self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put_changed("status", &status(&prior.enabled), &status(&self.enabled))
            .put_changed("idpEntityId", &prior.idp_entity_id, &self.idp_entity_id)
            .put_changed(
                "idpSingleSignOnUrl",
                &prior.idp_single_sign_on_url,
                &self.idp_single_sign_on_url,
            )
            .put_changed(
                "idpSingleLogoutUrl",
                &prior.idp_single_logout_url,
                &self.idp_single_logout_url,
            )
            .put_changed("idpCertificate", &prior.idp_certificate, &self.idp_certificate)
            .put_changed("username", &prior.username, &self.username)
            .put_changed("groupName", &prior.group_name, &self.group_name);
        body.into_inner()
    }
}

/// `$meta.state` of a raw API object
fn meta_state(obj: &JsonObject) -> Option<&str> {
    obj.get("$meta")
        .and_then(|meta| meta.get("state"))
        .and_then(Json::as_str)
}

fn describe(obj: &JsonObject) -> String {
    match meta_state(obj) {
        Some(state) => format!("$meta.state = {}", state),
        None => "no $meta.state".to_string(),
    }
}

/// Wait until the last change is rolled out
async fn wait_done(ctx: &ResourceContext) -> Result<()> {
    let client: &dyn RestApi = ctx.client.as_ref();
    poll_until(&ctx.poll, &ctx.cancel, "VPN SAML server change not finished", move || async move {
        let obj = client
            .read(&VpnSamlServer::ENDPOINT, &InputModel::new())
            .await?;
        Ok::<_, fortisase_client::Error>(if meta_state(&obj) == Some(STATE_DONE) {
            Probe::Done(())
        } else {
            Probe::Pending(describe(&obj))
        })
    })
    .await?;
    Ok(())
}

/// Wait until the configuration is gone
async fn wait_removed(ctx: &ResourceContext) -> Result<()> {
    let client: &dyn RestApi = ctx.client.as_ref();
    poll_until(&ctx.poll, &ctx.cancel, "VPN SAML server still exists", move || async move {
        match client
            .read(&VpnSamlServer::ENDPOINT, &InputModel::new())
            .await
        {
            Ok(obj) if meta_state(&obj).is_some() => Ok(Probe::Pending(describe(&obj))),
            Ok(_) => Ok(Probe::Done(())),
            Err(e) if e.is_not_found() => Ok(Probe::Done(())),
            Err(e) => Err(e),
        }
    })
    .await?;
    Ok(())
}

/// Resource handler: object lifecycle plus completion polling
pub struct VpnSamlServerResource;

#[async_trait]
impl Resource for VpnSamlServerResource {
    fn type_name(&self) -> &'static str {
        VpnSamlServer::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        VpnSamlServer::schema()
    }

    async fn create(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        let plan = VpnSamlServer::from_state(planned)?;
        let client = ctx.client.as_ref();
        let _guard = lock_for::<VpnSamlServer>(client).await;

        info!("Configuring VPN SAML server");
        let input = InputModel::new().with_body(plan.expand());
        client.create(&VpnSamlServer::ENDPOINT, &input).await?;
        wait_done(ctx).await?;

        Ok(fetch_existing::<VpnSamlServer>(client, SINGLETON_ID)
            .await?
            .to_state())
    }

    async fn read(&self, ctx: &ResourceContext, _state: &DynamicValue) -> Result<Option<DynamicValue>> {
        Ok(fetch::<VpnSamlServer>(ctx.client.as_ref(), SINGLETON_ID)
            .await?
            .map(|m| m.to_state()))
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let before = VpnSamlServer::from_state(prior)?;
        let plan = VpnSamlServer::from_state(planned)?;
        let client = ctx.client.as_ref();
        let _guard = lock_for::<VpnSamlServer>(client).await;

        let body = plan.expand_update(&before);
        if body.is_empty() {
            debug!("VPN SAML server: nothing to send");
        } else {
            info!("Updating VPN SAML server ({} field(s))", body.len());
            let input = InputModel::new().with_body(body);
            client.update(&VpnSamlServer::ENDPOINT, &input).await?;
            wait_done(ctx).await?;
        }

        Ok(fetch_existing::<VpnSamlServer>(client, SINGLETON_ID)
            .await?
            .to_state())
    }

    async fn delete(&self, ctx: &ResourceContext, _prior: &DynamicValue) -> Result<()> {
        let client = ctx.client.as_ref();
        let _guard = lock_for::<VpnSamlServer>(client).await;

        info!("Removing VPN SAML server configuration");
        match client
            .delete(&VpnSamlServer::ENDPOINT, &InputModel::new())
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        wait_removed(ctx).await
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<DynamicValue> {
        if id != SINGLETON_ID {
            return Err(Error::InvalidConfig(format!(
                "the VPN SAML server is imported with the id {}",
                SINGLETON_ID
            )));
        }
        match fetch::<VpnSamlServer>(ctx.client.as_ref(), SINGLETON_ID).await? {
            Some(model) => Ok(model.to_state()),
            None => Err(Error::InvalidConfig(
                "no VPN SAML server is configured".to_string(),
            )),
        }
    }
}
