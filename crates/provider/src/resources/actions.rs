//! One-shot operations modelled as resources
//!
//! Applying the resource performs the operation. There is no remote object
//! behind it, so the id is constant, reads return the stored state and
//! destroying it only removes it from state.

use std::collections::BTreeSet;

use async_trait::async_trait;
use fortisase_client::{Endpoint, InputModel, JsonObject};
use serde_json::Value as Json;
use tracing::{debug, info};

use super::{Model, Resource, ResourceContext};
use crate::diff::IsZero;
use crate::error::{Error, Result};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{attr, block_list, expand_set_to_string_list, RequestBody, Value};

/// Source object and copy targets of a clone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloneRequest {
    pub id: Value<String>,
    pub primary_key: Value<String>,
    pub target_primary_keys: Value<BTreeSet<String>>,
}

impl Model for CloneRequest {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            primary_key: attr(v, "primary_key")?,
            target_primary_keys: attr(v, "target_primary_keys")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("primary_key", self.primary_key.to_dynamic()),
            ("target_primary_keys", self.target_primary_keys.to_dynamic()),
        ])
    }
}

/// Copy one object's settings onto others
pub struct CloneAction {
    type_name: &'static str,
    endpoint: Endpoint,
    id: &'static str,
    description: &'static str,
}

impl CloneAction {
    pub fn endpoint_profile() -> Self {
        Self {
            type_name: "fortisase_endpoint_profile_clone",
            endpoint: Endpoint::ENDPOINT_PROFILE_CLONE,
            id: "EndpointProfileClone",
            description: "Copy the settings of an endpoint profile onto other profiles.",
        }
    }

    pub fn endpoint_to_endpoint_policies() -> Self {
        Self {
            type_name: "fortisase_security_endpoint_to_endpoint_policies_clone",
            endpoint: Endpoint::SECURITY_ENDPOINT_TO_ENDPOINT_POLICIES_CLONE,
            id: "SecurityEndpointToEndpointPoliciesClone",
            description: "Copy an endpoint-to-endpoint policy onto other policies.",
        }
    }

    async fn run(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        let mut request = CloneRequest::from_state(planned)?;
        let source = request.primary_key.as_str().ok_or_else(|| {
            Error::InvalidConfig(format!("{}: primary_key must be known", self.type_name))
        })?;

        let mut body = RequestBody::new();
        body.put_json(
            "primaryKeys",
            expand_set_to_string_list(&request.target_primary_keys),
        );
        let input = InputModel::new()
            .with_url_param("primaryKey", source)
            .with_body(body.into_inner());

        info!("{}: cloning {}", self.type_name, source);
        ctx.client.action(&self.endpoint, &input).await?;

        request.id = Value::from(self.id);
        Ok(request.to_state())
    }
}

#[async_trait]
impl Resource for CloneAction {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new(self.description)
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("primary_key")
                        .required()
                        .describe("Object to copy from."),
                )
                .attribute(
                    Attribute::string_set("target_primary_keys")
                        .required()
                        .length_between(1, 79)
                        .describe("Objects to copy onto."),
                ),
        )
    }

    async fn create(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        self.run(ctx, planned).await
    }

    async fn read(&self, _ctx: &ResourceContext, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        Ok(Some(state.clone()))
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        _prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        self.run(ctx, planned).await
    }

    async fn delete(&self, _ctx: &ResourceContext, _prior: &DynamicValue) -> Result<()> {
        debug!("{}: nothing to delete", self.type_name);
        Ok(())
    }

    async fn import(&self, _ctx: &ResourceContext, _id: &str) -> Result<DynamicValue> {
        Err(Error::InvalidConfig(format!(
            "{} performs an operation and cannot be imported",
            self.type_name
        )))
    }
}

/// One VPN session to terminate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpnSession {
    pub user_name: Value<String>,
    pub ip: Value<String>,
    pub vpn_type: Value<String>,
}

impl IsZero for VpnSession {
    fn is_zero(&self) -> bool {
        self.user_name.is_zero() && self.ip.is_zero() && self.vpn_type.is_zero()
    }
}

impl VpnSession {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            user_name: attr(v, "user_name")?,
            ip: attr(v, "ip")?,
            vpn_type: attr(v, "vpn_type")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("user_name", self.user_name.to_dynamic()),
            ("ip", self.ip.to_dynamic()),
            ("vpn_type", self.vpn_type.to_dynamic()),
        ])
    }

    fn expand(&self) -> Json {
        let mut body = RequestBody::new();
        body.put("userName", &self.user_name)
            .put("ip", &self.ip)
            .put("vpnType", &self.vpn_type);
        Json::Object(body.into_inner())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeauthRequest {
    pub id: Value<String>,
    pub sessions: Vec<VpnSession>,
}

impl Model for DeauthRequest {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            sessions: block_list(v, "sessions", VpnSession::from_state)?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            (
                "sessions",
                DynamicValue::List(self.sessions.iter().map(VpnSession::to_state).collect()),
            ),
        ])
    }
}

impl DeauthRequest {
    fn expand(&self) -> JsonObject {
        let sessions = self
            .sessions
            .iter()
            .filter(|s| !s.is_zero())
            .map(VpnSession::expand)
            .collect();
        let mut body = JsonObject::new();
        body.insert("sessions".to_string(), Json::Array(sessions));
        body
    }
}

/// Disconnect VPN users
pub struct VpnSessionsDeauth;

const DEAUTH_TYPE_NAME: &str = "fortisase_user_vpn_sessions_deauth";
const DEAUTH_ID: &str = "UserVpnSessionsDeauth";

impl VpnSessionsDeauth {
    async fn run(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        let mut request = DeauthRequest::from_state(planned)?;
        let input = InputModel::new().with_body(request.expand());

        info!("Deauthenticating {} VPN session(s)", request.sessions.len());
        ctx.client
            .action(&Endpoint::USER_VPN_SESSIONS_DEAUTH, &input)
            .await?;

        request.id = Value::from(DEAUTH_ID);
        Ok(request.to_state())
    }
}

#[async_trait]
impl Resource for VpnSessionsDeauth {
    fn type_name(&self) -> &'static str {
        DEAUTH_TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new("Terminate VPN user sessions.")
                .attribute(Attribute::id())
                .block(
                    NestedBlock::list(
                        "sessions",
                        Block::new("Session to terminate.")
                            .attribute(Attribute::string("user_name").required())
                            .attribute(Attribute::string("ip").required())
                            .attribute(
                                Attribute::string("vpn_type")
                                    .optional()
                                    .one_of(&["ssl", "ipsec"]),
                            ),
                    )
                    .min_items(1),
                ),
        )
    }

    async fn create(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        self.run(ctx, planned).await
    }

    async fn read(&self, _ctx: &ResourceContext, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        Ok(Some(state.clone()))
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        _prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        self.run(ctx, planned).await
    }

    async fn delete(&self, _ctx: &ResourceContext, _prior: &DynamicValue) -> Result<()> {
        Ok(())
    }

    async fn import(&self, _ctx: &ResourceContext, _id: &str) -> Result<DynamicValue> {
        Err(Error::InvalidConfig(format!(
            "{} performs an operation and cannot be imported",
            DEAUTH_TYPE_NAME
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::string_value;
    use serde_json::json;

    #[test]
    fn test_deauth_body() {
        let request = DeauthRequest::from_state(&make_state(vec![(
            "sessions",
            DynamicValue::List(vec![
                make_state(vec![
                    ("user_name", string_value("alice")),
                    ("ip", string_value("10.212.134.200")),
                    ("vpn_type", DynamicValue::Null),
                ]),
                make_state(vec![]),
            ]),
        )]))
        .unwrap();
        assert_eq!(
            Json::Object(request.expand()),
            json!({"sessions": [{"userName": "alice", "ip": "10.212.134.200"}]})
        );
    }

    #[test]
    fn test_clone_schema_names() {
        let profile = CloneAction::endpoint_profile();
        assert_eq!(profile.type_name(), "fortisase_endpoint_profile_clone");
        let block = profile.schema().block;
        assert!(block.get_attribute("target_primary_keys").unwrap().required);
        assert_eq!(
            CloneAction::endpoint_to_endpoint_policies().endpoint,
            Endpoint::SECURITY_ENDPOINT_TO_ENDPOINT_POLICIES_CLONE
        );
    }
}
