//! fortisase_auth_fsso_agents

use fortisase_client::{Endpoint, JsonObject};
use serde_json::Value as Json;

use super::{key_of, Model, ObjectModel};
use crate::diff::{is_same_struct, is_zero_struct, IsZero};
use crate::error::Result;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{
    attr, block, expand_reference, parse_int_value, parse_reference_value, parse_string_value,
    RequestBody, Value,
};

const LDAP_SERVERS: &str = "auth/ldap-servers";
const CA_CERTIFICATES: &str = "certificate/ca-certificates";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FssoAgent {
    pub id: Value<String>,
    pub primary_key: Value<String>,
    pub server: Value<String>,
    pub password: Value<String>,
    pub server2: Value<String>,
    pub password2: Value<String>,
    pub ssl_trusted_cert: Value<String>,
    pub active_server: Value<String>,
    pub ldap_group_polling: Option<LdapGroupPolling>,
}

/// Group membership polling against an LDAP server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LdapGroupPolling {
    pub server: Value<String>,
    pub interval: Value<i64>,
}

impl IsZero for LdapGroupPolling {
    fn is_zero(&self) -> bool {
        self.server.is_zero() && self.interval.is_zero()
    }
}

impl LdapGroupPolling {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            server: attr(v, "server")?,
            interval: attr(v, "interval")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("server", self.server.to_dynamic()),
            ("interval", self.interval.to_dynamic()),
        ])
    }

    fn flatten(obj: &JsonObject) -> Self {
        Self {
            server: parse_reference_value(obj.get("server")),
            interval: parse_int_value(obj.get("interval")),
        }
    }

    fn expand(&self) -> Json {
        let mut body = RequestBody::new();
        body.put_json("server", expand_reference(&self.server, LDAP_SERVERS))
            .put("interval", &self.interval);
        Json::Object(body.into_inner())
    }
}

impl Model for FssoAgent {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            primary_key: attr(v, "primary_key")?,
            server: attr(v, "server")?,
            password: attr(v, "password")?,
            server2: attr(v, "server2")?,
            password2: attr(v, "password2")?,
            ssl_trusted_cert: attr(v, "ssl_trusted_cert")?,
            active_server: attr(v, "active_server")?,
            ldap_group_polling: block(v, "ldap_group_polling", LdapGroupPolling::from_state)?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("primary_key", self.primary_key.to_dynamic()),
            ("server", self.server.to_dynamic()),
            ("password", self.password.to_dynamic()),
            ("server2", self.server2.to_dynamic()),
            ("password2", self.password2.to_dynamic()),
            ("ssl_trusted_cert", self.ssl_trusted_cert.to_dynamic()),
            ("active_server", self.active_server.to_dynamic()),
            (
                "ldap_group_polling",
                self.ldap_group_polling
                    .as_ref()
                    .map_or(DynamicValue::Null, LdapGroupPolling::to_state),
            ),
        ])
    }
}

impl ObjectModel for FssoAgent {
    const TYPE_NAME: &'static str = "fortisase_auth_fsso_agents";
    const ENDPOINT: Endpoint = Endpoint::AUTH_FSSO_AGENTS;
    const LOCKED: bool = true;

    fn schema() -> Schema {
        Schema::new(
            Block::new("Fortinet Single Sign-On collector agent.")
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("primary_key")
                        .required()
                        .force_new()
                        .length_between(1, 35),
                )
                .attribute(
                    Attribute::string("server")
                        .required()
                        .length_between(1, 63)
                        .describe("Address of the primary collector agent."),
                )
                .attribute(Attribute::string("password").optional().sensitive())
                .attribute(Attribute::string("server2").optional_computed().length_between(0, 63))
                .attribute(Attribute::string("password2").optional().sensitive())
                .attribute(Attribute::string("ssl_trusted_cert").optional_computed())
                .attribute(
                    Attribute::string("active_server")
                        .computed()
                        .describe("Collector agent currently in use."),
                )
                .block(
                    NestedBlock::single(
                        "ldap_group_polling",
                        Block::new("Poll an LDAP server for group membership.")
                            .attribute(Attribute::string("server").required())
                            .attribute(
                                Attribute::number("interval")
                                    .optional_computed()
                                    .int_between(1, 2880)
                                    .describe("Polling interval in minutes."),
                            ),
                    )
                    .max_items(1),
                ),
        )
    }

    fn mkey(&self) -> Option<String> {
        key_of(&self.primary_key, &self.id)
    }

    fn set_id(&mut self, id: &str) {
        self.id = Value::from(id);
    }

    fn flatten(obj: &JsonObject) -> Self {
        Self {
            id: Value::Null,
            primary_key: parse_string_value(obj.get("primaryKey")),
            server: parse_string_value(obj.get("server")),
            password: Value::Null,
            server2: parse_string_value(obj.get("server2")),
            password2: Value::Null,
            ssl_trusted_cert: parse_reference_value(obj.get("sslTrustedCert")),
            active_server: parse_string_value(obj.get("activeServer")),
            ldap_group_polling: obj
                .get("ldapGroupPolling")
                .and_then(Json::as_object)
                .map(LdapGroupPolling::flatten)
                .filter(|p| !is_zero_struct(p)),
        }
    }

    fn expand(&self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put("primaryKey", &self.primary_key)
            .put("server", &self.server)
            .put("password", &self.password)
            .put("server2", &self.server2)
            .put("password2", &self.password2)
            .put_json(
                "sslTrustedCert",
                expand_reference(&self.ssl_trusted_cert, CA_CERTIFICATES),
            );
        if !is_zero_struct(&self.ldap_group_polling) {
            body.put_json(
                "ldapGroupPolling",
                self.ldap_group_polling.as_ref().map(LdapGroupPolling::expand),
            );
        }
        body.into_inner()
    }

    fn expand_update(&self, prior: &Self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put_changed("server", &prior.server, &self.server)
            .put_changed("password", &prior.password, &self.password)
            .put_changed("server2", &prior.server2, &self.server2)
            .put_changed("password2", &prior.password2, &self.password2);
        if self.ssl_trusted_cert != prior.ssl_trusted_cert {
            body.put_json(
                "sslTrustedCert",
                expand_reference(&self.ssl_trusted_cert, CA_CERTIFICATES),
            );
        }
        if !is_same_struct(&self.ldap_group_polling, &prior.ldap_group_polling)
            && !is_zero_struct(&self.ldap_group_polling)
        {
            body.put_json(
                "ldapGroupPolling",
                self.ldap_group_polling.as_ref().map(LdapGroupPolling::expand),
            );
        }
        body.into_inner()
    }

    fn keep_write_only(&mut self, known: &Self) {
        if self.password.is_null() {
            self.password = known.password.clone();
        }
        if self.password2.is_null() {
            self.password2 = known.password2.clone();
        }
    }
}
