//! fortisase_auth_users

use fortisase_client::{Endpoint, JsonObject};

use super::{key_of, Model, ObjectModel};
use crate::error::Result;
use crate::schema::{Attribute, Block, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{attr, expand_reference, parse_reference_value, parse_string_value, RequestBody, Value};

const LDAP_SERVERS: &str = "auth/ldap-servers";
const RADIUS_SERVERS: &str = "auth/radius-servers";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthUser {
    pub id: Value<String>,
    pub primary_key: Value<String>,
    pub auth_type: Value<String>,
    pub email: Value<String>,
    pub password: Value<String>,
    pub status: Value<String>,
    pub ldap_server: Value<String>,
    pub radius_server: Value<String>,
}

impl Model for AuthUser {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            primary_key: attr(v, "primary_key")?,
            auth_type: attr(v, "auth_type")?,
            email: attr(v, "email")?,
            password: attr(v, "password")?,
            status: attr(v, "status")?,
            ldap_server: attr(v, "ldap_server")?,
            radius_server: attr(v, "radius_server")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("primary_key", self.primary_key.to_dynamic()),
            ("auth_type", self.auth_type.to_dynamic()),
            ("email", self.email.to_dynamic()),
            ("password", self.password.to_dynamic()),
            ("status", self.status.to_dynamic()),
            ("ldap_server", self.ldap_server.to_dynamic()),
            ("radius_server", self.radius_server.to_dynamic()),
        ])
    }
}

impl ObjectModel for AuthUser {
    const TYPE_NAME: &'static str = "fortisase_auth_users";
    const ENDPOINT: Endpoint = Endpoint::AUTH_USERS;
    const LOCKED: bool = true;

    fn schema() -> Schema {
        Schema::new(
            Block::new("Local, LDAP or RADIUS user.")
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("primary_key")
                        .required()
                        .force_new()
                        .length_between(1, 35)
                        .describe("User name."),
                )
                .attribute(
                    Attribute::string("auth_type")
                        .optional_computed()
                        .one_of(&["password", "ldap", "radius"]),
                )
                .attribute(Attribute::string("email").optional_computed().length_between(0, 63))
                .attribute(
                    Attribute::string("password")
                        .optional()
                        .sensitive()
                        .length_between(1, 128),
                )
                .attribute(
                    Attribute::string("status")
                        .optional_computed()
                        .one_of(&["enable", "disable"]),
                )
                .attribute(
                    Attribute::string("ldap_server")
                        .optional_computed()
                        .describe("Primary key of the LDAP server authenticating this user."),
                )
                .attribute(
                    Attribute::string("radius_server")
                        .optional_computed()
                        .describe("Primary key of the RADIUS server authenticating this user."),
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
            auth_type: parse_string_value(obj.get("authType")),
            email: parse_string_value(obj.get("email")),
            password: Value::Null,
            status: parse_string_value(obj.get("status")),
            ldap_server: parse_reference_value(obj.get("ldapServer")),
            radius_server: parse_reference_value(obj.get("radiusServer")),
        }
    }

    fn expand(&self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put("primaryKey", &self.primary_key)
            .put("authType", &self.auth_type)
            .put("email", &self.email)
            .put("password", &self.password)
            .put("status", &self.status)
            .put_json("ldapServer", expand_reference(&self.ldap_server, LDAP_SERVERS))
            .put_json("radiusServer", expand_reference(&self.radius_server, RADIUS_SERVERS));
        body.into_inner()
    }

    fn expand_update(&self, prior: &Self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put_changed("authType", &prior.auth_type, &self.auth_type)
            .put_changed("email", &prior.email, &self.email)
            .put_changed("password", &prior.password, &self.password)
            .put_changed("status", &prior.status, &self.status);
        if self.ldap_server != prior.ldap_server {
            body.put_json("ldapServer", expand_reference(&self.ldap_server, LDAP_SERVERS));
        }
        if self.radius_server != prior.radius_server {
            body.put_json("radiusServer", expand_reference(&self.radius_server, RADIUS_SERVERS));
        }
        body.into_inner()
    }

    fn keep_write_only(&mut self, known: &Self) {
        if self.password.is_null() {
            self.password = known.password.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flatten() {
        let user = AuthUser::flatten(&object(json!({
            "primaryKey": "alice",
            "authType": "ldap",
            "email": "alice@example.com",
            "status": "enable",
            "ldapServer": {"primaryKey": "corp-ldap", "datasource": "auth/ldap-servers"},
            "radiusServer": null
        })));
        assert_eq!(user.primary_key, Value::from("alice"));
        assert_eq!(user.ldap_server, Value::from("corp-ldap"));
        assert!(user.radius_server.is_null());
        assert!(user.password.is_null());
    }

    #[test]
    fn test_expand_leaves_out_unset_fields() {
        let user = AuthUser {
            primary_key: Value::from("bob"),
            password: Value::from("s3cret"),
            status: Value::Unknown,
            ldap_server: Value::from("corp-ldap"),
            ..Default::default()
        };
        assert_eq!(
            serde_json::Value::Object(user.expand()),
            json!({
                "primaryKey": "bob",
                "password": "s3cret",
                "ldapServer": {"primaryKey": "corp-ldap", "datasource": "auth/ldap-servers"}
            })
        );
    }

    #[test]
    fn test_expand_update_only_changes() {
        let prior = AuthUser {
            primary_key: Value::from("bob"),
            email: Value::from("bob@example.com"),
            status: Value::from("enable"),
            ..Default::default()
        };
        let planned = AuthUser {
            status: Value::from("disable"),
            ..prior.clone()
        };
        assert_eq!(
            serde_json::Value::Object(planned.expand_update(&prior)),
            json!({"status": "disable"})
        );
        assert!(prior.expand_update(&prior).is_empty());
    }

    #[test]
    fn test_password_survives_read() {
        let mut read = AuthUser::flatten(&object(json!({"primaryKey": "bob"})));
        let prior = AuthUser {
            password: Value::from("s3cret"),
            ..Default::default()
        };
        read.keep_write_only(&prior);
        assert_eq!(read.password, Value::from("s3cret"));
    }

    #[test]
    fn test_state_round_trip() {
        let user = AuthUser {
            id: Value::from("bob"),
            primary_key: Value::from("bob"),
            email: Value::from("bob@example.com"),
            status: Value::Unknown,
            ..Default::default()
        };
        assert_eq!(AuthUser::from_state(&user.to_state()).unwrap(), user);
    }

    #[test]
    fn test_expand_reproduces_api_object() {
        let api = json!({
            "primaryKey": "alice",
            "authType": "radius",
            "email": "alice@example.com",
            "status": "disable",
            "ldapServer": {"primaryKey": "corp-ldap", "datasource": "auth/ldap-servers"},
            "radiusServer": {"primaryKey": "corp-radius", "datasource": "auth/radius-servers"}
        });
        let body = AuthUser::flatten(&object(api.clone())).expand();
        assert_eq!(serde_json::Value::Object(body), api);
    }
}
