//! fortisase_network_host_groups

use std::collections::BTreeSet;

use fortisase_client::{Endpoint, JsonObject};

use super::{key_of, Model, ObjectModel};
use crate::error::Result;
use crate::schema::{Attribute, Block, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{
    attr, expand_reference_list, parse_reference_set, parse_string_value, RequestBody, Value,
};

const HOSTS: &str = "network/hosts";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostGroup {
    pub id: Value<String>,
    pub primary_key: Value<String>,
    pub members: Value<BTreeSet<String>>,
}

impl Model for HostGroup {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            primary_key: attr(v, "primary_key")?,
            members: attr(v, "members")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("primary_key", self.primary_key.to_dynamic()),
            ("members", self.members.to_dynamic()),
        ])
    }
}

impl ObjectModel for HostGroup {
    const TYPE_NAME: &'static str = "fortisase_network_host_groups";
    const ENDPOINT: Endpoint = Endpoint::NETWORK_HOST_GROUPS;
    const LOCKED: bool = false;

    fn schema() -> Schema {
        Schema::new(
            Block::new("Group of network hosts.")
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("primary_key")
                        .required()
                        .force_new()
                        .length_between(1, 79),
                )
                .attribute(
                    Attribute::string_set("members")
                        .required()
                        .describe("Primary keys of the hosts in the group."),
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
            members: parse_reference_set(obj.get("members")),
        }
    }

    fn expand(&self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put("primaryKey", &self.primary_key)
            .put_json("members", expand_reference_list(&self.members, HOSTS));
        body.into_inner()
    }

    fn expand_update(&self, prior: &Self) -> JsonObject {
        let mut body = RequestBody::new();
        if self.members != prior.members {
            body.put_json("members", expand_reference_list(&self.members, HOSTS));
        }
        body.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn members(keys: &[&str]) -> Value<BTreeSet<String>> {
        Value::Known(keys.iter().map(|k| k.to_string()).collect())
    }

    #[test]
    fn test_flatten_and_expand_members() {
        let group = HostGroup::flatten(
            json!({
                "primaryKey": "servers",
                "members": [
                    {"primaryKey": "web", "datasource": "network/hosts"},
                    {"primaryKey": "db", "datasource": "network/hosts"}
                ]
            })
            .as_object()
            .unwrap(),
        );
        assert_eq!(group.members, members(&["web", "db"]));
        assert_eq!(
            serde_json::Value::Object(group.expand()),
            json!({
                "primaryKey": "servers",
                "members": [
                    {"primaryKey": "db", "datasource": "network/hosts"},
                    {"primaryKey": "web", "datasource": "network/hosts"}
                ]
            })
        );
    }

    #[test]
    fn test_update_sends_members_only_when_changed() {
        let prior = HostGroup {
            primary_key: Value::from("servers"),
            members: members(&["web", "db"]),
            ..Default::default()
        };
        assert!(prior.expand_update(&prior).is_empty());

        let planned = HostGroup {
            members: members(&["web"]),
            ..prior.clone()
        };
        assert_eq!(
            serde_json::Value::Object(planned.expand_update(&prior)),
            json!({"members": [{"primaryKey": "web", "datasource": "network/hosts"}]})
        );
    }

    #[test]
    fn test_expand_reproduces_api_object() {
        let api = json!({
            "primaryKey": "servers",
            "members": [
                {"primaryKey": "db", "datasource": "network/hosts"},
                {"primaryKey": "web", "datasource": "network/hosts"}
            ]
        });
        let body = HostGroup::flatten(api.as_object().unwrap()).expand();
        assert_eq!(serde_json::Value::Object(body), api);
    }
}
