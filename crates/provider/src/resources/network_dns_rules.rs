//! fortisase_network_dns_rules
//!
//! DNS rules are predefined by the platform. "Creating" one takes over its
//! configuration and destroying it only drops it from state.

use std::collections::BTreeSet;

use fortisase_client::{Endpoint, JsonObject};
use serde_json::Value as Json;

use super::{key_of, Model, ObjectModel};
use crate::diff::{is_same_struct, IsZero};
use crate::error::Result;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::state::{make_state, DynamicValue};
use crate::value::{
    attr, block_list, expand_set_to_string_list, parse_string_set, parse_string_value,
    RequestBody, Value,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DnsRule {
    pub id: Value<String>,
    pub primary_key: Value<String>,
    pub primary_dns: Value<String>,
    pub secondary_dns: Value<String>,
    pub domains: Value<BTreeSet<String>>,
    pub pop_dns_override: Vec<PopDnsOverride>,
}

/// Per point-of-presence DNS servers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopDnsOverride {
    pub pop: Value<String>,
    pub primary_dns: Value<String>,
    pub secondary_dns: Value<String>,
}

impl IsZero for PopDnsOverride {
    fn is_zero(&self) -> bool {
        self.pop.is_zero() && self.primary_dns.is_zero() && self.secondary_dns.is_zero()
    }
}

impl PopDnsOverride {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            pop: attr(v, "pop")?,
            primary_dns: attr(v, "primary_dns")?,
            secondary_dns: attr(v, "secondary_dns")?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("pop", self.pop.to_dynamic()),
            ("primary_dns", self.primary_dns.to_dynamic()),
            ("secondary_dns", self.secondary_dns.to_dynamic()),
        ])
    }

    fn flatten(obj: &JsonObject) -> Self {
        Self {
            pop: parse_string_value(obj.get("pop")),
            primary_dns: parse_string_value(obj.get("primaryDns")),
            secondary_dns: parse_string_value(obj.get("secondaryDns")),
        }
    }

    fn expand(&self) -> Json {
        let mut body = RequestBody::new();
        body.put("pop", &self.pop)
            .put("primaryDns", &self.primary_dns)
            .put("secondaryDns", &self.secondary_dns);
        Json::Object(body.into_inner())
    }
}

fn expand_overrides(overrides: &[PopDnsOverride]) -> Json {
    Json::Array(
        overrides
            .iter()
            .filter(|o| !o.is_zero())
            .map(PopDnsOverride::expand)
            .collect(),
    )
}

impl Model for DnsRule {
    fn from_state(v: &DynamicValue) -> Result<Self> {
        Ok(Self {
            id: attr(v, "id")?,
            primary_key: attr(v, "primary_key")?,
            primary_dns: attr(v, "primary_dns")?,
            secondary_dns: attr(v, "secondary_dns")?,
            domains: attr(v, "domains")?,
            pop_dns_override: block_list(v, "pop_dns_override", PopDnsOverride::from_state)?,
        })
    }

    fn to_state(&self) -> DynamicValue {
        make_state(vec![
            ("id", self.id.to_dynamic()),
            ("primary_key", self.primary_key.to_dynamic()),
            ("primary_dns", self.primary_dns.to_dynamic()),
            ("secondary_dns", self.secondary_dns.to_dynamic()),
            ("domains", self.domains.to_dynamic()),
            (
                "pop_dns_override",
                DynamicValue::List(
                    self.pop_dns_override
                        .iter()
                        .map(PopDnsOverride::to_state)
                        .collect(),
                ),
            ),
        ])
    }
}

impl ObjectModel for DnsRule {
    const TYPE_NAME: &'static str = "fortisase_network_dns_rules";
    const ENDPOINT: Endpoint = Endpoint::NETWORK_DNS_RULES;
    const LOCKED: bool = true;
    const PREDEFINED: bool = true;

    fn schema() -> Schema {
        Schema::new(
            Block::new("DNS servers used for a set of domains.")
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("primary_key")
                        .required()
                        .force_new()
                        .describe("Name of the predefined rule."),
                )
                .attribute(Attribute::string("primary_dns").optional_computed())
                .attribute(Attribute::string("secondary_dns").optional_computed())
                .attribute(
                    Attribute::string_set("domains")
                        .optional_computed()
                        .length_between(1, 127),
                )
                .block(NestedBlock::list(
                    "pop_dns_override",
                    Block::new("DNS servers to use at one point of presence.")
                        .attribute(Attribute::string("pop").required())
                        .attribute(Attribute::string("primary_dns").optional_computed())
                        .attribute(Attribute::string("secondary_dns").optional_computed()),
                )),
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
            primary_dns: parse_string_value(obj.get("primaryDns")),
            secondary_dns: parse_string_value(obj.get("secondaryDns")),
            domains: parse_string_set(obj.get("domains")),
            pop_dns_override: obj
                .get("popDnsOverride")
                .and_then(Json::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Json::as_object)
                        .map(PopDnsOverride::flatten)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    fn expand(&self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put("primaryDns", &self.primary_dns)
            .put("secondaryDns", &self.secondary_dns)
            .put_json("domains", expand_set_to_string_list(&self.domains));
        if !self.pop_dns_override.is_zero() {
            body.put_json("popDnsOverride", Some(expand_overrides(&self.pop_dns_override)));
        }
        body.into_inner()
    }

    fn expand_update(&self, prior: &Self) -> JsonObject {
        let mut body = RequestBody::new();
        body.put_changed("primaryDns", &prior.primary_dns, &self.primary_dns)
            .put_changed("secondaryDns", &prior.secondary_dns, &self.secondary_dns);
        if self.domains != prior.domains {
            body.put_json("domains", expand_set_to_string_list(&self.domains));
        }
        // An emptied list is a change too: the API only clears overrides it is sent.
        if !is_same_struct(&self.pop_dns_override, &prior.pop_dns_override) {
            body.put_json("popDnsOverride", Some(expand_overrides(&self.pop_dns_override)));
        }
        body.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule() -> DnsRule {
        DnsRule {
            id: Value::from("corp"),
            primary_key: Value::from("corp"),
            primary_dns: Value::from("10.0.0.53"),
            domains: Value::Known(["b.example.com", "a.example.com"].iter().map(|s| s.to_string()).collect()),
            pop_dns_override: vec![PopDnsOverride {
                pop: Value::from("fra1"),
                primary_dns: Value::from("10.1.0.53"),
                secondary_dns: Value::Null,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_flatten() {
        let rule = DnsRule::flatten(
            json!({
                "primaryKey": "corp",
                "primaryDns": "10.0.0.53",
                "secondaryDns": "",
                "domains": ["a.example.com", "b.example.com"],
                "popDnsOverride": [
                    {"pop": "fra1", "primaryDns": "10.1.0.53", "secondaryDns": null}
                ]
            })
            .as_object()
            .unwrap(),
        );
        assert_eq!(rule.secondary_dns, Value::from(""));
        assert_eq!(rule.pop_dns_override.len(), 1);
        assert_eq!(rule.pop_dns_override[0].pop, Value::from("fra1"));
        assert!(rule.pop_dns_override[0].secondary_dns.is_null());
    }

    #[test]
    fn test_expand_sorts_set_and_nests_overrides() {
        assert_eq!(
            serde_json::Value::Object(rule().expand()),
            json!({
                "primaryDns": "10.0.0.53",
                "domains": ["a.example.com", "b.example.com"],
                "popDnsOverride": [{"pop": "fra1", "primaryDns": "10.1.0.53"}]
            })
        );
    }

    #[test]
    fn test_reordered_domains_are_not_a_change() {
        let prior = rule();
        let mut planned = rule();
        planned.domains = Value::Known(["a.example.com", "b.example.com"].iter().map(|s| s.to_string()).collect());
        assert!(planned.expand_update(&prior).is_empty());
    }

    #[test]
    fn test_removed_overrides_are_sent_empty() {
        let prior = rule();
        let mut planned = rule();
        planned.pop_dns_override.clear();
        assert_eq!(
            serde_json::Value::Object(planned.expand_update(&prior)),
            json!({"popDnsOverride": []})
        );
    }

    #[test]
    fn test_reordered_overrides_are_a_change() {
        let mut prior = rule();
        prior.pop_dns_override.push(PopDnsOverride {
            pop: Value::from("sjc1"),
            ..Default::default()
        });
        let mut planned = prior.clone();
        planned.pop_dns_override.reverse();
        assert!(planned.expand_update(&prior).contains_key("popDnsOverride"));
    }

    #[test]
    fn test_expand_reproduces_api_object() {
        let mut api = json!({
            "primaryKey": "corp",
            "primaryDns": "10.0.0.53",
            "secondaryDns": "10.0.1.53",
            "domains": ["a.example.com", "b.example.com"],
            "popDnsOverride": [
                {"pop": "fra1", "primaryDns": "10.1.0.53", "secondaryDns": "10.1.1.53"},
                {"pop": "sjc1", "primaryDns": "10.2.0.53", "secondaryDns": "10.2.1.53"}
            ]
        });
        let body = DnsRule::flatten(api.as_object().unwrap()).expand();

        // the rule is addressed by URL
        api.as_object_mut().unwrap().remove("primaryKey");
        assert_eq!(serde_json::Value::Object(body), api);
    }
}
