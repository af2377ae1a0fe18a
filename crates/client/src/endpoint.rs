//! Resource API endpoint table

use std::collections::BTreeMap;

use crate::{Error, Result};

/// How an endpoint addresses its objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Objects live under `<path>/<mkey>`; created by POST to `<path>`
    Collection,
    /// A single object at `<path>`; never created or listed
    Singleton,
    /// A one-shot operation invoked by POST to `<path>`
    Action,
}

/// A resource API endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Short name used in errors and logs
    pub name: &'static str,
    /// Path template; `{name}` segments are filled from URL parameters
    pub path: &'static str,
    pub kind: EndpointKind,
}

impl Endpoint {
    pub const AUTH_USERS: Endpoint = Endpoint {
        name: "auth/users",
        path: "/resource-api/v2/auth/users",
        kind: EndpointKind::Collection,
    };

    pub const AUTH_FSSO_AGENTS: Endpoint = Endpoint {
        name: "auth/fsso-agents",
        path: "/resource-api/v2/auth/fsso-agents",
        kind: EndpointKind::Collection,
    };

    pub const AUTH_VPN_SAML_SERVER: Endpoint = Endpoint {
        name: "auth/vpn-saml-server",
        path: "/resource-api/v2/auth/vpn-saml-server",
        kind: EndpointKind::Singleton,
    };

    pub const NETWORK_DNS_RULES: Endpoint = Endpoint {
        name: "network/dns-rules",
        path: "/resource-api/v2/network/dns-rules",
        kind: EndpointKind::Collection,
    };

    pub const NETWORK_HOST_GROUPS: Endpoint = Endpoint {
        name: "network/host-groups",
        path: "/resource-api/v2/network/host-groups",
        kind: EndpointKind::Collection,
    };

    pub const ENDPOINT_PROFILE_CLONE: Endpoint = Endpoint {
        name: "endpoint/profiles/clone",
        path: "/resource-api/v2/endpoint/profiles/{primaryKey}/clone",
        kind: EndpointKind::Action,
    };

    pub const SECURITY_ENDPOINT_TO_ENDPOINT_POLICIES_CLONE: Endpoint = Endpoint {
        name: "security/endpoint-to-endpoint-policies/clone",
        path: "/resource-api/v2/security/endpoint-to-endpoint-policies/{primaryKey}/clone",
        kind: EndpointKind::Action,
    };

    pub const USER_VPN_SESSIONS_DEAUTH: Endpoint = Endpoint {
        name: "user/vpn-sessions/deauth",
        path: "/resource-api/v2/user/vpn-sessions/deauth",
        kind: EndpointKind::Action,
    };

    /// Path used to create objects (or invoke the action)
    pub fn create_path(&self, params: &BTreeMap<String, String>) -> Result<ResolvedPath> {
        ResolvedPath::fill(self.path, params)
    }

    /// Path addressing one object
    pub fn object_path(
        &self,
        mkey: Option<&str>,
        params: &BTreeMap<String, String>,
    ) -> Result<ResolvedPath> {
        let mut resolved = ResolvedPath::fill(self.path, params)?;
        match self.kind {
            EndpointKind::Collection => {
                let mkey = mkey.filter(|k| !k.is_empty()).ok_or_else(|| {
                    Error::InvalidConfig(format!("{} requires a primary key", self.name))
                })?;
                resolved.path = format!("{}/{}", resolved.path, urlencoding::encode(mkey));
            }
            EndpointKind::Singleton => {}
            EndpointKind::Action => {
                return Err(Error::InvalidConfig(format!(
                    "{} is an action and has no objects",
                    self.name
                )))
            }
        }
        Ok(resolved)
    }
}

/// A concrete request path plus the URL parameters left over as query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl ResolvedPath {
    fn fill(template: &str, params: &BTreeMap<String, String>) -> Result<Self> {
        let mut path = String::with_capacity(template.len());
        let mut used = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| Error::InvalidConfig(format!("bad path template {}", template)))?;
            let name = &rest[open + 1..close];
            let value = params
                .get(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::InvalidConfig(format!("missing URL parameter {}", name)))?;
            path.push_str(&rest[..open]);
            path.push_str(&urlencoding::encode(value));
            used.push(name);
            rest = &rest[close + 1..];
        }
        path.push_str(rest);

        let query = params
            .iter()
            .filter(|(k, _)| !used.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self { path, query })
    }
}
