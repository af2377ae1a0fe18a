//! Data Source Implementations
//!
//! Data sources read the same API objects as the resources and share their
//! flatten functions; the schema is the resource schema made read-only.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};
use crate::resources::auth_users::AuthUser;
use crate::resources::auth_vpn_saml_server::VpnSamlServer;
use crate::resources::network_dns_rules::DnsRule;
use crate::resources::{fetch, ObjectModel, ResourceContext};
use crate::schema::Schema;
use crate::state::DynamicValue;

/// Trait for data source reads
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &ResourceContext, config: &DynamicValue) -> Result<DynamicValue>;
}

/// Generic data source over an object model
pub struct ObjectDataSource<M>(PhantomData<fn() -> M>);

impl<M: ObjectModel> ObjectDataSource<M> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M: ObjectModel> Default for ObjectDataSource<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: ObjectModel> DataSource for ObjectDataSource<M> {
    fn type_name(&self) -> &'static str {
        M::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let mut schema = M::schema();
        schema.block = schema.block.computed_view(M::LOOKUP_KEY);
        schema
    }

    async fn read(&self, ctx: &ResourceContext, config: &DynamicValue) -> Result<DynamicValue> {
        let lookup = M::from_state(config)?;
        let mkey = lookup.mkey().ok_or_else(|| {
            Error::InvalidConfig(format!("{}: primary_key must be known", M::TYPE_NAME))
        })?;

        info!("Reading data source {} {}", M::TYPE_NAME, mkey);
        match fetch::<M>(ctx.client.as_ref(), &mkey).await? {
            Some(model) => Ok(model.to_state()),
            None => Err(Error::InvalidConfig(format!(
                "{}: no object with key {}",
                M::TYPE_NAME,
                mkey
            ))),
        }
    }
}

/// Every data source the provider serves
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(ObjectDataSource::<AuthUser>::new()),
        Arc::new(ObjectDataSource::<DnsRule>::new()),
        Arc::new(ObjectDataSource::<VpnSamlServer>::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_read_only() {
        let schema = ObjectDataSource::<DnsRule>::new().schema();
        let key = schema.block.get_attribute("primary_key").unwrap();
        assert!(key.required);
        assert!(schema
            .block
            .attributes
            .iter()
            .filter(|a| a.name != "primary_key")
            .all(|a| a.computed && !a.optional && !a.required));
        assert!(schema.block.get_attribute("pop_dns_override").is_some());
    }

    #[test]
    fn test_singleton_has_no_lookup_key() {
        let schema = ObjectDataSource::<VpnSamlServer>::new().schema();
        assert!(schema.block.attributes.iter().all(|a| a.computed));
    }
}
