//! Resource Implementations
//!
//! Implements the CRUD operations for each resource type. Most resources
//! are plain API objects and go through [`ObjectResource`], which only needs
//! the per-type flatten/expand pair from an [`ObjectModel`].

pub mod actions;
pub mod auth_fsso_agents;
pub mod auth_users;
pub mod auth_vpn_saml_server;
pub mod network_dns_rules;
pub mod network_host_groups;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use fortisase_client::{Endpoint, InputModel, JsonObject, ResourceGuard, RestApi};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::poll::PollPolicy;
use crate::schema::Schema;
use crate::state::DynamicValue;
use crate::value::Value;

/// Everything a handler needs for one call
#[derive(Clone)]
pub struct ResourceContext {
    pub client: Arc<dyn RestApi>,
    pub poll: PollPolicy,
    pub cancel: CancellationToken,
}

/// Trait for resource operations
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Create a new resource from the planned state
    async fn create(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue>;

    /// Read an existing resource; `None` when it no longer exists
    async fn read(&self, ctx: &ResourceContext, state: &DynamicValue) -> Result<Option<DynamicValue>>;

    /// Update an existing resource
    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue>;

    /// Delete a resource
    async fn delete(&self, ctx: &ResourceContext, prior: &DynamicValue) -> Result<()>;

    /// Build state for an existing remote object from its import id
    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<DynamicValue>;
}

/// Typed model of a resource's Terraform state
pub trait Model: Sized + Default + Clone + PartialEq + Send + Sync {
    fn from_state(value: &DynamicValue) -> Result<Self>;
    fn to_state(&self) -> DynamicValue;
}

/// A model backed by one API object
pub trait ObjectModel: Model + 'static {
    const TYPE_NAME: &'static str;
    const ENDPOINT: Endpoint;
    /// Mutations take the per-type lock
    const LOCKED: bool;
    /// The object always exists remotely: create configures it, delete forgets it
    const PREDEFINED: bool = false;
    /// Attribute a data source looks the object up by
    const LOOKUP_KEY: Option<&'static str> = Some("primary_key");

    fn schema() -> Schema;

    /// Key addressing the remote object, once known
    fn mkey(&self) -> Option<String>;

    fn set_id(&mut self, id: &str);

    /// API JSON -> model
    fn flatten(obj: &JsonObject) -> Self;

    /// Request body for create
    fn expand(&self) -> JsonObject;

    /// Request body for update: only what changed since `prior`
    fn expand_update(&self, prior: &Self) -> JsonObject;

    /// Carry over values the API never returns
    fn keep_write_only(&mut self, _known: &Self) {}
}

/// Key from `primary_key`, falling back to `id`
pub fn key_of(primary_key: &Value<String>, id: &Value<String>) -> Option<String> {
    primary_key
        .as_str()
        .or_else(|| id.as_str())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Take the per-type lock when the model asks for it
pub async fn lock_for<M: ObjectModel>(client: &dyn RestApi) -> Option<ResourceGuard> {
    if M::LOCKED {
        debug!("Acquiring lock for {}", M::TYPE_NAME);
        Some(client.lock(M::TYPE_NAME).await)
    } else {
        None
    }
}

/// Read the remote object; `None` on 404
pub async fn fetch<M: ObjectModel>(client: &dyn RestApi, mkey: &str) -> Result<Option<M>> {
    let input = InputModel::new().with_mkey(mkey);
    match client.read(&M::ENDPOINT, &input).await {
        Ok(obj) => {
            let mut model = M::flatten(&obj);
            model.set_id(mkey);
            Ok(Some(model))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read back after a mutation; the object must exist
pub async fn fetch_existing<M: ObjectModel>(client: &dyn RestApi, mkey: &str) -> Result<M> {
    fetch::<M>(client, mkey).await?.ok_or_else(|| {
        Error::state(format!(
            "{} {} was not found right after being written",
            M::TYPE_NAME,
            mkey
        ))
    })
}

fn required_mkey<M: ObjectModel>(model: &M) -> Result<String> {
    model.mkey().ok_or_else(|| {
        Error::InvalidConfig(format!("{}: primary_key must be known", M::TYPE_NAME))
    })
}

/// Generic handler for API object resources
pub struct ObjectResource<M>(PhantomData<fn() -> M>);

impl<M: ObjectModel> ObjectResource<M> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M: ObjectModel> Default for ObjectResource<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: ObjectModel> Resource for ObjectResource<M> {
    fn type_name(&self) -> &'static str {
        M::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        M::schema()
    }

    async fn create(&self, ctx: &ResourceContext, planned: &DynamicValue) -> Result<DynamicValue> {
        let plan = M::from_state(planned)?;
        let mkey = required_mkey(&plan)?;
        let client = ctx.client.as_ref();
        let _guard = lock_for::<M>(client).await;

        let input = InputModel::new().with_mkey(&mkey).with_body(plan.expand());
        if M::PREDEFINED {
            info!("Configuring predefined {} {}", M::TYPE_NAME, mkey);
            client.update(&M::ENDPOINT, &input).await?;
        } else {
            info!("Creating {} {}", M::TYPE_NAME, mkey);
            client.create(&M::ENDPOINT, &input).await?;
        }

        let mut model = fetch_existing::<M>(client, &mkey).await?;
        model.keep_write_only(&plan);
        Ok(model.to_state())
    }

    async fn read(&self, ctx: &ResourceContext, state: &DynamicValue) -> Result<Option<DynamicValue>> {
        let current = M::from_state(state)?;
        let mkey = required_mkey(&current)?;
        debug!("Reading {} {}", M::TYPE_NAME, mkey);

        match fetch::<M>(ctx.client.as_ref(), &mkey).await? {
            Some(mut model) => {
                model.keep_write_only(&current);
                Ok(Some(model.to_state()))
            }
            None => {
                info!("{} {} no longer exists", M::TYPE_NAME, mkey);
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        ctx: &ResourceContext,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue> {
        let before = M::from_state(prior)?;
        let plan = M::from_state(planned)?;
        let mkey = required_mkey(&before)?;
        let client = ctx.client.as_ref();
        let _guard = lock_for::<M>(client).await;

        let body = plan.expand_update(&before);
        if body.is_empty() {
            debug!("{} {}: nothing to send", M::TYPE_NAME, mkey);
        } else {
            info!("Updating {} {} ({} field(s))", M::TYPE_NAME, mkey, body.len());
            let input = InputModel::new().with_mkey(&mkey).with_body(body);
            client.update(&M::ENDPOINT, &input).await?;
        }

        let mut model = fetch_existing::<M>(client, &mkey).await?;
        model.keep_write_only(&plan);
        Ok(model.to_state())
    }

    async fn delete(&self, ctx: &ResourceContext, prior: &DynamicValue) -> Result<()> {
        let before = M::from_state(prior)?;
        let mkey = required_mkey(&before)?;
        let client = ctx.client.as_ref();
        let _guard = lock_for::<M>(client).await;

        if M::PREDEFINED {
            info!("{} {} is predefined; removing it from state only", M::TYPE_NAME, mkey);
            return Ok(());
        }

        info!("Deleting {} {}", M::TYPE_NAME, mkey);
        match client
            .delete(&M::ENDPOINT, &InputModel::new().with_mkey(&mkey))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("{} {} was already gone", M::TYPE_NAME, mkey);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn import(&self, ctx: &ResourceContext, id: &str) -> Result<DynamicValue> {
        info!("Importing {} {}", M::TYPE_NAME, id);
        match fetch::<M>(ctx.client.as_ref(), id).await? {
            Some(model) => Ok(model.to_state()),
            None => Err(Error::InvalidConfig(format!(
                "cannot import {}: no object with key {}",
                M::TYPE_NAME,
                id
            ))),
        }
    }
}

/// Every resource the provider serves
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(ObjectResource::<auth_users::AuthUser>::new()),
        Arc::new(ObjectResource::<auth_fsso_agents::FssoAgent>::new()),
        Arc::new(ObjectResource::<network_dns_rules::DnsRule>::new()),
        Arc::new(ObjectResource::<network_host_groups::HostGroup>::new()),
        Arc::new(auth_vpn_saml_server::VpnSamlServerResource),
        Arc::new(actions::CloneAction::endpoint_profile()),
        Arc::new(actions::CloneAction::endpoint_to_endpoint_policies()),
        Arc::new(actions::VpnSessionsDeauth),
    ]
}
