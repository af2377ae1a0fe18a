//! FortiSASE REST Client
//!
//! HTTP session, endpoint table and named lock registry shared by every
//! resource handler of the Terraform provider.

mod auth;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod lock;

pub use client::{FortiClient, InputModel, JsonObject, RestApi};
pub use config::ClientConfig;
pub use endpoint::{Endpoint, EndpointKind, ResolvedPath};
pub use error::{error_detail, Error, Result};
pub use lock::{LockRegistry, ResourceGuard};
