//! FortiSASE Terraform Provider
//!
//! This crate implements a Terraform provider for FortiSASE using the
//! Terraform Plugin Protocol v6.

pub mod data_sources;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod poll;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;
pub mod value;

pub mod tfplugin6 {
    tonic::include_proto!("tfplugin6");
}

pub use error::{Error, Result};
pub use provider::FortiSaseProvider;
