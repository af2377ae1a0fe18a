//! Terraform Provider for FortiSASE
//!
//! This binary implements the Terraform Plugin Protocol v6 for managing
//! FortiSASE users, DNS rules, host groups and SAML settings.

use terraform_provider_fortisase::{server, FortiSaseProvider};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the plugin handshake, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("Starting FortiSASE Terraform Provider");

    server::serve(FortiSaseProvider::new()).await
}
