//! Plugin server
//!
//! Terraform launches the provider as a go-plugin subprocess: the provider
//! checks the magic cookie, listens on a local port, prints the handshake
//! line on stdout and then serves gRPC. When Terraform passes its client
//! certificate, the connection is mutually authenticated with a freshly
//! generated self-signed server certificate.

use std::io::Write;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

use crate::provider::FortiSaseProvider;
use crate::tfplugin6::provider_server::ProviderServer;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// Environment variable carrying Terraform's client certificate (PEM)
pub const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

const CORE_PROTOCOL_VERSION: u32 = 1;
const APP_PROTOCOL_VERSION: u32 = 6;

/// Self-signed server certificate
pub struct ServerCert {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: Vec<u8>,
}

/// Generate the certificate presented to Terraform
pub fn generate_server_cert() -> Result<ServerCert> {
    let key = KeyPair::generate().context("generating server key")?;

    let mut params = CertificateParams::new(vec!["localhost".to_string()])
        .context("building certificate parameters")?;
    params.distinguished_name.push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let cert = params.self_signed(&key).context("self-signing certificate")?;
    Ok(ServerCert {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
        der: cert.der().to_vec(),
    })
}

/// The line go-plugin reads from stdout
pub fn handshake_line(addr: &std::net::SocketAddr, cert_der: Option<&[u8]>) -> String {
    format!(
        "{}|{}|tcp|{}|grpc|{}",
        CORE_PROTOCOL_VERSION,
        APP_PROTOCOL_VERSION,
        addr,
        cert_der.map(|der| STANDARD_NO_PAD.encode(der)).unwrap_or_default()
    )
}

/// Run the plugin until Terraform kills it
pub async fn serve(provider: FortiSaseProvider) -> Result<()> {
    if std::env::var(MAGIC_COOKIE_KEY).ok().as_deref() != Some(MAGIC_COOKIE_VALUE) {
        bail!(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
        );
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let mut builder = Server::builder();
    let client_cert = std::env::var(CLIENT_CERT_ENV)
        .ok()
        .filter(|pem| !pem.trim().is_empty());

    let cert_der = match client_cert {
        Some(client_pem) => {
            let cert = generate_server_cert()?;
            let tls = ServerTlsConfig::new()
                .identity(Identity::from_pem(&cert.cert_pem, &cert.key_pem))
                .client_ca_root(Certificate::from_pem(client_pem));
            builder = builder.tls_config(tls).context("configuring TLS")?;
            info!("AutoMTLS enabled");
            Some(cert.der)
        }
        None => None,
    };

    info!("Provider listening on {}", addr);

    // Terraform reads exactly one line; logs go to stderr.
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", handshake_line(&addr, cert_der.as_deref()))?;
    stdout.flush()?;

    builder
        .add_service(ProviderServer::new(provider))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
        .context("gRPC server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_without_tls() {
        let addr: std::net::SocketAddr = "127.0.0.1:40123".parse().unwrap();
        assert_eq!(handshake_line(&addr, None), "1|6|tcp|127.0.0.1:40123|grpc|");
    }

    #[test]
    fn test_handshake_cert_is_unpadded_base64() {
        let addr: std::net::SocketAddr = "127.0.0.1:40123".parse().unwrap();
        let line = handshake_line(&addr, Some(&[1, 2, 3, 4]));
        assert_eq!(line, "1|6|tcp|127.0.0.1:40123|grpc|AQIDBA");
    }

    #[test]
    fn test_generated_cert() {
        let cert = generate_server_cert().unwrap();
        assert!(cert.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(cert.key_pem.contains("PRIVATE KEY"));
        assert!(!cert.der.is_empty());
    }
}
