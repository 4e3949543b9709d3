//! QUIC transport configuration helpers
//!
//! Both sides use the same idle timeout and keep-alive so a client
//! streaming interactive input keeps its connection while the user thinks.

pub mod tls;

pub use tls::{fingerprint, PinnedCertVerifier, SkipVerification};

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use quinn::{ClientConfig, IdleTimeout, ServerConfig, TransportConfig, VarInt};
use rustls::client::danger::ServerCertVerifier;
use std::sync::Arc;
use std::time::Duration;

use crate::{CoreError, Result};

/// Server name presented during the TLS handshake
pub const SERVER_NAME: &str = "textcast.local";

const IDLE_TIMEOUT_MS: u32 = 30_000;
const KEEP_ALIVE: Duration = Duration::from_secs(5);

fn transport() -> TransportConfig {
    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(IdleTimeout::from(VarInt::from_u32(IDLE_TIMEOUT_MS))));
    transport.keep_alive_interval(Some(KEEP_ALIVE));
    transport
}

/// Configure QUIC client with the given certificate verifier
pub fn configure_client(verifier: Arc<dyn ServerCertVerifier>) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let crypto = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| CoreError::Protocol(format!("Failed to configure TLS: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    let quic_crypto = QuicClientConfig::try_from(crypto)
        .map_err(|e| CoreError::Protocol(format!("Failed to configure QUIC crypto: {}", e)))?;

    let mut config = ClientConfig::new(Arc::new(quic_crypto));
    config.transport_config(Arc::new(transport()));
    Ok(config)
}

/// Configure QUIC server with a single certificate
pub fn configure_server(
    cert: Vec<rustls::pki_types::CertificateDer<'static>>,
    key: rustls::pki_types::PrivateKeyDer<'static>,
) -> Result<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let crypto = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| CoreError::Protocol(format!("Failed to configure TLS: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(cert, key)
        .map_err(|e| CoreError::Protocol(format!("Failed to configure TLS: {}", e)))?;

    let quic_crypto = QuicServerConfig::try_from(crypto)
        .map_err(|e| CoreError::Protocol(format!("Failed to configure QUIC crypto: {}", e)))?;

    let mut config = ServerConfig::with_crypto(Arc::new(quic_crypto));
    config.transport_config(Arc::new(transport()));
    Ok(config)
}
