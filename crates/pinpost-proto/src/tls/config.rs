//! rustls client configuration for one pinned mTLS connection attempt.
//!
//! The config enforces:
//! - Ring crypto provider, TLS 1.2 and 1.3
//! - Server trust decided by the handshake's [`TrustPinningVerifier`]
//! - Client certificate supplied by the handshake on request
//! - ALPN `http/1.1`
//!
//! A config is built per upload around a fresh [`MtlsHandshake`]; configs
//! are never shared between concurrent uploads.
//!
//! [`TrustPinningVerifier`]: crate::tls::verifier::TrustPinningVerifier

use std::sync::Arc;

use crate::error::{ProtoError, Result};
use crate::tls::handshake::{HandshakeDriver, MtlsHandshake};

/// ALPN protocol identifier for the upload transport.
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Build a `rustls::ClientConfig` whose challenge callbacks are answered by
/// `handshake`.
pub fn build_client_tls_config(handshake: Arc<MtlsHandshake>) -> Result<rustls::ClientConfig> {
    let provider = Arc::clone(handshake.verifier().provider());
    let driver = Arc::new(HandshakeDriver::new(handshake));

    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ProtoError::TlsConfiguration(format!("TLS version config: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(driver.clone())
        .with_client_cert_resolver(driver);

    config.alpn_protocols = vec![ALPN_HTTP11.to_vec()];

    Ok(config)
}
