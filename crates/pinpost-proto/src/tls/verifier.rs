//! Server trust evaluation with a single pinned anchor.
//!
//! The check runs in two steps so that the outcome can be classified:
//!
//! 1. the chain must build to a root of the selected root set, with valid
//!    signatures and validity periods (`ChainValidationFailed` otherwise);
//! 2. the leaf must be valid for the expected server name
//!    (`HostnameMismatch` otherwise). Raw IP addresses are matched against
//!    IP SANs, never skipped.
//!
//! With an anchor, the root set is the anchor alone. Without one, the
//! verifier's default roots are used and a warning is emitted.
//!
//! Both steps delegate to webpki through rustls' public helpers.

use std::sync::Arc;

use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::server::ParsedCertificate;
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, warn};

use crate::error::TrustError;
use crate::identity::PinnedAnchor;
use crate::trust::{default_root_store, TrustMode};

/// Decides whether a presented server chain is trusted for a hostname.
#[derive(Debug, Clone)]
pub struct TrustPinningVerifier {
    default_roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl TrustPinningVerifier {
    /// Verifier whose fallback roots are the `webpki-roots` set.
    pub fn new() -> Self {
        Self::with_default_roots(default_root_store())
    }

    /// Verifier with an explicit fallback root set, used only when no anchor
    /// is supplied.
    pub fn with_default_roots(default_roots: Arc<RootCertStore>) -> Self {
        Self {
            default_roots,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Signature algorithms used for chain and handshake signatures.
    pub fn signature_algorithms(&self) -> &WebPkiSupportedAlgorithms {
        &self.provider.signature_verification_algorithms
    }

    /// Evaluate `presented_chain` (leaf first) for `hostname`.
    ///
    /// Returns the [`TrustMode`] the decision was made under.
    pub fn verify(
        &self,
        presented_chain: &[CertificateDer<'_>],
        hostname: &ServerName<'_>,
        anchor: Option<&PinnedAnchor>,
        now: UnixTime,
    ) -> Result<TrustMode, TrustError> {
        let (end_entity, intermediates) = presented_chain
            .split_first()
            .ok_or(TrustError::NoTrustObject)?;

        let mode = TrustMode::for_anchor(anchor);
        let roots = match anchor {
            Some(anchor) => anchor.root_store(),
            None => {
                warn!(
                    host = %hostname.to_str(),
                    "no pinned anchor loaded; evaluating server against default roots"
                );
                &*self.default_roots
            }
        };

        let parsed = ParsedCertificate::try_from(end_entity).map_err(|e| {
            TrustError::ChainValidationFailed {
                diagnostic: format!("leaf certificate: {e}"),
            }
        })?;

        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            roots,
            intermediates,
            now,
            self.signature_algorithms().all,
        )
        .map_err(|e| TrustError::ChainValidationFailed {
            diagnostic: e.to_string(),
        })?;

        verify_server_name(&parsed, hostname).map_err(|e| TrustError::HostnameMismatch {
            hostname: hostname.to_str().into_owned(),
            diagnostic: e.to_string(),
        })?;

        debug!(host = %hostname.to_str(), ?mode, "server certificate trusted");
        Ok(mode)
    }
}

impl Default for TrustPinningVerifier {
    fn default() -> Self {
        Self::new()
    }
}
