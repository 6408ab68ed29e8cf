//! The single pinned trust anchor.
//!
//! A [`PinnedAnchor`] is parsed once from a DER certificate and is immutable
//! afterwards. It owns a private one-entry `RootCertStore`, so pinning never
//! touches process-wide trust configuration.

use std::sync::Arc;

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use tracing::debug;

use crate::error::LoadError;
use crate::tls::cert_extract::{self, CertSummary};

/// A parsed anchor certificate and the trust store containing only it.
#[derive(Clone)]
pub struct PinnedAnchor {
    der: CertificateDer<'static>,
    summary: CertSummary,
    fingerprint: String,
    roots: Arc<RootCertStore>,
}

impl PinnedAnchor {
    /// DER bytes of the anchor certificate.
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.summary.subject
    }

    /// Lowercase hex SHA-256 of the DER bytes, for auditing the pin.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Root store holding this anchor and nothing else.
    pub fn root_store(&self) -> &RootCertStore {
        &self.roots
    }
}

impl PartialEq for PinnedAnchor {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PinnedAnchor {}

impl std::fmt::Debug for PinnedAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedAnchor")
            .field("subject", &self.summary.subject)
            .field("sha256", &self.fingerprint)
            .finish()
    }
}

/// Parse a single DER-encoded X.509 certificate into a [`PinnedAnchor`].
///
/// Empty input is reported as `AnchorNotFound`; anything that is not exactly
/// one well-formed certificate is `CertificateParseFailed`.
pub fn load_anchor(anchor_der: &[u8]) -> Result<PinnedAnchor, LoadError> {
    if anchor_der.is_empty() {
        return Err(LoadError::AnchorNotFound("anchor input is empty".into()));
    }

    let summary = cert_extract::summarize(anchor_der).map_err(LoadError::CertificateParseFailed)?;

    let der = CertificateDer::from(anchor_der.to_vec());
    let mut roots = RootCertStore::empty();
    roots
        .add(der.clone())
        .map_err(|e| LoadError::CertificateParseFailed(format!("unusable trust anchor: {e}")))?;

    let fingerprint = cert_extract::sha256_fingerprint(anchor_der);
    debug!(subject = %summary.subject, sha256 = %fingerprint, "loaded pinned anchor");

    Ok(PinnedAnchor {
        der,
        summary,
        fingerprint,
        roots: Arc::new(roots),
    })
}
