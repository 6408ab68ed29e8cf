//! Trust modes: pinned-exclusive versus default roots.
//!
//! [`TrustMode`] records which root set a trust decision was made against:
//! - `Pinned`: only the single loaded anchor. Default roots are never
//!   consulted, so a default CA cannot stand in for the pin.
//! - `DefaultRoots`: no anchor was loaded and the chain was evaluated
//!   against the default roots. This is the weaker mode and is always
//!   reported at warn level.
//!
//! The default roots are the Mozilla set from `webpki-roots`. They can be
//! replaced through [`crate::tls::verifier::TrustPinningVerifier::with_default_roots`].

use std::sync::Arc;

use rustls::RootCertStore;

use crate::identity::PinnedAnchor;

/// Which root set a trust decision was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    /// Only the pinned anchor was trusted.
    Pinned,
    /// No anchor was available; default roots were used.
    DefaultRoots,
}

impl TrustMode {
    /// The mode that applies for an optional anchor.
    pub fn for_anchor(anchor: Option<&PinnedAnchor>) -> Self {
        match anchor {
            Some(_) => TrustMode::Pinned,
            None => TrustMode::DefaultRoots,
        }
    }

    pub fn is_pinned(self) -> bool {
        self == TrustMode::Pinned
    }
}

/// Mozilla root set bundled by `webpki-roots`.
pub fn default_root_store() -> Arc<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(roots)
}
