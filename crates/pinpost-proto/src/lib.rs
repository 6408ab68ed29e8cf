//! Pinpost protocol layer.
//!
//! Shared primitives consumed by `pinpost-client-core`:
//!
//! - PKCS#12 client identity and DER trust anchor loading
//! - Pinned trust evaluation bound to the expected hostname
//! - The two-challenge mTLS handshake state machine
//! - rustls client configuration

pub mod error;
pub mod identity;
pub mod tls;
pub mod trust;

pub use error::{LoadError, ProtoError, TrustError};
pub use identity::{ClientIdentity, PinnedAnchor};
pub use trust::TrustMode;
