//! Error types for credential loading, trust evaluation and TLS setup.
//!
//! Each enum mirrors one failure taxonomy. All variants carry the native
//! diagnostic (p12 / x509-parser / rustls message) so that a user-visible
//! failure can show both the kind and the underlying cause.

use thiserror::Error;

/// Failures while loading the client identity archive or the pinned anchor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("identity archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("anchor certificate not found: {0}")]
    AnchorNotFound(String),

    /// Wrong passphrase or corrupt container.
    #[error("identity archive import failed: {status}")]
    ImportFailed { status: String },

    /// The container decoded, but held no usable private key + certificate pair.
    #[error("identity archive holds no usable key/certificate pair: {0}")]
    IdentityMissing(String),

    #[error("anchor certificate could not be parsed: {0}")]
    CertificateParseFailed(String),
}

impl LoadError {
    /// Short taxonomy name, used in status messages.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::ArchiveNotFound(_) => "ArchiveNotFound",
            LoadError::AnchorNotFound(_) => "AnchorNotFound",
            LoadError::ImportFailed { .. } => "ImportFailed",
            LoadError::IdentityMissing(_) => "IdentityMissing",
            LoadError::CertificateParseFailed(_) => "CertificateParseFailed",
        }
    }
}

/// Rejection of a server certificate chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    /// The transport handed over no certificate to evaluate.
    #[error("no certificate chain was presented for evaluation")]
    NoTrustObject,

    #[error("certificate chain failed to validate: {diagnostic}")]
    ChainValidationFailed { diagnostic: String },

    #[error("certificate is not valid for {hostname}: {diagnostic}")]
    HostnameMismatch { hostname: String, diagnostic: String },
}

impl TrustError {
    /// Short taxonomy name, used in status messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TrustError::NoTrustObject => "NoTrustObject",
            TrustError::ChainValidationFailed { .. } => "ChainValidationFailed",
            TrustError::HostnameMismatch { .. } => "HostnameMismatch",
        }
    }
}

/// Errors raised while assembling TLS configuration.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("TLS configuration error: {0}")]
    TlsConfiguration(String),
}

/// Result type alias using [`ProtoError`].
pub type Result<T> = std::result::Result<T, ProtoError>;
