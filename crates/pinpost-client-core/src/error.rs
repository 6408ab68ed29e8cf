//! Error types for the upload transport.

use pinpost_proto::{ProtoError, TrustError};
use thiserror::Error;

/// Errors that can end a single upload attempt.
///
/// None of these invalidate loaded credentials; the caller may retry with
/// the same identity and anchor.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No HTTP response was obtained: connect failure, cancelled handshake,
    /// timeout, or a connection dropped mid-transfer. `trust` holds the
    /// recorded rejection when the handshake cancelled on server trust.
    #[error("transport failure: {detail}")]
    TransportFailure {
        detail: String,
        trust: Option<TrustError>,
    },

    #[error("server rejected upload with HTTP {status}")]
    ServerRejected { status: u16, body: String },

    #[error("invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("file access failed: {0}")]
    FileAccess(String),

    #[error(transparent)]
    TlsConfiguration(#[from] ProtoError),
}

impl UploadError {
    pub(crate) fn transport(detail: impl Into<String>) -> Self {
        UploadError::TransportFailure {
            detail: detail.into(),
            trust: None,
        }
    }

    /// Short taxonomy name, used in status messages.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::TransportFailure { .. } => "TransportFailure",
            UploadError::ServerRejected { .. } => "ServerRejected",
            UploadError::InvalidRequest(_) => "InvalidRequest",
            UploadError::FileAccess(_) => "FileAccess",
            UploadError::TlsConfiguration(_) => "TlsConfiguration",
        }
    }

    /// The trust rejection behind a transport failure, if any.
    pub fn trust_failure(&self) -> Option<&TrustError> {
        match self {
            UploadError::TransportFailure { trust, .. } => trust.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

/// Render an error with its whole `source()` chain, `outer: inner: ...`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}
