//! Read descriptive fields out of DER-encoded X.509 certificates.
//!
//! Used for logging and auditing only: trust decisions never rely on these
//! summaries, they go through webpki in [`crate::tls::verifier`].
//!
//! Reference: `x509-parser` crate (rusticata, MIT/Apache-2.0)

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

/// Human-readable summary of one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    /// Expiry as seconds since Unix epoch.
    pub not_after_epoch: i64,
    pub is_ca: bool,
}

/// Parse exactly one DER certificate.
///
/// Trailing bytes after the certificate are an error: the input must be a
/// single certificate, not a concatenation.
pub fn summarize(cert_der: &[u8]) -> Result<CertSummary, String> {
    let (rest, cert) =
        X509Certificate::from_der(cert_der).map_err(|e| format!("X.509 parse error: {e}"))?;

    if !rest.is_empty() {
        return Err(format!(
            "{} trailing bytes after certificate",
            rest.len()
        ));
    }

    Ok(CertSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_after_epoch: cert.validity().not_after.timestamp(),
        is_ca: cert.is_ca(),
    })
}

/// Lowercase hex SHA-256 over the DER bytes.
pub fn sha256_fingerprint(cert_der: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(cert_der))
}
