//! Client identity loading from a password-protected PKCS#12 archive.
//!
//! Both the current format (PBES2 / AES-256, SHA-256 MAC) and the legacy one
//! (SHA-1 PBE with 3DES or RC2, SHA-1 MAC) are accepted. The archive must hold
//! a PKCS#8 private key and the certificate bearing its local key ID. The
//! leaf is chosen by priority:
//!
//! 1. the first certificate of the key's chain, when it parses and pairs with
//!    the private key;
//! 2. otherwise the first later certificate in the chain that pairs with it.
//!
//! All remaining certificates become the intermediate chain, in chain order.

use std::panic;
use std::sync::Arc;

use p12_keystore::KeyStore;
use rustls::sign::{CertifiedKey, SigningKey};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::tls::cert_extract;

/// A client private key with its leaf certificate and optional intermediates.
///
/// Owned by whoever loaded it. The TLS layer only takes a reference-counted
/// handle to the signing material ([`ClientIdentity::certified_key`]) for the
/// lifetime of a single connection attempt. Not `Clone`; `Debug` never
/// prints key material.
pub struct ClientIdentity {
    leaf: CertificateDer<'static>,
    intermediates: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    leaf_subject: String,
    certified: Arc<CertifiedKey>,
}

impl ClientIdentity {
    /// The selected leaf certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.leaf
    }

    pub fn intermediates(&self) -> &[CertificateDer<'static>] {
        &self.intermediates
    }

    pub fn leaf_subject(&self) -> &str {
        &self.leaf_subject
    }

    /// Signing key plus chain (leaf first), ready to answer a client
    /// certificate request.
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified)
    }
}

impl PartialEq for ClientIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.leaf == other.leaf
            && self.intermediates == other.intermediates
            && self.key.secret_der() == other.key.secret_der()
    }
}

impl Eq for ClientIdentity {}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("leaf_subject", &self.leaf_subject)
            .field("intermediates", &self.intermediates.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Decode `archive` with `passphrase` and build a [`ClientIdentity`].
///
/// Empty input is `ArchiveNotFound`. Any decoder failure (wrong passphrase,
/// corrupt or unsupported container) is `ImportFailed`, checked before any
/// content is inspected. A container that decodes but lacks a paired key and
/// certificate is `IdentityMissing`.
pub fn load_identity(archive: &[u8], passphrase: &str) -> Result<ClientIdentity, LoadError> {
    if archive.is_empty() {
        return Err(LoadError::ArchiveNotFound("archive input is empty".into()));
    }

    let keystore = decode(archive, passphrase)?;

    let (alias, key_chain) = keystore.private_key_chain().ok_or_else(|| {
        LoadError::IdentityMissing("archive contains no private key with a certificate".into())
    })?;
    if key_chain.chain().is_empty() {
        return Err(LoadError::IdentityMissing(format!(
            "private key {alias:?} has no certificate"
        )));
    }

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_chain.key().to_vec()));
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(|e| LoadError::IdentityMissing(format!("unusable private key: {e}")))?;

    let mut certs: Vec<CertificateDer<'static>> = key_chain
        .chain()
        .iter()
        .map(|c| CertificateDer::from(c.as_der().to_vec()))
        .collect();

    let leaf_index = select_leaf(&certs, &signing_key).ok_or_else(|| {
        LoadError::IdentityMissing("no certificate in the archive matches the private key".into())
    })?;

    let leaf = certs.remove(leaf_index);
    let intermediates = certs;

    let leaf_subject = cert_extract::summarize(&leaf)
        .map(|s| s.subject)
        .map_err(LoadError::IdentityMissing)?;

    let mut chain = Vec::with_capacity(1 + intermediates.len());
    chain.push(leaf.clone());
    chain.extend(intermediates.iter().cloned());
    let certified = Arc::new(CertifiedKey::new(chain, signing_key));

    debug!(
        subject = %leaf_subject,
        alias,
        leaf_index,
        intermediates = intermediates.len(),
        "loaded client identity"
    );

    Ok(ClientIdentity {
        leaf,
        intermediates,
        key,
        leaf_subject,
        certified,
    })
}

/// Verify the MAC and decrypt every bag. Malformed input never unwinds past
/// this point.
fn decode(archive: &[u8], passphrase: &str) -> Result<KeyStore, LoadError> {
    match panic::catch_unwind(|| KeyStore::from_pkcs12(archive, passphrase)) {
        Ok(Ok(keystore)) => Ok(keystore),
        Ok(Err(e)) => Err(LoadError::ImportFailed {
            status: format!("PKCS#12 import: {e} (wrong passphrase or corrupt archive)"),
        }),
        Err(_) => {
            warn!(bytes = archive.len(), "PKCS#12 decoder aborted on malformed archive");
            Err(LoadError::ImportFailed {
                status: "PKCS#12 import: malformed archive".into(),
            })
        }
    }
}

/// Pick the leaf index by the documented priority, or `None` if no
/// certificate pairs with the key.
fn select_leaf(certs: &[CertificateDer<'static>], signing_key: &Arc<dyn SigningKey>) -> Option<usize> {
    let pairs_with_key = |der: &CertificateDer<'static>| {
        if cert_extract::summarize(der).is_err() {
            return false;
        }
        let candidate = CertifiedKey::new(vec![der.clone()], Arc::clone(signing_key));
        candidate.keys_match().is_ok()
    };

    certs.iter().position(pairs_with_key)
}
