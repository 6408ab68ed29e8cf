//! Shared fixtures: a throwaway PKI and PKCS#12 archives built with `rcgen`
//! and `p12-keystore`.

#![allow(dead_code)]

use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConnection, RootCertStore, ServerConnection};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

pub const PASSPHRASE: &str = "ios-client-passphrase";

/// A certificate authority able to issue server and client certificates.
pub struct TestCa {
    pub cert: rcgen::Certificate,
    pub key: rcgen::KeyPair,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let key = rcgen::KeyPair::generate().expect("ca key");
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).expect("params");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.distinguished_name.push(rcgen::DnType::CommonName, name);
        let cert = params.self_signed(&key).expect("ca cert");
        Self { cert, key }
    }

    pub fn der(&self) -> &[u8] {
        self.cert.der()
    }

    /// Issue a leaf for the given SAN entries (DNS names or IP literals).
    pub fn issue(&self, common_name: &str, sans: &[&str]) -> Leaf {
        let key = rcgen::KeyPair::generate().expect("leaf key");
        let mut params = rcgen::CertificateParams::new(
            sans.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .expect("params");
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("leaf cert");
        Leaf {
            cert_der: cert.der().to_vec(),
            key_der: key.serialize_der(),
        }
    }
}

/// A leaf certificate with its PKCS#8 private key.
pub struct Leaf {
    pub cert_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

impl Leaf {
    pub fn self_signed(sans: &[&str]) -> Self {
        let key = rcgen::KeyPair::generate().expect("key");
        let cert = rcgen::CertificateParams::new(
            sans.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .expect("params")
        .self_signed(&key)
        .expect("self-signed cert");
        Self {
            cert_der: cert.der().to_vec(),
            key_der: key.serialize_der(),
        }
    }

    /// Package this leaf (plus an optional CA) as a PKCS#12 archive.
    pub fn archive(&self, ca: Option<&[u8]>, passphrase: &str) -> Vec<u8> {
        let mut chain = vec![p12_keystore::Certificate::from_der(&self.cert_der).expect("leaf")];
        if let Some(ca) = ca {
            chain.push(p12_keystore::Certificate::from_der(ca).expect("ca"));
        }
        let mut store = p12_keystore::KeyStore::new();
        store.add_entry(
            "client",
            p12_keystore::KeyStoreEntry::PrivateKeyChain(p12_keystore::PrivateKeyChain::new(
                &self.key_der,
                b"client",
                chain,
            )),
        );
        store.writer(passphrase).write().expect("pkcs12 build")
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

/// Server config that demands a client certificate issued by `client_ca`.
pub fn server_config(server: &Leaf, client_ca: &[u8]) -> Arc<rustls::ServerConfig> {
    config_with_client_auth(server, client_ca, true)
}

/// Server config that asks for a client certificate but accepts clients
/// that send none.
pub fn optional_client_auth_config(server: &Leaf, client_ca: &[u8]) -> Arc<rustls::ServerConfig> {
    config_with_client_auth(server, client_ca, false)
}

fn config_with_client_auth(
    server: &Leaf,
    client_ca: &[u8],
    required: bool,
) -> Arc<rustls::ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(client_ca.to_vec()))
        .expect("client ca");
    let builder = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone());
    let builder = if required {
        builder
    } else {
        builder.allow_unauthenticated()
    };
    let client_verifier = builder.build().expect("client verifier");

    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("versions")
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(
            vec![CertificateDer::from(server.cert_der.clone())],
            server.private_key(),
        )
        .expect("server cert");

    Arc::new(config)
}

/// Shuttle TLS records between the two in-memory peers until neither has
/// anything left to send, or one side fails.
pub fn pump(
    client: &mut ClientConnection,
    server: &mut ServerConnection,
) -> Result<(), rustls::Error> {
    loop {
        let mut progressed = false;

        while client.wants_write() {
            let mut buf = Vec::new();
            client.write_tls(&mut buf).expect("client write_tls");
            server.read_tls(&mut buf.as_slice()).expect("server read_tls");
            server.process_new_packets()?;
            progressed = true;
        }

        while server.wants_write() {
            let mut buf = Vec::new();
            server.write_tls(&mut buf).expect("server write_tls");
            client.read_tls(&mut buf.as_slice()).expect("client read_tls");
            client.process_new_packets()?;
            progressed = true;
        }

        if !progressed {
            return Ok(());
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_test_writer()
        .try_init();
}
