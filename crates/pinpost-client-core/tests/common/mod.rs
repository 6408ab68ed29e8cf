//! Shared fixtures: throwaway PKI, a credential directory, a counting access
//! hook, and an in-process HTTPS server that asks for a client certificate.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pinpost_client_core::ScopedAccess;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

pub const PASSPHRASE: &str = "ios-client-passphrase";
pub const ARCHIVE_NAME: &str = "ios-client.p12";
pub const ANCHOR_NAME: &str = "rootCA.der";

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

/// One CA issuing both the server certificate (for `127.0.0.1`) and the
/// client identity, written to a credential directory under the usual names.
pub struct Pki {
    pub ca: TestCa,
    pub server: Leaf,
    pub client: Leaf,
    pub dir: tempfile::TempDir,
}

impl Pki {
    pub fn new() -> Self {
        let ca = TestCa::new("Pinpost Test Root");
        let server = ca.issue("upload.test", &["127.0.0.1"]);
        let client = ca.issue("ios-client", &[]);

        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(ARCHIVE_NAME),
            client.archive(Some(ca.der()), PASSPHRASE),
        )
        .expect("write archive");
        std::fs::write(dir.path().join(ANCHOR_NAME), ca.der()).expect("write anchor");

        Self {
            ca,
            server,
            client,
            dir,
        }
    }

    pub fn bundle(&self) -> pinpost_client_core::ResourceBundle {
        pinpost_client_core::ResourceBundle::new(self.dir.path())
    }

    /// Server config presenting `server` and requiring a client certificate
    /// from this PKI's CA.
    pub fn server_config(&self, server: &Leaf) -> Arc<rustls::ServerConfig> {
        self.config_with_client_auth(server, true)
    }

    /// Like [`Pki::server_config`], but clients without a certificate are
    /// let through.
    pub fn optional_client_auth_config(&self, server: &Leaf) -> Arc<rustls::ServerConfig> {
        self.config_with_client_auth(server, false)
    }

    fn config_with_client_auth(&self, server: &Leaf, required: bool) -> Arc<rustls::ServerConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots
            .add(CertificateDer::from(self.ca.der().to_vec()))
            .expect("client ca");
        let builder =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone());
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
}

/// Access hook counting acquire and release calls.
#[derive(Debug, Default)]
pub struct CountingAccess {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingAccess {
    pub fn counts(&self) -> (usize, usize) {
        (
            self.acquired.load(Ordering::SeqCst),
            self.released.load(Ordering::SeqCst),
        )
    }
}

impl ScopedAccess for CountingAccess {
    fn acquire(&self) -> bool {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// How the test server answers a complete request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16, &'static str),
    /// Read the request, then never answer.
    Hang,
}

/// A request the server read in full.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct ServerState {
    handshakes: AtomicUsize,
    client_certificates: Mutex<Vec<Option<Vec<u8>>>>,
    requests: Mutex<Vec<ReceivedRequest>>,
}

/// Minimal HTTP/1.1-over-mTLS server on `127.0.0.1:0`.
pub struct TestServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: Arc<rustls::ServerConfig>, reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let acceptor = TlsAcceptor::from(config);
        let state = Arc::new(ServerState::default());

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let acceptor = acceptor.clone();
                let state = Arc::clone(&shared);
                tokio::spawn(async move {
                    // A failed handshake never reaches the HTTP layer.
                    let Ok(mut tls) = acceptor.accept(tcp).await else {
                        return;
                    };
                    state.handshakes.fetch_add(1, Ordering::SeqCst);
                    let peer = tls
                        .get_ref()
                        .1
                        .peer_certificates()
                        .and_then(|certs| certs.first())
                        .map(|cert| cert.as_ref().to_vec());
                    state
                        .client_certificates
                        .lock()
                        .expect("client certificates")
                        .push(peer);

                    let Some(request) = read_request(&mut tls).await else {
                        return;
                    };
                    state.requests.lock().expect("requests").push(request);

                    match reply {
                        Reply::Status(code, body) => {
                            let response = format!(
                                "HTTP/1.1 {code} Test\r\n\
                                 Content-Type: text/plain\r\n\
                                 Content-Length: {}\r\n\
                                 Connection: close\r\n\
                                 \r\n\
                                 {body}",
                                body.len()
                            );
                            let _ = tls.write_all(response.as_bytes()).await;
                            let _ = tls.shutdown().await;
                        }
                        Reply::Hang => {
                            tokio::time::sleep(Duration::from_secs(3600)).await;
                        }
                    }
                });
            }
        });

        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("https://{}/upload", self.addr)
    }

    /// Connections that completed the TLS handshake.
    pub fn handshakes(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    /// Leaf client certificate of each completed handshake, if one was sent.
    pub fn client_certificates(&self) -> Vec<Option<Vec<u8>>> {
        self.state
            .client_certificates
            .lock()
            .expect("client certificates")
            .clone()
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().expect("requests").clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request<S>(stream: &mut S) -> Option<ReceivedRequest>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(ReceivedRequest {
        head,
        body: buf[head_end..head_end + content_length].to_vec(),
    })
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_test_writer()
        .try_init();
}
