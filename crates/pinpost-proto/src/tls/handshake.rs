//! The per-connection mTLS handshake state machine.
//!
//! A TLS client handshake raises up to two challenges, in an order chosen by
//! the transport:
//!
//! - `ClientCertificateRequested`: answered with the loaded identity, or
//!   `Cancel` when none was loaded.
//! - `ServerTrustRequested`: delegated to [`TrustPinningVerifier`]; answered
//!   with `UseTrust` or `Cancel`, recording the [`TrustError`] on rejection.
//!
//! A cancelled client certificate request rejects the whole attempt. rustls
//! asks for the client certificate before it verifies the server, so the
//! server trust answer is where the handshake is aborted; the client never
//! reaches `Finished` and no application data is sent.
//!
//! Anything else gets `DefaultHandling`. Each challenge point is answered at
//! most once; a repeated challenge receives the first answer again.
//!
//! [`MtlsHandshake`] is created fresh for every upload and owned by it. The
//! rustls side sees it through [`HandshakeDriver`], which holds an `Arc`
//! to the same state, so pending callbacks can never outlive it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ResolvesClientCert;
use rustls::sign::CertifiedKey;
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, info, warn};

use crate::error::TrustError;
use crate::identity::{ClientIdentity, PinnedAnchor};
use crate::tls::verifier::TrustPinningVerifier;
use crate::trust::TrustMode;

/// A challenge raised by the transport during connection setup.
#[derive(Debug)]
pub enum HandshakeChallenge<'a> {
    ClientCertificateRequested,
    ServerTrustRequested {
        /// Leaf first, followed by any intermediates the server sent.
        presented_chain: &'a [CertificateDer<'a>],
        hostname: &'a ServerName<'a>,
        now: UnixTime,
    },
    /// An authentication method this component does not handle.
    Other(&'a str),
}

/// The single response to one challenge.
#[derive(Clone)]
pub enum Disposition {
    UseIdentity(Arc<CertifiedKey>),
    UseTrust,
    Cancel,
    DefaultHandling,
}

impl std::fmt::Debug for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::UseIdentity(_) => f.write_str("UseIdentity(<identity>)"),
            Disposition::UseTrust => f.write_str("UseTrust"),
            Disposition::Cancel => f.write_str("Cancel"),
            Disposition::DefaultHandling => f.write_str("DefaultHandling"),
        }
    }
}

/// Final decision of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accepted,
    Rejected,
}

/// Observable progress of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No challenge raised yet.
    Idle,
    /// Server trust was accepted; a client certificate request may follow.
    AwaitingClientAuth,
    /// The client certificate request was answered with the identity;
    /// server trust is pending.
    AwaitingServerTrust,
    Resolved(Resolution),
}

#[derive(Debug, Default)]
struct Slots {
    client_auth: Option<bool>,
    server_trust: Option<Result<TrustMode, TrustError>>,
}

/// Per-connection handshake responder.
pub struct MtlsHandshake {
    identity: Option<Arc<CertifiedKey>>,
    anchor: Option<PinnedAnchor>,
    verifier: TrustPinningVerifier,
    slots: Mutex<Slots>,
}

impl MtlsHandshake {
    /// Bind a fresh handshake to borrowed credentials.
    ///
    /// Only a reference-counted handle to the identity's signing material
    /// and a cheap clone of the immutable anchor are retained.
    pub fn new(
        identity: Option<&ClientIdentity>,
        anchor: Option<&PinnedAnchor>,
        verifier: TrustPinningVerifier,
    ) -> Self {
        Self {
            identity: identity.map(ClientIdentity::certified_key),
            anchor: anchor.cloned(),
            verifier,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Answer one challenge.
    pub fn respond(&self, challenge: HandshakeChallenge<'_>) -> Disposition {
        match challenge {
            HandshakeChallenge::ClientCertificateRequested => self.on_client_auth(),
            HandshakeChallenge::ServerTrustRequested {
                presented_chain,
                hostname,
                now,
            } => self.on_server_trust(presented_chain, hostname, now),
            HandshakeChallenge::Other(method) => {
                debug!(method, "unhandled challenge; default handling");
                Disposition::DefaultHandling
            }
        }
    }

    fn on_client_auth(&self) -> Disposition {
        let mut slots = self.lock();
        if slots.client_auth.is_some() {
            debug!("client certificate requested again; repeating first answer");
        }
        slots.client_auth = Some(self.identity.is_some());

        match &self.identity {
            Some(key) => {
                info!("server requested client certificate; presenting identity");
                Disposition::UseIdentity(Arc::clone(key))
            }
            None => {
                warn!("server requested client certificate but no identity is loaded");
                Disposition::Cancel
            }
        }
    }

    fn on_server_trust(
        &self,
        presented_chain: &[CertificateDer<'_>],
        hostname: &ServerName<'_>,
        now: UnixTime,
    ) -> Disposition {
        let mut slots = self.lock();
        let decision = match &slots.server_trust {
            Some(previous) => {
                debug!("server trust requested again; repeating first answer");
                previous.clone()
            }
            None => {
                let decision =
                    self.verifier
                        .verify(presented_chain, hostname, self.anchor.as_ref(), now);
                slots.server_trust = Some(decision.clone());
                decision
            }
        };

        match decision {
            Ok(_) if slots.client_auth == Some(false) => {
                warn!(
                    host = %hostname.to_str(),
                    "aborting handshake: client certificate was requested but no identity is loaded"
                );
                Disposition::Cancel
            }
            Ok(_) => Disposition::UseTrust,
            Err(e) => {
                warn!(host = %hostname.to_str(), kind = e.kind(), error = %e, "server trust rejected");
                Disposition::Cancel
            }
        }
    }

    pub fn state(&self) -> HandshakeState {
        let slots = self.lock();
        match (&slots.server_trust, slots.client_auth) {
            (Some(Err(_)), _) | (_, Some(false)) => HandshakeState::Resolved(Resolution::Rejected),
            (Some(Ok(_)), Some(_)) => HandshakeState::Resolved(Resolution::Accepted),
            (Some(Ok(_)), None) => HandshakeState::AwaitingClientAuth,
            (None, Some(_)) => HandshakeState::AwaitingServerTrust,
            (None, None) => HandshakeState::Idle,
        }
    }

    /// The recorded trust rejection, if the server was rejected.
    pub fn trust_failure(&self) -> Option<TrustError> {
        match &self.lock().server_trust {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// The mode server trust was granted under, once granted.
    pub fn trust_mode(&self) -> Option<TrustMode> {
        match &self.lock().server_trust {
            Some(Ok(mode)) => Some(*mode),
            _ => None,
        }
    }

    /// Whether a client certificate request was cancelled for lack of an
    /// identity.
    pub fn client_auth_cancelled(&self) -> bool {
        self.lock().client_auth == Some(false)
    }

    /// Whether the identity was handed to the transport for a client
    /// certificate request.
    pub fn identity_supplied(&self) -> bool {
        self.lock().client_auth == Some(true)
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn verifier(&self) -> &TrustPinningVerifier {
        &self.verifier
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MtlsHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsHandshake")
            .field("has_identity", &self.identity.is_some())
            .field("anchor", &self.anchor)
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// rustls adapter: turns rustls callbacks into challenges
// ---------------------------------------------------------------------------

/// Plugs an [`MtlsHandshake`] into rustls as both the server certificate
/// verifier and the client certificate resolver.
#[derive(Debug, Clone)]
pub struct HandshakeDriver {
    handshake: Arc<MtlsHandshake>,
}

impl HandshakeDriver {
    pub fn new(handshake: Arc<MtlsHandshake>) -> Self {
        Self { handshake }
    }

    pub fn handshake(&self) -> &Arc<MtlsHandshake> {
        &self.handshake
    }
}

impl ServerCertVerifier for HandshakeDriver {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let mut chain = Vec::with_capacity(1 + intermediates.len());
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        let disposition = self.handshake.respond(HandshakeChallenge::ServerTrustRequested {
            presented_chain: &chain,
            hostname: server_name,
            now,
        });

        match disposition {
            Disposition::UseTrust => Ok(ServerCertVerified::assertion()),
            _ => Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            )),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            self.handshake.verifier().signature_algorithms(),
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            self.handshake.verifier().signature_algorithms(),
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.handshake
            .verifier()
            .signature_algorithms()
            .supported_schemes()
    }
}

impl ResolvesClientCert for HandshakeDriver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        match self
            .handshake
            .respond(HandshakeChallenge::ClientCertificateRequested)
        {
            Disposition::UseIdentity(key) => Some(key),
            _ => None,
        }
    }

    fn has_certs(&self) -> bool {
        self.handshake.has_identity()
    }
}
