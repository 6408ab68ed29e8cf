//! TLS primitives for the pinned mutual-TLS session.
//!
//! - Certificate summaries and fingerprints
//! - Trust evaluation against a single pinned anchor (or default roots)
//! - The per-connection handshake state machine and its rustls adapter
//! - Client config builder

pub mod cert_extract;
pub mod config;
pub mod handshake;
pub mod verifier;
