//! Single-shot file upload over a pinned mutual-TLS session.
//!
//! Every call builds its own `MtlsHandshake`, rustls config and reqwest
//! client, uses them for one POST, and drops them on return. Nothing is
//! shared between concurrent uploads except the immutable verifier roots.

use std::sync::Arc;

use pinpost_proto::identity::{ClientIdentity, PinnedAnchor};
use pinpost_proto::tls::config::build_client_tls_config;
use pinpost_proto::tls::handshake::MtlsHandshake;
use pinpost_proto::tls::verifier::TrustPinningVerifier;
use pinpost_proto::TrustMode;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::{info, warn};

use crate::error::{error_chain, Result, UploadError};
use crate::file_access::FileHandle;
use crate::settings::UploadSettings;

/// Form field name carrying the file.
pub const FILE_FIELD: &str = "file";

/// A successful upload: HTTP status in `[200, 300)` and the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub status: u16,
    pub body: String,
    /// Root set the server was trusted under.
    pub trust_mode: Option<TrustMode>,
}

/// Performs uploads with a fixed verifier and timeout settings.
#[derive(Debug, Clone)]
pub struct UploadTransfer {
    verifier: TrustPinningVerifier,
    settings: UploadSettings,
}

impl UploadTransfer {
    pub fn new(verifier: TrustPinningVerifier, settings: UploadSettings) -> Self {
        Self { verifier, settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Upload `file` to `target_url` as a multipart `file` part.
    ///
    /// `identity` and `anchor` are borrowed for the duration of the call.
    /// A server that asks for a client certificate always gets `identity`;
    /// one that does not ask never sees it.
    /// Scoped file access is acquired before reading and released on every
    /// exit path, including timeout and the returned future being dropped.
    pub async fn upload(
        &self,
        file: &FileHandle,
        target_url: &str,
        identity: &ClientIdentity,
        anchor: Option<&PinnedAnchor>,
    ) -> Result<UploadOutcome> {
        self.settings.validate()?;
        let url = parse_target(target_url)?;

        let scope = file.open_scope()?;
        let attempt = async {
            let contents = file.read(&scope).await?;
            self.send(&url, file.filename(), &contents, identity, anchor)
                .await
        };

        let result = match tokio::time::timeout(self.settings.resource_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::transport(format!(
                "resource timeout of {:?} elapsed",
                self.settings.resource_timeout
            ))),
        };
        drop(scope);

        match &result {
            Ok(outcome) => info!(url = %url, status = outcome.status, "upload succeeded"),
            Err(e) => warn!(url = %url, kind = e.kind(), error = %e, "upload failed"),
        }
        result
    }

    async fn send(
        &self,
        url: &Url,
        filename: &str,
        contents: &[u8],
        identity: &ClientIdentity,
        anchor: Option<&PinnedAnchor>,
    ) -> Result<UploadOutcome> {
        let handshake = Arc::new(MtlsHandshake::new(Some(identity), anchor, self.verifier.clone()));
        let tls = build_client_tls_config(Arc::clone(&handshake))?;

        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .https_only(true)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(self.settings.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| UploadError::transport(format!("HTTP client setup: {}", error_chain(&e))))?;

        let part = Part::bytes(contents.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| UploadError::InvalidRequest(format!("file part: {}", error_chain(&e))))?;
        let form = Form::new().part(FILE_FIELD, part);
        info!(
            url = %url,
            file = %filename,
            bytes = contents.len(),
            pinned = anchor.is_some(),
            "starting upload"
        );

        let response = client
            .post(url.clone())
            .timeout(self.settings.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_failure(&e, &handshake))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| transport_failure(&e, &handshake))?;

        classify(status, text, handshake.trust_mode())
    }
}

impl Default for UploadTransfer {
    fn default() -> Self {
        Self::new(TrustPinningVerifier::new(), UploadSettings::default())
    }
}

fn parse_target(target_url: &str) -> Result<Url> {
    let url = Url::parse(target_url)
        .map_err(|e| UploadError::InvalidRequest(format!("{target_url:?}: {e}")))?;
    if url.scheme() != "https" {
        return Err(UploadError::InvalidRequest(format!(
            "{target_url:?}: only https URLs are supported"
        )));
    }
    if url.host().is_none() {
        return Err(UploadError::InvalidRequest(format!(
            "{target_url:?}: URL has no host"
        )));
    }
    Ok(url)
}

fn transport_failure(err: &reqwest::Error, handshake: &MtlsHandshake) -> UploadError {
    let trust = handshake.trust_failure();
    let detail = match &trust {
        Some(t) => format!("handshake cancelled: {} ({})", t, t.kind()),
        None if err.is_timeout() => format!("request timed out: {}", error_chain(err)),
        None => error_chain(err),
    };
    UploadError::TransportFailure { detail, trust }
}

fn classify(status: u16, body: String, trust_mode: Option<TrustMode>) -> Result<UploadOutcome> {
    if (200..300).contains(&status) {
        Ok(UploadOutcome {
            status,
            body,
            trust_mode,
        })
    } else {
        Err(UploadError::ServerRejected { status, body })
    }
}
