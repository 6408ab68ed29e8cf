//! Collaborator facade for a presentation layer.
//!
//! `SecureUploader` keeps the loaded credentials and exposes two calls:
//! `load_credentials` and `perform_upload`. Both return plain status values
//! suitable for display. The UI never touches TLS types directly.
//!
//! Loading the identity and loading the anchor are independent: a failed
//! anchor only disables pinning, a failed identity disables uploads. Upload
//! failures leave the loaded credentials intact for a retry.

use pinpost_proto::identity::{ClientIdentity, PinnedAnchor};
use pinpost_proto::TrustMode;
use tracing::{info, warn};

use crate::error::UploadError;
use crate::file_access::FileHandle;
use crate::resources::ResourceBundle;
use crate::transfer::UploadTransfer;

/// Result of a credential load, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub identity_loaded: bool,
    pub pinning_enabled: bool,
    pub error_detail: Option<String>,
}

/// Result of an upload, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub succeeded: bool,
    pub status_message: String,
}

/// Holds credentials and performs uploads on behalf of a UI.
#[derive(Debug)]
pub struct SecureUploader {
    resources: ResourceBundle,
    transfer: UploadTransfer,
    identity: Option<ClientIdentity>,
    anchor: Option<PinnedAnchor>,
}

impl SecureUploader {
    pub fn new(resources: ResourceBundle) -> Self {
        Self::with_transfer(resources, UploadTransfer::default())
    }

    pub fn with_transfer(resources: ResourceBundle, transfer: UploadTransfer) -> Self {
        Self {
            resources,
            transfer,
            identity: None,
            anchor: None,
        }
    }

    /// (Re)load the identity archive and the anchor by resource name.
    ///
    /// Each credential that fails to load is cleared; the other is kept.
    pub async fn load_credentials(
        &mut self,
        archive_name: &str,
        passphrase: &str,
        anchor_name: &str,
    ) -> CredentialStatus {
        let mut problems = Vec::new();

        match self.resources.load_identity(archive_name, passphrase).await {
            Ok(identity) => {
                info!(subject = %identity.leaf_subject(), "client identity loaded");
                self.identity = Some(identity);
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "client identity not loaded");
                self.identity = None;
                problems.push(format!("identity [{}]: {e}", e.kind()));
            }
        }

        match self.resources.load_anchor(anchor_name).await {
            Ok(anchor) => {
                info!(subject = %anchor.subject(), sha256 = %anchor.fingerprint(), "pinned anchor loaded");
                self.anchor = Some(anchor);
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "anchor not loaded; pinning disabled");
                self.anchor = None;
                problems.push(format!("anchor [{}]: {e}", e.kind()));
            }
        }

        CredentialStatus {
            error_detail: (!problems.is_empty()).then(|| problems.join("; ")),
            ..self.credential_status()
        }
    }

    /// Current capability flags, without error detail.
    pub fn credential_status(&self) -> CredentialStatus {
        CredentialStatus {
            identity_loaded: self.identity.is_some(),
            pinning_enabled: self.anchor.is_some(),
            error_detail: None,
        }
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn anchor(&self) -> Option<&PinnedAnchor> {
        self.anchor.as_ref()
    }

    /// Upload `file` to `target_url`.
    ///
    /// Without a loaded identity no connection is attempted.
    pub async fn perform_upload(&self, file: &FileHandle, target_url: &str) -> UploadReport {
        let Some(identity) = self.identity.as_ref() else {
            return UploadReport {
                succeeded: false,
                status_message: "No client identity loaded; load credentials before uploading"
                    .to_string(),
            };
        };

        match self
            .transfer
            .upload(file, target_url, identity, self.anchor.as_ref())
            .await
        {
            Ok(outcome) => {
                let mut message = format!("Upload succeeded (HTTP {})", outcome.status);
                if !outcome.body.is_empty() {
                    message.push_str(": ");
                    message.push_str(outcome.body.trim());
                }
                if outcome.trust_mode == Some(TrustMode::DefaultRoots) {
                    message.push_str(" [warning: pinning disabled, server trusted via default roots]");
                }
                UploadReport {
                    succeeded: true,
                    status_message: message,
                }
            }
            Err(e) => UploadReport {
                succeeded: false,
                status_message: failure_message(&e),
            },
        }
    }
}

fn failure_message(err: &UploadError) -> String {
    match err {
        UploadError::ServerRejected { status, body } if !body.trim().is_empty() => {
            format!("Upload failed [ServerRejected] HTTP {status}: {}", body.trim())
        }
        UploadError::ServerRejected { status, .. } => {
            format!("Upload failed [ServerRejected] HTTP {status}")
        }
        UploadError::TransportFailure {
            detail,
            trust: Some(trust),
        } => format!("Upload failed [TransportFailure/{}]: {detail}", trust.kind()),
        other => format!("Upload failed [{}]: {other}", other.kind()),
    }
}
