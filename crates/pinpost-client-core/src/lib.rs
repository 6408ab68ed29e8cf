//! Pinpost client core.
//!
//! Headless engine behind any upload front end:
//!
//! - Named credential resources (PKCS#12 identity, DER anchor)
//! - Single-shot multipart upload over pinned mutual TLS
//! - Balanced scoped access to user-selected files
//! - A status-returning facade for presentation layers

pub mod error;
pub mod file_access;
pub mod resources;
pub mod settings;
pub mod transfer;
pub mod uploader;

pub use error::UploadError;
pub use file_access::{AccessGuard, FileHandle, ScopedAccess};
pub use resources::ResourceBundle;
pub use settings::UploadSettings;
pub use transfer::{UploadOutcome, UploadTransfer};
pub use uploader::{CredentialStatus, SecureUploader, UploadReport};
