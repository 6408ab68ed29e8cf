//! Named resource lookup for credential files.
//!
//! Credentials are addressed by plain file name inside one root directory
//! (e.g. `ios-client.p12`, `rootCA.der`). Names that would escape the root
//! are treated as missing.

use std::io;
use std::path::{Path, PathBuf};

use pinpost_proto::identity::{self, ClientIdentity, PinnedAnchor};
use pinpost_proto::LoadError;
use tracing::debug;

/// A directory of named credential resources.
#[derive(Debug, Clone)]
pub struct ResourceBundle {
    root: PathBuf,
}

impl ResourceBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `name`, or `None` if the name is not a plain file name.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        plain.then(|| self.root.join(name))
    }

    /// Read the raw bytes of a named resource.
    pub async fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("invalid resource name {name:?}"))
        })?;
        debug!(path = %path.display(), "reading resource");
        tokio::fs::read(&path).await
    }

    /// Load and decode the identity archive named `name`.
    pub async fn load_identity(
        &self,
        name: &str,
        passphrase: &str,
    ) -> Result<ClientIdentity, LoadError> {
        let bytes = self
            .read(name)
            .await
            .map_err(|e| LoadError::ArchiveNotFound(format!("{name}: {e}")))?;
        identity::load_identity(&bytes, passphrase)
    }

    /// Load and parse the anchor certificate named `name`.
    pub async fn load_anchor(&self, name: &str) -> Result<PinnedAnchor, LoadError> {
        let bytes = self
            .read(name)
            .await
            .map_err(|e| LoadError::AnchorNotFound(format!("{name}: {e}")))?;
        identity::load_anchor(&bytes)
    }
}
