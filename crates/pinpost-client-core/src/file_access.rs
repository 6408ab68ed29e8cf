//! Source files for uploads and scoped access around reading them.
//!
//! Some platforms grant access to user-picked files only between an explicit
//! acquire and release. [`ScopedAccess`] models that pair; [`AccessGuard`]
//! releases on drop, so every exit path (success, error, timeout, or a
//! dropped future) gives back exactly what it took.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, UploadError};

/// Acquire/release hook for files that need scoped permission to read.
pub trait ScopedAccess: Send + Sync {
    /// Start accessing. Returns `false` if access was refused.
    fn acquire(&self) -> bool;

    /// Stop accessing. Called exactly once per successful `acquire`.
    fn release(&self);
}

/// Access hook for files that need no permission scope.
#[derive(Debug, Default)]
pub struct Unscoped;

impl ScopedAccess for Unscoped {
    fn acquire(&self) -> bool {
        true
    }

    fn release(&self) {}
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file to upload: where its bytes come from, the filename sent to the
/// server, and its access hook.
#[derive(Clone)]
pub struct FileHandle {
    source: Source,
    filename: String,
    access: Arc<dyn ScopedAccess>,
}

impl FileHandle {
    /// A file on disk. The upload filename is the path's final component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Self {
            source: Source::Path(path),
            filename,
            access: Arc::new(Unscoped),
        }
    }

    /// In-memory contents sent under `filename`.
    pub fn from_bytes(filename: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        Self {
            source: Source::Memory(contents.into()),
            filename: filename.into(),
            access: Arc::new(Unscoped),
        }
    }

    /// Attach a scoped access hook.
    pub fn with_scoped_access(mut self, access: Arc<dyn ScopedAccess>) -> Self {
        self.access = access;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Acquire access; the returned guard releases it on drop.
    pub fn open_scope(&self) -> Result<AccessGuard> {
        if !self.access.acquire() {
            return Err(UploadError::FileAccess(format!(
                "access to {} was refused",
                self.filename
            )));
        }
        debug!(file = %self.filename, "scoped access acquired");
        Ok(AccessGuard {
            access: Arc::clone(&self.access),
            filename: self.filename.clone(),
        })
    }

    /// Read the full contents. Callers hold an [`AccessGuard`] while reading.
    pub async fn read(&self, _scope: &AccessGuard) -> Result<Vec<u8>> {
        match &self.source {
            Source::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                UploadError::FileAccess(format!("reading {}: {e}", path.display()))
            }),
            Source::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("source", &self.source)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Holds scoped access open; releases it when dropped.
pub struct AccessGuard {
    access: Arc<dyn ScopedAccess>,
    filename: String,
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        self.access.release();
        debug!(file = %self.filename, "scoped access released");
    }
}
