//! Temporary artifacts: scoped, uniquely named files owned by one render.
//!
//! ## Why scopes?
//!
//! The browser CLI backend needs real files (the input HTML it navigates to,
//! the PDF it prints into). Those files must disappear on every exit path of
//! the render: success, backend failure, timeout, and a caller dropping the
//! future mid-flight. An [`ArtifactScope`] records every artifact it hands out
//! and deletes whatever is still alive when it is released or dropped, so
//! cleanup does not depend on each error branch remembering to do it.
//!
//! ## Why inject the id generator and the store?
//!
//! Names come from a [`UniqueIdGenerator`] (random UUIDs by default) so
//! concurrent renders never share a path, and tests can substitute a
//! deterministic generator. File operations go through a [`TempFileStore`]
//! so tests can point the store at a private directory and assert it is empty
//! afterwards.

use crate::error::RenderError;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// What an artifact holds; decides its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Rewritten HTML handed to a browser process.
    InputHtml,
    /// PDF written by a browser process.
    OutputPdf,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::InputHtml => "html",
            ArtifactKind::OutputPdf => "pdf",
        }
    }
}

/// A live artifact: where it is and what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

// ── Collaborators ────────────────────────────────────────────────────────────

/// Produces collision-free identifiers for artifact names.
pub trait UniqueIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs, hyphen-free.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl UniqueIdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Create/write/read/delete a named temporary file.
///
/// Methods are synchronous: artifacts are small, and deletion has to be
/// callable from `Drop`.
pub trait TempFileStore: Send + Sync {
    /// Create a new, empty file called `name`. Fails if it already exists.
    fn create(&self, name: &str) -> io::Result<PathBuf>;
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// A [`TempFileStore`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirTempStore {
    root: PathBuf,
}

impl DirTempStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the system temporary directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TempFileStore for DirTempStore {
    fn create(&self, name: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

// ── Manager ──────────────────────────────────────────────────────────────────

/// Hands out one [`ArtifactScope`] per render.
#[derive(Clone)]
pub struct ArtifactManager {
    store: Arc<dyn TempFileStore>,
    ids: Arc<dyn UniqueIdGenerator>,
}

impl Default for ArtifactManager {
    fn default() -> Self {
        Self::new(Arc::new(DirTempStore::system()), Arc::new(UuidGenerator))
    }
}

impl std::fmt::Debug for ArtifactManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactManager").finish_non_exhaustive()
    }
}

impl ArtifactManager {
    pub fn new(store: Arc<dyn TempFileStore>, ids: Arc<dyn UniqueIdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Start a scope for one render.
    pub fn scope(&self) -> ArtifactScope {
        ArtifactScope {
            store: Arc::clone(&self.store),
            ids: Arc::clone(&self.ids),
            live: Mutex::new(Vec::new()),
        }
    }
}

/// The artifacts of one render. Anything still alive is deleted on
/// [`release_all`](Self::release_all) or drop.
pub struct ArtifactScope {
    store: Arc<dyn TempFileStore>,
    ids: Arc<dyn UniqueIdGenerator>,
    live: Mutex<Vec<ArtifactHandle>>,
}

impl ArtifactScope {
    /// Create a new, empty artifact of `kind` under a fresh unique name.
    pub fn acquire(&self, kind: ArtifactKind) -> Result<ArtifactHandle, RenderError> {
        let name = format!("html2pdf-{}.{}", self.ids.next_id(), kind.extension());
        let path = self
            .store
            .create(&name)
            .map_err(|e| RenderError::artifact_io(&name, e))?;
        debug!("Acquired {:?} artifact {}", kind, path.display());

        let handle = ArtifactHandle { kind, path };
        self.lock().push(handle.clone());
        Ok(handle)
    }

    /// The first live artifact of `kind`, if one was acquired.
    pub fn get(&self, kind: ArtifactKind) -> Option<ArtifactHandle> {
        self.lock().iter().find(|h| h.kind == kind).cloned()
    }

    pub fn write(&self, handle: &ArtifactHandle, bytes: &[u8]) -> Result<(), RenderError> {
        self.store
            .write(&handle.path, bytes)
            .map_err(|e| RenderError::artifact_io(&handle.path, e))
    }

    pub fn read(&self, handle: &ArtifactHandle) -> Result<Vec<u8>, RenderError> {
        self.store
            .read(&handle.path)
            .map_err(|e| RenderError::artifact_io(&handle.path, e))
    }

    /// Delete one artifact now.
    pub fn release(&self, handle: &ArtifactHandle) -> Result<(), RenderError> {
        self.lock().retain(|h| h != handle);
        self.store
            .delete(&handle.path)
            .map_err(|e| RenderError::artifact_io(&handle.path, e))?;
        debug!("Released artifact {}", handle.path.display());
        Ok(())
    }

    /// Delete every live artifact. Attempts all of them and reports the first
    /// failure.
    pub fn release_all(&self) -> Result<(), RenderError> {
        let handles = std::mem::take(&mut *self.lock());
        let mut first_err = None;
        for handle in handles {
            match self.store.delete(&handle.path) {
                Ok(()) => debug!("Released artifact {}", handle.path.display()),
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(RenderError::artifact_io(&handle.path, e));
                    } else {
                        warn!("Failed to delete artifact {}: {}", handle.path.display(), e);
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Paths of artifacts not yet released.
    pub fn live_paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|h| h.path.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ArtifactHandle>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        let handles = std::mem::take(&mut *self.lock());
        for handle in handles {
            if let Err(e) = self.store.delete(&handle.path) {
                warn!(
                    "Failed to delete temporary artifact {}: {}",
                    handle.path.display(),
                    e
                );
            }
        }
    }
}
