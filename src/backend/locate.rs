//! Resolving the browser executable for the browser-driven backends.
//!
//! The locator either returns a path that exists or fails with
//! `BackendUnavailable`; it never hands back an empty or guessed path for the
//! backend to trip over later.

use crate::backend::BackendKind;
use crate::error::RenderError;
use std::path::{Path, PathBuf};

/// Resolves the installed browser executable.
pub trait BrowserLocator: Send + Sync {
    /// `backend` is only used to label the error.
    fn locate(&self, backend: BackendKind) -> Result<PathBuf, RenderError>;
}

/// Searches the system: optional explicit path, `CHROME_PATH` /
/// `CHROMIUM_PATH`, well-known install locations, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowserLocator {
    explicit: Option<PathBuf>,
}

impl SystemBrowserLocator {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }
}

impl BrowserLocator for SystemBrowserLocator {
    fn locate(&self, backend: BackendKind) -> Result<PathBuf, RenderError> {
        browser_locate::locate_browser(self.explicit.as_deref()).map_err(|e| {
            RenderError::BackendUnavailable {
                backend,
                reason: e.to_string(),
            }
        })
    }
}

/// Always the given path, checked for existence on every call.
#[derive(Debug, Clone)]
pub struct FixedBrowserLocator(PathBuf);

impl FixedBrowserLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl BrowserLocator for FixedBrowserLocator {
    fn locate(&self, backend: BackendKind) -> Result<PathBuf, RenderError> {
        if self.0.is_file() {
            Ok(self.0.clone())
        } else {
            Err(RenderError::BackendUnavailable {
                backend,
                reason: format!("browser executable '{}' does not exist", self.0.display()),
            })
        }
    }
}
