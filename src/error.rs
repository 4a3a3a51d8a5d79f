//! Error types for the edgequake-html2pdf library.
//!
//! Every fatal outcome of a render is a [`RenderError`]. The variants fall
//! into four kinds that callers actually branch on, exposed through
//! [`RenderError::kind`]:
//!
//! * **Unavailable**: the chosen backend cannot run here at all (no browser
//!   installed, binary not executable). A fallback policy may move on to the
//!   next backend.
//! * **Timeout**: the backend did not finish before the deadline. All of its
//!   resources have already been torn down when this is returned.
//! * **ProcessFailure**: the backend ran but crashed, exited non-zero, or
//!   produced something that is not a PDF.
//! * **IoFailure**: a temporary artifact or the output file could not be
//!   written, read, or removed.
//!
//! Rewriting never fails: malformed markup passes through unchanged, so there
//! is no error variant for it.

use crate::backend::BackendKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-html2pdf library.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Backend errors ────────────────────────────────────────────────────
    /// Required executable or runtime is missing.
    #[error("Render backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    /// The render did not complete before the deadline.
    #[error("Render with '{backend}' timed out after {elapsed_ms}ms\nIncrease --timeout or simplify the document.")]
    RenderTimeout { backend: BackendKind, elapsed_ms: u64 },

    /// The backend crashed, exited non-zero, or returned invalid output.
    #[error("Render backend '{backend}' failed: {detail}")]
    RenderProcessFailure { backend: BackendKind, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A temporary artifact could not be created, written, read, or deleted.
    #[error("Temporary artifact I/O failed for '{path}': {source}")]
    ArtifactIoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input / config errors ─────────────────────────────────────────────
    /// Render options could not be interpreted (bad length, unknown format).
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Internal errors ───────────────────────────────────────────────────
    /// Runtime or task plumbing failed (e.g. no tokio runtime could be built).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`RenderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderErrorKind {
    Unavailable,
    Timeout,
    ProcessFailure,
    IoFailure,
    InvalidInput,
    Internal,
}

impl RenderError {
    /// Which of the coarse failure kinds this error belongs to.
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            RenderError::BackendUnavailable { .. } => RenderErrorKind::Unavailable,
            RenderError::RenderTimeout { .. } => RenderErrorKind::Timeout,
            RenderError::RenderProcessFailure { .. } => RenderErrorKind::ProcessFailure,
            RenderError::ArtifactIoFailure { .. } | RenderError::OutputWriteFailed { .. } => {
                RenderErrorKind::IoFailure
            }
            RenderError::InvalidOptions(_) | RenderError::InvalidConfig(_) => {
                RenderErrorKind::InvalidInput
            }
            RenderError::Internal(_) => RenderErrorKind::Internal,
        }
    }

    /// The backend that produced this error, if any.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            RenderError::BackendUnavailable { backend, .. }
            | RenderError::RenderTimeout { backend, .. }
            | RenderError::RenderProcessFailure { backend, .. } => Some(*backend),
            _ => None,
        }
    }

    /// `true` when retrying the same backend could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            RenderErrorKind::Timeout | RenderErrorKind::ProcessFailure
        )
    }

    /// `true` when a fallback policy should try the next backend.
    ///
    /// Only a missing backend qualifies: a backend that ran and failed has
    /// already consumed the caller's time budget and says something about the
    /// document, not the environment.
    pub fn allows_fallback(&self) -> bool {
        self.kind() == RenderErrorKind::Unavailable
    }

    pub(crate) fn artifact_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::ArtifactIoFailure {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display() {
        let e = RenderError::BackendUnavailable {
            backend: BackendKind::BrowserCli,
            reason: "no chrome on PATH".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("browser-cli"), "got: {msg}");
        assert!(msg.contains("no chrome on PATH"));
        assert_eq!(e.kind(), RenderErrorKind::Unavailable);
        assert!(e.allows_fallback());
        assert!(!e.is_retryable());
    }

    #[test]
    fn timeout_display() {
        let e = RenderError::RenderTimeout {
            backend: BackendKind::BrowserAutomation,
            elapsed_ms: 5000,
        };
        assert!(e.to_string().contains("5000ms"));
        assert!(e.is_retryable());
        assert!(!e.allows_fallback());
        assert_eq!(e.backend(), Some(BackendKind::BrowserAutomation));
    }

    #[test]
    fn process_failure_display() {
        let e = RenderError::RenderProcessFailure {
            backend: BackendKind::LayoutEngine,
            detail: "exit status 3".into(),
        };
        assert!(e.to_string().contains("layout-engine"));
        assert!(e.to_string().contains("exit status 3"));
        assert_eq!(e.kind(), RenderErrorKind::ProcessFailure);
    }

    #[test]
    fn artifact_io_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = RenderError::artifact_io("/tmp/x.html", io);
        assert!(e.to_string().contains("/tmp/x.html"));
        assert!(std::error::Error::source(&e).is_some());
        assert_eq!(e.kind(), RenderErrorKind::IoFailure);
        assert_eq!(e.backend(), None);
    }

    #[test]
    fn invalid_options_is_input_kind() {
        let e = RenderError::InvalidOptions("bad length '12furlongs'".into());
        assert_eq!(e.kind(), RenderErrorKind::InvalidInput);
        assert!(e.to_string().contains("12furlongs"));
    }
}
