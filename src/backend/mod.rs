//! Render backends: turn rewritten HTML plus [`RenderOptions`] into PDF bytes.
//!
//! Three strategies implement the same [`RenderBackend`] contract:
//!
//! | Backend | Mechanism | JavaScript | Needs a browser |
//! |---------|-----------|-----------|-----------------|
//! | [`LayoutEngineBackend`] | in-process block layout + PDF writer | no | no |
//! | [`BrowserCliBackend`] | `chrome --headless --print-to-pdf` child process | yes | yes |
//! | `BrowserAutomationBackend` | DevTools protocol, `Page.printToPDF` | yes | yes |
//!
//! All three honour the same options (paper, four margins, header/footer
//! templates and their toggle) so callers can swap one for another and get
//! the same layout intent, not identical pixels.
//!
//! A backend declares which temporary files it needs through
//! [`RenderBackend::required_artifacts`]; the pipeline acquires them in an
//! [`ArtifactScope`] before calling [`RenderBackend::render`] and releases
//! them afterwards whatever the outcome.

use crate::config::{BrowserSettings, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::artifacts::{ArtifactKind, ArtifactScope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "browser")]
pub mod automation;
pub mod cli;
pub mod layout;
pub mod locate;

#[cfg(feature = "browser")]
pub use automation::BrowserAutomationBackend;
pub use cli::BrowserCliBackend;
pub use layout::LayoutEngineBackend;
pub use locate::{BrowserLocator, FixedBrowserLocator, SystemBrowserLocator};

/// First bytes of every PDF file.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Stable identifier of a backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    LayoutEngine,
    BrowserAutomation,
    BrowserCli,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::LayoutEngine => "layout-engine",
            BackendKind::BrowserAutomation => "browser-automation",
            BackendKind::BrowserCli => "browser-cli",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "layout-engine" | "layout" => Ok(BackendKind::LayoutEngine),
            "browser-automation" | "browser" | "cdp" => Ok(BackendKind::BrowserAutomation),
            "browser-cli" | "cli" => Ok(BackendKind::BrowserCli),
            other => Err(RenderError::InvalidConfig(format!(
                "unknown backend '{other}' (expected layout-engine, browser-automation or browser-cli)"
            ))),
        }
    }
}

/// A strategy that renders HTML to PDF bytes.
///
/// Implementations must be `Send + Sync`: one backend instance serves many
/// concurrent renders. A render future may be dropped at any await point
/// (deadline expiry, caller cancellation); implementations must not leave
/// processes or pages behind when that happens.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Temporary files the pipeline should acquire before [`render`](Self::render).
    fn required_artifacts(&self) -> &'static [ArtifactKind] {
        &[]
    }

    /// Render `html` (already rewritten) with `options`.
    ///
    /// `artifacts` holds whatever [`required_artifacts`](Self::required_artifacts)
    /// asked for; the pipeline releases them after this returns.
    async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        artifacts: &ArtifactScope,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Build a boxed backend for `kind`.
///
/// Requesting the automation backend in a build without the `browser`
/// feature yields `BackendUnavailable`, so fallback policies can move on.
pub fn create_backend(
    kind: BackendKind,
    settings: &BrowserSettings,
) -> Result<Box<dyn RenderBackend>, RenderError> {
    match kind {
        BackendKind::LayoutEngine => Ok(Box::new(LayoutEngineBackend::new())),
        BackendKind::BrowserCli => Ok(Box::new(BrowserCliBackend::new(settings.clone()))),
        #[cfg(feature = "browser")]
        BackendKind::BrowserAutomation => {
            Ok(Box::new(BrowserAutomationBackend::new(settings.clone())))
        }
        #[cfg(not(feature = "browser"))]
        BackendKind::BrowserAutomation => Err(RenderError::BackendUnavailable {
            backend: kind,
            reason: "built without the `browser` feature".into(),
        }),
    }
}

/// Reject output that is not a PDF.
pub(crate) fn ensure_pdf_signature(backend: BackendKind, bytes: &[u8]) -> Result<(), RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::RenderProcessFailure {
            backend,
            detail: "backend produced an empty document".into(),
        });
    }
    if !bytes.starts_with(PDF_SIGNATURE) {
        let head: Vec<u8> = bytes.iter().take(8).copied().collect();
        return Err(RenderError::RenderProcessFailure {
            backend,
            detail: format!(
                "output is not a PDF (starts with {:?})",
                String::from_utf8_lossy(&head)
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_strings() {
        for kind in [
            BackendKind::LayoutEngine,
            BackendKind::BrowserAutomation,
            BackendKind::BrowserCli,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!("CLI".parse::<BackendKind>().unwrap(), BackendKind::BrowserCli);
        assert!("wkhtmltopdf".parse::<BackendKind>().is_err());
    }

    #[test]
    fn kind_serialises_kebab_case() {
        let json = serde_json::to_string(&BackendKind::BrowserAutomation).unwrap();
        assert_eq!(json, "\"browser-automation\"");
    }

    #[test]
    fn signature_check() {
        assert!(ensure_pdf_signature(BackendKind::BrowserCli, b"%PDF-1.7\n").is_ok());
        let err = ensure_pdf_signature(BackendKind::BrowserCli, b"<html>").unwrap_err();
        assert!(err.to_string().contains("not a PDF"));
        assert!(ensure_pdf_signature(BackendKind::BrowserCli, b"").is_err());
    }

    #[test]
    fn factory_builds_requested_kind() {
        let settings = BrowserSettings::default();
        for kind in [BackendKind::LayoutEngine, BackendKind::BrowserCli] {
            assert_eq!(create_backend(kind, &settings).unwrap().kind(), kind);
        }
    }

    #[cfg(feature = "browser")]
    #[test]
    fn factory_builds_automation_backend() {
        let backend = create_backend(BackendKind::BrowserAutomation, &BrowserSettings::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::BrowserAutomation);
    }
}
