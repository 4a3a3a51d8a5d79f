//! BrowserCliBackend: print through a headless browser child process.
//!
//! ## How it works
//!
//! 1. The rewritten HTML, with an injected `@page` stylesheet, is written to
//!    an `InputHtml` artifact.
//! 2. The browser is started with `--headless --print-to-pdf=<OutputPdf>`
//!    pointing at the artifact's `file://` URL and a throwaway profile dir.
//! 3. After a zero exit status the output artifact is read back and checked
//!    for the PDF signature.
//!
//! ## Why inject CSS?
//!
//! The print-to-pdf switch has no flags for paper size, margins, or
//! header/footer templates. CSS paged media covers all of them: `@page`
//! carries size and margins, and the `@top-center` / `@bottom-center` margin
//! boxes carry header and footer text, with `counter(page)` and
//! `counter(pages)` standing in for the page placeholders. The browser's own
//! date/URL header is switched off so only the requested one appears.
//!
//! The child is spawned with `kill_on_drop`, so a render abandoned at its
//! deadline takes the browser process down with it.

use crate::backend::locate::{BrowserLocator, SystemBrowserLocator};
use crate::backend::{ensure_pdf_signature, BackendKind, RenderBackend};
use crate::config::{BrowserSettings, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::artifacts::{ArtifactHandle, ArtifactKind, ArtifactScope};
use crate::templates::{document_title, Template, TemplateContext};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

const KIND: BackendKind = BackendKind::BrowserCli;

/// Renders by running the browser's own `--print-to-pdf` mode.
pub struct BrowserCliBackend {
    settings: BrowserSettings,
    locator: Arc<dyn BrowserLocator>,
}

impl BrowserCliBackend {
    /// Locate the browser from `settings.executable` or the system.
    pub fn new(settings: BrowserSettings) -> Self {
        let locator = Arc::new(SystemBrowserLocator::new(settings.executable.clone()));
        Self::with_locator(settings, locator)
    }

    pub fn with_locator(settings: BrowserSettings, locator: Arc<dyn BrowserLocator>) -> Self {
        Self { settings, locator }
    }
}

#[async_trait]
impl RenderBackend for BrowserCliBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    fn required_artifacts(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::InputHtml, ArtifactKind::OutputPdf]
    }

    async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        artifacts: &ArtifactScope,
    ) -> Result<Vec<u8>, RenderError> {
        let executable = self.locator.locate(KIND)?;
        let input = artifact(artifacts, ArtifactKind::InputHtml)?;
        let output = artifact(artifacts, ArtifactKind::OutputPdf)?;

        let input_url = file_url(&input.path)?;
        let document = prepare_document(html, options, input_url.as_str());
        artifacts.write(&input, document.as_bytes())?;

        // Dropped (and deleted) on every exit path, including cancellation.
        let profile = tempfile::Builder::new()
            .prefix("html2pdf-profile-")
            .tempdir()
            .map_err(|e| RenderError::artifact_io(std::env::temp_dir(), e))?;

        let args = build_args(&self.settings, profile.path(), &output.path, input_url.as_str());
        debug!("Launching {} {:?}", executable.display(), args);

        let start = Instant::now();
        let child = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&executable, e))?;

        let result = child
            .wait_with_output()
            .await
            .map_err(|e| RenderError::RenderProcessFailure {
                backend: KIND,
                detail: format!("waiting for browser: {e}"),
            })?;

        if !result.status.success() {
            return Err(RenderError::RenderProcessFailure {
                backend: KIND,
                detail: format!(
                    "browser exited with {}: {}",
                    result.status,
                    stderr_tail(&result.stderr)
                ),
            });
        }

        let pdf = artifacts.read(&output)?;
        ensure_pdf_signature(KIND, &pdf)?;
        info!(
            "Browser printed {} bytes in {}ms",
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(pdf)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Use the artifact the pipeline acquired, or acquire one when the backend
/// is driven directly.
fn artifact(scope: &ArtifactScope, kind: ArtifactKind) -> Result<ArtifactHandle, RenderError> {
    match scope.get(kind) {
        Some(handle) => Ok(handle),
        None => scope.acquire(kind),
    }
}

fn file_url(path: &Path) -> Result<Url, RenderError> {
    let absolute = std::path::absolute(path).map_err(|e| RenderError::artifact_io(path, e))?;
    Url::from_file_path(&absolute).map_err(|()| {
        RenderError::artifact_io(
            &absolute,
            io::Error::new(io::ErrorKind::InvalidInput, "cannot express path as a file:// URL"),
        )
    })
}

fn spawn_error(executable: &Path, e: io::Error) -> RenderError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            RenderError::BackendUnavailable {
                backend: KIND,
                reason: format!("cannot execute '{}': {e}", executable.display()),
            }
        }
        _ => RenderError::RenderProcessFailure {
            backend: KIND,
            detail: format!("failed to start '{}': {e}", executable.display()),
        },
    }
}

/// Command-line switches for one print job.
pub(crate) fn build_args(
    settings: &BrowserSettings,
    profile_dir: &Path,
    output: &Path,
    input_url: &str,
) -> Vec<String> {
    let mut args = vec![
        "--headless=new".to_string(),
        "--disable-gpu".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--hide-scrollbars".to_string(),
        "--no-pdf-header-footer".to_string(),
        "--print-to-pdf-no-header".to_string(),
        format!("--user-data-dir={}", profile_dir.display()),
    ];
    if settings.no_sandbox {
        args.push("--no-sandbox".to_string());
    }
    args.extend(settings.extra_args.iter().cloned());
    args.push(format!("--print-to-pdf={}", output.display()));
    args.push(input_url.to_string());
    args
}

static RE_HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static RE_BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body\b").unwrap());
static RE_DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*<!doctype[^>]*>").unwrap());

/// The document with the print stylesheet injected where it wins the cascade
/// (end of `<head>`), or as early as is valid when there is no head.
pub(crate) fn prepare_document(html: &str, options: &RenderOptions, url: &str) -> String {
    let style = page_stylesheet(html, options, url);

    let at = RE_HEAD_CLOSE
        .find(html)
        .or_else(|| RE_BODY_OPEN.find(html))
        .map(|m| m.start())
        .or_else(|| RE_DOCTYPE.find(html).map(|m| m.end()))
        .unwrap_or(0);

    let mut out = String::with_capacity(html.len() + style.len());
    out.push_str(&html[..at]);
    out.push_str(&style);
    out.push_str(&html[at..]);
    out
}

fn page_stylesheet(html: &str, options: &RenderOptions, url: &str) -> String {
    let (width, height) = options.paper_size_inches();
    let mut css = format!(
        "<style data-html2pdf>\n@page {{\n  size: {width}in {height}in;\n  margin: {} {} {} {};\n",
        options.margin_top, options.margin_right, options.margin_bottom, options.margin_left
    );

    if options.display_header_footer {
        let ctx = TemplateContext::for_document(document_title(html).unwrap_or_default(), url);
        for (box_name, markup) in [
            ("top-center", options.header_template_or_default()),
            ("bottom-center", options.footer_template_or_default()),
        ] {
            let template = Template::parse(markup);
            css.push_str(&format!(
                "  @{box_name} {{ content: {}; font-family: Helvetica, Arial, sans-serif; font-size: {}pt; }}\n",
                template.css_content(&ctx),
                template.font_size_pt
            ));
        }
    }
    css.push_str("}\n");

    if options.print_background {
        css.push_str("html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }\n");
    }
    css.push_str("</style>\n");
    css
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(no output on stderr)".to_string();
    }
    let start = trimmed
        .char_indices()
        .rev()
        .nth(499)
        .map_or(0, |(i, _)| i);
    trimmed[start..].to_string()
}
