//! BrowserAutomationBackend: print through the DevTools protocol.
//!
//! ## How it works
//!
//! A headless Chrome/Chromium is launched with `chromiumoxide`, a blank page
//! is opened, the rewritten HTML is injected with `document.write` (the
//! document itself is never fetched; absolute sub-resources are), and
//! `Page.printToPDF` returns the PDF bytes straight over the websocket. No
//! temporary files are involved apart from the browser profile directory.
//!
//! ## Pooling
//!
//! Browser startup dominates latency. With [`BrowserSettings::reuse_browser`]
//! one browser is launched lazily and kept; every render opens its own page
//! in it, so independent renders proceed concurrently while each page only
//! ever carries one render. Without pooling each render launches and closes
//! its own browser.
//!
//! ## Cancellation
//!
//! A render future dropped at its deadline drops its [`PageGuard`], which
//! closes the page in the background, and (unpooled) its [`BrowserSession`],
//! whose child process is killed on drop and whose event-loop task is
//! aborted. Nothing outlives the render.

use crate::backend::locate::{BrowserLocator, SystemBrowserLocator};
use crate::backend::{ensure_pdf_signature, BackendKind, RenderBackend};
use crate::config::{BrowserSettings, RenderOptions};
use crate::error::RenderError;
use crate::pipeline::artifacts::ArtifactScope;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const KIND: BackendKind = BackendKind::BrowserAutomation;

/// Renders with `Page.printToPDF` over the DevTools protocol.
pub struct BrowserAutomationBackend {
    settings: BrowserSettings,
    locator: Arc<dyn BrowserLocator>,
    pool: Mutex<Option<BrowserSession>>,
}

impl BrowserAutomationBackend {
    /// Locate the browser from `settings.executable` or the system.
    pub fn new(settings: BrowserSettings) -> Self {
        let locator = Arc::new(SystemBrowserLocator::new(settings.executable.clone()));
        Self::with_locator(settings, locator)
    }

    pub fn with_locator(settings: BrowserSettings, locator: Arc<dyn BrowserLocator>) -> Self {
        Self {
            settings,
            locator,
            pool: Mutex::new(None),
        }
    }

    /// Close the pooled browser, if one is running.
    pub async fn shutdown(&self) {
        if let Some(session) = self.pool.lock().await.take() {
            session.close().await;
        }
    }

    /// A fresh page, plus the browser that owns it when not pooled.
    async fn open_page(&self) -> Result<(PageGuard, Option<BrowserSession>), RenderError> {
        if self.settings.reuse_browser {
            let mut pool = self.pool.lock().await;
            if pool.is_none() {
                *pool = Some(BrowserSession::launch(&self.settings, self.locator.as_ref()).await?);
            }
            let session = pool.as_ref().ok_or_else(|| RenderError::RenderProcessFailure {
                backend: KIND,
                detail: "browser pool is empty".into(),
            })?;
            match session.new_page().await {
                Ok(page) => Ok((page, None)),
                Err(e) => {
                    // A dead pooled browser is replaced on the next render.
                    if let Some(dead) = pool.take() {
                        dead.close().await;
                    }
                    Err(e)
                }
            }
        } else {
            let session = BrowserSession::launch(&self.settings, self.locator.as_ref()).await?;
            let page = session.new_page().await?;
            Ok((page, Some(session)))
        }
    }
}

#[async_trait]
impl RenderBackend for BrowserAutomationBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        _artifacts: &ArtifactScope,
    ) -> Result<Vec<u8>, RenderError> {
        let start = Instant::now();
        let (mut page, session) = self.open_page().await?;

        let result = print_page(page.page()?, html, options, start).await;

        page.close().await;
        if let Some(session) = session {
            session.close().await;
        }

        let pdf = result?;
        ensure_pdf_signature(KIND, &pdf)?;
        info!(
            "Printed {} bytes over CDP in {}ms",
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(pdf)
    }
}

async fn print_page(
    page: &Page,
    html: &str,
    options: &RenderOptions,
    start: Instant,
) -> Result<Vec<u8>, RenderError> {
    page.set_content(html)
        .await
        .map_err(|e| cdp_error(e, start))?;
    debug!("Content loaded after {}ms", start.elapsed().as_millis());

    page.pdf(print_params(options))
        .await
        .map_err(|e| cdp_error(e, start))
}

/// `Page.printToPDF` parameters for `options`.
///
/// Paper dimensions stay portrait; the `landscape` flag rotates them.
pub(crate) fn print_params(options: &RenderOptions) -> PrintToPdfParams {
    let (width, height) = options.page_format.size_inches();
    let (top, right, bottom, left) = options.margins_inches();

    let mut builder = PrintToPdfParams::builder()
        .landscape(options.landscape)
        .print_background(options.print_background)
        .paper_width(width)
        .paper_height(height)
        .margin_top(top)
        .margin_right(right)
        .margin_bottom(bottom)
        .margin_left(left)
        .prefer_css_page_size(false)
        .display_header_footer(options.display_header_footer);

    if options.display_header_footer {
        builder = builder
            .header_template(options.header_template_or_default())
            .footer_template(options.footer_template_or_default());
    }
    builder.build()
}

fn cdp_error(e: CdpError, start: Instant) -> RenderError {
    match e {
        CdpError::Timeout => RenderError::RenderTimeout {
            backend: KIND,
            elapsed_ms: start.elapsed().as_millis() as u64,
        },
        other => RenderError::RenderProcessFailure {
            backend: KIND,
            detail: other.to_string(),
        },
    }
}

// ── Browser lifetime ─────────────────────────────────────────────────────────

/// A launched browser, its event loop, and its profile directory.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(
        settings: &BrowserSettings,
        locator: &dyn BrowserLocator,
    ) -> Result<Self, RenderError> {
        let executable = locator.locate(KIND)?;
        let profile = tempfile::Builder::new()
            .prefix("html2pdf-cdp-")
            .tempdir()
            .map_err(|e| RenderError::artifact_io(std::env::temp_dir(), e))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .new_headless_mode()
            .user_data_dir(profile.path())
            .launch_timeout(Duration::from_secs(settings.launch_timeout_secs.max(1)))
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .args(settings.extra_args.iter().cloned());
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(|reason| RenderError::BackendUnavailable {
            backend: KIND,
            reason,
        })?;

        debug!("Launching {}", executable.display());
        let (browser, mut handler) = Browser::launch(config).await.map_err(launch_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn new_page(&self) -> Result<PageGuard, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::RenderProcessFailure {
                backend: KIND,
                detail: format!("opening page: {e}"),
            })?;
        Ok(PageGuard(Some(page)))
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close request failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Waiting for browser exit failed: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn launch_error(e: CdpError) -> RenderError {
    match e {
        CdpError::Timeout => RenderError::RenderTimeout {
            backend: KIND,
            elapsed_ms: 0,
        },
        other => RenderError::BackendUnavailable {
            backend: KIND,
            reason: format!("browser failed to start: {other}"),
        },
    }
}

/// Owns one page; closes it in the background if dropped while still open.
struct PageGuard(Option<Page>);

impl PageGuard {
    fn page(&self) -> Result<&Page, RenderError> {
        self.0.as_ref().ok_or_else(|| RenderError::RenderProcessFailure {
            backend: KIND,
            detail: "page already closed".into(),
        })
    }

    async fn close(&mut self) {
        if let Some(page) = self.0.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.0.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::locate::FixedBrowserLocator;
    use crate::config::{Length, LengthUnit, PageFormat};
    use crate::pipeline::artifacts::ArtifactManager;

    #[test]
    fn print_params_carry_options() {
        let options = RenderOptions::builder()
            .page_format(PageFormat::Letter)
            .landscape(true)
            .margin_top(Length::new(1.0, LengthUnit::In))
            .margin_left(Length::new(72.0, LengthUnit::Pt))
            .header_template("<span class=\"title\"></span>")
            .build()
            .unwrap();
        let p = print_params(&options);
        assert_eq!(p.paper_width, Some(8.5));
        assert_eq!(p.paper_height, Some(11.0));
        assert_eq!(p.landscape, Some(true));
        assert_eq!(p.margin_top, Some(1.0));
        assert_eq!(p.margin_left, Some(1.0));
        assert_eq!(p.display_header_footer, Some(true));
        assert_eq!(p.header_template.as_deref(), Some("<span class=\"title\"></span>"));
        assert!(p.footer_template.as_deref().unwrap().contains("totalPages"));
    }

    #[test]
    fn print_params_without_header_footer() {
        let options = RenderOptions::builder()
            .display_header_footer(false)
            .build()
            .unwrap();
        let p = print_params(&options);
        assert_eq!(p.display_header_footer, Some(false));
        assert!(p.header_template.is_none());
        assert!(p.footer_template.is_none());
    }

    #[tokio::test]
    async fn missing_browser_is_unavailable() {
        let backend = BrowserAutomationBackend::with_locator(
            BrowserSettings::default(),
            Arc::new(FixedBrowserLocator::new("/nonexistent/chrome")),
        );
        let scope = ArtifactManager::default().scope();
        let err = backend
            .render("<p>x</p>", &RenderOptions::default(), &scope)
            .await
            .unwrap_err();
        assert!(err.allows_fallback(), "got: {err}");
    }
}
