//! Render entry points: the pipeline and the fallback policy above it.
//!
//! ## One render, one backend
//!
//! [`PdfPipeline`] runs exactly one backend invocation per call:
//!
//! ```text
//! base URL (asked per call) ─▶ rewrite ─▶ acquire artifacts ─▶ backend.render
//!                                                  │                 │
//!                                                  └── release ◀─────┘  (every exit path)
//! ```
//!
//! It never retries and never switches backends on its own. Trying another
//! backend when one is not installed is a policy decision, made by
//! [`render_with_fallback`], which drives the pipeline once per candidate.
//!
//! ## Deadlines
//!
//! The deadline wraps the backend invocation only. When it fires the backend
//! future is dropped, which kills a child process or closes a page, and the
//! artifact scope is released before `RenderTimeout` is returned. Dropping
//! the whole render future from outside has the same effect: the scope's
//! `Drop` deletes whatever is still on disk.
//!
//! ## No ambient runtime
//!
//! Nothing here spawns work at load time or keeps a global runtime.
//! [`render_sync`] builds a private runtime for the duration of one call.

use crate::backend::RenderBackend;
use crate::base_url::{BaseUrlProvider, StaticBaseUrl};
use crate::config::{PipelineConfig, RenderOptions};
use crate::error::RenderError;
use crate::output::{RenderOutput, RenderStats};
use crate::pipeline::artifacts::{ArtifactManager, DirTempStore, UuidGenerator};
use crate::pipeline::rewrite::rewrite_urls_counted;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Rewrites, renders and cleans up; one backend invocation per call.
///
/// Holds no per-render state, so one pipeline can be shared (`&self`)
/// across any number of concurrent renders.
#[derive(Clone)]
pub struct PdfPipeline {
    config: PipelineConfig,
    base_url: Arc<dyn BaseUrlProvider>,
    artifacts: ArtifactManager,
}

impl std::fmt::Debug for PdfPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PdfPipeline {
    /// A pipeline resolving references against `base_url`, with artifacts in
    /// `config.temp_dir` (or the system temp dir) named by random UUIDs.
    pub fn new(base_url: impl BaseUrlProvider + 'static, config: PipelineConfig) -> Self {
        let store = match &config.temp_dir {
            Some(dir) => DirTempStore::new(dir),
            None => DirTempStore::system(),
        };
        Self {
            artifacts: ArtifactManager::new(Arc::new(store), Arc::new(UuidGenerator)),
            base_url: Arc::new(base_url),
            config,
        }
    }

    /// Replace the artifact manager (custom store or id generator).
    pub fn with_artifacts(mut self, artifacts: ArtifactManager) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Render `html` to PDF bytes with `backend`, using the configured deadline.
    pub async fn render(
        &self,
        html: &str,
        options: &RenderOptions,
        backend: &dyn RenderBackend,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(self.render_with_stats(html, options, backend).await?.pdf)
    }

    /// Like [`render`](Self::render), also returning [`RenderStats`].
    pub async fn render_with_stats(
        &self,
        html: &str,
        options: &RenderOptions,
        backend: &dyn RenderBackend,
    ) -> Result<RenderOutput, RenderError> {
        self.render_with_deadline(html, options, backend, self.config.timeout())
            .await
    }

    /// Render with an explicit deadline for the backend invocation. `None`
    /// waits as long as the backend takes.
    pub async fn render_with_deadline(
        &self,
        html: &str,
        options: &RenderOptions,
        backend: &dyn RenderBackend,
        deadline: Option<Duration>,
    ) -> Result<RenderOutput, RenderError> {
        let kind = backend.kind();
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_render_start(kind.as_str(), html.len());
        }

        let result = self.run(html, options, backend, deadline).await;

        match &result {
            Ok(output) => {
                info!(
                    "Rendered {} bytes of HTML to {} bytes of PDF with {} in {}ms",
                    output.stats.input_bytes,
                    output.stats.pdf_bytes,
                    kind,
                    output.stats.total_duration_ms
                );
                if let Some(cb) = cb {
                    cb.on_render_complete(
                        kind.as_str(),
                        output.stats.pdf_bytes,
                        output.stats.total_duration_ms,
                    );
                }
            }
            Err(e) => {
                debug!("Render with {} failed: {}", kind, e);
                if let Some(cb) = cb {
                    cb.on_render_error(kind.as_str(), &e.to_string());
                }
            }
        }
        result
    }

    /// Render and write the PDF to `path` atomically (temp file + rename).
    pub async fn render_to_file(
        &self,
        html: &str,
        options: &RenderOptions,
        backend: &dyn RenderBackend,
        path: impl AsRef<Path>,
    ) -> Result<RenderStats, RenderError> {
        let output = self.render_with_stats(html, options, backend).await?;
        write_pdf_atomic(path.as_ref(), &output.pdf).await?;
        Ok(output.stats)
    }

    async fn run(
        &self,
        html: &str,
        options: &RenderOptions,
        backend: &dyn RenderBackend,
        deadline: Option<Duration>,
    ) -> Result<RenderOutput, RenderError> {
        let total_start = Instant::now();
        let kind = backend.kind();
        options.validate()?;

        // ── Step 1: Rewrite ──────────────────────────────────────────────
        let base_url = self.base_url.base_url();
        let rewrite_start = Instant::now();
        let (rewritten, expanded) = rewrite_urls_counted(html, &base_url);
        let rewrite_duration_ms = rewrite_start.elapsed().as_millis() as u64;
        debug!(
            "Expanded {} references against '{}' in {}ms",
            expanded, base_url, rewrite_duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_rewrite_complete(expanded);
        }

        // ── Step 2: Acquire artifacts ────────────────────────────────────
        let scope = self.artifacts.scope();
        for artifact in backend.required_artifacts() {
            if let Err(e) = scope.acquire(*artifact) {
                if let Err(cleanup) = scope.release_all() {
                    warn!("Cleanup after failed acquire also failed: {}", cleanup);
                }
                return Err(e);
            }
        }

        // ── Step 3: Invoke backend ───────────────────────────────────────
        let backend_start = Instant::now();
        let rendered = match deadline {
            Some(limit) => {
                match tokio::time::timeout(limit, backend.render(&rewritten, options, &scope)).await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("{} exceeded its {}ms deadline", kind, limit.as_millis());
                        Err(RenderError::RenderTimeout {
                            backend: kind,
                            elapsed_ms: backend_start.elapsed().as_millis() as u64,
                        })
                    }
                }
            }
            None => backend.render(&rewritten, options, &scope).await,
        };
        let backend_duration_ms = backend_start.elapsed().as_millis() as u64;

        // ── Step 4: Release artifacts ────────────────────────────────────
        let released = scope.release_all();
        let pdf = match (rendered, released) {
            (Ok(pdf), Ok(())) => pdf,
            (Ok(_), Err(cleanup)) => return Err(cleanup),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(cleanup)) => {
                warn!("Artifact cleanup failed after render error: {}", cleanup);
                return Err(e);
            }
        };

        let stats = RenderStats {
            backend: kind,
            rewritten_references: expanded,
            input_bytes: html.len(),
            pdf_bytes: pdf.len(),
            rewrite_duration_ms,
            backend_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        Ok(RenderOutput { pdf, stats })
    }
}

// ── Free functions ───────────────────────────────────────────────────────

/// Render `html` against `base_url` with `backend` and the default pipeline
/// configuration (60 s deadline, system temp dir).
///
/// # Example
///
/// ```rust,no_run
/// use edgequake_html2pdf::{render, LayoutEngineBackend, RenderOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let html = r#"<h1>Invoice</h1><img src="/static/logo.png">"#;
/// let pdf = render(html, "https://shop.example.com", &RenderOptions::default(),
///                  &LayoutEngineBackend::new()).await?;
/// assert!(pdf.starts_with(b"%PDF-"));
/// # Ok(())
/// # }
/// ```
pub async fn render(
    html: &str,
    base_url: &str,
    options: &RenderOptions,
    backend: &dyn RenderBackend,
) -> Result<Vec<u8>, RenderError> {
    PdfPipeline::new(StaticBaseUrl::new(base_url), PipelineConfig::default())
        .render(html, options, backend)
        .await
}

/// Synchronous wrapper around [`render`].
///
/// Creates a tokio runtime for the duration of the call. Must not be called
/// from inside an async context.
pub fn render_sync(
    html: &str,
    base_url: &str,
    options: &RenderOptions,
    backend: &dyn RenderBackend,
) -> Result<Vec<u8>, RenderError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RenderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(render(html, base_url, options, backend))
}

/// Try `backends` in order, moving to the next one only when a backend is
/// unavailable (`BackendUnavailable`). Any other failure is returned as is.
///
/// Each attempt is a complete pipeline run with its own artifacts and its
/// own deadline.
pub async fn render_with_fallback(
    pipeline: &PdfPipeline,
    html: &str,
    options: &RenderOptions,
    backends: &[Box<dyn RenderBackend>],
) -> Result<RenderOutput, RenderError> {
    let mut last_unavailable = None;
    for backend in backends {
        match pipeline.render_with_stats(html, options, backend.as_ref()).await {
            Err(e) if e.allows_fallback() => {
                info!("{} unavailable, trying next backend: {}", backend.kind(), e);
                last_unavailable = Some(e);
            }
            other => return other,
        }
    }
    Err(last_unavailable
        .unwrap_or_else(|| RenderError::InvalidConfig("no render backends to try".into())))
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so a
/// reader never sees a half-written PDF. Missing parent directories are
/// created.
pub async fn write_pdf_atomic(path: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let write_err = |e| RenderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::pipeline::artifacts::{ArtifactKind, ArtifactScope};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the HTML it was given and returns a fixed PDF.
    struct Capture {
        seen: Mutex<Option<String>>,
    }

    #[async_trait]
    impl RenderBackend for Capture {
        fn kind(&self) -> BackendKind {
            BackendKind::LayoutEngine
        }

        async fn render(
            &self,
            html: &str,
            _options: &RenderOptions,
            _artifacts: &ArtifactScope,
        ) -> Result<Vec<u8>, RenderError> {
            *self.seen.lock().unwrap() = Some(html.to_string());
            Ok(b"%PDF-1.4\n".to_vec())
        }
    }

    struct Missing(BackendKind);

    #[async_trait]
    impl RenderBackend for Missing {
        fn kind(&self) -> BackendKind {
            self.0
        }

        fn required_artifacts(&self) -> &'static [ArtifactKind] {
            &[ArtifactKind::InputHtml]
        }

        async fn render(
            &self,
            _html: &str,
            _options: &RenderOptions,
            _artifacts: &ArtifactScope,
        ) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::BackendUnavailable {
                backend: self.0,
                reason: "not installed".into(),
            })
        }
    }

    fn pipeline(dir: &Path) -> PdfPipeline {
        let config = PipelineConfig::builder().temp_dir(dir).build().unwrap();
        PdfPipeline::new(StaticBaseUrl::new("https://example.com/"), config)
    }

    #[tokio::test]
    async fn backend_receives_rewritten_html() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Capture {
            seen: Mutex::new(None),
        };
        let output = pipeline(dir.path())
            .render_with_stats(
                r#"<img src="logo.png"><a href="mailto:a@b.c">x</a>"#,
                &RenderOptions::default(),
                &backend,
            )
            .await
            .unwrap();
        assert_eq!(output.stats.rewritten_references, 1);
        assert_eq!(output.stats.backend, BackendKind::LayoutEngine);
        assert_eq!(
            backend.seen.lock().unwrap().as_deref(),
            Some(r#"<img src="https://example.com/logo.png"><a href="mailto:a@b.c">x</a>"#)
        );
    }

    #[tokio::test]
    async fn base_url_is_asked_for_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = move || {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            format!("https://host{n}.example.com")
        };
        let config = PipelineConfig::builder().temp_dir(dir.path()).build().unwrap();
        let pipeline = PdfPipeline::new(provider, config);
        let backend = Capture {
            seen: Mutex::new(None),
        };

        for expected in ["https://host0.example.com/a", "https://host1.example.com/a"] {
            pipeline
                .render(r#"<a href="a">"#, &RenderOptions::default(), &backend)
                .await
                .unwrap();
            assert!(backend.seen.lock().unwrap().as_deref().unwrap().contains(expected));
        }
    }

    #[tokio::test]
    async fn invalid_options_fail_before_the_backend_runs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Capture {
            seen: Mutex::new(None),
        };
        let mut options = RenderOptions::default();
        options.margin_left = "5in".parse().unwrap();
        options.margin_right = "5in".parse().unwrap();
        let err = pipeline(dir.path())
            .render("<p>x</p>", &options, &backend)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidOptions(_)));
        assert!(backend.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn fallback_moves_past_unavailable_backends() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Box<dyn RenderBackend>> = vec![
            Box::new(Missing(BackendKind::BrowserAutomation)),
            Box::new(Missing(BackendKind::BrowserCli)),
            Box::new(Capture {
                seen: Mutex::new(None),
            }),
        ];
        let output = render_with_fallback(
            &pipeline(dir.path()),
            "<p>hi</p>",
            &RenderOptions::default(),
            &backends,
        )
        .await
        .unwrap();
        assert_eq!(output.stats.backend, BackendKind::LayoutEngine);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fallback_reports_last_unavailable_error() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Box<dyn RenderBackend>> = vec![
            Box::new(Missing(BackendKind::BrowserAutomation)),
            Box::new(Missing(BackendKind::BrowserCli)),
        ];
        let err = render_with_fallback(
            &pipeline(dir.path()),
            "<p>hi</p>",
            &RenderOptions::default(),
            &backends,
        )
        .await
        .unwrap_err();
        assert_eq!(err.backend(), Some(BackendKind::BrowserCli));

        let none: Vec<Box<dyn RenderBackend>> = Vec::new();
        let err = render_with_fallback(&pipeline(dir.path()), "", &RenderOptions::default(), &none)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn render_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("doc.pdf");
        let backend = Capture {
            seen: Mutex::new(None),
        };
        let stats = pipeline(dir.path())
            .render_to_file("<p>x</p>", &RenderOptions::default(), &backend, &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.4\n");
        assert_eq!(stats.pdf_bytes, 9);
        assert!(!out.with_extension("pdf.tmp").exists());
    }
}
