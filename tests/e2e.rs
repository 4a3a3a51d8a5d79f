//! End-to-end integration tests for edgequake-html2pdf.
//!
//! The built-in layout engine needs nothing installed, so most tests here run
//! everywhere. Tests that drive a real Chrome / Chromium are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Including the live browser renders:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use edgequake_html2pdf::{
    create_backend, render, render_with_fallback, ArtifactKind, ArtifactManager, ArtifactScope,
    BackendKind, BrowserSettings, DirTempStore, LayoutEngineBackend, PdfPipeline, PipelineConfig,
    RenderBackend, RenderError, RenderOptions, StaticBaseUrl, UniqueIdGenerator, UuidGenerator,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Test helpers ─────────────────────────────────────────────────────────────

const SAMPLE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Quarterly Report</title>
  <link rel="stylesheet" href="/static/print.css">
  <style>body { background: url(img/paper.png); }</style>
</head>
<body>
  <h1>Quarterly Report</h1>
  <p>Revenue grew in <strong>every</strong> region.</p>
  <ul><li>North</li><li>South</li></ul>
  <img src="charts/q3.png" alt="Q3 chart">
  <a href="https://cdn.example.com/full.pdf">Full data</a>
</body>
</html>"#;

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run live browser tests");
            return;
        }
    }};
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

fn pipeline_in(dir: &Path) -> PdfPipeline {
    let config = PipelineConfig::builder().temp_dir(dir).build().unwrap();
    PdfPipeline::new(StaticBaseUrl::new("https://example.com"), config)
}

fn assert_pdf(bytes: &[u8], context: &str) {
    assert!(
        bytes.starts_with(b"%PDF-"),
        "[{context}] output does not start with %PDF-: {:?}",
        &bytes[..bytes.len().min(16)]
    );
    let doc = lopdf::Document::load_mem(bytes).expect("output parses as PDF");
    assert!(!doc.get_pages().is_empty(), "[{context}] PDF has no pages");
}

/// Writes the HTML it receives into its input artifact, then behaves as told.
struct FileBackend {
    behaviour: Behaviour,
    seen: Mutex<Vec<PathBuf>>,
}

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    Fail,
    Hang,
}

impl FileBackend {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RenderBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::BrowserCli
    }

    fn required_artifacts(&self) -> &'static [ArtifactKind] {
        &[ArtifactKind::InputHtml, ArtifactKind::OutputPdf]
    }

    async fn render(
        &self,
        html: &str,
        _options: &RenderOptions,
        artifacts: &ArtifactScope,
    ) -> Result<Vec<u8>, RenderError> {
        let input = artifacts.get(ArtifactKind::InputHtml).unwrap();
        let output = artifacts.get(ArtifactKind::OutputPdf).unwrap();
        self.seen
            .lock()
            .unwrap()
            .extend([input.path.clone(), output.path.clone()]);
        artifacts.write(&input, html.as_bytes())?;

        match self.behaviour {
            Behaviour::Succeed => {
                tokio::task::yield_now().await;
                artifacts.write(&output, b"%PDF-1.4\n%%EOF\n")?;
                artifacts.read(&output)
            }
            Behaviour::Fail => Err(RenderError::RenderProcessFailure {
                backend: self.kind(),
                detail: "simulated crash".into(),
            }),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                artifacts.read(&output)
            }
        }
    }
}

// ── Layout engine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_layout_engine_renders_pdf() {
    let pdf = render(
        SAMPLE,
        "https://example.com",
        &RenderOptions::default(),
        &LayoutEngineBackend::new(),
    )
    .await
    .unwrap();
    assert_pdf(&pdf, "layout");

    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    let page = *doc.get_pages().values().next().unwrap();
    let content = String::from_utf8_lossy(&doc.get_page_content(page).unwrap()).into_owned();
    assert!(content.contains("Quarterly Report"), "content: {content}");
    assert!(content.contains("Q3 chart"), "alt text is drawn: {content}");
}

#[tokio::test]
async fn test_layout_engine_long_document_paginates() {
    let body: String = (0..400)
        .map(|i| format!("<p>Paragraph number {i} with enough words to fill a line.</p>"))
        .collect();
    let html = format!("<html><body>{body}</body></html>");
    let options = RenderOptions::builder()
        .display_header_footer(true)
        .footer_template(r#"<span class="pageNumber"></span>/<span class="totalPages"></span>"#)
        .build()
        .unwrap();

    let pdf = render(&html, "", &options, &LayoutEngineBackend::new())
        .await
        .unwrap();
    assert_pdf(&pdf, "paginate");
    let pages = lopdf::Document::load_mem(&pdf).unwrap().get_pages().len();
    assert!(pages > 1, "400 paragraphs fit on {pages} page(s)");
}

#[tokio::test]
async fn test_layout_engine_empty_document() {
    let pdf = render("", "", &RenderOptions::default(), &LayoutEngineBackend::new())
        .await
        .unwrap();
    assert_pdf(&pdf, "empty");
}

#[test]
fn test_render_sync_outside_runtime() {
    let pdf = edgequake_html2pdf::render_sync(
        "<p>sync</p>",
        "https://example.com",
        &RenderOptions::default(),
        &LayoutEngineBackend::new(),
    )
    .unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_stats_report_rewrites() {
    let dir = tempfile::tempdir().unwrap();
    let out = pipeline_in(dir.path())
        .render_with_stats(SAMPLE, &RenderOptions::default(), &LayoutEngineBackend::new())
        .await
        .unwrap();
    // /static/print.css, img/paper.png, charts/q3.png; the https link is kept.
    assert_eq!(out.stats.rewritten_references, 3);
    assert_eq!(out.stats.backend, BackendKind::LayoutEngine);
    assert_eq!(out.stats.pdf_bytes, out.pdf.len());
    assert!(entries(dir.path()).is_empty());
}

// ── Cleanup guarantee ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_artifacts_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(Behaviour::Succeed);
    let pdf = pipeline_in(dir.path())
        .render(SAMPLE, &RenderOptions::default(), &backend)
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(backend.seen.lock().unwrap().len(), 2);
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_artifacts_removed_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(Behaviour::Fail);
    let err = pipeline_in(dir.path())
        .render(SAMPLE, &RenderOptions::default(), &backend)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::RenderProcessFailure { .. }));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_timeout_is_reported_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(Behaviour::Hang);
    let start = Instant::now();
    let err = pipeline_in(dir.path())
        .render_with_deadline(
            SAMPLE,
            &RenderOptions::default(),
            &backend,
            Some(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(10));
    match err {
        RenderError::RenderTimeout { backend, .. } => assert_eq!(backend, BackendKind::BrowserCli),
        other => panic!("expected RenderTimeout, got {other:?}"),
    }
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_cancelled_render_is_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::new(Behaviour::Hang);
    let pipeline = pipeline_in(dir.path());

    let dropped = tokio::time::timeout(
        Duration::from_millis(200),
        pipeline.render_with_deadline(SAMPLE, &RenderOptions::default(), &backend, None),
    )
    .await;
    assert!(dropped.is_err(), "render should still be pending");
    assert_eq!(backend.seen.lock().unwrap().len(), 2);
    assert!(entries(dir.path()).is_empty());
}

// ── Concurrency ──────────────────────────────────────────────────────────────

/// Counts ids handed out, delegating to the UUID generator.
struct CountingIds(AtomicUsize);

impl UniqueIdGenerator for CountingIds {
    fn next_id(&self) -> String {
        self.0.fetch_add(1, Ordering::SeqCst);
        UuidGenerator.next_id()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_renders_use_distinct_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let ids = Arc::new(CountingIds(AtomicUsize::new(0)));
    let pipeline = pipeline_in(dir.path()).with_artifacts(ArtifactManager::new(
        Arc::new(DirTempStore::new(dir.path())),
        ids.clone(),
    ));
    let backend = Arc::new(FileBackend::new(Behaviour::Succeed));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let pipeline = pipeline.clone();
            let backend = backend.clone();
            tokio::spawn(async move {
                let html = format!("<p>document {i}</p>");
                pipeline
                    .render(&html, &RenderOptions::default(), backend.as_ref())
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        assert!(task.unwrap().unwrap().starts_with(b"%PDF-"));
    }

    let seen = backend.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 32);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 32);
    assert_eq!(ids.0.load(Ordering::SeqCst), 32);
    assert!(entries(dir.path()).is_empty());
}

// ── Fallback ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fallback_to_layout_engine_when_browser_missing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = BrowserSettings {
        executable: Some(dir.path().join("no-such-chrome")),
        ..BrowserSettings::default()
    };
    let backends = vec![
        create_backend(BackendKind::BrowserCli, &settings).unwrap(),
        create_backend(BackendKind::LayoutEngine, &settings).unwrap(),
    ];

    let out = render_with_fallback(
        &pipeline_in(dir.path()),
        SAMPLE,
        &RenderOptions::default(),
        &backends,
    )
    .await
    .unwrap();
    assert_eq!(out.stats.backend, BackendKind::LayoutEngine);
    assert_pdf(&out.pdf, "fallback");
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_missing_browser_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let settings = BrowserSettings {
        executable: Some(dir.path().join("no-such-chrome")),
        ..BrowserSettings::default()
    };
    let backend = create_backend(BackendKind::BrowserCli, &settings).unwrap();
    let err = pipeline_in(dir.path())
        .render(SAMPLE, &RenderOptions::default(), backend.as_ref())
        .await
        .unwrap_err();
    assert!(err.allows_fallback(), "got {err:?}");
    assert!(entries(dir.path()).is_empty());
}

// ── Live browser renders (E2E_ENABLED) ───────────────────────────────────────

#[tokio::test]
async fn test_browser_cli_live() {
    e2e_skip_unless_ready!();
    let backend = create_backend(BackendKind::BrowserCli, &BrowserSettings::default()).unwrap();
    let options = RenderOptions::builder()
        .display_header_footer(true)
        .footer_template(r#"<span class="pageNumber"></span> / <span class="totalPages"></span>"#)
        .build()
        .unwrap();
    let pdf = render(SAMPLE, "https://example.com", &options, backend.as_ref())
        .await
        .unwrap();
    assert_pdf(&pdf, "browser-cli");
}

#[tokio::test]
async fn test_browser_automation_live() {
    e2e_skip_unless_ready!();
    let backend =
        create_backend(BackendKind::BrowserAutomation, &BrowserSettings::default()).unwrap();
    let pdf = render(
        SAMPLE,
        "https://example.com",
        &RenderOptions::default(),
        backend.as_ref(),
    )
    .await
    .unwrap();
    assert_pdf(&pdf, "browser-automation");
}
