//! # edgequake-html2pdf
//!
//! Render HTML documents to PDF, with every relative resource reference
//! resolved against the site's base URL first.
//!
//! ## Why this crate?
//!
//! HTML generated by a web application is full of relative references:
//! `<img src="/static/logo.png">`, `<link href="css/print.css">`,
//! `background: url(img/bg.png)`. A PDF renderer never loads that document
//! from the site itself (it gets a string or a temporary file), so those
//! references break. This crate rewrites them to absolute URLs, then hands
//! the document to one of several interchangeable render backends, managing
//! temporary files, deadlines and failures on the way.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML + base URL
//!  │
//!  ├─ 1. Rewrite   relative href/src/url() → absolute (idempotent, scheme-aware)
//!  ├─ 2. Acquire   uniquely named temp files, if the backend needs them
//!  ├─ 3. Render    one backend invocation under a deadline
//!  │                 layout-engine       in-process, no browser, no JS
//!  │                 browser-automation  headless Chrome over DevTools
//!  │                 browser-cli         chrome --headless --print-to-pdf
//!  ├─ 4. Release   temp files deleted on every exit path
//!  └─ 5. Output    PDF bytes (+ per-render stats)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_html2pdf::{render, LayoutEngineBackend, RenderOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let html = r#"<h1>Report</h1><img src="charts/q3.png">"#;
//!     let pdf = render(
//!         html,
//!         "https://reports.example.com",
//!         &RenderOptions::default(),
//!         &LayoutEngineBackend::new(),
//!     )
//!     .await?;
//!     std::fs::write("report.pdf", pdf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `html2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `browser` | on      | Enables `BrowserAutomationBackend` (chromiumoxide) |
//!
//! Disable both when only the rewriter and the built-in layout engine are
//! needed:
//! ```toml
//! edgequake-html2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Backend
//!
//! | Backend | Needs | JavaScript | Fidelity | Best for |
//! |---------|-------|------------|----------|----------|
//! | `layout-engine` | nothing | no | text & structure | servers without a browser, fallback |
//! | `browser-automation` | Chrome/Chromium | yes | full CSS | production, pooled browser |
//! | `browser-cli` | Chrome/Chromium | yes | full CSS | one-off renders, no DevTools |
//!
//! Use [`render_with_fallback`] to try them in order; it moves on only when
//! a backend is not installed.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod base_url;
pub mod config;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "browser")]
pub use backend::BrowserAutomationBackend;
pub use backend::{
    create_backend, BackendKind, BrowserCliBackend, BrowserLocator, FixedBrowserLocator,
    LayoutEngineBackend, RenderBackend, SystemBrowserLocator,
};
pub use base_url::{BaseUrlProvider, StaticBaseUrl};
pub use config::{
    BrowserSettings, Length, LengthUnit, PageFormat, PipelineConfig, PipelineConfigBuilder,
    RenderOptions, RenderOptionsBuilder,
};
pub use error::{RenderError, RenderErrorKind};
pub use output::{RenderOutput, RenderStats};
pub use pipeline::artifacts::{
    ArtifactHandle, ArtifactKind, ArtifactManager, ArtifactScope, DirTempStore, TempFileStore,
    UniqueIdGenerator, UuidGenerator,
};
pub use pipeline::rewrite::{rewrite_urls, rewrite_urls_counted};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use render::{render, render_sync, render_with_fallback, write_pdf_atomic, PdfPipeline};
