//! Progress-callback trait for render lifecycle events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a channel, a job record, or a terminal
//! spinner without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because one pipeline may serve
//! many concurrent renders.
//!
//! # Example
//!
//! ```rust
//! use edgequake_html2pdf::{PipelineConfig, RenderProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl RenderProgressCallback for Log {
//!     fn on_render_complete(&self, backend: &str, pdf_bytes: usize, elapsed_ms: u64) {
//!         eprintln!("{backend}: {pdf_bytes} bytes in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as a render progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Backends are named by their stable identifier
/// (`layout-engine`, `browser-automation`, `browser-cli`).
pub trait RenderProgressCallback: Send + Sync {
    /// Called once per render before anything else happens.
    ///
    /// # Arguments
    /// * `backend`    — backend that will be invoked
    /// * `html_bytes` — size of the input document
    fn on_render_start(&self, backend: &str, html_bytes: usize) {
        let _ = (backend, html_bytes);
    }

    /// Called after URL rewriting.
    ///
    /// # Arguments
    /// * `expanded` — number of references that were rewritten
    fn on_rewrite_complete(&self, expanded: usize) {
        let _ = expanded;
    }

    /// Called once the PDF bytes are in hand and artifacts are released.
    fn on_render_complete(&self, backend: &str, pdf_bytes: usize, elapsed_ms: u64) {
        let _ = (backend, pdf_bytes, elapsed_ms);
    }

    /// Called when the render fails, after artifacts are released.
    fn on_render_error(&self, backend: &str, error: &str) {
        let _ = (backend, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
