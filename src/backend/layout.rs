//! LayoutEngineBackend: the built-in engine, no browser required.
//!
//! Layout and PDF serialisation are CPU-bound and synchronous, so they run
//! on tokio's blocking pool through `spawn_blocking`, keeping the async
//! worker threads free. A blocking task cannot be interrupted: when the
//! pipeline deadline fires first, the task finishes on its own and its
//! result is discarded.

use crate::backend::{ensure_pdf_signature, BackendKind, RenderBackend};
use crate::config::RenderOptions;
use crate::error::RenderError;
use crate::layout;
use crate::pipeline::artifacts::ArtifactScope;
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

const KIND: BackendKind = BackendKind::LayoutEngine;

/// Renders with the in-process layout engine in [`crate::layout`].
#[derive(Debug, Clone, Default)]
pub struct LayoutEngineBackend;

impl LayoutEngineBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RenderBackend for LayoutEngineBackend {
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
        let html = html.to_string();
        let options = options.clone();

        let pdf = tokio::task::spawn_blocking(move || layout::html_to_pdf(&html, &options))
            .await
            .map_err(|e| RenderError::RenderProcessFailure {
                backend: KIND,
                detail: format!("layout task panicked: {e}"),
            })?
            .map_err(|e| RenderError::RenderProcessFailure {
                backend: KIND,
                detail: format!("writing PDF: {e}"),
            })?;

        ensure_pdf_signature(KIND, &pdf)?;
        info!(
            "Laid out {} bytes of PDF in {}ms",
            pdf.len(),
            start.elapsed().as_millis()
        );
        Ok(pdf)
    }
}
