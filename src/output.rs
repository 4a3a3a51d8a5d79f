//! Render results.

use crate::backend::BackendKind;
use serde::Serialize;

/// PDF bytes plus what it took to produce them.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub pdf: Vec<u8>,
    pub stats: RenderStats,
}

/// Per-render statistics, serialisable for `--json` output and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    /// Backend that produced the PDF.
    pub backend: BackendKind,
    /// References expanded against the base URL.
    pub rewritten_references: usize,
    pub input_bytes: usize,
    pub pdf_bytes: usize,
    pub rewrite_duration_ms: u64,
    pub backend_duration_ms: u64,
    pub total_duration_ms: u64,
}
