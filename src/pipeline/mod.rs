//! Pipeline stages that run before and around a backend.
//!
//! Each submodule implements exactly one concern, so each is independently
//! testable and the backends never see raw, relative-URL HTML.
//!
//! ## Data Flow
//!
//! ```text
//! base URL ─┐
//! HTML ─────┴─▶ rewrite ──▶ artifacts.acquire ──▶ backend.render ──▶ artifacts.release
//!              (absolute     (per-render scope)    (PDF bytes)        (every exit path)
//!               references)
//! ```
//!
//! 1. [`rewrite`]   — expand relative `href`/`src` attributes and CSS
//!    `url()` notations against the base URL; pure and infallible
//! 2. [`artifacts`] — uniquely named temporary files scoped to one render,
//!    deleted on success, failure, timeout and cancellation alike

pub mod artifacts;
pub mod rewrite;
