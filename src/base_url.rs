//! Where the base URL for a render comes from.
//!
//! The pipeline never caches a base URL: the same process may serve several
//! deployments (staging and production hosts, per-tenant domains), so the
//! origin is asked for on every call through a [`BaseUrlProvider`].

/// Supplies the canonical origin (scheme + host) for the current context.
pub trait BaseUrlProvider: Send + Sync {
    fn base_url(&self) -> String;
}

/// A provider that always returns the same origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticBaseUrl(String);

impl StaticBaseUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(normalize_base_url(&url.into()))
    }
}

impl BaseUrlProvider for StaticBaseUrl {
    fn base_url(&self) -> String {
        self.0.clone()
    }
}

impl<F> BaseUrlProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn base_url(&self) -> String {
        self()
    }
}

/// Trim surrounding whitespace and any trailing `/`.
///
/// `https://example.com/` and `https://example.com` must prefix references
/// identically, otherwise the no-double-prefix check would miss values that
/// were expanded against the other spelling.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
