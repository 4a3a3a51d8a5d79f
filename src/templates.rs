//! Header and footer templates.
//!
//! Templates use the browser print convention: ordinary markup where an
//! element whose `class` names one of the placeholders below is filled in per
//! page.
//!
//! | Class | Replaced with |
//! |-------|---------------|
//! | `pageNumber` | current page, 1-based |
//! | `totalPages` | number of pages in the document |
//! | `title` | the document `<title>` |
//! | `url` | the document location |
//! | `date` | the render date |
//!
//! The browser automation backend passes template markup through verbatim.
//! The other two backends have no print-template API, so the markup is
//! parsed once into [`TemplateSegment`]s and then either resolved to plain
//! text (layout engine) or turned into a CSS `content:` value (browser CLI).
//!
//! Centralising the defaults here keeps all three backends agreeing on what
//! an unconfigured page looks like.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;

/// Header used when `headerTemplateHTML` is absent: an empty band.
pub const DEFAULT_HEADER_TEMPLATE: &str =
    r#"<span style="font-size: 10px; width: 100%; text-align: center;"></span>"#;

/// Footer used when `footerTemplateHTML` is absent: centred "N of M".
pub const DEFAULT_FOOTER_TEMPLATE: &str = r#"<span style="font-size: 10px; width: 100%; text-align: center;"><span class="pageNumber"></span> of <span class="totalPages"></span></span>"#;

/// Font size browsers use for header/footer text with no explicit size.
pub const DEFAULT_TEMPLATE_FONT_PT: f64 = 8.0;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Text(String),
    PageNumber,
    TotalPages,
    Title,
    Url,
    Date,
}

/// Values substituted into placeholders for one page.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub page: usize,
    pub total_pages: usize,
    pub title: String,
    pub url: String,
    pub date: String,
}

impl TemplateContext {
    /// Context for a document, dated now. Page numbers start at zero and are
    /// set per page by the caller.
    pub fn for_document(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            page: 0,
            total_pages: 0,
            title: title.into(),
            url: url.into(),
            date: Local::now().format("%-m/%-d/%y").to_string(),
        }
    }

    pub fn with_page(&self, page: usize, total_pages: usize) -> Self {
        Self {
            page,
            total_pages,
            ..self.clone()
        }
    }
}

/// A template parsed into segments, plus the font size it asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
    /// Font size in points, from the first `font-size: Npx|Npt` in the markup.
    pub font_size_pt: f64,
}

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)([^>]*)>").unwrap());

static RE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap());

static RE_FONT_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)font-size\s*:\s*([0-9]*\.?[0-9]+)\s*(px|pt)").unwrap());

static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

impl Template {
    /// Parse template markup. Never fails; unknown markup is dropped and its
    /// text kept.
    pub fn parse(markup: &str) -> Self {
        let mut segments: Vec<TemplateSegment> = Vec::new();
        let mut cursor = 0;
        let mut in_raw_text = false;

        for caps in RE_TAG.captures_iter(markup) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let closing = &caps[1] == "/";
            let name = caps[2].to_ascii_lowercase();

            if !in_raw_text {
                push_text(&mut segments, &markup[cursor..whole.start]);
            }
            cursor = whole.end;

            if name == "style" || name == "script" {
                in_raw_text = !closing;
                continue;
            }
            if closing || in_raw_text {
                continue;
            }
            if let Some(placeholder) = placeholder_for(&caps[3]) {
                segments.push(placeholder);
            }
        }
        if !in_raw_text {
            push_text(&mut segments, &markup[cursor..]);
        }

        trim_edges(&mut segments);

        let font_size_pt = RE_FONT_SIZE
            .captures(markup)
            .and_then(|c| {
                let size: f64 = c[1].parse().ok()?;
                Some(if c[2].eq_ignore_ascii_case("px") {
                    size * 0.75
                } else {
                    size
                })
            })
            .unwrap_or(DEFAULT_TEMPLATE_FONT_PT);

        Self {
            segments,
            font_size_pt,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Plain text for one page.
    pub fn resolve(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                TemplateSegment::Text(t) => out.push_str(t),
                TemplateSegment::PageNumber => out.push_str(&ctx.page.to_string()),
                TemplateSegment::TotalPages => out.push_str(&ctx.total_pages.to_string()),
                TemplateSegment::Title => out.push_str(&ctx.title),
                TemplateSegment::Url => out.push_str(&ctx.url),
                TemplateSegment::Date => out.push_str(&ctx.date),
            }
        }
        out
    }

    /// A CSS `content:` value for a paged-media margin box, with page
    /// counters for the page placeholders. `ctx` supplies the static values.
    pub fn css_content(&self, ctx: &TemplateContext) -> String {
        if self.segments.is_empty() {
            return "\"\"".to_string();
        }
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|seg| match seg {
                TemplateSegment::Text(t) => css_string(t),
                TemplateSegment::PageNumber => "counter(page)".to_string(),
                TemplateSegment::TotalPages => "counter(pages)".to_string(),
                TemplateSegment::Title => css_string(&ctx.title),
                TemplateSegment::Url => css_string(&ctx.url),
                TemplateSegment::Date => css_string(&ctx.date),
            })
            .collect();
        parts.join(" ")
    }
}

/// The text of the document's `<title>`, whitespace-collapsed.
pub fn document_title(html: &str) -> Option<String> {
    let raw = RE_TITLE.captures(html)?.get(1)?.as_str();
    let text = RE_WS.replace_all(&decode_entities(raw), " ").trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Decode the handful of entities that show up in templates and titles.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            "ndash" => Some('\u{2013}'),
            "mdash" => Some('\u{2014}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn placeholder_for(attrs: &str) -> Option<TemplateSegment> {
    let caps = RE_CLASS.captures(attrs)?;
    let classes = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
    classes.split_whitespace().find_map(|class| match class {
        "pageNumber" => Some(TemplateSegment::PageNumber),
        "totalPages" => Some(TemplateSegment::TotalPages),
        "title" => Some(TemplateSegment::Title),
        "url" => Some(TemplateSegment::Url),
        "date" => Some(TemplateSegment::Date),
        _ => None,
    })
}

fn push_text(segments: &mut Vec<TemplateSegment>, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let text = RE_WS.replace_all(&decode_entities(raw), " ").into_owned();
    if let Some(TemplateSegment::Text(prev)) = segments.last_mut() {
        prev.push_str(&text);
    } else {
        segments.push(TemplateSegment::Text(text));
    }
}

fn trim_edges(segments: &mut Vec<TemplateSegment>) {
    if let Some(TemplateSegment::Text(first)) = segments.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(TemplateSegment::Text(last)) = segments.last_mut() {
        *last = last.trim_end().to_string();
    }
    segments.retain(|s| !matches!(s, TemplateSegment::Text(t) if t.is_empty()));
}

fn css_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\A ")
        .replace('<', "\\3C ");
    format!("\"{escaped}\"")
}
