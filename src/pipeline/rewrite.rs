//! URL rewriting: resolve relative resource references against a base URL.
//!
//! ## Why rewrite at all?
//!
//! Every backend renders the document from a string or a temporary file, not
//! from the site it was generated for. A relative `<img src="logo.png">` would
//! therefore resolve against `about:blank` or `file:///tmp/...` and come out as
//! a broken image. Expanding every relative reference against the deployment's
//! origin lets the browser fetch the real sub-resources.
//!
//! ## What counts as a reference
//!
//! Two notations are scanned in a single pass over the document:
//!
//! - attribute values of `href=` / `src=` (double-quoted, single-quoted or
//!   bare), and
//! - CSS `url(...)` notations, wherever they appear (`<style>` blocks, `style=`
//!   attributes, inline text).
//!
//! Matches are ordered by position; a match nested inside an earlier one (a
//! `url(...)` inside an `href` value) is left to the outer match. Everything
//! between matches is copied byte-for-byte, and only the value itself is ever
//! replaced, so quoting style and surrounding whitespace survive.
//!
//! ## Classification order
//!
//! For each value, the first rule that applies wins:
//!
//! 1. empty or fragment-only (`#top`): unchanged
//! 2. already starts with the base URL: unchanged (no double prefix)
//! 3. starts with the `http://` form of the base URL: unchanged, so a site
//!    reachable over both schemes is never wrapped twice
//! 4. carries any URI scheme (`https:`, `mailto:`, `data:`, `tel:`,
//!    `javascript:` ...): unchanged
//! 5. protocol-relative (`//cdn.example.com/x.js`): gets the base URL's scheme
//! 6. anything else: base URL + exactly one `/` + the value without its
//!    leading slashes
//!
//! Every output of rules 5 and 6 is caught by rule 2 or 4 on a second run,
//! which is what makes rewriting idempotent.

use crate::base_url::normalize_base_url;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

/// Which notation a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `href=` or `src=` attribute.
    Attribute,
    /// CSS `url(...)`.
    CssUrl,
}

/// One located resource reference.
///
/// `raw` is `prefix` + optional opening quote + `value` + `suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReference<'a> {
    pub kind: ReferenceKind,
    /// The whole matched text.
    pub raw: &'a str,
    /// `src=`, `href = `, `url(` ...
    pub prefix: &'a str,
    /// Quote character around the value, if any.
    pub delimiter: Option<char>,
    pub value: &'a str,
    /// Closing quote and, for CSS, the closing parenthesis.
    pub suffix: &'a str,
    /// Byte range of the whole match in the document.
    pub span: Range<usize>,
    /// Byte range of `value` in the document.
    pub value_span: Range<usize>,
}

// ── Matchers ─────────────────────────────────────────────────────────────────

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

static RE_CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(url)(\(\s*)(?:"([^"]*)"|'([^']*)'|([^\s"')]+))(\s*\))"#).unwrap()
});

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// Locate every `href`/`src` attribute and CSS `url()` reference, in document
/// order, without overlaps.
pub fn find_references(html: &str) -> Vec<UrlReference<'_>> {
    let mut found: Vec<UrlReference<'_>> = RE_ATTR
        .captures_iter(html)
        .filter_map(|c| to_reference(html, &c, ReferenceKind::Attribute))
        .chain(
            RE_CSS_URL
                .captures_iter(html)
                .filter_map(|c| to_reference(html, &c, ReferenceKind::CssUrl)),
        )
        .collect();
    found.sort_by_key(|r| r.span.start);

    let mut end = 0;
    found.retain(|r| {
        if r.span.start < end {
            return false;
        }
        end = r.span.end;
        true
    });
    found
}

fn to_reference<'a>(html: &'a str, caps: &Captures<'a>, kind: ReferenceKind) -> Option<UrlReference<'a>> {
    let whole = caps.get(0)?;
    let (value, delimiter) = match (caps.get(3), caps.get(4), caps.get(5)) {
        (Some(v), _, _) => (v, Some('"')),
        (_, Some(v), _) => (v, Some('\'')),
        (_, _, Some(v)) => (v, None),
        _ => return None,
    };
    let prefix_end = caps.get(2)?.end();
    let closing = caps.get(6).map_or(value.end(), |m| m.end());
    let suffix_start = value.end();
    let suffix_end = if kind == ReferenceKind::CssUrl {
        closing
    } else {
        value.end() + delimiter.map_or(0, char::len_utf8)
    };

    Some(UrlReference {
        kind,
        raw: whole.as_str(),
        prefix: &html[whole.start()..prefix_end],
        delimiter,
        value: value.as_str(),
        suffix: &html[suffix_start..suffix_end],
        span: whole.start()..whole.end(),
        value_span: value.range(),
    })
}

// ── Classification ───────────────────────────────────────────────────────────

/// Decide what a single reference value becomes under `base_url`.
///
/// Returns `None` when the value must be left untouched. `base_url` is
/// expected to be normalised already (no trailing slash); an empty base
/// disables rewriting.
pub fn resolve_reference(value: &str, base_url: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if trimmed.starts_with(base_url) {
        return None;
    }
    let http_variant = base_url.replacen("https://", "http://", 1);
    if trimmed.starts_with(&http_variant) {
        return None;
    }
    if RE_SCHEME.is_match(trimmed) {
        return None;
    }
    if trimmed.starts_with("//") {
        let scheme = RE_SCHEME.find(base_url)?.as_str();
        return Some(format!("{scheme}{trimmed}"));
    }
    Some(format!("{base_url}/{}", trimmed.trim_start_matches('/')))
}

// ── Rewriting ────────────────────────────────────────────────────────────────

/// Rewrite every relative reference in `html` against `base_url`.
///
/// Never fails: markup that does not match is copied through unchanged.
///
/// ```rust
/// use edgequake_html2pdf::rewrite_urls;
///
/// assert_eq!(
///     rewrite_urls(r#"<img src="foo/bar.png">"#, "https://example.com"),
///     r#"<img src="https://example.com/foo/bar.png">"#,
/// );
/// ```
pub fn rewrite_urls(html: &str, base_url: &str) -> String {
    rewrite_urls_counted(html, base_url).0
}

/// Like [`rewrite_urls`], also returning how many references were expanded.
pub fn rewrite_urls_counted(html: &str, base_url: &str) -> (String, usize) {
    let base = normalize_base_url(base_url);
    if base.is_empty() {
        return (html.to_string(), 0);
    }

    let mut out = String::with_capacity(html.len() + 256);
    let mut cursor = 0;
    let mut expanded = 0;

    for reference in find_references(html) {
        if let Some(new_value) = resolve_reference(reference.value, &base) {
            out.push_str(&html[cursor..reference.value_span.start]);
            out.push_str(&new_value);
            cursor = reference.value_span.end;
            expanded += 1;
        }
    }
    out.push_str(&html[cursor..]);
    (out, expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str = "https://example.com";

    #[test]
    fn relative_src_gets_base() {
        assert_eq!(
            rewrite_urls(r#"<img src="foo/bar.png">"#, BASE),
            r#"<img src="https://example.com/foo/bar.png">"#
        );
    }

    #[test]
    fn leading_slash_is_not_doubled() {
        assert_eq!(
            rewrite_urls(r#"<img src="/foo/bar.png">"#, BASE),
            r#"<img src="https://example.com/foo/bar.png">"#
        );
        assert_eq!(
            rewrite_urls(r#"<img src="/foo/bar.png">"#, "https://example.com/"),
            r#"<img src="https://example.com/foo/bar.png">"#
        );
    }

    #[test]
    fn css_url_unquoted() {
        assert_eq!(
            rewrite_urls("background: url(images/bg.png)", BASE),
            "background: url(https://example.com/images/bg.png)"
        );
    }

    #[test]
    fn css_url_quoted_and_multiple() {
        let css = r#"<style>.a{background:url('a.png'), url( "/b.png" )}</style>"#;
        assert_eq!(
            rewrite_urls(css, BASE),
            r#"<style>.a{background:url('https://example.com/a.png'), url( "https://example.com/b.png" )}</style>"#
        );
    }

    #[test]
    fn quoting_styles_preserved() {
        let html = r#"<a href='docs/x.html'>x</a><a href=docs/y.html>y</a><a HREF = "z.html">z</a>"#;
        assert_eq!(
            rewrite_urls(html, BASE),
            r#"<a href='https://example.com/docs/x.html'>x</a><a href=https://example.com/docs/y.html>y</a><a HREF = "https://example.com/z.html">z</a>"#
        );
    }

    #[test]
    fn excluded_schemes_untouched() {
        let html = concat!(
            r#"<a href="mailto:me@example.com">m</a>"#,
            r#"<img src="data:image/png;base64,AAAA">"#,
            r#"<a href="tel:+15551234">t</a>"#,
            r#"<a href="javascript:void(0)">j</a>"#,
            r#"<div style="background:url(data:image/gif;base64,R0lG)"></div>"#,
        );
        assert_eq!(rewrite_urls(html, BASE), html);
    }

    #[test]
    fn absolute_and_same_origin_untouched() {
        let html = concat!(
            r#"<a href="https://example.com/a">a</a>"#,
            r#"<a href="http://example.com/b">b</a>"#,
            r#"<a href="https://other.org/c">c</a>"#,
            r##"<a href="#section">d</a>"##,
            r#"<a href="">e</a>"#,
        );
        assert_eq!(rewrite_urls(html, BASE), html);
    }

    #[test]
    fn protocol_relative_gets_scheme_not_prefix() {
        assert_eq!(
            rewrite_urls(r#"<script src="//cdn.example.net/lib.js"></script>"#, BASE),
            r#"<script src="https://cdn.example.net/lib.js"></script>"#
        );
        assert_eq!(
            rewrite_urls("url(//cdn.example.net/f.woff)", "http://example.com"),
            "url(http://cdn.example.net/f.woff)"
        );
    }

    #[test]
    fn counted_reports_expansions() {
        let html = r#"<img src="a.png"><img src="https://example.com/b.png"><a href="c">c</a>"#;
        let (_, n) = rewrite_urls_counted(html, BASE);
        assert_eq!(n, 2);
    }

    #[test]
    fn empty_base_is_a_no_op() {
        let html = r#"<img src="a.png">"#;
        assert_eq!(rewrite_urls(html, ""), html);
    }

    #[test]
    fn find_references_reports_structure() {
        let html = r#"<img src='a.png'><p style="background: url( b.png )">"#;
        let refs = find_references(html);
        assert_eq!(refs.len(), 2);

        assert_eq!(refs[0].kind, ReferenceKind::Attribute);
        assert_eq!(refs[0].prefix, "src=");
        assert_eq!(refs[0].delimiter, Some('\''));
        assert_eq!(refs[0].value, "a.png");
        assert_eq!(refs[0].suffix, "'");
        assert_eq!(refs[0].raw, "src='a.png'");

        assert_eq!(refs[1].kind, ReferenceKind::CssUrl);
        assert_eq!(refs[1].prefix, "url( ");
        assert_eq!(refs[1].delimiter, None);
        assert_eq!(refs[1].value, "b.png");
        assert_eq!(refs[1].suffix, " )");
        assert_eq!(&html[refs[1].span.clone()], refs[1].raw);
    }

    #[test]
    fn nested_url_inside_attribute_is_left_to_outer_match() {
        let html = r#"<a href="url(x)">x</a>"#;
        let refs = find_references(html);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ReferenceKind::Attribute);
    }

    #[test]
    fn unrelated_attributes_untouched() {
        let html = r#"<img srcset="a.png 2x" alt="src" data-x="href">"#;
        assert_eq!(rewrite_urls(html, BASE), html);
    }

    // ── Properties ───────────────────────────────────────────────────────────

    fn value_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.(png|css|js)",
            "/[a-z]{1,6}/[a-z]{1,6}\\.png",
            "//cdn[0-9]\\.example\\.net/[a-z]{1,5}\\.js",
            "https://example\\.com/[a-z]{1,6}",
            "http://example\\.com/[a-z]{1,6}",
            "https://other\\.org/[a-z]{1,6}",
            "mailto:[a-z]{1,6}@example\\.com",
            "tel:\\+[0-9]{5,9}",
            "data:image/png;base64,[A-Za-z0-9]{4,12}",
            "#[a-z]{1,6}",
            Just(String::new()),
        ]
    }

    fn fragment_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            value_strategy().prop_map(|v| format!(r#"<img src="{v}">"#)),
            value_strategy().prop_map(|v| format!("<a href='{v}'>link</a>")),
            value_strategy()
                .prop_filter("bare values need content", |v| !v.is_empty())
                .prop_map(|v| format!("<a href={v}>bare</a>")),
            value_strategy().prop_map(|v| format!("<p style=\"background: url({v})\"></p>")),
            value_strategy().prop_map(|v| format!("<style>a{{b:url('{v}')}}</style>")),
            "[a-zA-Z ,.]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn rewriting_is_idempotent(parts in prop::collection::vec(fragment_strategy(), 0..8)) {
            let html = parts.concat();
            let once = rewrite_urls(&html, BASE);
            let twice = rewrite_urls(&once, BASE);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn excluded_schemes_are_byte_identical(
            value in prop_oneof![
                "mailto:[a-z]{1,8}@[a-z]{1,8}\\.com",
                "data:[a-z]{1,5}/[a-z]{1,5};base64,[A-Za-z0-9+/]{1,16}",
                "tel:\\+?[0-9]{3,12}",
            ],
            css in any::<bool>(),
        ) {
            let html = if css {
                format!("<div style=\"background:url({value})\"></div>")
            } else {
                format!("<a href=\"{value}\">x</a>")
            };
            prop_assert_eq!(rewrite_urls(&html, BASE), html);
        }

        #[test]
        fn base_prefixed_values_never_double_prefixed(path in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
            let html = format!("<img src=\"{BASE}/{path}\">");
            prop_assert_eq!(rewrite_urls(&html, BASE), html);
        }
    }
}
