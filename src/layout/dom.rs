//! HTML → block list.
//!
//! The layout engine has no CSS cascade. It keeps the structure a reader
//! relies on (headings, paragraphs, lists, preformatted text, rules, bold
//! and monospace runs) and drops everything else, including scripts and
//! styles. Inline images contribute their `alt` text.

use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

/// Typeface a run is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Mono,
}

/// Text in one style. `"\n"` inside a run is a forced line break.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub style: FontStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// `h1`..`h6`.
    Heading(u8),
    Paragraph,
    /// Only the first block of an `<li>` carries the marker.
    ListItem { marker: String, depth: usize },
    /// Whitespace preserved, no wrapping at spaces.
    Preformatted,
    /// `<hr>`.
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub runs: Vec<Run>,
}

impl Block {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// What the layout engine knows about a parsed document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub title: Option<String>,
    pub blocks: Vec<Block>,
}

const SKIPPED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "object", "canvas",
    "select", "button",
];

const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "center", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "header", "hgroup",
    "main", "nav", "ol", "p", "section", "summary", "table", "tbody", "tfoot", "thead", "tr",
    "ul", "caption",
];

/// Parse `html` into blocks.
pub fn parse(html: &str) -> Document {
    let root = kuchiki::parse_html().one(html);

    let title = root
        .select_first("title")
        .ok()
        .map(|t| collapse_whitespace(&t.text_contents()).trim().to_string())
        .filter(|t| !t.is_empty());

    let mut builder = Builder::default();
    builder.walk(&root);
    builder.flush();

    Document {
        title,
        blocks: builder.blocks,
    }
}

// ── Tree walk ────────────────────────────────────────────────────────────

enum Context {
    Heading(u8),
    ListItem(usize),
}

struct ListState {
    ordered: bool,
    next: usize,
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    runs: Vec<Run>,
    bold: usize,
    mono: usize,
    pre: usize,
    contexts: Vec<Context>,
    lists: Vec<ListState>,
    pending_marker: Option<String>,
}

impl Builder {
    fn walk(&mut self, node: &NodeRef) {
        match node.data() {
            NodeData::Text(text) => self.push_text(&text.borrow()),
            NodeData::Element(el) => {
                let tag = el.name.local.to_ascii_lowercase().to_string();
                if SKIPPED.contains(&tag.as_str()) {
                    return;
                }
                let alt = el.attributes.borrow().get("alt").map(str::to_string);
                let start = el.attributes.borrow().get("start").and_then(|s| s.trim().parse().ok());
                self.element(node, &tag, alt, start);
            }
            NodeData::Document(_) | NodeData::DocumentFragment => {
                for child in node.children() {
                    self.walk(&child);
                }
            }
            _ => {}
        }
    }

    fn element(&mut self, node: &NodeRef, tag: &str, alt: Option<String>, start: Option<usize>) {
        match tag {
            "br" => {
                self.push_run("\n".to_string());
                return;
            }
            "hr" => {
                self.flush();
                self.blocks.push(Block {
                    kind: BlockKind::Rule,
                    runs: Vec::new(),
                });
                return;
            }
            "img" => {
                if let Some(alt) = alt {
                    self.push_text(&alt);
                }
                return;
            }
            _ => {}
        }

        let heading = heading_level(tag);
        let is_block = heading.is_some() || tag == "li" || tag == "pre" || BLOCKS.contains(&tag);
        if is_block {
            self.flush();
        }

        let bold = heading.is_some() || matches!(tag, "b" | "strong" | "th" | "dt");
        let mono = matches!(tag, "pre" | "code" | "kbd" | "samp" | "tt");
        if bold {
            self.bold += 1;
        }
        if mono {
            self.mono += 1;
        }
        if tag == "pre" {
            self.pre += 1;
        }
        if let Some(level) = heading {
            self.contexts.push(Context::Heading(level));
        }
        match tag {
            "ul" | "ol" => self.lists.push(ListState {
                ordered: tag == "ol",
                next: start.unwrap_or(1),
            }),
            "li" => {
                let marker = match self.lists.last_mut() {
                    Some(list) if list.ordered => {
                        let n = list.next;
                        list.next += 1;
                        format!("{n}.")
                    }
                    _ => "\u{2022}".to_string(),
                };
                self.pending_marker = Some(marker);
                self.contexts.push(Context::ListItem(self.lists.len().max(1)));
            }
            _ => {}
        }

        for child in node.children() {
            self.walk(&child);
        }

        if matches!(tag, "td" | "th") {
            self.push_text(" ");
        }
        if is_block {
            self.flush();
        }

        match tag {
            "ul" | "ol" => {
                self.lists.pop();
            }
            "li" => {
                self.contexts.pop();
                self.pending_marker = None;
            }
            _ => {}
        }
        if heading.is_some() {
            self.contexts.pop();
        }
        if tag == "pre" {
            self.pre -= 1;
        }
        if mono {
            self.mono -= 1;
        }
        if bold {
            self.bold -= 1;
        }
    }

    fn style(&self) -> FontStyle {
        if self.mono > 0 {
            FontStyle::Mono
        } else if self.bold > 0 {
            FontStyle::Bold
        } else {
            FontStyle::Regular
        }
    }

    fn push_text(&mut self, raw: &str) {
        if self.pre > 0 {
            let text = raw.replace("\r\n", "\n").replace('\r', "\n");
            if !text.is_empty() {
                self.push_run(text);
            }
            return;
        }
        let mut text = collapse_whitespace(raw);
        if self.at_line_start() && text.starts_with(' ') {
            text.remove(0);
        }
        if !text.is_empty() {
            self.push_run(text);
        }
    }

    fn push_run(&mut self, text: String) {
        let style = self.style();
        match self.runs.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.runs.push(Run { text, style }),
        }
    }

    fn at_line_start(&self) -> bool {
        self.runs
            .last()
            .map_or(true, |r| r.text.ends_with(' ') || r.text.ends_with('\n'))
    }

    /// Close the current block, if it has any text.
    fn flush(&mut self) {
        let mut runs = std::mem::take(&mut self.runs);
        let preformatted = self.pre > 0;
        if !preformatted {
            trim_runs(&mut runs);
        } else if let Some(last) = runs.last_mut() {
            // A trailing newline before `</pre>` is not a blank line.
            if last.text.ends_with('\n') {
                last.text.pop();
            }
        }
        if runs.iter().all(|r| r.text.trim().is_empty()) {
            return;
        }

        let kind = if preformatted {
            BlockKind::Preformatted
        } else {
            match self.contexts.last() {
                Some(Context::Heading(level)) => BlockKind::Heading(*level),
                Some(Context::ListItem(depth)) => BlockKind::ListItem {
                    marker: self.pending_marker.take().unwrap_or_default(),
                    depth: *depth,
                },
                None => BlockKind::Paragraph,
            }
        };
        self.blocks.push(Block { kind, runs });
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Every whitespace run, non-breaking spaces included, becomes one space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() || ch == '\u{00A0}' {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn trim_runs(runs: &mut Vec<Run>) {
    while let Some(first) = runs.first_mut() {
        let trimmed = first.text.trim_start_matches(' ').to_string();
        if trimmed.is_empty() {
            runs.remove(0);
        } else {
            first.text = trimmed;
            break;
        }
    }
    while let Some(last) = runs.last_mut() {
        let trimmed = last.text.trim_end_matches([' ', '\n']).to_string();
        if trimmed.is_empty() {
            runs.pop();
        } else {
            last.text = trimmed;
            break;
        }
    }
}
