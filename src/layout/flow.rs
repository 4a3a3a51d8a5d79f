//! Line breaking and pagination.
//!
//! Text is measured with the AFM advance widths of the standard PDF fonts
//! (Helvetica, Helvetica-Bold, Courier), so no font files are needed and
//! what is measured here is exactly what the viewer draws. Lines are filled
//! greedily; a word wider than the line is broken between characters.

use super::dom::{Block, BlockKind, Document, FontStyle};

/// Body text size in points.
pub const BODY_SIZE: f64 = 11.0;
const PRE_SIZE: f64 = 9.5;
const LINE_HEIGHT: f64 = 1.3;
const LIST_INDENT: f64 = 18.0;
const MARKER_GAP: f64 = 4.0;

// ── Metrics ──────────────────────────────────────────────────────────────

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica-Bold advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Advance width of `ch` in 1/1000 em.
pub fn char_width(ch: char, style: FontStyle) -> u16 {
    if style == FontStyle::Mono {
        return 600;
    }
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        let idx = (code - 0x20) as usize;
        return match style {
            FontStyle::Bold => HELVETICA_BOLD[idx],
            _ => HELVETICA[idx],
        };
    }
    match ch {
        '\u{00A0}' => 278,
        '\u{2022}' => 350,
        '\u{2014}' | '\u{2026}' | '\u{2030}' => 1000,
        '\u{2018}' | '\u{2019}' | '\u{201A}' => 278,
        '\u{201C}' | '\u{201D}' | '\u{201E}' => 500,
        _ => 556,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, style: FontStyle, size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, style))).sum();
    f64::from(units) * size / 1000.0
}

// ── Output model ─────────────────────────────────────────────────────────

/// Paper and margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl PageGeometry {
    pub fn content_width(&self) -> f64 {
        self.width - self.margin_left - self.margin_right
    }
}

/// Something to draw, in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// `y` is the baseline.
    Text {
        x: f64,
        y: f64,
        text: String,
        style: FontStyle,
        size: f64,
    },
    Rule { x1: f64, x2: f64, y: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<PageItem>,
}

impl Page {
    /// All text on the page, one item per line fragment.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            PageItem::Text { text, .. } => Some(text.as_str()),
            PageItem::Rule { .. } => None,
        })
    }
}

/// Lay `doc` out on pages of `geometry`. Always returns at least one page.
pub fn layout(doc: &Document, geometry: &PageGeometry) -> Vec<Page> {
    let mut cursor = Cursor::new(*geometry);
    for block in &doc.blocks {
        cursor.block(block);
    }
    cursor.finish()
}

// ── Line building ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Fragment {
    x: f64,
    text: String,
    style: FontStyle,
}

#[derive(Debug, Default)]
struct Line {
    fragments: Vec<Fragment>,
    width: f64,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, text: &str, style: FontStyle, size: f64, gap: f64) {
        let w = text_width(text, style, size);
        match self.fragments.last_mut() {
            Some(last) if last.style == style => {
                if gap > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
            }
            _ => self.fragments.push(Fragment {
                x: self.width + gap,
                text: text.to_string(),
                style,
            }),
        }
        self.width += gap + w;
    }
}

/// A break opportunity followed by glued pieces, e.g. `<b>foo</b>bar`.
#[derive(Debug, Default)]
struct Word {
    pieces: Vec<(String, FontStyle)>,
    space_before: bool,
}

enum Token {
    Word(Word),
    Newline,
}

fn tokenize(block: &Block, preformatted: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = Word::default();
    let mut pending_space = false;

    fn finish(word: &mut Word, tokens: &mut Vec<Token>) {
        if !word.pieces.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    for run in &block.runs {
        let mut piece = String::new();
        for ch in run.text.chars() {
            if ch == '\n' {
                if !piece.is_empty() {
                    word.pieces.push((std::mem::take(&mut piece), run.style));
                }
                finish(&mut word, &mut tokens);
                tokens.push(Token::Newline);
                pending_space = false;
            } else if ch == ' ' && !preformatted {
                if !piece.is_empty() {
                    word.pieces.push((std::mem::take(&mut piece), run.style));
                }
                finish(&mut word, &mut tokens);
                pending_space = true;
            } else {
                if word.pieces.is_empty() && piece.is_empty() {
                    word.space_before = pending_space;
                    pending_space = false;
                }
                piece.push(ch);
            }
        }
        if !piece.is_empty() {
            word.pieces.push((piece, run.style));
        }
    }
    finish(&mut word, &mut tokens);
    tokens
}

/// Break a block's text into lines no wider than `width`.
fn break_lines(block: &Block, size: f64, width: f64, preformatted: bool) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();

    for token in tokenize(block, preformatted) {
        let word = match token {
            Token::Newline => {
                lines.push(std::mem::take(&mut line));
                continue;
            }
            Token::Word(word) => word,
        };

        let word_width: f64 = word
            .pieces
            .iter()
            .map(|(t, s)| text_width(t, *s, size))
            .sum();
        let gap = if line.is_empty() || !word.space_before {
            0.0
        } else {
            text_width(" ", word.pieces[0].1, size)
        };

        if line.width + gap + word_width > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
            place_word(&mut lines, &mut line, &word, size, width, 0.0);
        } else {
            place_word(&mut lines, &mut line, &word, size, width, gap);
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Append `word` to `line`, splitting it between characters if it is wider
/// than the whole line.
fn place_word(lines: &mut Vec<Line>, line: &mut Line, word: &Word, size: f64, width: f64, gap: f64) {
    let mut gap = gap;
    for (text, style) in &word.pieces {
        let w = text_width(text, *style, size);
        if line.width + gap + w <= width {
            line.push(text, *style, size, gap);
            gap = 0.0;
            continue;
        }
        let mut chunk = String::new();
        let mut chunk_width = 0.0;
        for ch in text.chars() {
            let cw = f64::from(char_width(ch, *style)) * size / 1000.0;
            let occupied = line.width + gap + chunk_width + cw;
            if occupied > width && (!chunk.is_empty() || !line.is_empty()) {
                if !chunk.is_empty() {
                    line.push(&chunk, *style, size, gap);
                }
                lines.push(std::mem::take(line));
                chunk.clear();
                chunk_width = 0.0;
                gap = 0.0;
            }
            chunk.push(ch);
            chunk_width += cw;
        }
        if !chunk.is_empty() {
            line.push(&chunk, *style, size, gap);
            gap = 0.0;
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────

struct Cursor {
    geometry: PageGeometry,
    pages: Vec<Page>,
    current: Page,
    /// Top of the next line, measured down from the top of the paper.
    y: f64,
}

impl Cursor {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: Vec::new(),
            current: Page::default(),
            y: geometry.margin_top,
        }
    }

    fn at_page_top(&self) -> bool {
        self.current.items.is_empty()
    }

    fn bottom_limit(&self) -> f64 {
        self.geometry.height - self.geometry.margin_bottom
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = self.geometry.margin_top;
    }

    /// Reserve `height` points, moving to a new page if they do not fit.
    /// Returns the top of the reserved band.
    fn reserve(&mut self, height: f64) -> f64 {
        if self.y + height > self.bottom_limit() && !self.at_page_top() {
            self.new_page();
        }
        let top = self.y;
        self.y += height;
        top
    }

    fn space(&mut self, height: f64) {
        if !self.at_page_top() {
            self.y += height;
        }
    }

    fn block(&mut self, block: &Block) {
        let left = self.geometry.margin_left;
        let width = self.geometry.content_width();

        let (size, indent, before, after) = match &block.kind {
            BlockKind::Heading(level) => {
                let size = heading_size(*level);
                (size, 0.0, size * 0.8, size * 0.3)
            }
            BlockKind::Paragraph => (BODY_SIZE, 0.0, BODY_SIZE * 0.6, 0.0),
            BlockKind::ListItem { depth, .. } => {
                (BODY_SIZE, LIST_INDENT * *depth as f64, BODY_SIZE * 0.25, 0.0)
            }
            BlockKind::Preformatted => (PRE_SIZE, 0.0, BODY_SIZE * 0.6, 0.0),
            BlockKind::Rule => {
                self.space(BODY_SIZE * 0.5);
                let top = self.reserve(BODY_SIZE);
                let y = self.geometry.height - top - BODY_SIZE / 2.0;
                self.current.items.push(PageItem::Rule {
                    x1: left,
                    x2: left + width,
                    y,
                });
                return;
            }
        };

        // A margin too wide for the indent still gets one character per line.
        let indent = indent.min(width * 0.5);
        let preformatted = block.kind == BlockKind::Preformatted;
        let lines = break_lines(block, size, width - indent, preformatted);
        let line_height = size * LINE_HEIGHT;

        self.space(before);
        for (i, line) in lines.into_iter().enumerate() {
            let top = self.reserve(line_height);
            let baseline = self.geometry.height - top - size;

            if i == 0 {
                if let BlockKind::ListItem { marker, .. } = &block.kind {
                    if !marker.is_empty() {
                        let mw = text_width(marker, FontStyle::Regular, size);
                        self.current.items.push(PageItem::Text {
                            x: (left + indent - MARKER_GAP - mw).max(0.0),
                            y: baseline,
                            text: marker.clone(),
                            style: FontStyle::Regular,
                            size,
                        });
                    }
                }
            }
            for fragment in line.fragments {
                self.current.items.push(PageItem::Text {
                    x: left + indent + fragment.x,
                    y: baseline,
                    text: fragment.text,
                    style: fragment.style,
                    size,
                });
            }
        }
        self.y += after;
    }

    fn finish(mut self) -> Vec<Page> {
        if !self.current.items.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

pub fn heading_size(level: u8) -> f64 {
    match level {
        1 => 22.0,
        2 => 18.0,
        3 => 15.0,
        4 => 13.0,
        5 => 11.0,
        _ => 10.0,
    }
}
