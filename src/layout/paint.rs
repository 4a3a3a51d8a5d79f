//! Laid-out pages → PDF bytes with `lopdf`.
//!
//! Only the standard Type1 fonts are referenced, with `WinAnsiEncoding`.
//! Characters outside that encoding are drawn as `?`.

use super::dom::FontStyle;
use super::flow::{text_width, Page, PageGeometry, PageItem};
use crate::templates::{Template, TemplateContext};
use chrono::Local;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Header and footer drawn in the top and bottom margin bands.
#[derive(Debug, Clone)]
pub struct PageDecorations {
    pub header: Template,
    pub footer: Template,
    pub context: TemplateContext,
}

const PRODUCER: &str = concat!("edgequake-html2pdf ", env!("CARGO_PKG_VERSION"));

/// Serialise `pages` into a complete PDF document.
pub fn paint(
    pages: &[Page],
    geometry: &PageGeometry,
    decorations: Option<&PageDecorations>,
    title: Option<&str>,
) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for style in [FontStyle::Regular, FontStyle::Bold, FontStyle::Mono] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font(style),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font_resource(style), font_id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (index, page) in pages.iter().enumerate() {
        let mut operations = page_operations(page);
        if let Some(decorations) = decorations {
            operations.extend(decoration_operations(decorations, geometry, index + 1, total));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
        "CreationDate" => Object::string_literal(Local::now().format("D:%Y%m%d%H%M%S").to_string()),
    };
    if let Some(title) = title {
        info.set("Title", Object::string_literal(encode_win_ansi(title)));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn base_font(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "Helvetica",
        FontStyle::Bold => "Helvetica-Bold",
        FontStyle::Mono => "Courier",
    }
}

fn font_resource(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "F1",
        FontStyle::Bold => "F2",
        FontStyle::Mono => "F3",
    }
}

// ── Content streams ──────────────────────────────────────────────────────

fn page_operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::new();
    for item in &page.items {
        match item {
            PageItem::Text {
                x,
                y,
                text,
                style,
                size,
            } => text_operations(&mut ops, *x, *y, text, *style, *size),
            PageItem::Rule { x1, x2, y } => {
                ops.push(Operation::new("w", vec![0.5.into()]));
                ops.push(Operation::new("m", vec![(*x1).into(), (*y).into()]));
                ops.push(Operation::new("l", vec![(*x2).into(), (*y).into()]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    ops
}

fn text_operations(ops: &mut Vec<Operation>, x: f64, y: f64, text: &str, style: FontStyle, size: f64) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font_resource(style).as_bytes().to_vec()), size.into()],
    ));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(encode_win_ansi(text))],
    ));
    ops.push(Operation::new("ET", vec![]));
}

/// Header centred in the top margin, footer centred in the bottom margin.
fn decoration_operations(
    decorations: &PageDecorations,
    geometry: &PageGeometry,
    page: usize,
    total: usize,
) -> Vec<Operation> {
    let ctx = decorations.context.with_page(page, total);
    let mut ops = Vec::new();
    let bands = [
        (&decorations.header, geometry.height - geometry.margin_top / 2.0),
        (&decorations.footer, geometry.margin_bottom / 2.0),
    ];
    for (template, band_centre) in bands {
        if template.is_empty() {
            continue;
        }
        let text = template.resolve(&ctx);
        if text.trim().is_empty() {
            continue;
        }
        let size = template.font_size_pt;
        let width = text_width(&text, FontStyle::Regular, size);
        let x = geometry.margin_left + (geometry.content_width() - width) / 2.0;
        let y = band_centre - size / 3.0;
        text_operations(&mut ops, x.max(0.0), y.max(0.0), &text, FontStyle::Regular, size);
    }
    ops
}

// ── Encoding ─────────────────────────────────────────────────────────────

/// Encode `text` for a `WinAnsiEncoding` font.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(ch: char) -> u8 {
    let code = ch as u32;
    match code {
        0x20..=0x7e | 0xa0..=0xff => code as u8,
        _ => match ch {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8a,
            '\u{2039}' => 0x8b,
            '\u{0152}' => 0x8c,
            '\u{017D}' => 0x8e,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9a,
            '\u{203A}' => 0x9b,
            '\u{0153}' => 0x9c,
            '\u{017E}' => 0x9e,
            '\u{0178}' => 0x9f,
            '\t' => b' ',
            _ => b'?',
        },
    }
}
