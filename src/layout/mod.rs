//! In-process HTML layout: the engine behind [`LayoutEngineBackend`].
//!
//! ## Why a built-in engine?
//!
//! Both browser backends need Chrome/Chromium installed. On CI runners, in
//! slim containers and in serverless functions there often is none, and the
//! fallback chain still has to produce a PDF. This engine needs nothing but
//! the crate itself.
//!
//! ## What it does (and does not) do
//!
//! ```text
//! HTML ──▶ dom    kuchiki parse → blocks of styled runs
//!      ──▶ flow   AFM-metric line breaking + pagination
//!      ──▶ paint  lopdf content streams, header/footer bands
//! ```
//!
//! No CSS cascade, no JavaScript, no images, no network. Headings,
//! paragraphs, lists, preformatted text, rules, bold and monospace runs are
//! laid out; the rest contributes its text only.
//!
//! [`LayoutEngineBackend`]: crate::backend::LayoutEngineBackend

pub mod dom;
pub mod flow;
pub mod paint;

use crate::config::RenderOptions;
use crate::templates::{Template, TemplateContext};
use flow::PageGeometry;
use paint::PageDecorations;
use tracing::debug;

const POINTS_PER_INCH: f64 = 72.0;

/// Lay out and paint `html` as a complete PDF document.
pub fn html_to_pdf(html: &str, options: &RenderOptions) -> Result<Vec<u8>, lopdf::Error> {
    let geometry = page_geometry(options);
    let document = dom::parse(html);
    let pages = flow::layout(&document, &geometry);
    debug!(
        "Laid out {} blocks on {} page(s)",
        document.blocks.len(),
        pages.len()
    );

    let decorations = options.display_header_footer.then(|| PageDecorations {
        header: Template::parse(options.header_template_or_default()),
        footer: Template::parse(options.footer_template_or_default()),
        context: TemplateContext::for_document(document.title.clone().unwrap_or_default(), ""),
    });

    paint::paint(
        &pages,
        &geometry,
        decorations.as_ref(),
        document.title.as_deref(),
    )
}

/// Paper and margins of `options` in points, orientation applied.
pub fn page_geometry(options: &RenderOptions) -> PageGeometry {
    let (width, height) = options.paper_size_inches();
    PageGeometry {
        width: width * POINTS_PER_INCH,
        height: height * POINTS_PER_INCH,
        margin_top: options.margin_top.to_points(),
        margin_right: options.margin_right.to_points(),
        margin_bottom: options.margin_bottom.to_points(),
        margin_left: options.margin_left.to_points(),
    }
}
