//! CLI binary for edgequake-html2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `RenderOptions` / `PipelineConfig` / `BrowserSettings`, runs the render
//! (with the fallback policy for `--backend auto`) and writes the PDF.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_html2pdf::{
    create_backend, render_with_fallback, rewrite_urls_counted, write_pdf_atomic, BackendKind,
    BrowserSettings, Length, PageFormat, PdfPipeline, PipelineConfig, ProgressCallback,
    RenderBackend, RenderOptions, RenderProgressCallback, StaticBaseUrl,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while a backend runs, plus one log
/// line per attempt so fallbacks are visible.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, backend: &str, html_bytes: usize) {
        self.bar.set_prefix("Rendering");
        self.bar
            .set_message(format!("{backend}  {}", dim(&format!("{html_bytes} bytes of HTML"))));
    }

    fn on_rewrite_complete(&self, expanded: usize) {
        if expanded > 0 {
            self.bar.println(format!(
                "  {} {} relative references expanded",
                cyan("↻"),
                expanded
            ));
        }
    }

    fn on_render_complete(&self, backend: &str, pdf_bytes: usize, elapsed_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}  {}",
            green("✔"),
            bold(backend),
            dim(&format!("{pdf_bytes} bytes")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        );
    }

    fn on_render_error(&self, backend: &str, error: &str) {
        // Keep the first line only; multi-line hints are repeated by anyhow.
        let first = error.lines().next().unwrap_or(error);
        let msg = if first.chars().count() > 100 {
            format!("{}\u{2026}", first.chars().take(99).collect::<String>())
        } else {
            first.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), bold(backend), red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render a file with the best available backend
  html2pdf invoice.html -o invoice.pdf --base-url https://shop.example.com

  # Read from stdin, write to stdout
  curl -s https://example.com/report | html2pdf - --base-url https://example.com > report.pdf

  # Letter paper, landscape, 1in margins, no header/footer
  html2pdf page.html -o page.pdf --format Letter --landscape --margin 1in --no-header-footer

  # Force the built-in layout engine (no browser needed)
  html2pdf page.html -o page.pdf --backend layout

  # Custom footer template (Chrome placeholders: pageNumber, totalPages, title, url, date)
  html2pdf page.html -o page.pdf --footer-template footer.html

  # Show what the rewriter does, without rendering
  html2pdf page.html --base-url https://example.com --rewrite-only

  # Render options from a JSON file (camelCase keys), then override one
  html2pdf page.html -o page.pdf --options print.json --margin-top 2cm

BACKENDS:
  Name      Needs            JavaScript  Notes
  ────────  ───────────────  ──────────  ───────────────────────────────────
  auto      —                —           browser → cli → layout, moving on only
                                         when a backend is not installed
  browser   Chrome/Chromium  yes         DevTools protocol, Page.printToPDF
  cli       Chrome/Chromium  yes         chrome --headless --print-to-pdf
  layout    nothing          no          built-in engine, text and structure only

OPTIONS FILE (--options):
  { "pageFormat": "A4", "marginTop": "60px", "marginRight": "40px",
    "marginBottom": "60px", "marginLeft": "40px", "displayHeaderFooter": true,
    "headerTemplateHTML": "<span class='title'></span>",
    "footerTemplateHTML": "<span class='pageNumber'></span> of <span class='totalPages'></span>",
    "printBackground": true, "landscape": false }

ENVIRONMENT VARIABLES:
  HTML2PDF_BASE_URL   Base URL relative references are resolved against
  HTML2PDF_BACKEND    auto, browser, cli or layout
  HTML2PDF_TIMEOUT    Render deadline in seconds (0 disables)
  HTML2PDF_TEMP_DIR   Directory for temporary artifacts
  CHROME_PATH         Chrome/Chromium executable (also CHROMIUM_PATH)
  RUST_LOG            Log filter, e.g. RUST_LOG=edgequake_html2pdf=debug
"#;

/// Render HTML documents to PDF with base-URL rewriting.
#[derive(Parser, Debug)]
#[command(
    name = "html2pdf",
    version,
    about = "Render HTML documents to PDF, resolving relative URLs against a base URL",
    long_about = "Render HTML documents to PDF. Relative href/src attributes and CSS url() \
references are first expanded against --base-url so the renderer can fetch images, \
stylesheets and fonts. Renders with headless Chrome/Chromium (DevTools or CLI) or with a \
built-in layout engine that needs no browser.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTML file to render, or `-` for stdin.
    input: String,

    /// Write the PDF to this file instead of stdout.
    #[arg(short, long, env = "HTML2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Base URL (scheme + host) relative references are resolved against.
    #[arg(short, long, env = "HTML2PDF_BASE_URL", default_value = "")]
    base_url: String,

    /// Render backend: auto, browser, cli, layout.
    #[arg(long, env = "HTML2PDF_BACKEND", value_enum, default_value = "auto")]
    backend: BackendArg,

    /// Paper size: A0–A6, Letter, Legal, Tabloid, Ledger.
    #[arg(long, env = "HTML2PDF_FORMAT")]
    format: Option<String>,

    /// All four margins, e.g. 1in, 2cm, 40px.
    #[arg(long)]
    margin: Option<String>,

    #[arg(long)]
    margin_top: Option<String>,

    #[arg(long)]
    margin_right: Option<String>,

    #[arg(long)]
    margin_bottom: Option<String>,

    #[arg(long)]
    margin_left: Option<String>,

    /// Landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// File containing header template markup.
    #[arg(long)]
    header_template: Option<PathBuf>,

    /// File containing footer template markup.
    #[arg(long)]
    footer_template: Option<PathBuf>,

    /// Do not print a header or footer.
    #[arg(long)]
    no_header_footer: bool,

    /// Do not print background colours and images.
    #[arg(long)]
    no_background: bool,

    /// JSON file with render options (camelCase keys); flags override it.
    #[arg(long, env = "HTML2PDF_OPTIONS")]
    options: Option<PathBuf>,

    /// Render deadline in seconds; 0 disables it.
    #[arg(long, env = "HTML2PDF_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Directory for temporary artifacts.
    #[arg(long, env = "HTML2PDF_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Chrome/Chromium executable.
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Extra browser switch (repeatable), e.g. --chrome-arg=--lang=de.
    #[arg(long = "chrome-arg", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Keep the browser sandbox on (it is off by default for containers).
    #[arg(long)]
    sandbox: bool,

    /// Print the rewritten HTML and exit without rendering.
    #[arg(long)]
    rewrite_only: bool,

    /// Print render statistics as JSON on stdout (requires --output).
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "HTML2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum BackendArg {
    Auto,
    Browser,
    Cli,
    Layout,
}

impl BackendArg {
    fn kinds(self) -> Vec<BackendKind> {
        match self {
            BackendArg::Auto => vec![
                BackendKind::BrowserAutomation,
                BackendKind::BrowserCli,
                BackendKind::LayoutEngine,
            ],
            BackendArg::Browser => vec![BackendKind::BrowserAutomation],
            BackendArg::Cli => vec![BackendKind::BrowserCli],
            BackendArg::Layout => vec![BackendKind::LayoutEngine],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would
    // tear it, so they are only shown without it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.rewrite_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.json && cli.output.is_none() {
        bail!("--json prints statistics on stdout; use --output for the PDF");
    }

    // ── Read input ───────────────────────────────────────────────────────
    let html = read_input(&cli.input).await?;
    if cli.base_url.trim().is_empty() {
        warn!("No --base-url given; relative references are left as they are");
    }

    // ── Rewrite-only mode ────────────────────────────────────────────────
    if cli.rewrite_only {
        let (rewritten, expanded) = rewrite_urls_counted(&html, &cli.base_url);
        io::stdout()
            .lock()
            .write_all(rewritten.as_bytes())
            .context("Failed to write to stdout")?;
        if !cli.quiet {
            eprintln!("{} {} references expanded", cyan("↻"), expanded);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let options = build_options(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };
    let mut builder = PipelineConfig::builder().timeout_secs(cli.timeout);
    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid pipeline configuration")?;
    let pipeline = PdfPipeline::new(StaticBaseUrl::new(&cli.base_url), config);

    let settings = BrowserSettings {
        executable: cli.chrome_path.clone(),
        extra_args: cli.chrome_args.clone(),
        no_sandbox: !cli.sandbox,
        ..BrowserSettings::default()
    };
    let backends = build_backends(cli.backend, &settings)?;

    // ── Render ───────────────────────────────────────────────────────────
    let output = render_with_fallback(&pipeline, &html, &options, &backends)
        .await
        .context("Render failed")?;

    // ── Write output ─────────────────────────────────────────────────────
    match cli.output {
        Some(ref path) => {
            write_pdf_atomic(path, &output.pdf)
                .await
                .context("Failed to write PDF")?;
            if cli.json {
                let json = serde_json::to_string_pretty(&output.stats)
                    .context("Failed to serialise stats")?;
                println!("{json}");
            } else if !cli.quiet {
                eprintln!(
                    "{}  {}  {} refs rewritten  {}ms  →  {}",
                    green("✔"),
                    output.stats.backend,
                    output.stats.rewritten_references,
                    output.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            io::stdout()
                .lock()
                .write_all(&output.pdf)
                .context("Failed to write PDF to stdout")?;
        }
    }

    Ok(())
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut html = String::new();
        io::stdin()
            .read_to_string(&mut html)
            .context("Failed to read HTML from stdin")?;
        Ok(html)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {input}"))
    }
}

/// Options file first, then individual flags on top.
async fn build_options(cli: &Cli) -> Result<RenderOptions> {
    let mut options = match cli.options {
        Some(ref path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read options from {:?}", path))?;
            RenderOptions::from_json(&json)
                .with_context(|| format!("Invalid options file {:?}", path))?
        }
        None => RenderOptions::default(),
    };

    if let Some(ref format) = cli.format {
        options.page_format = format.parse::<PageFormat>()?;
    }
    if let Some(ref all) = cli.margin {
        let len = parse_length("--margin", all)?;
        options.margin_top = len;
        options.margin_right = len;
        options.margin_bottom = len;
        options.margin_left = len;
    }
    for (flag, value, slot) in [
        ("--margin-top", &cli.margin_top, &mut options.margin_top),
        ("--margin-right", &cli.margin_right, &mut options.margin_right),
        ("--margin-bottom", &cli.margin_bottom, &mut options.margin_bottom),
        ("--margin-left", &cli.margin_left, &mut options.margin_left),
    ] {
        if let Some(v) = value {
            *slot = parse_length(flag, v)?;
        }
    }
    if cli.landscape {
        options.landscape = true;
    }
    if cli.no_background {
        options.print_background = false;
    }
    if cli.no_header_footer {
        options.display_header_footer = false;
    }
    if let Some(ref path) = cli.header_template {
        options.header_template = Some(read_template(path).await?);
    }
    if let Some(ref path) = cli.footer_template {
        options.footer_template = Some(read_template(path).await?);
    }

    options.validate()?;
    debug!("Render options: {:?}", options);
    Ok(options)
}

fn parse_length(flag: &str, value: &str) -> Result<Length> {
    value
        .parse::<Length>()
        .with_context(|| format!("Invalid value for {flag}"))
}

async fn read_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read template from {:?}", path))
}

/// Backends to try, in order. Kinds this build cannot construct are skipped
/// in `auto` mode and reported otherwise.
fn build_backends(arg: BackendArg, settings: &BrowserSettings) -> Result<Vec<Box<dyn RenderBackend>>> {
    let mut backends = Vec::new();
    for kind in arg.kinds() {
        match create_backend(kind, settings) {
            Ok(backend) => backends.push(backend),
            Err(e) if arg == BackendArg::Auto => debug!("Skipping {}: {}", kind, e),
            Err(e) => return Err(e).context("Backend not available in this build"),
        }
    }
    Ok(backends)
}
