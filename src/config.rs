//! Configuration types for HTML-to-PDF rendering.
//!
//! Three structs carry every knob:
//!
//! * [`RenderOptions`]: what the PDF should look like (paper, margins,
//!   header/footer). A value object shared by all backends and the only
//!   thing that travels with a single render call.
//! * [`PipelineConfig`]: how the pipeline runs (deadline, where temporary
//!   artifacts live, progress events).
//! * [`BrowserSettings`]: how the browser-driven backends find and launch
//!   Chrome/Chromium.
//!
//! # Design choice: builder over constructor
//! As in the rest of the crate, callers set only what they care about and
//! rely on documented defaults for the rest; `build()` validates the result
//! so an impossible layout (margins wider than the paper) is rejected before
//! a browser is ever launched.

use crate::error::RenderError;
use crate::progress::ProgressCallback;
use crate::templates::{DEFAULT_FOOTER_TEMPLATE, DEFAULT_HEADER_TEMPLATE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── RenderOptions ────────────────────────────────────────────────────────

/// Page layout for a single render.
///
/// JSON field names follow the camelCase convention used by browser print
/// APIs, so an options file written for one tool can be reused here:
///
/// ```json
/// { "pageFormat": "Letter", "marginTop": "1in", "displayHeaderFooter": false }
/// ```
///
/// Missing fields fall back to [`RenderOptions::default()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Paper size. Default: A4.
    pub page_format: PageFormat,

    /// Top margin. Default: 60px. Also the band the header is drawn in.
    pub margin_top: Length,

    /// Right margin. Default: 40px.
    pub margin_right: Length,

    /// Bottom margin. Default: 60px. Also the band the footer is drawn in.
    pub margin_bottom: Length,

    /// Left margin. Default: 40px.
    pub margin_left: Length,

    /// Header markup. May contain the `pageNumber`, `totalPages`, `title`,
    /// `url` and `date` placeholder classes. `None` uses the built-in default.
    #[serde(rename = "headerTemplateHTML")]
    pub header_template: Option<String>,

    /// Footer markup, same placeholder rules as the header. `None` uses the
    /// built-in "N of M" footer.
    #[serde(rename = "footerTemplateHTML")]
    pub footer_template: Option<String>,

    /// Whether header and footer are drawn at all. Default: true.
    pub display_header_footer: bool,

    /// Paint background colours and images. Default: true.
    pub print_background: bool,

    /// Rotate the page 90°. Default: false.
    pub landscape: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_format: PageFormat::A4,
            margin_top: Length::px(60.0),
            margin_right: Length::px(40.0),
            margin_bottom: Length::px(60.0),
            margin_left: Length::px(40.0),
            header_template: None,
            footer_template: None,
            display_header_footer: true,
            print_background: true,
            landscape: false,
        }
    }
}

impl RenderOptions {
    /// Create a new builder for `RenderOptions`.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Parse options from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        let options: RenderOptions = serde_json::from_str(json)
            .map_err(|e| RenderError::InvalidOptions(format!("options JSON: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Header markup after applying the default.
    pub fn header_template_or_default(&self) -> &str {
        self.header_template
            .as_deref()
            .unwrap_or(DEFAULT_HEADER_TEMPLATE)
    }

    /// Footer markup after applying the default.
    pub fn footer_template_or_default(&self) -> &str {
        self.footer_template
            .as_deref()
            .unwrap_or(DEFAULT_FOOTER_TEMPLATE)
    }

    /// Paper `(width, height)` in inches, orientation applied.
    pub fn paper_size_inches(&self) -> (f64, f64) {
        let (w, h) = self.page_format.size_inches();
        if self.landscape {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Margins `(top, right, bottom, left)` in inches.
    pub fn margins_inches(&self) -> (f64, f64, f64, f64) {
        (
            self.margin_top.to_inches(),
            self.margin_right.to_inches(),
            self.margin_bottom.to_inches(),
            self.margin_left.to_inches(),
        )
    }

    /// Reject negative or non-finite margins and layouts that leave no
    /// printable area.
    pub fn validate(&self) -> Result<(), RenderError> {
        for (side, margin) in [
            ("top", &self.margin_top),
            ("right", &self.margin_right),
            ("bottom", &self.margin_bottom),
            ("left", &self.margin_left),
        ] {
            if !margin.value.is_finite() || margin.value < 0.0 {
                return Err(RenderError::InvalidOptions(format!(
                    "{side} margin must be a finite, non-negative length (got {})",
                    margin.value
                )));
            }
        }

        let (w, h) = self.paper_size_inches();
        let (top, right, bottom, left) = self.margins_inches();
        if left + right >= w {
            return Err(RenderError::InvalidOptions(format!(
                "left + right margins ({}, {}) leave no printable width on {} paper",
                self.margin_left, self.margin_right, self.page_format
            )));
        }
        if top + bottom >= h {
            return Err(RenderError::InvalidOptions(format!(
                "top + bottom margins ({}, {}) leave no printable height on {} paper",
                self.margin_top, self.margin_bottom, self.page_format
            )));
        }
        Ok(())
    }
}

/// Builder for [`RenderOptions`].
#[derive(Debug)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    pub fn page_format(mut self, format: PageFormat) -> Self {
        self.options.page_format = format;
        self
    }

    /// Set all four margins to the same length.
    pub fn margin(mut self, all: Length) -> Self {
        self.options.margin_top = all;
        self.options.margin_right = all;
        self.options.margin_bottom = all;
        self.options.margin_left = all;
        self
    }

    pub fn margin_top(mut self, len: Length) -> Self {
        self.options.margin_top = len;
        self
    }

    pub fn margin_right(mut self, len: Length) -> Self {
        self.options.margin_right = len;
        self
    }

    pub fn margin_bottom(mut self, len: Length) -> Self {
        self.options.margin_bottom = len;
        self
    }

    pub fn margin_left(mut self, len: Length) -> Self {
        self.options.margin_left = len;
        self
    }

    pub fn header_template(mut self, markup: impl Into<String>) -> Self {
        self.options.header_template = Some(markup.into());
        self
    }

    pub fn footer_template(mut self, markup: impl Into<String>) -> Self {
        self.options.footer_template = Some(markup.into());
        self
    }

    pub fn display_header_footer(mut self, v: bool) -> Self {
        self.options.display_header_footer = v;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.options.print_background = v;
        self
    }

    pub fn landscape(mut self, v: bool) -> Self {
        self.options.landscape = v;
        self
    }

    /// Build the options, validating that some printable area remains.
    pub fn build(self) -> Result<RenderOptions, RenderError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

// ── Lengths ──────────────────────────────────────────────────────────────

/// Unit of a [`Length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// CSS pixel, 1/96 inch.
    Px,
    /// Point, 1/72 inch.
    Pt,
    In,
    Cm,
    Mm,
}

impl LengthUnit {
    fn per_inch(self) -> f64 {
        match self {
            LengthUnit::Px => 96.0,
            LengthUnit::Pt => 72.0,
            LengthUnit::In => 1.0,
            LengthUnit::Cm => 2.54,
            LengthUnit::Mm => 25.4,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Pt => "pt",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
        }
    }
}

/// A non-negative length with a unit, e.g. `60px` or `1.5cm`.
///
/// Parsed from strings; a bare number is taken as CSS pixels. Displays in
/// its original unit so it can be handed to CSS unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LengthRepr", into = "String")]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    pub const ZERO: Length = Length {
        value: 0.0,
        unit: LengthUnit::Px,
    };

    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn px(value: f64) -> Self {
        Self::new(value, LengthUnit::Px)
    }

    pub fn to_inches(&self) -> f64 {
        self.value / self.unit.per_inch()
    }

    /// Length in PDF user-space units (1/72 inch).
    pub fn to_points(&self) -> f64 {
        self.to_inches() * 72.0
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Length {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| RenderError::InvalidOptions(format!("invalid length '{s}'")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(RenderError::InvalidOptions(format!(
                "length must be a non-negative number, got '{s}'"
            )));
        }

        let unit = match suffix.to_ascii_lowercase().as_str() {
            "" | "px" => LengthUnit::Px,
            "pt" => LengthUnit::Pt,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            other => {
                return Err(RenderError::InvalidOptions(format!(
                    "unknown length unit '{other}' in '{s}' (use px, pt, in, cm or mm)"
                )))
            }
        };
        Ok(Length::new(value, unit))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LengthRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<LengthRepr> for Length {
    type Error = RenderError;

    fn try_from(repr: LengthRepr) -> Result<Self, Self::Error> {
        match repr {
            LengthRepr::Number(n) => format!("{n}").parse(),
            LengthRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Length> for String {
    fn from(len: Length) -> Self {
        len.to_string()
    }
}

// ── Paper formats ────────────────────────────────────────────────────────

/// Named paper size.
///
/// | Format | Inches |
/// |--------|--------|
/// | Letter | 8.5 × 11 |
/// | Legal | 8.5 × 14 |
/// | Tabloid | 11 × 17 |
/// | Ledger | 17 × 11 |
/// | A0–A6 | ISO 216 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PageFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
}

impl PageFormat {
    pub const ALL: [PageFormat; 11] = [
        PageFormat::Letter,
        PageFormat::Legal,
        PageFormat::Tabloid,
        PageFormat::Ledger,
        PageFormat::A0,
        PageFormat::A1,
        PageFormat::A2,
        PageFormat::A3,
        PageFormat::A4,
        PageFormat::A5,
        PageFormat::A6,
    ];

    /// Portrait `(width, height)` in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
            PageFormat::Tabloid => (11.0, 17.0),
            PageFormat::Ledger => (17.0, 11.0),
            PageFormat::A0 => (33.1, 46.8),
            PageFormat::A1 => (23.4, 33.1),
            PageFormat::A2 => (16.54, 23.4),
            PageFormat::A3 => (11.7, 16.54),
            PageFormat::A4 => (8.27, 11.7),
            PageFormat::A5 => (5.83, 8.27),
            PageFormat::A6 => (4.13, 5.83),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
            PageFormat::Tabloid => "Tabloid",
            PageFormat::Ledger => "Ledger",
            PageFormat::A0 => "A0",
            PageFormat::A1 => "A1",
            PageFormat::A2 => "A2",
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::A6 => "A6",
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PageFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PageFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                RenderError::InvalidOptions(format!(
                    "unknown page format '{s}' (expected one of Letter, Legal, Tabloid, Ledger, A0-A6)"
                ))
            })
    }
}

impl TryFrom<String> for PageFormat {
    type Error = RenderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PageFormat> for String {
    fn from(f: PageFormat) -> Self {
        f.name().to_string()
    }
}

// ── PipelineConfig ───────────────────────────────────────────────────────

/// How the pipeline runs, independent of what a single document looks like.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Deadline for one backend invocation in seconds. `0` disables it.
    /// Default: 60.
    ///
    /// Browser startup dominates latency; a minute covers a cold Chrome launch
    /// on a loaded CI box with plenty of headroom while still catching a
    /// browser that hangs on a never-ending network request.
    pub timeout_secs: u64,

    /// Directory temporary artifacts are created in. `None` uses the system
    /// temporary directory.
    pub temp_dir: Option<PathBuf>,

    /// Optional progress callback for render lifecycle events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            temp_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("timeout_secs", &self.timeout_secs)
            .field("temp_dir", &self.temp_dir)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured deadline, if any.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, RenderError> {
        if let Some(ref dir) = self.config.temp_dir {
            if dir.as_os_str().is_empty() {
                return Err(RenderError::InvalidConfig(
                    "temp_dir must not be empty".into(),
                ));
            }
            if dir.exists() && !dir.is_dir() {
                return Err(RenderError::InvalidConfig(format!(
                    "temp_dir '{}' exists but is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── BrowserSettings ──────────────────────────────────────────────────────

/// Launch settings shared by the browser-driven backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Explicit executable. `None` searches `CHROME_PATH`, well-known install
    /// locations, then `PATH`.
    pub executable: Option<PathBuf>,

    /// Extra command-line switches appended after the built-in ones.
    pub extra_args: Vec<String>,

    /// Pass `--no-sandbox`. Default: true, since rendering typically runs as
    /// root inside containers where the sandbox cannot start.
    pub no_sandbox: bool,

    /// Keep one browser alive across renders (automation backend only).
    /// Default: false: every render launches and closes its own browser.
    pub reuse_browser: bool,

    /// Seconds allowed for the browser to start and accept a connection.
    /// Default: 20.
    pub launch_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            extra_args: Vec::new(),
            no_sandbox: true,
            reuse_browser: false,
            launch_timeout_secs: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_print_defaults() {
        let o = RenderOptions::default();
        assert_eq!(o.page_format, PageFormat::A4);
        assert_eq!(o.margin_top.to_string(), "60px");
        assert_eq!(o.margin_right.to_string(), "40px");
        assert_eq!(o.margin_bottom.to_string(), "60px");
        assert_eq!(o.margin_left.to_string(), "40px");
        assert!(o.display_header_footer);
        assert!(o.print_background);
        assert!(!o.landscape);
        assert!(o.footer_template_or_default().contains("pageNumber"));
    }

    #[test]
    fn length_parsing_units() {
        assert_eq!("60px".parse::<Length>().unwrap(), Length::px(60.0));
        assert_eq!("12".parse::<Length>().unwrap(), Length::px(12.0));
        let cm: Length = " 2.54CM ".parse().unwrap();
        assert_eq!(cm.unit, LengthUnit::Cm);
        assert!((cm.to_inches() - 1.0).abs() < 1e-9);
        assert!(("72pt".parse::<Length>().unwrap().to_inches() - 1.0).abs() < 1e-9);
        assert!(("96px".parse::<Length>().unwrap().to_points() - 72.0).abs() < 1e-9);
    }

    #[test]
    fn length_rejects_garbage() {
        assert!("abc".parse::<Length>().is_err());
        assert!("-5px".parse::<Length>().is_err());
        assert!("10furlongs".parse::<Length>().is_err());
    }

    #[test]
    fn page_format_case_insensitive() {
        assert_eq!("a4".parse::<PageFormat>().unwrap(), PageFormat::A4);
        assert_eq!("LETTER".parse::<PageFormat>().unwrap(), PageFormat::Letter);
        assert!("B5".parse::<PageFormat>().is_err());
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let o = RenderOptions::builder()
            .page_format(PageFormat::Letter)
            .landscape(true)
            .build()
            .unwrap();
        assert_eq!(o.paper_size_inches(), (11.0, 8.5));
    }

    #[test]
    fn builder_rejects_margins_wider_than_paper() {
        let err = RenderOptions::builder()
            .page_format(PageFormat::A6)
            .margin(Length::new(3.0, LengthUnit::In))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("printable width"), "got: {err}");
    }

    #[test]
    fn builder_rejects_negative_and_nan_margins() {
        let err = RenderOptions::builder()
            .margin_left(Length::new(-1.0, LengthUnit::Px))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("left margin"), "got: {err}");

        let err = RenderOptions::builder()
            .margin_top(Length::new(f64::NAN, LengthUnit::Mm))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("top margin"), "got: {err}");

        let o = RenderOptions {
            margin_bottom: Length::new(f64::INFINITY, LengthUnit::In),
            ..RenderOptions::default()
        };
        assert!(matches!(o.validate(), Err(RenderError::InvalidOptions(_))));
        assert!(RenderOptions::builder().margin(Length::ZERO).build().is_ok());
    }

    #[test]
    fn json_uses_camel_case_names() {
        let o = RenderOptions::from_json(
            r#"{
                "pageFormat": "letter",
                "marginTop": "1in",
                "marginLeft": 20,
                "headerTemplateHTML": "<span class=\"title\"></span>",
                "displayHeaderFooter": false
            }"#,
        )
        .unwrap();
        assert_eq!(o.page_format, PageFormat::Letter);
        assert_eq!(o.margin_top, Length::new(1.0, LengthUnit::In));
        assert_eq!(o.margin_left, Length::px(20.0));
        assert_eq!(o.margin_right, Length::px(40.0));
        assert_eq!(o.header_template.as_deref(), Some("<span class=\"title\"></span>"));
        assert!(!o.display_header_footer);

        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["pageFormat"], "Letter");
        assert_eq!(json["marginTop"], "1in");
        assert!(json.get("headerTemplateHTML").is_some());
    }

    #[test]
    fn json_rejects_unknown_format() {
        assert!(RenderOptions::from_json(r#"{"pageFormat": "B7"}"#).is_err());
    }

    #[test]
    fn pipeline_timeout_zero_disables() {
        let c = PipelineConfig::builder().timeout_secs(0).build().unwrap();
        assert!(c.timeout().is_none());
        assert_eq!(
            PipelineConfig::default().timeout(),
            Some(std::time::Duration::from_secs(60))
        );
    }

    #[test]
    fn pipeline_rejects_file_as_temp_dir() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let err = PipelineConfig::builder()
            .temp_dir(f.path())
            .build()
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }
}
