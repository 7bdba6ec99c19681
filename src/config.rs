//! Configuration types for report generation.
//!
//! All generation behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between a session and its runs, and to log
//! exactly what a run used.

use crate::error::ReportError;
use crate::layout::PageGeometry;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for building a report.
///
/// Built via [`ReportConfig::builder()`] or using [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use walk_report::{PageSize, ReportConfig};
///
/// let config = ReportConfig::builder()
///     .page_size(PageSize::Letter)
///     .margin_mm(12.0)
///     .prefetch(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry().margin, 12.0);
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Sheet size for every page. Default: A4 portrait.
    pub page_size: PageSize,

    /// Uniform margin on all four sides, in millimetres. Default: 10.
    pub margin_mm: f64,

    /// Gap between the image's bottom edge and the caption baseline. Default: 5 mm.
    pub caption_gap_mm: f64,

    /// Captions whose baseline lands within this distance of the page bottom
    /// are skipped. Default: 5 mm.
    pub bottom_safety_mm: f64,

    /// Caption font size in points. Default: 10.
    pub caption_font_size: f32,

    /// Caption grey level, 0 (black) – 255 (white). Default: 100.
    pub caption_gray: u8,

    /// JPEG quality used when re-encoding images for embedding. Default: 85.
    pub jpeg_quality: u8,

    /// Longest edge, in pixels, of an embedded image. Default: 2400.
    ///
    /// Phone photos are often 4000+ px wide; at A4 and 10 mm margins 2400 px
    /// is already above 300 DPI, so larger sources only inflate the file.
    pub max_image_pixels: u32,

    /// How many pages may be resolved ahead of the drawing cursor. Default: 2.
    ///
    /// Drawing is strictly sequential; prefetch only overlaps fetching and
    /// decoding of later pages with drawing of the current one. Page order in
    /// the document is unaffected.
    pub prefetch: usize,

    /// Per-asset fetch timeout in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Remove the generated pages from the live list after a successful run.
    /// Default: true.
    pub clear_after_generate: bool,

    /// Receives per-page progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin_mm: 10.0,
            caption_gap_mm: 5.0,
            bottom_safety_mm: 5.0,
            caption_font_size: 10.0,
            caption_gray: 100,
            jpeg_quality: 85,
            max_image_pixels: 2400,
            prefetch: 2,
            fetch_timeout_secs: 30,
            clear_after_generate: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("page_size", &self.page_size)
            .field("margin_mm", &self.margin_mm)
            .field("caption_gap_mm", &self.caption_gap_mm)
            .field("bottom_safety_mm", &self.bottom_safety_mm)
            .field("caption_font_size", &self.caption_font_size)
            .field("caption_gray", &self.caption_gray)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("prefetch", &self.prefetch)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("clear_after_generate", &self.clear_after_generate)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page geometry handed to the layout engine.
    pub fn geometry(&self) -> PageGeometry {
        let (width, height) = self.page_size.dimensions_mm();
        PageGeometry {
            width,
            height,
            margin: self.margin_mm,
            caption_gap: self.caption_gap_mm,
            bottom_safety: self.bottom_safety_mm,
        }
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_mm(mut self, mm: f64) -> Self {
        self.config.margin_mm = mm;
        self
    }

    pub fn caption_gap_mm(mut self, mm: f64) -> Self {
        self.config.caption_gap_mm = mm;
        self
    }

    pub fn bottom_safety_mm(mut self, mm: f64) -> Self {
        self.config.bottom_safety_mm = mm;
        self
    }

    pub fn caption_font_size(mut self, pt: f32) -> Self {
        self.config.caption_font_size = pt.clamp(4.0, 72.0);
        self
    }

    pub fn caption_gray(mut self, level: u8) -> Self {
        self.config.caption_gray = level;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(64);
        self
    }

    pub fn prefetch(mut self, n: usize) -> Self {
        self.config.prefetch = n.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn clear_after_generate(mut self, v: bool) -> Self {
        self.config.clear_after_generate = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        let (w, h) = c.page_size.dimensions_mm();
        if !(w > 0.0 && h > 0.0) {
            return Err(ReportError::InvalidConfig(format!(
                "Page size must be positive, got {w}×{h} mm"
            )));
        }
        if !(c.margin_mm >= 0.0) || 2.0 * c.margin_mm >= w.min(h) {
            return Err(ReportError::InvalidConfig(format!(
                "Margin {} mm leaves no printable area on a {w}×{h} mm page",
                c.margin_mm
            )));
        }
        if c.caption_gap_mm < 0.0 || c.bottom_safety_mm < 0.0 {
            return Err(ReportError::InvalidConfig(
                "Caption gap and bottom safety must be ≥ 0".into(),
            ));
        }
        if c.fetch_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "Fetch timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Standard sheet sizes, portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 215.9 × 279.4 mm.
    Letter,
    /// Any other size, in millimetres.
    Custom { width_mm: f64, height_mm: f64 },
}

impl PageSize {
    /// `(width, height)` in millimetres.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match *self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }
}
