//! Configuration types for spreadsheet-to-PNG conversion.
//!
//! Every knob of the pipeline lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Each component (masker, sanitizer, sizer,
//! paginator, gate) receives the slice of it that it needs at construction
//! time; nothing reads ambient globals.
//!
//! The keyword lists are split out into [`RedactionRules`] so operators can
//! keep them in a JSON file next to the data rather than in code.

use crate::error::SheetError;
use crate::pipeline::annotate::ImageAnnotator;
use crate::pipeline::render::RenderBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for a conversion run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use sheet2png::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .rows_per_page(10)
///     .leak_tolerance(5)
///     .output_dir("previews")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Keyword lists and the header sentinel.
    pub rules: RedactionRules,

    /// Maximum cumulative leak count per file before the retry/quarantine
    /// path is taken. Default: 5.
    ///
    /// A count equal to the tolerance is still accepted.
    pub leak_tolerance: usize,

    /// Data rows per rendered page. Default: 10.
    ///
    /// The final page of a sheet is padded to this many rows so every image
    /// has the same canvas height.
    pub rows_per_page: usize,

    /// Data columns kept per row; extra columns are dropped, short rows are
    /// padded. Default: 15.
    pub max_columns: usize,

    /// How many leading rows are searched for the sentinel URL. Default: 30.
    pub sentinel_scan_rows: usize,

    /// Column widths and wrap heuristics.
    pub layout: LayoutConstants,

    /// Canvas size of every rendered page. Default: 2000 × 1300.
    pub viewport: Viewport,

    /// Number of images per file left unobscured. Default: 10.
    ///
    /// Counting is global across all sheets of a file, in render order.
    pub free_preview_images: usize,

    /// Watermark and blur settings for the default annotator.
    pub watermark: WatermarkConfig,

    /// Root directory for rendered images. Default: `output_images`.
    pub output_dir: PathBuf,

    /// Directory receiving quarantined source files. Default: `data_check`.
    pub quarantine_dir: PathBuf,

    /// Whether quarantine moves or copies the source file. Default: move.
    pub quarantine_mode: QuarantineMode,

    /// Number of files processed concurrently in a batch. Default: 2.
    ///
    /// Page generation and auditing run in parallel per file; screenshots are
    /// serialized by the rendering backend regardless of this value.
    pub concurrency: usize,

    /// Explicit browser binary for the default Chromium backend.
    /// If None, the backend searches the environment and `PATH`.
    pub browser_path: Option<PathBuf>,

    /// Pre-constructed rendering backend. Takes precedence over `browser_path`.
    pub renderer: Option<Arc<dyn RenderBackend>>,

    /// Pre-constructed image annotator. If None, a
    /// [`crate::pipeline::annotate::WatermarkAnnotator`] is built from
    /// `watermark`.
    pub annotator: Option<Arc<dyn ImageAnnotator>>,

    /// Progress events for batch and per-file milestones.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: RedactionRules::default(),
            leak_tolerance: 5,
            rows_per_page: 10,
            max_columns: 15,
            sentinel_scan_rows: 30,
            layout: LayoutConstants::default(),
            viewport: Viewport::default(),
            free_preview_images: 10,
            watermark: WatermarkConfig::default(),
            output_dir: PathBuf::from("output_images"),
            quarantine_dir: PathBuf::from("data_check"),
            quarantine_mode: QuarantineMode::default(),
            concurrency: 2,
            browser_path: None,
            renderer: None,
            annotator: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("rules", &self.rules)
            .field("leak_tolerance", &self.leak_tolerance)
            .field("rows_per_page", &self.rows_per_page)
            .field("max_columns", &self.max_columns)
            .field("sentinel_scan_rows", &self.sentinel_scan_rows)
            .field("layout", &self.layout)
            .field("viewport", &self.viewport)
            .field("free_preview_images", &self.free_preview_images)
            .field("watermark", &self.watermark)
            .field("output_dir", &self.output_dir)
            .field("quarantine_dir", &self.quarantine_dir)
            .field("quarantine_mode", &self.quarantine_mode)
            .field("concurrency", &self.concurrency)
            .field("browser_path", &self.browser_path)
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn RenderBackend>"))
            .field("annotator", &self.annotator.as_ref().map(|_| "<dyn ImageAnnotator>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn rules(mut self, rules: RedactionRules) -> Self {
        self.config.rules = rules;
        self
    }

    pub fn leak_tolerance(mut self, n: usize) -> Self {
        self.config.leak_tolerance = n;
        self
    }

    pub fn rows_per_page(mut self, n: usize) -> Self {
        self.config.rows_per_page = n;
        self
    }

    pub fn max_columns(mut self, n: usize) -> Self {
        self.config.max_columns = n;
        self
    }

    pub fn sentinel_scan_rows(mut self, n: usize) -> Self {
        self.config.sentinel_scan_rows = n;
        self
    }

    pub fn layout(mut self, layout: LayoutConstants) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport = Viewport { width, height };
        self
    }

    pub fn free_preview_images(mut self, n: usize) -> Self {
        self.config.free_preview_images = n;
        self
    }

    pub fn watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.config.watermark = watermark;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn quarantine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.quarantine_dir = dir.into();
        self
    }

    pub fn quarantine_mode(mut self, mode: QuarantineMode) -> Self {
        self.config.quarantine_mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_path = Some(path.into());
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn RenderBackend>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn annotator(mut self, annotator: Arc<dyn ImageAnnotator>) -> Self {
        self.config.annotator = Some(annotator);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, SheetError> {
        let c = &self.config;
        if c.rows_per_page == 0 {
            return Err(SheetError::InvalidConfig(
                "rows per page must be ≥ 1".into(),
            ));
        }
        if c.max_columns == 0 {
            return Err(SheetError::InvalidConfig(
                "max columns must be ≥ 1".into(),
            ));
        }
        if c.viewport.width == 0 || c.viewport.height == 0 {
            return Err(SheetError::InvalidConfig(format!(
                "viewport must be non-empty, got {}x{}",
                c.viewport.width, c.viewport.height
            )));
        }
        if !(c.layout.avg_char_width > 0.0) {
            return Err(SheetError::InvalidConfig(format!(
                "average character width must be > 0, got {}",
                c.layout.avg_char_width
            )));
        }
        if c.watermark.grid_cols == 0 || c.watermark.grid_rows == 0 {
            return Err(SheetError::InvalidConfig(
                "watermark grid must have at least one cell".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(SheetError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Redaction rules ──────────────────────────────────────────────────────

/// Keyword lists driving the masker and the sanitizer.
///
/// `remove_keywords` is the stronger policy: any cell containing one is
/// emptied entirely. `mask_keywords` only star out the keyword itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionRules {
    /// Case-insensitive literal substrings replaced by `*`.
    pub mask_keywords: Vec<String>,
    /// Case-insensitive literal substrings that clear the whole cell.
    pub remove_keywords: Vec<String>,
    /// Marker URL of operator annotation rows at the top of exported sheets.
    pub sentinel_url: Option<String>,
}

impl Default for RedactionRules {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            mask_keywords: owned(&[
                "trangvang",
                "scribd",
                "hsct",
                "hosocongty",
                "thuế",
                "thue",
                "masothue",
                "data5s",
                "google.com/maps/",
            ]),
            remove_keywords: owned(&[
                "trang vang",
                "trangvang",
                "scribd",
                "hsct",
                "hosocongty",
                "mst",
                "masothue",
                "data5s",
                "google.com/map",
            ]),
            sentinel_url: Some("https://www.facebook.com/datakhachhangtiemnang1".to_string()),
        }
    }
}

impl RedactionRules {
    /// Load rules from a JSON file. Missing fields fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SheetError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SheetError::InvalidConfig(format!("cannot read rules file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SheetError::InvalidConfig(format!("malformed rules file {}: {e}", path.display()))
        })
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Pixel constants for column sizing and the wrap heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConstants {
    /// Width of the leading row-number column. Default: 50.
    pub index_col_width: u32,
    /// Width given to the widest-content columns. Default: 200.
    pub wide_col_width: u32,
    /// Width of every other column. Default: 105.
    pub narrow_col_width: u32,
    /// How many columns get `wide_col_width`. Default: 3.
    pub wide_columns: usize,
    /// Estimated glyph advance in pixels. Default: 8.5.
    pub avg_char_width: f64,
    /// Horizontal cell padding subtracted from the column width. Default: 10.
    pub cell_padding_x: u32,
    /// Estimated line height in pixels. Default: 18.
    pub line_height: u32,
    /// Fixed table row height in pixels. Default: 108.
    pub row_height: u32,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            index_col_width: 50,
            wide_col_width: 200,
            narrow_col_width: 105,
            wide_columns: 3,
            avg_char_width: 8.5,
            cell_padding_x: 10,
            line_height: 18,
            row_height: 108,
        }
    }
}

/// Fixed canvas of every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 1300,
        }
    }
}

// ── Annotation ───────────────────────────────────────────────────────────

/// Font used for the text watermark when none is configured.
pub const DEFAULT_WATERMARK_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Settings for the default watermark/blur annotator.
///
/// Each grid cell gets one mark, picked in this order: the stamp image if
/// set, else `text` drawn in `font_path`, else a plain translucent band
/// (also used when the font cannot be loaded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Optional PNG stamp tiled over the grid instead of the text.
    pub stamp_image: Option<PathBuf>,
    /// Watermark text. Default: `DATALD.COM`.
    pub text: String,
    /// TrueType/OpenType font for `text`, sized to 1/25 of the image width.
    /// Default: DejaVu Sans at its usual Linux location.
    pub font_path: Option<PathBuf>,
    /// Alpha of the watermark, 0–255. Default: 90.
    pub opacity: u8,
    /// Grid columns. Default: 3.
    pub grid_cols: u32,
    /// Grid rows. Default: 3.
    pub grid_rows: u32,
    /// Gaussian blur sigma applied to obscured images. Default: 8.0.
    pub blur_radius: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            stamp_image: None,
            text: "DATALD.COM".to_string(),
            font_path: Some(PathBuf::from(DEFAULT_WATERMARK_FONT)),
            opacity: 90,
            grid_cols: 3,
            grid_rows: 3,
            blur_radius: 8.0,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a quarantined source file reaches the quarantine store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuarantineMode {
    /// Move the source out of the active input set (default).
    #[default]
    Move,
    /// Copy the source, leaving the original in place.
    Copy,
}
