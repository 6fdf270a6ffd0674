//! # sheet2png
//!
//! Render spreadsheets to paginated PNG previews with personal data masked,
//! and refuse to publish anything a post-render audit still flags.
//!
//! ## Why audit after masking?
//!
//! Masking rules are written against the cells; leaks happen in the output.
//! Sheet names end up in page titles, new identifier formats slip past a
//! pattern, a rule edit regresses. The auditor reads the final page markup
//! back as plain text with its own independent patterns, and a
//! [`pipeline::gate::DecisionGate`] publishes only when the count stays
//! within tolerance. Files that fail twice go to a quarantine directory for
//! manual review and produce no images at all.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Spreadsheet
//!  │
//!  ├─ 1. Source    validate container, read sheets (calamine)
//!  ├─ 2. Sanitize  strip sentinel rows, empty cells holding removal keywords
//!  ├─ 3. Paginate  10 rows per page, mask every cell, size columns
//!  ├─ 4. Markup    one HTML document per page (scratch TempDir)
//!  ├─ 5. Audit     independent leak scan of every page
//!  ├─ 6. Gate      accept │ regenerate once │ quarantine
//!  └─ 7. Publish   render (headless Chromium), watermark, blur past previews
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheet2png::{process_file, PipelineConfig, PipelineOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .output_dir("previews")
//!         .build()?;
//!     let report = process_file("customers.xlsx", &config).await;
//!     match report.outcome {
//!         PipelineOutcome::Accepted { images, .. } => println!("{} images", images.len()),
//!         other => eprintln!("{}: {:?}", report.file_name, other),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheet2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sheet2png = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    LayoutConstants, PipelineConfig, PipelineConfigBuilder, QuarantineMode, RedactionRules,
    Viewport, WatermarkConfig,
};
pub use convert::{
    process_batch, process_file, process_file_sync, process_workbook, write_summary, SUMMARY_FILE,
};
pub use error::SheetError;
pub use model::{
    BatchSummary, FileReport, FileStats, LeakReport, Page, PipelineOutcome, RenderedImage, Sheet,
    Workbook,
};
pub use pipeline::annotate::{ImageAnnotator, WatermarkAnnotator};
pub use pipeline::render::{ChromiumRenderer, RenderBackend};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use stream::{process_stream, ReportStream};
