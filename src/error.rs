//! Error types for the sheet2png library.
//!
//! Two distinct failure modes exist:
//!
//! * [`SheetError`] — **Fatal for one file**: the workbook cannot be read,
//!   the renderer failed, the quarantine store is unwritable. A batch never
//!   aborts on it; the error is folded into
//!   [`crate::model::PipelineOutcome::Rejected`] for that file only.
//!
//! * Leaks — **Not errors at all**. A leak found by the auditor is data
//!   ([`crate::model::LeakReport`]) that the decision gate reconciles. The
//!   only leak-related variant here, [`SheetError::LeakToleranceExceeded`],
//!   exists to give quarantine reasons a consistent wording.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal per-file errors returned by the sheet2png library.
#[derive(Debug, Error)]
pub enum SheetError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Spreadsheet not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is neither a ZIP nor an OLE2 container.
    #[error("File is not a spreadsheet: '{path}'\nFirst bytes: {magic:?}")]
    NotASpreadsheet { path: PathBuf, magic: [u8; 4] },

    /// calamine could not open or decode the workbook.
    #[error("Failed to read spreadsheet '{path}': {detail}")]
    SourceRead { path: PathBuf, detail: String },

    // ── Gate ──────────────────────────────────────────────────────────────
    /// The audit still found more leaks than allowed after the retry.
    #[error("Security check failed: {leaks} leaks detected after retry (tolerance {tolerance})")]
    LeakToleranceExceeded { leaks: usize, tolerance: usize },

    /// The source could not be deposited in the quarantine store.
    #[error("Failed to quarantine '{path}' into '{dir}': {source}")]
    QuarantineFailed {
        path: PathBuf,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Rendering ─────────────────────────────────────────────────────────
    /// The rendering backend failed to produce an image for a page.
    #[error("Rendering failed for '{page}': {detail}")]
    RenderFailed { page: String, detail: String },

    /// No rendering backend could be located on this machine.
    #[error(
        "No headless browser found: {0}\n\n\
Install Chromium or Google Chrome, or point to an existing binary with\n\
  --browser /path/to/chromium   (or set SHEET2PNG_BROWSER).\n"
    )]
    BrowserNotFound(String),

    /// Watermarking or blurring a rendered image failed.
    #[error("Failed to annotate image '{path}': {detail}")]
    AnnotateFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
