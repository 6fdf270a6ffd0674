//! Pipeline stages for spreadsheet-to-PNG redaction.
//!
//! Each submodule implements exactly one step. The text stages (`mask`
//! through `audit`) are pure and synchronous; only `render` and `annotate`
//! touch external programs or image data.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ sanitize ──▶ paginate ──▶ markup ──▶ audit ──▶ gate
//! (calamine)  (cells)    (mask+layout)  (HTML)   (regex)     │
//!                                                 ┌──────────┴──────────┐
//!                                              accepted            quarantined
//!                                                 ▼                     ▼
//!                                       render ──▶ annotate       quarantine
//!                                     (browser)   (watermark)     (review dir)
//! ```
//!
//! 1. [`source`]   — validate the container and read every sheet as text
//! 2. [`sanitize`] — drop sentinel rows, empty cells holding removal keywords
//! 3. [`paginate`] — split into fixed-size pages, applying [`mask`] to every
//!    cell and [`layout`] for column widths and wrap classes
//! 4. [`markup`]   — write each page as a standalone HTML document
//! 5. [`audit`]    — scan the markup independently for residual PII
//! 6. [`gate`]     — accept, regenerate once, or quarantine
//! 7. [`render`]   — rasterise accepted pages; blocking, run off the runtime
//! 8. [`annotate`] — watermark, blur pages beyond the free previews
//! 9. [`quarantine`] — deposit rejected sources for manual review

pub mod annotate;
pub mod audit;
pub mod gate;
pub mod layout;
pub mod markup;
pub mod mask;
pub mod paginate;
pub mod quarantine;
pub mod render;
pub mod sanitize;
pub mod source;
