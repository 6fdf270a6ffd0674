//! Progress-callback trait for batch and per-file pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as files move through the gate.
//!
//! # Example
//!
//! ```rust
//! use sheet2png::{PipelineConfig, PipelineOutcome, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Quarantines(AtomicUsize);
//!
//! impl PipelineProgressCallback for Quarantines {
//!     fn on_file_complete(&self, _file: &str, outcome: &PipelineOutcome) {
//!         if matches!(outcome, PipelineOutcome::Quarantined { .. }) {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Quarantines(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::PipelineOutcome;
use std::sync::Arc;

/// Called by the pipeline as it processes files.
///
/// Files in a batch run concurrently, so per-file methods may be called
/// from different threads at once. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first file starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file has been read and paginated.
    ///
    /// # Arguments
    /// * `file`  — file name (no directory)
    /// * `pages` — pages that will be generated per attempt
    fn on_file_start(&self, file: &str, pages: usize) {
        let _ = (file, pages);
    }

    /// Called after each audit round with that round's leak total.
    fn on_audit(&self, file: &str, attempt: usize, leaks: usize) {
        let _ = (file, attempt, leaks);
    }

    /// Called for every image written after acceptance.
    fn on_image_rendered(&self, file: &str, index: usize, blurred: bool) {
        let _ = (file, index, blurred);
    }

    /// Called once per file with its terminal outcome.
    fn on_file_complete(&self, file: &str, outcome: &PipelineOutcome) {
        let _ = (file, outcome);
    }

    /// Called once after every file has an outcome.
    fn on_batch_complete(&self, total_files: usize, accepted: usize) {
        let _ = (total_files, accepted);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
