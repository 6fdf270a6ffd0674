//! Streaming batch API: emit file reports as files complete.
//!
//! Unlike [`crate::convert::process_batch`], which returns only after every
//! file has an outcome, [`process_stream`] yields each [`FileReport`] as
//! soon as its file finishes. With `concurrency > 1` reports arrive in
//! completion order, not input order.

use crate::config::PipelineConfig;
use crate::convert::{process_file, with_shared_backends};
use crate::error::SheetError;
use crate::model::FileReport;
use crate::pipeline::source;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file reports.
pub type ReportStream = Pin<Box<dyn Stream<Item = FileReport> + Send>>;

/// Process `inputs`, streaming one report per spreadsheet file.
///
/// # Errors
/// Only when a directory input cannot be listed; per-file failures arrive
/// as [`crate::PipelineOutcome::Rejected`] items.
///
/// # Example
/// ```rust,no_run
/// use sheet2png::{process_stream, PipelineConfig};
/// use futures::StreamExt;
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let mut reports = process_stream(&[PathBuf::from("uploads/")], &config)?;
/// while let Some(report) = reports.next().await {
///     println!("{}: {}", report.file_name, report.outcome.label());
/// }
/// # Ok(())
/// # }
/// ```
pub fn process_stream(
    inputs: &[PathBuf],
    config: &PipelineConfig,
) -> Result<ReportStream, SheetError> {
    let files = source::expand_inputs(inputs)?;
    info!("Streaming {} files", files.len());

    let config = with_shared_backends(config);
    let concurrency = config.concurrency;
    let s = stream::iter(files.into_iter().map(move |path| {
        let cfg = config.clone();
        async move { process_file(&path, &cfg).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
