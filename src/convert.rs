//! Eager (whole-file and whole-batch) entry points.
//!
//! One file goes through three phases:
//!
//! 1. **Gate** (blocking pool): sanitize, paginate and write markup for
//!    every page into a scratch [`TempDir`], audit it, and let the
//!    [`DecisionGate`] accept, regenerate once, or quarantine.
//! 2. **Publish** (blocking pool, accepted files only): render each page to
//!    `<output>/<file>/<sheet>/<file>_<sheet>_page_<n>.png` and annotate it.
//!    `<file>` is a directory claimed for this file alone: a second file
//!    with the same stem gets `<file>_2`, and sheets whose names clean to
//!    the same component are suffixed the same way. A failure removes the
//!    claimed directory with every image already written.
//! 3. **Quarantine** (quarantined files only): deposit the source file in
//!    the review directory.
//!
//! Nothing here returns an error for a single file: every failure becomes
//! [`PipelineOutcome::Rejected`] so a batch always yields one report per
//! input. Use [`crate::stream::process_stream`] to receive reports as files
//! finish instead of waiting for the whole batch.

use crate::config::PipelineConfig;
use crate::error::SheetError;
use crate::model::{
    BatchSummary, FileReport, FileStats, Page, PipelineOutcome, RenderedImage, Workbook,
};
use crate::pipeline::annotate::{ImageAnnotator, WatermarkAnnotator};
use crate::pipeline::audit;
use crate::pipeline::gate::{DecisionGate, GateVerdict, PageGenerator};
use crate::pipeline::markup;
use crate::pipeline::paginate::Paginator;
use crate::pipeline::quarantine::QuarantineStore;
use crate::pipeline::render::{ChromiumRenderer, RenderBackend};
use crate::pipeline::sanitize::Sanitizer;
use crate::pipeline::source;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Name of the batch summary written to the output directory.
pub const SUMMARY_FILE: &str = "pipeline_result.json";

/// Process one spreadsheet file end to end.
///
/// Never fails: unreadable sources and backend failures are reported as
/// [`PipelineOutcome::Rejected`] with the source left in place.
pub async fn process_file(path: impl AsRef<Path>, config: &PipelineConfig) -> FileReport {
    let path = path.as_ref().to_path_buf();
    let started = Instant::now();
    info!("Processing {}", path.display());

    let read_path = path.clone();
    let workbook = tokio::task::spawn_blocking(move || source::read_workbook(&read_path))
        .await
        .map_err(|e| SheetError::Internal(format!("Read task panicked: {e}")))
        .and_then(|r| r);

    match workbook {
        Ok(workbook) => process_workbook(workbook, &path, config).await,
        Err(e) => {
            warn!("Rejecting {}: {}", path.display(), e);
            let report = FileReport::new(
                path.clone(),
                display_name(&path),
                PipelineOutcome::Rejected {
                    reason: e.to_string(),
                },
                FileStats {
                    duration_ms: started.elapsed().as_millis() as u64,
                    ..FileStats::default()
                },
            );
            notify_complete(config, &report);
            report
        }
    }
}

/// Process an already-loaded workbook. `source` is the file deposited in
/// quarantine if the gate rejects it.
pub async fn process_workbook(
    workbook: Workbook,
    source: &Path,
    config: &PipelineConfig,
) -> FileReport {
    let started = Instant::now();
    let file_name = display_name(source);
    let mut stats = FileStats {
        sheets: workbook.sheets.len(),
        ..FileStats::default()
    };

    let outcome = match run_file(workbook, source, &file_name, config, &mut stats).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}: {}", file_name, e);
            PipelineOutcome::Rejected {
                reason: e.to_string(),
            }
        }
    };
    stats.duration_ms = started.elapsed().as_millis() as u64;

    info!(
        file = %file_name,
        status = outcome.label(),
        images = outcome.images().len(),
        "Finished in {}ms",
        stats.duration_ms
    );

    let report = FileReport::new(source.to_path_buf(), file_name, outcome, stats);
    notify_complete(config, &report);
    report
}

/// Process every input (directories expand to their spreadsheet files),
/// up to `config.concurrency` files at a time. Reports come back in input
/// order.
pub async fn process_batch(
    inputs: &[PathBuf],
    config: &PipelineConfig,
) -> Result<Vec<FileReport>, SheetError> {
    let files = source::expand_inputs(inputs)?;
    let config = with_shared_backends(config);
    info!("Processing {} files", files.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(files.len());
    }

    let mut reports: Vec<(usize, FileReport)> =
        stream::iter(files.into_iter().enumerate().map(|(i, path)| {
            let cfg = config.clone();
            async move { (i, process_file(&path, &cfg).await) }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    reports.sort_by_key(|(i, _)| *i);
    let reports: Vec<FileReport> = reports.into_iter().map(|(_, r)| r).collect();

    let accepted = reports.iter().filter(|r| r.outcome.is_accepted()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(reports.len(), accepted);
    }
    Ok(reports)
}

/// Synchronous wrapper around [`process_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_file_sync(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<FileReport, SheetError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| SheetError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_file(path, config)))
}

/// Write `pipeline_result.json` into `output_dir`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_summary(
    reports: &[FileReport],
    output_dir: impl AsRef<Path>,
) -> Result<PathBuf, SheetError> {
    let dir = output_dir.as_ref();
    let path = dir.join(SUMMARY_FILE);
    let write_failed = |e: std::io::Error| SheetError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    let json = serde_json::to_string_pretty(&BatchSummary::from_reports(reports))
        .map_err(|e| SheetError::Internal(format!("summary serialisation: {e}")))?;

    tokio::fs::create_dir_all(dir).await.map_err(write_failed)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(write_failed)?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the default backends once so every file of a batch shares one
/// browser session. Detection failures are left for the first file that
/// actually needs to render.
pub(crate) fn with_shared_backends(config: &PipelineConfig) -> PipelineConfig {
    let mut config = config.clone();
    if config.renderer.is_none() {
        match ChromiumRenderer::detect(config.browser_path.as_deref()) {
            Ok(r) => config.renderer = Some(Arc::new(r)),
            Err(e) => debug!("Renderer not resolved up front: {}", e),
        }
    }
    if config.annotator.is_none() {
        match WatermarkAnnotator::new(config.watermark.clone()) {
            Ok(a) => config.annotator = Some(Arc::new(a)),
            Err(e) => debug!("Annotator not resolved up front: {}", e),
        }
    }
    config
}

fn renderer_for(config: &PipelineConfig) -> Result<Arc<dyn RenderBackend>, SheetError> {
    match config.renderer {
        Some(ref r) => Ok(Arc::clone(r)),
        None => Ok(Arc::new(ChromiumRenderer::detect(config.browser_path.as_deref())?)),
    }
}

fn annotator_for(config: &PipelineConfig) -> Result<Arc<dyn ImageAnnotator>, SheetError> {
    match config.annotator {
        Some(ref a) => Ok(Arc::clone(a)),
        None => Ok(Arc::new(WatermarkAnnotator::new(config.watermark.clone())?)),
    }
}

async fn run_file(
    workbook: Workbook,
    source: &Path,
    file_name: &str,
    config: &PipelineConfig,
    stats: &mut FileStats,
) -> Result<PipelineOutcome, SheetError> {
    // ── Gate ─────────────────────────────────────────────────────────────
    let mut generator = MarkupGenerator::new(workbook, file_name, config)?;
    let tolerance = config.leak_tolerance;
    let (run, generator) = tokio::task::spawn_blocking(move || {
        let run = DecisionGate::new(tolerance).run(&mut generator);
        run.map(|run| (run, generator))
    })
    .await
    .map_err(|e| SheetError::Internal(format!("Gate task panicked: {e}")))??;

    stats.attempts = run.attempts();
    stats.cleared_cells = generator.cleared_cells;
    if let Some(ref cb) = config.progress_callback {
        for (i, total) in run.attempt_totals.iter().enumerate() {
            cb.on_audit(file_name, i + 1, *total);
        }
    }

    match run.verdict {
        // ── Publish ──────────────────────────────────────────────────────
        GateVerdict::Accepted {
            artifacts,
            report,
            retried,
        } => {
            stats.pages = artifacts.len();
            let images = if artifacts.is_empty() {
                info!("{}: no content rows, nothing to render", file_name);
                Vec::new()
            } else {
                let publisher = Publisher::new(&generator.file_stem, file_name, config)?;
                tokio::task::spawn_blocking(move || {
                    let images = publisher.publish(&artifacts);
                    // Markup must outlive rendering.
                    drop(generator);
                    images
                })
                .await
                .map_err(|e| SheetError::Internal(format!("Render task panicked: {e}")))??
            };
            Ok(PipelineOutcome::Accepted {
                images,
                total_leaks: report.count,
                retried,
            })
        }

        // ── Quarantine ───────────────────────────────────────────────────
        GateVerdict::Quarantined { report } => {
            let reason = SheetError::LeakToleranceExceeded {
                leaks: report.count,
                tolerance,
            }
            .to_string();
            warn!("{}: {}", file_name, reason);

            let store = QuarantineStore::new(&config.quarantine_dir, config.quarantine_mode);
            let deposit_source = source.to_path_buf();
            let deposit = tokio::task::spawn_blocking(move || store.deposit(&deposit_source))
                .await
                .map_err(|e| SheetError::Internal(format!("Quarantine task panicked: {e}")))??;

            Ok(PipelineOutcome::Quarantined {
                reason,
                total_leaks: report.count,
                details: report.details,
                quarantined_to: deposit.path().to_path_buf(),
            })
        }
    }
}

fn notify_complete(config: &PipelineConfig, report: &FileReport) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_complete(&report.file_name, &report.outcome);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Make a sheet or file name safe as a single path component.
pub(crate) fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Gate generator ───────────────────────────────────────────────────────

/// One page's markup on disk.
#[derive(Debug)]
struct MarkupArtifact {
    sheet_index: usize,
    page: Page,
    path: PathBuf,
}

/// Writes every page of a workbook as HTML into a scratch directory that is
/// removed when the generator is dropped.
struct MarkupGenerator {
    workbook: Workbook,
    file_stem: String,
    file_name: String,
    sanitizer: Sanitizer,
    paginator: Paginator,
    config: PipelineConfig,
    scratch: TempDir,
    cleared_cells: usize,
}

impl MarkupGenerator {
    fn new(workbook: Workbook, file_name: &str, config: &PipelineConfig) -> Result<Self, SheetError> {
        let scratch = tempfile::Builder::new()
            .prefix("sheet2png-")
            .tempdir()
            .map_err(|e| SheetError::Internal(format!("scratch directory: {e}")))?;
        Ok(Self {
            file_stem: workbook.file_stem.clone(),
            file_name: file_name.to_string(),
            sanitizer: Sanitizer::from_config(config),
            paginator: Paginator::from_config(config)?,
            config: config.clone(),
            workbook,
            scratch,
            cleared_cells: 0,
        })
    }
}

impl PageGenerator for MarkupGenerator {
    type Artifact = MarkupArtifact;
    type Error = SheetError;

    fn generate(&mut self, attempt: usize) -> Result<Vec<MarkupArtifact>, SheetError> {
        let dir = self.scratch.path().join(format!("attempt-{attempt}"));
        std::fs::create_dir_all(&dir).map_err(|e| SheetError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;

        let mut artifacts = Vec::new();
        let mut cleared = 0;
        for (sheet_index, sheet) in self.workbook.sheets.iter().enumerate() {
            let sanitized = self.sanitizer.sanitize_sheet(sheet);
            cleared += sanitized.cleared_cells;

            for page in self.paginator.paginate(&self.file_stem, &sanitized.sheet) {
                let html = markup::render_page(&page, self.config.viewport, &self.config.layout);
                let path = dir.join(format!("s{:03}_p{:04}.html", sheet_index, page.number));
                std::fs::write(&path, html).map_err(|e| SheetError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
                debug!(sheet = %page.sheet_name, page = page.number, "Wrote markup");
                artifacts.push(MarkupArtifact {
                    sheet_index,
                    page,
                    path,
                });
            }
        }
        self.cleared_cells = cleared;

        if attempt == 1 {
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_file_start(&self.file_name, artifacts.len());
            }
        }
        Ok(artifacts)
    }

    fn audit(&self, artifact: &MarkupArtifact) -> crate::model::LeakReport {
        audit::audit_file(&artifact.path, &self.file_stem)
    }

    fn discard(&mut self, artifacts: Vec<MarkupArtifact>) {
        for a in artifacts {
            if let Err(e) = std::fs::remove_file(&a.path) {
                debug!("Could not remove {}: {}", a.path.display(), e);
            }
        }
    }
}

// ── Publisher ────────────────────────────────────────────────────────────

/// Renders and annotates accepted pages.
struct Publisher {
    renderer: Arc<dyn RenderBackend>,
    annotator: Arc<dyn ImageAnnotator>,
    file_stem: String,
    file_name: String,
    config: PipelineConfig,
}

impl Publisher {
    fn new(file_stem: &str, file_name: &str, config: &PipelineConfig) -> Result<Self, SheetError> {
        Ok(Self {
            renderer: renderer_for(config)?,
            annotator: annotator_for(config)?,
            file_stem: file_stem.to_string(),
            file_name: file_name.to_string(),
            config: config.clone(),
        })
    }

    /// Render every page in order. On failure, the file's output directory
    /// is removed with every image written so far.
    fn publish(&self, artifacts: &[MarkupArtifact]) -> Result<Vec<RenderedImage>, SheetError> {
        let (file_component, file_dir) =
            claim_dir(&self.config.output_dir, &path_component(&self.file_stem))?;
        let sheets = sheet_components(artifacts);

        let mut images: Vec<RenderedImage> = Vec::with_capacity(artifacts.len());
        for (index, artifact) in artifacts.iter().enumerate() {
            let sheet = &sheets[&artifact.sheet_index];
            match self.publish_one(index, artifact, &file_dir, &file_component, sheet) {
                Ok(image) => images.push(image),
                Err(e) => {
                    if let Err(rm) = std::fs::remove_dir_all(&file_dir) {
                        warn!("Could not remove {}: {}", file_dir.display(), rm);
                    }
                    return Err(e);
                }
            }
        }

        let blurred = images.iter().filter(|i| i.is_blurred).count();
        info!(
            "{}: {} images, {} clear, {} blurred",
            self.file_name,
            images.len(),
            images.len() - blurred,
            blurred
        );
        Ok(images)
    }

    fn publish_one(
        &self,
        index: usize,
        artifact: &MarkupArtifact,
        file_dir: &Path,
        file_component: &str,
        sheet: &str,
    ) -> Result<RenderedImage, SheetError> {
        let page = &artifact.page;
        let dir = file_dir.join(sheet);
        std::fs::create_dir_all(&dir).map_err(|e| SheetError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
        let target = dir.join(format!("{}_{}_page_{}.png", file_component, sheet, page.number));

        let obscure = index >= self.config.free_preview_images;
        self.renderer
            .render(&artifact.path, self.config.viewport, &target)
            .and_then(|()| self.annotator.annotate(&target, obscure))?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_image_rendered(&self.file_name, index, obscure);
        }
        debug!(obscured = obscure, "Published {}", target.display());
        Ok(RenderedImage {
            sheet: page.sheet_name.clone(),
            page: page.number,
            path: target,
            is_blurred: obscure,
        })
    }
}

/// Create `<parent>/<base>`, or `<base>_2`, `<base>_3`, ... when taken.
/// `create_dir` fails on an existing entry, so concurrent files never end
/// up sharing a directory.
fn claim_dir(parent: &Path, base: &str) -> Result<(String, PathBuf), SheetError> {
    std::fs::create_dir_all(parent).map_err(|e| SheetError::OutputWriteFailed {
        path: parent.to_path_buf(),
        source: e,
    })?;
    let mut n = 1;
    loop {
        let name = if n == 1 {
            base.to_string()
        } else {
            format!("{base}_{n}")
        };
        let dir = parent.join(&name);
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok((name, dir)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(SheetError::OutputWriteFailed { path: dir, source: e }),
        }
    }
}

/// One directory name per sheet. Names are compared case-insensitively so
/// `Q1/Q2`, `Q1_Q2` and `q1_q2` stay apart on any filesystem.
fn sheet_components(artifacts: &[MarkupArtifact]) -> HashMap<usize, String> {
    let mut taken = HashSet::new();
    let mut components = HashMap::new();
    for artifact in artifacts {
        if components.contains_key(&artifact.sheet_index) {
            continue;
        }
        let base = path_component(&artifact.page.sheet_name);
        let mut name = base.clone();
        let mut n = 1;
        while !taken.insert(name.to_lowercase()) {
            n += 1;
            name = format!("{base}_{n}");
        }
        components.insert(artifact.sheet_index, name);
    }
    components
}
