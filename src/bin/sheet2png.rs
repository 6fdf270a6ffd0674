//! CLI binary for sheet2png.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheet2png::config::DEFAULT_WATERMARK_FONT;
use sheet2png::{
    process_batch, write_summary, FileReport, PipelineConfig, PipelineOutcome,
    PipelineProgressCallback, ProgressCallback, QuarantineMode, RedactionRules, WatermarkConfig,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: one bar over files, one log line per file.
/// Files finish out of order when `--concurrency > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    images: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            images: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} spreadsheets…"))
        ));
    }

    fn on_file_start(&self, file: &str, pages: usize) {
        self.bar.set_message(format!("{file} ({pages} pages)"));
    }

    fn on_audit(&self, file: &str, attempt: usize, leaks: usize) {
        if leaks > 0 {
            self.bar.println(format!(
                "  {} {}  attempt {}: {} leaks",
                yellow("!"),
                file,
                attempt,
                leaks
            ));
        }
    }

    fn on_image_rendered(&self, _file: &str, _index: usize, _blurred: bool) {
        self.images.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_complete(&self, file: &str, outcome: &PipelineOutcome) {
        let line = match outcome {
            PipelineOutcome::Accepted { images, .. } => format!(
                "  {} {:<40} {}",
                green("✓"),
                file,
                dim(&format!("{} images", images.len()))
            ),
            PipelineOutcome::Quarantined { total_leaks, .. } => format!(
                "  {} {:<40} {}",
                yellow("⚠"),
                file,
                yellow(&format!("quarantined ({total_leaks} leaks)"))
            ),
            PipelineOutcome::Rejected { reason } => {
                let first = reason.lines().next().unwrap_or_default();
                let msg = if first.chars().count() > 80 {
                    format!("{}\u{2026}", first.chars().take(79).collect::<String>())
                } else {
                    first.to_string()
                };
                format!("  {} {:<40} {}", red("✗"), file, red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, accepted: usize) {
        self.bar.finish_and_clear();
        let images = self.images.load(Ordering::SeqCst);
        let mark = if accepted == total_files {
            green("✔")
        } else if accepted == 0 {
            red("✘")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{} {}/{} files accepted, {} images",
            mark,
            bold(&accepted.to_string()),
            total_files,
            images
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render one workbook into ./output_images
  sheet2png customers.xlsx

  # Every spreadsheet in a directory, two files at a time
  sheet2png uploads/ -o previews --concurrency 2

  # Custom keyword lists, keep quarantined originals in place
  sheet2png --rules rules.json --copy-quarantine data.xlsx

  # Machine-readable summary on stdout
  sheet2png --json --no-progress data.xlsx > result.json

RULES FILE (JSON, every field optional):
  {
    "mask_keywords":   ["brand", "company"],
    "remove_keywords": ["tax code"],
    "sentinel_url":    "https://example.com/export-marker"
  }

ENVIRONMENT VARIABLES:
  SHEET2PNG_BROWSER     Chromium/Chrome binary (also CHROME, CHROMIUM)
  SHEET2PNG_OUTPUT      Output directory
  SHEET2PNG_QUARANTINE  Quarantine directory
  SHEET2PNG_RULES       Redaction rules JSON file
  RUST_LOG              Log filter (overrides -v / -q)

EXIT STATUS:
  0  every file accepted
  2  at least one file quarantined or rejected
"#;

/// Render spreadsheets to masked, audited PNG previews.
#[derive(Parser, Debug)]
#[command(
    name = "sheet2png",
    version,
    about = "Render spreadsheets to masked, leak-audited PNG previews",
    long_about = "Render every sheet of one or more spreadsheets (xlsx, xlsm, xlsb, xls, ods) \
to fixed-size PNG pages. Personal data is masked before layout, every page is audited for \
residual emails and long digit runs, and files that still leak after one retry are moved \
to a quarantine directory instead of being published.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet files or directories containing them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving `<file>/<sheet>/*.png` and pipeline_result.json.
    #[arg(short, long, env = "SHEET2PNG_OUTPUT", default_value = "output_images")]
    output: PathBuf,

    /// Directory receiving files that fail the leak audit.
    #[arg(long, env = "SHEET2PNG_QUARANTINE", default_value = "data_check")]
    quarantine_dir: PathBuf,

    /// Copy failing files into quarantine instead of moving them.
    #[arg(long, env = "SHEET2PNG_COPY_QUARANTINE")]
    copy_quarantine: bool,

    /// JSON file with mask/remove keyword lists and the sentinel URL.
    #[arg(long, env = "SHEET2PNG_RULES")]
    rules: Option<PathBuf>,

    /// Leaks tolerated per file before retry/quarantine.
    #[arg(long, env = "SHEET2PNG_TOLERANCE", default_value_t = 5)]
    tolerance: usize,

    /// Data rows per image.
    #[arg(long, env = "SHEET2PNG_ROWS_PER_PAGE", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..=200))]
    rows_per_page: u32,

    /// Columns kept from the left of each sheet.
    #[arg(long, env = "SHEET2PNG_MAX_COLUMNS", default_value_t = 15,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    max_columns: u32,

    /// Images per file left unblurred.
    #[arg(long, env = "SHEET2PNG_FREE_PREVIEWS", default_value_t = 10)]
    free_previews: usize,

    /// Chromium or Chrome binary used for rendering.
    #[arg(long, env = "SHEET2PNG_BROWSER")]
    browser: Option<PathBuf>,

    /// PNG stamp tiled as the watermark instead of text.
    #[arg(long, env = "SHEET2PNG_WATERMARK_IMAGE")]
    watermark_image: Option<PathBuf>,

    /// Watermark text drawn in each grid cell.
    #[arg(long, env = "SHEET2PNG_WATERMARK_TEXT", default_value = "DATALD.COM")]
    watermark_text: String,

    /// Font for the watermark text (falls back to plain bands if unreadable).
    #[arg(long, env = "SHEET2PNG_WATERMARK_FONT", default_value = DEFAULT_WATERMARK_FONT)]
    watermark_font: PathBuf,

    /// Files processed concurrently.
    #[arg(short, long, env = "SHEET2PNG_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, env = "SHEET2PNG_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SHEET2PNG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHEET2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHEET2PNG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is
    // active; the bar prints one line per file.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let reports = process_batch(&cli.inputs, &config)
        .await
        .context("Failed to collect input files")?;
    if reports.is_empty() {
        anyhow::bail!("No spreadsheet files found in the given inputs");
    }

    let summary_path = write_summary(&reports, &config.output_dir)
        .await
        .context("Failed to write pipeline summary")?;

    if cli.json {
        let summary = sheet2png::BatchSummary::from_reports(&reports);
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        if !show_progress {
            print_reports(&reports);
        }
        eprintln!("   summary → {}", bold(&summary_path.display().to_string()));
    }

    if reports.iter().all(|r| r.outcome.is_accepted()) {
        Ok(())
    } else {
        std::process::exit(2);
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let rules = match cli.rules {
        Some(ref path) => RedactionRules::from_json_file(path)
            .with_context(|| format!("Failed to load rules from {:?}", path))?,
        None => RedactionRules::default(),
    };

    let watermark = WatermarkConfig {
        stamp_image: cli.watermark_image.clone(),
        text: cli.watermark_text.clone(),
        font_path: Some(cli.watermark_font.clone()),
        ..WatermarkConfig::default()
    };

    let mut builder = PipelineConfig::builder()
        .rules(rules)
        .leak_tolerance(cli.tolerance)
        .rows_per_page(cli.rows_per_page as usize)
        .max_columns(cli.max_columns as usize)
        .free_preview_images(cli.free_previews)
        .watermark(watermark)
        .output_dir(&cli.output)
        .quarantine_dir(&cli.quarantine_dir)
        .quarantine_mode(if cli.copy_quarantine {
            QuarantineMode::Copy
        } else {
            QuarantineMode::Move
        })
        .concurrency(cli.concurrency);

    if let Some(ref browser) = cli.browser {
        builder = builder.browser_path(browser);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Plain per-file listing for runs without the progress bar.
fn print_reports(reports: &[FileReport]) {
    for r in reports {
        match &r.outcome {
            PipelineOutcome::Accepted {
                images,
                total_leaks,
                retried,
            } => {
                let blurred = images.iter().filter(|i| i.is_blurred).count();
                eprintln!(
                    "{} {}: {} images ({} blurred), {} leaks{}",
                    green("✓"),
                    r.file_name,
                    images.len(),
                    blurred,
                    total_leaks,
                    if *retried { ", retried" } else { "" }
                );
            }
            PipelineOutcome::Quarantined {
                reason,
                quarantined_to,
                ..
            } => eprintln!(
                "{} {}: {} → {}",
                yellow("⚠"),
                r.file_name,
                reason,
                quarantined_to.display()
            ),
            PipelineOutcome::Rejected { reason } => {
                eprintln!("{} {}: {}", red("✗"), r.file_name, reason)
            }
        }
    }
}
