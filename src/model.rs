//! Data types flowing through the pipeline and returned to callers.
//!
//! ```text
//! Workbook ─▶ Sheet ─▶ (sanitized) Sheet ─▶ Page ─▶ markup ─▶ LeakReport
//!                                                         └─▶ PipelineOutcome
//! ```
//!
//! Everything downstream of [`Sheet`] is rebuilt from scratch on a gate
//! retry, so none of these types carry mutable state across attempts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One row of cell texts. Missing cells are already `""`.
pub type Row = Vec<String>;

/// One tab of a workbook, header-less.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build a sheet from string literals; convenient in tests and demos.
    pub fn from_rows<R, C>(name: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            name: name.into(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// All sheets of one source file, in workbook order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    /// File name without extension. Used in page titles, image names and as
    /// the auditor's file identifier.
    pub file_stem: String,
    pub sheets: Vec<Sheet>,
}

// ── Pages ────────────────────────────────────────────────────────────────

/// Whether a cell's text may wrap inside its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapClass {
    Wrap,
    NoWrap,
}

impl WrapClass {
    /// CSS class emitted into the page markup.
    pub fn css_class(self) -> &'static str {
        match self {
            WrapClass::Wrap => "wrap-text",
            WrapClass::NoWrap => "no-wrap-text",
        }
    }
}

/// Traceability label of a page row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLabel {
    /// 1-based position in the sanitized sheet.
    Source(usize),
    /// Padding row on the last page.
    Placeholder,
}

impl fmt::Display for RowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowLabel::Source(n) => write!(f, "{n}"),
            RowLabel::Placeholder => f.write_str(" "),
        }
    }
}

/// A masked cell ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCell {
    pub value: String,
    pub wrap: WrapClass,
}

impl PageCell {
    pub fn blank() -> Self {
        Self {
            value: String::new(),
            wrap: WrapClass::Wrap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRow {
    pub label: RowLabel,
    pub cells: Vec<PageCell>,
}

/// One fixed-size render unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub sheet_name: String,
    /// 1-based page number within its sheet.
    pub number: usize,
    pub title: String,
    /// Pixel widths, index column first.
    pub column_widths: Vec<u32>,
    pub rows: Vec<PageRow>,
}

impl Page {
    /// Rows backed by source data (placeholders excluded).
    pub fn data_rows(&self) -> impl Iterator<Item = &PageRow> {
        self.rows
            .iter()
            .filter(|r| matches!(r.label, RowLabel::Source(_)))
    }
}

// ── Audit ────────────────────────────────────────────────────────────────

/// Suspected leaks found in one rendered artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub count: usize,
    pub details: Vec<String>,
}

impl LeakReport {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detail: impl Into<String>) {
        self.count += 1;
        self.details.push(detail.into());
    }

    pub fn merge(&mut self, other: LeakReport) {
        self.count += other.count;
        self.details.extend(other.details);
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// One published image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedImage {
    pub sheet: String,
    pub page: usize,
    pub path: PathBuf,
    /// Obscured beyond the free-preview allowance.
    pub is_blurred: bool,
}

/// Terminal result for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Leak audit passed; images were rendered and annotated.
    Accepted {
        images: Vec<RenderedImage>,
        total_leaks: usize,
        retried: bool,
    },
    /// Leak audit failed twice; no output, source moved to review.
    Quarantined {
        reason: String,
        total_leaks: usize,
        details: Vec<String>,
        quarantined_to: PathBuf,
    },
    /// The file could not be processed at all (unreadable source, renderer
    /// failure). The source is left untouched.
    Rejected { reason: String },
}

impl PipelineOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PipelineOutcome::Accepted { .. })
    }

    pub fn images(&self) -> &[RenderedImage] {
        match self {
            PipelineOutcome::Accepted { images, .. } => images,
            _ => &[],
        }
    }

    /// Short label for logs and progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Accepted { .. } => "accepted",
            PipelineOutcome::Quarantined { .. } => "quarantined",
            PipelineOutcome::Rejected { .. } => "rejected",
        }
    }
}

/// Per-file counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub sheets: usize,
    /// Pages generated on the last gate attempt.
    pub pages: usize,
    /// Cells emptied by the removal keyword list.
    pub cleared_cells: usize,
    /// Gate attempts (1 or 2).
    pub attempts: usize,
    pub duration_ms: u64,
}

/// Everything known about one processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub file_name: String,
    pub outcome: PipelineOutcome,
    pub stats: FileStats,
    /// Number of published images; 0 unless accepted.
    #[serde(rename = "totalImages", default)]
    pub total_images: usize,
    /// First published image, used as the listing thumbnail.
    #[serde(rename = "coverPhoto", default)]
    pub cover_photo: Option<PathBuf>,
}

impl FileReport {
    pub fn new(source: PathBuf, file_name: String, outcome: PipelineOutcome, stats: FileStats) -> Self {
        let images = outcome.images();
        Self {
            total_images: images.len(),
            cover_photo: images.first().map(|i| i.path.clone()),
            source,
            file_name,
            outcome,
            stats,
        }
    }
}

/// Contents of `pipeline_result.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub accepted: usize,
    pub quarantined: usize,
    pub rejected: usize,
    pub images: usize,
    pub blurred_images: usize,
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let count = |label: &str| reports.iter().filter(|r| r.outcome.label() == label).count();
        let images = reports.iter().flat_map(|r| r.outcome.images());
        Self {
            accepted: count("accepted"),
            quarantined: count("quarantined"),
            rejected: count("rejected"),
            images: images.clone().count(),
            blurred_images: images.filter(|i| i.is_blurred).count(),
            files: reports.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_label_display() {
        assert_eq!(RowLabel::Source(7).to_string(), "7");
        assert_eq!(RowLabel::Placeholder.to_string(), " ");
    }

    #[test]
    fn leak_report_merge() {
        let mut a = LeakReport::clean();
        a.push("1234567");
        let mut b = LeakReport::clean();
        b.push("x@y.com");
        b.push("7654321");
        a.merge(b);
        assert_eq!(a.count, 3);
        assert_eq!(a.details, vec!["1234567", "x@y.com", "7654321"]);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let o = PipelineOutcome::Rejected {
            reason: "boom".into(),
        };
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "boom");
    }

    #[test]
    fn rendered_image_uses_camel_case() {
        let img = RenderedImage {
            sheet: "S".into(),
            page: 1,
            path: PathBuf::from("a.png"),
            is_blurred: true,
        };
        let json = serde_json::to_value(&img).unwrap();
        assert_eq!(json["isBlurred"], true);
    }

    #[test]
    fn batch_summary_counts() {
        let image = |blurred| RenderedImage {
            sheet: "S".into(),
            page: 1,
            path: PathBuf::from("a.png"),
            is_blurred: blurred,
        };
        let report = |outcome| {
            FileReport::new(
                PathBuf::from("x.xlsx"),
                "x.xlsx".into(),
                outcome,
                FileStats::default(),
            )
        };
        let reports = vec![
            report(PipelineOutcome::Accepted {
                images: vec![image(false), image(true)],
                total_leaks: 0,
                retried: false,
            }),
            report(PipelineOutcome::Rejected { reason: "r".into() }),
        ];
        let s = BatchSummary::from_reports(&reports);
        assert_eq!((s.accepted, s.quarantined, s.rejected), (1, 0, 1));
        assert_eq!((s.images, s.blurred_images), (2, 1));
    }

    #[test]
    fn file_report_lists_cover_photo() {
        let image = |page| RenderedImage {
            sheet: "S".into(),
            page,
            path: PathBuf::from(format!("S_page_{page}.png")),
            is_blurred: false,
        };
        let accepted = FileReport::new(
            PathBuf::from("x.xlsx"),
            "x.xlsx".into(),
            PipelineOutcome::Accepted {
                images: vec![image(1), image(2)],
                total_leaks: 0,
                retried: false,
            },
            FileStats::default(),
        );
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["totalImages"], 2);
        assert_eq!(json["coverPhoto"], "S_page_1.png");

        let rejected = FileReport::new(
            PathBuf::from("x.xlsx"),
            "x.xlsx".into(),
            PipelineOutcome::Rejected { reason: "r".into() },
            FileStats::default(),
        );
        let json = serde_json::to_value(&rejected).unwrap();
        assert_eq!(json["totalImages"], 0);
        assert!(json["coverPhoto"].is_null());
    }
}
