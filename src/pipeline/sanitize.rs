//! Cell sanitizing: whole-cell removal and sentinel header stripping.
//!
//! Runs once per sheet, before masking and layout. Two rules apply, in this
//! order:
//!
//! 1. **Sentinel rows** — exports sometimes carry operator annotation rows
//!    above the data, marked by a tracking URL. If the sentinel appears in
//!    the first `scan_rows` rows, every row up to and including it is dropped.
//! 2. **Removal keywords** — a cell containing any removal keyword is
//!    emptied entirely. This is stronger than masking and reserved for
//!    identifiers that must not be exposed even partially.

use crate::config::{PipelineConfig, RedactionRules};
use crate::model::Sheet;
use crate::pipeline::mask::is_blank_marker;
use tracing::{debug, info};

/// Result of sanitizing one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedSheet {
    pub sheet: Sheet,
    /// Rows dropped above (and including) the sentinel.
    pub stripped_rows: usize,
    /// Cells emptied by the removal keyword list.
    pub cleared_cells: usize,
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    remove_keywords: Vec<String>,
    sentinel: Option<String>,
    scan_rows: usize,
}

impl Sanitizer {
    pub fn new(rules: &RedactionRules, scan_rows: usize) -> Self {
        Self {
            remove_keywords: rules
                .remove_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            sentinel: rules
                .sentinel_url
                .as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            scan_rows,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.rules, config.sentinel_scan_rows)
    }

    /// True if the cell must be emptied.
    pub fn should_remove(&self, text: &str) -> bool {
        if is_blank_marker(text) {
            return false;
        }
        let lower = text.to_lowercase();
        self.remove_keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// `""` when the cell hits a removal keyword, the text unchanged otherwise.
    pub fn sanitize_cell(&self, text: &str) -> String {
        if self.should_remove(text) {
            String::new()
        } else {
            text.to_string()
        }
    }

    /// Index of the first row (within the scan window) holding the sentinel.
    pub fn sentinel_row(&self, sheet: &Sheet) -> Option<usize> {
        let sentinel = self.sentinel.as_deref()?;
        sheet
            .rows
            .iter()
            .take(self.scan_rows)
            .position(|row| {
                row.iter()
                    .any(|cell| cell.trim().to_lowercase().contains(sentinel))
            })
    }

    /// Drop rows `0..=sentinel_row`; unchanged copy when the sentinel is absent.
    pub fn strip_sentinel_rows(&self, sheet: &Sheet) -> Sheet {
        match self.sentinel_row(sheet) {
            Some(idx) => {
                info!(
                    sheet = %sheet.name,
                    "Found sentinel URL at row {}, removing {} header rows",
                    idx + 1,
                    idx + 1
                );
                Sheet::new(sheet.name.clone(), sheet.rows[idx + 1..].to_vec())
            }
            None => sheet.clone(),
        }
    }

    /// Apply sentinel stripping, then whole-cell removal, to a copy of `sheet`.
    pub fn sanitize_sheet(&self, sheet: &Sheet) -> SanitizedSheet {
        let stripped = self.strip_sentinel_rows(sheet);
        let stripped_rows = sheet.rows.len() - stripped.rows.len();

        let mut cleared_cells = 0;
        let rows = stripped
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        if self.should_remove(&cell) {
                            cleared_cells += 1;
                            String::new()
                        } else {
                            cell
                        }
                    })
                    .collect()
            })
            .collect();

        if cleared_cells > 0 {
            debug!(
                sheet = %sheet.name,
                "Removed content from {} cells containing restricted keywords",
                cleared_cells
            );
        }

        SanitizedSheet {
            sheet: Sheet::new(stripped.name, rows),
            stripped_rows,
            cleared_cells,
        }
    }
}
