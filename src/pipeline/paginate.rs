//! Pagination: split a sanitized sheet into fixed-size render units.
//!
//! Each page is complete on its own: widths are computed from that page's
//! rows, so the same text can wrap on one page and be clipped on another.
//! The last page is padded with placeholder rows and every row is padded
//! with blank cells so all images share one canvas layout.

use crate::config::PipelineConfig;
use crate::error::SheetError;
use crate::model::{Page, PageCell, PageRow, Row, RowLabel, Sheet};
use crate::pipeline::layout::LayoutSizer;
use crate::pipeline::mask::{is_blank_marker, Masker};

#[derive(Debug, Clone)]
pub struct Paginator {
    masker: Masker,
    sizer: LayoutSizer,
    rows_per_page: usize,
    max_columns: usize,
}

impl Paginator {
    pub fn new(masker: Masker, sizer: LayoutSizer, rows_per_page: usize, max_columns: usize) -> Self {
        Self {
            masker,
            sizer,
            rows_per_page: rows_per_page.max(1),
            max_columns: max_columns.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, SheetError> {
        Ok(Self::new(
            Masker::new(&config.rules.mask_keywords)?,
            LayoutSizer::new(config.layout),
            config.rows_per_page,
            config.max_columns,
        ))
    }

    /// Paginate `sheet`, titling pages `"{file_stem} - {sheet} - P{n}"`.
    ///
    /// A sheet without any non-blank row yields no pages.
    pub fn paginate(&self, file_stem: &str, sheet: &Sheet) -> Vec<Page> {
        let rows = self.content_rows(sheet);
        rows.chunks(self.rows_per_page)
            .enumerate()
            .map(|(i, chunk)| self.build_page(file_stem, &sheet.name, i + 1, chunk))
            .collect()
    }

    /// Truncated non-blank rows, each with its 1-based source position.
    fn content_rows(&self, sheet: &Sheet) -> Vec<(usize, Row)> {
        sheet
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let kept: Row = row
                    .iter()
                    .take(self.max_columns)
                    .map(|cell| {
                        if is_blank_marker(cell) {
                            String::new()
                        } else {
                            cell.clone()
                        }
                    })
                    .collect();
                (i + 1, kept)
            })
            .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect()
    }

    fn build_page(&self, file_stem: &str, sheet_name: &str, number: usize, chunk: &[(usize, Row)]) -> Page {
        let source_rows: Vec<Row> = chunk.iter().map(|(_, row)| row.clone()).collect();
        let column_widths = self.sizer.widths(&source_rows, self.max_columns);

        let mut rows: Vec<PageRow> = chunk
            .iter()
            .map(|(position, row)| {
                let mut cells: Vec<PageCell> = row
                    .iter()
                    .enumerate()
                    .map(|(col, cell)| {
                        let value = self.masker.mask(cell);
                        let wrap = self.sizer.wrap_class(&value, column_widths[col + 1]);
                        PageCell { value, wrap }
                    })
                    .collect();
                cells.resize_with(self.max_columns, PageCell::blank);
                PageRow {
                    label: RowLabel::Source(*position),
                    cells,
                }
            })
            .collect();

        rows.resize_with(self.rows_per_page, || PageRow {
            label: RowLabel::Placeholder,
            cells: vec![PageCell::blank(); self.max_columns],
        });

        Page {
            sheet_name: sheet_name.to_string(),
            number,
            title: format!("{file_stem} - {sheet_name} - P{number}"),
            column_widths,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConstants;
    use crate::model::WrapClass;

    fn paginator(rows_per_page: usize, max_columns: usize) -> Paginator {
        Paginator::new(
            Masker::new(&["trangvang"]).unwrap(),
            LayoutSizer::new(LayoutConstants::default()),
            rows_per_page,
            max_columns,
        )
    }

    fn numbered_sheet(n: usize) -> Sheet {
        Sheet::new(
            "Data",
            (1..=n).map(|i| vec![format!("row {i}"), "x".to_string()]).collect(),
        )
    }

    #[test]
    fn test_23_rows_three_pages() {
        let pages = paginator(10, 15).paginate("book", &numbered_sheet(23));
        assert_eq!(pages.len(), 3);
        for page in &pages {
            assert_eq!(page.rows.len(), 10);
            assert!(page.rows.iter().all(|r| r.cells.len() == 15));
            assert_eq!(page.column_widths.len(), 16);
        }
        assert_eq!(pages[2].data_rows().count(), 3);
        assert_eq!(pages[2].rows[3].label, RowLabel::Placeholder);
        assert_eq!(pages[2].title, "book - Data - P3");
    }

    #[test]
    fn test_every_row_once_in_order() {
        let pages = paginator(10, 15).paginate("book", &numbered_sheet(23));
        let labels: Vec<usize> = pages
            .iter()
            .flat_map(|p| p.data_rows())
            .map(|r| match r.label {
                RowLabel::Source(n) => n,
                RowLabel::Placeholder => unreachable!(),
            })
            .collect();
        assert_eq!(labels, (1..=23).collect::<Vec<_>>());
    }

    #[test]
    fn test_blank_rows_dropped_positions_kept() {
        let sheet = Sheet::from_rows(
            "S",
            [
                vec!["a", ""],
                vec!["", "  "],
                vec!["nan", "NaN"],
                vec!["", "b"],
            ],
        );
        let pages = paginator(10, 3).paginate("f", &sheet);
        assert_eq!(pages.len(), 1);
        let labels: Vec<RowLabel> = pages[0].data_rows().map(|r| r.label).collect();
        assert_eq!(labels, vec![RowLabel::Source(1), RowLabel::Source(4)]);
    }

    #[test]
    fn test_empty_sheet_no_pages() {
        let sheet = Sheet::from_rows("S", [vec!["", "nan"]]);
        assert!(paginator(10, 15).paginate("f", &sheet).is_empty());
        assert!(paginator(10, 15).paginate("f", &Sheet::new("E", vec![])).is_empty());
    }

    #[test]
    fn test_columns_truncated() {
        let sheet = Sheet::from_rows("S", [vec!["a", "b", "c", "d"]]);
        let pages = paginator(10, 2).paginate("f", &sheet);
        let first = &pages[0].rows[0].cells;
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].value, "b");
    }

    #[test]
    fn test_truncated_columns_dont_keep_row_alive() {
        let sheet = Sheet::from_rows("S", [vec!["", "", "only here"], vec!["x", "", ""]]);
        let pages = paginator(10, 2).paginate("f", &sheet);
        assert_eq!(pages[0].data_rows().count(), 1);
    }

    #[test]
    fn test_values_are_masked() {
        let sheet = Sheet::from_rows("S", [vec!["0987654321", "a@b.com"]]);
        let pages = paginator(10, 2).paginate("f", &sheet);
        let cells = &pages[0].rows[0].cells;
        assert_eq!(cells[0].value, "*****54321");
        assert_eq!(cells[1].value, "*@b.com");
    }

    #[test]
    fn test_wrap_depends_on_page_widths() {
        // 100 chars: wraps in a wide column (6 lines), clipped in a narrow one.
        let long = "y".repeat(100);
        let mut first_page = vec![vec![long.clone(), String::new(), String::new(), String::new()]];
        first_page.extend((0..9).map(|_| vec!["".into(), "".into(), "".into(), "z".into()]));
        let mut second_page = vec![vec![long.clone(), "q".repeat(120), "q".repeat(120), "q".repeat(120)]];
        second_page.extend((0..9).map(|_| vec!["".into(), "q".into(), "q".into(), "q".into()]));
        let mut all = first_page;
        all.extend(second_page);

        let pages = paginator(10, 4).paginate("f", &Sheet::new("S", all));
        assert_eq!(pages[0].column_widths[1], 200);
        assert_eq!(pages[0].rows[0].cells[0].wrap, WrapClass::Wrap);
        assert_eq!(pages[1].column_widths[1], 105);
        assert_eq!(pages[1].rows[0].cells[0].wrap, WrapClass::NoWrap);
    }

    #[test]
    fn test_placeholder_cells_wrap() {
        let pages = paginator(3, 2).paginate("f", &numbered_sheet(1));
        let pad = &pages[0].rows[2];
        assert_eq!(pad.label, RowLabel::Placeholder);
        assert!(pad.cells.iter().all(|c| c.value.is_empty() && c.wrap == WrapClass::Wrap));
    }
}
