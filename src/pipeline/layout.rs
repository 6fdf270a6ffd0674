//! Layout sizing: column widths and the per-cell wrap decision.
//!
//! The canvas has a fixed row height, so a cell that would need more lines
//! than fit is rendered on one clipped line instead of pushing the table off
//! the page. Widths are computed per page from that page's rows only.

use crate::config::LayoutConstants;
use crate::model::{Row, WrapClass};

#[derive(Debug, Clone, Copy)]
pub struct LayoutSizer {
    constants: LayoutConstants,
}

impl LayoutSizer {
    pub fn new(constants: LayoutConstants) -> Self {
        Self { constants }
    }

    /// Pixel widths for `columns` data columns, index column first.
    ///
    /// Columns are ranked by mean trimmed text length; the top
    /// `wide_columns` get the wide width. Every row contributes to every
    /// column (short rows count as empty cells), so ranking by the column
    /// sum is the same as ranking by the mean. The sort is stable: ties keep
    /// their left-to-right order.
    pub fn widths(&self, rows: &[Row], columns: usize) -> Vec<u32> {
        let mut totals: Vec<(usize, usize)> = (0..columns)
            .map(|col| {
                let total = rows
                    .iter()
                    .map(|row| row.get(col).map_or(0, |c| c.trim().chars().count()))
                    .sum();
                (col, total)
            })
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1));

        let mut widths = vec![self.constants.narrow_col_width; columns];
        for &(col, _) in totals.iter().take(self.constants.wide_columns) {
            widths[col] = self.constants.wide_col_width;
        }

        let mut out = Vec::with_capacity(columns + 1);
        out.push(self.constants.index_col_width);
        out.extend(widths);
        out
    }

    /// Decide whether `text` may wrap inside a column `column_width` pixels wide.
    pub fn wrap_class(&self, text: &str, column_width: u32) -> WrapClass {
        let c = &self.constants;
        let space = f64::from(column_width) - f64::from(c.cell_padding_x);
        if space <= 0.0 {
            return WrapClass::NoWrap;
        }
        let len = text.trim().chars().count() as f64;
        let lines = (len * c.avg_char_width / space).ceil();
        let height = lines * f64::from(c.line_height);
        if height <= f64::from(c.row_height) {
            WrapClass::Wrap
        } else {
            WrapClass::NoWrap
        }
    }
}
