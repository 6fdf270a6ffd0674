//! Page markup: a [`Page`] as a self-contained HTML document.
//!
//! The document is sized to the fixed viewport and carries its own
//! stylesheet, so the rendering backend needs nothing but the file. The
//! auditor later reads the same file back as plain text, which is why every
//! cell value is escaped here rather than trusted.

use crate::config::{LayoutConstants, Viewport};
use crate::model::Page;
use std::fmt::Write as _;

/// Produce the HTML document for one page.
pub fn render_page(page: &Page, viewport: Viewport, layout: &LayoutConstants) -> String {
    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"vi\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape(&page.title));
    html.push_str("<style>\n");
    html.push_str(&stylesheet(viewport, layout));
    html.push_str("</style>\n</head>\n<body>\n");
    let _ = writeln!(html, "<h1 class=\"page-title\">{}</h1>", escape(&page.title));

    html.push_str("<table>\n<colgroup>\n");
    for width in &page.column_widths {
        let _ = writeln!(html, "<col style=\"width: {width}px\">");
    }
    html.push_str("</colgroup>\n<tbody>\n");

    for row in &page.rows {
        html.push_str("<tr>");
        let _ = write!(html, "<td class=\"row-index\">{}</td>", escape(&row.label.to_string()));
        for cell in &row.cells {
            let _ = write!(
                html,
                "<td><div class=\"{}\">{}</div></td>",
                cell.wrap.css_class(),
                escape(&cell.value)
            );
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

fn stylesheet(viewport: Viewport, layout: &LayoutConstants) -> String {
    format!(
        "html, body {{ margin: 0; padding: 0; background: #ffffff; }}\n\
body {{ width: {w}px; height: {h}px; overflow: hidden; font-family: 'DejaVu Sans', Arial, sans-serif; font-size: 14px; color: #1f2933; }}\n\
.page-title {{ font-size: 18px; margin: 8px 12px; height: 24px; white-space: nowrap; overflow: hidden; }}\n\
table {{ table-layout: fixed; border-collapse: collapse; margin: 0 12px; }}\n\
td {{ height: {row}px; border: 1px solid #cbd2d9; padding: 0 {pad}px; vertical-align: middle; overflow: hidden; }}\n\
td.row-index {{ text-align: center; color: #7b8794; background: #f5f7fa; }}\n\
td > div {{ max-height: {row}px; overflow: hidden; line-height: {line}px; }}\n\
.wrap-text {{ white-space: normal; word-break: break-word; }}\n\
.no-wrap-text {{ white-space: nowrap; text-overflow: ellipsis; }}\n",
        w = viewport.width,
        h = viewport.height,
        row = layout.row_height,
        pad = layout.cell_padding_x / 2,
        line = layout.line_height,
    )
}

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
