//! Source reading: open a spreadsheet and normalise it to text rows.
//!
//! ## Why check magic bytes first?
//!
//! calamine picks a reader from the extension and reports a wrong guess as
//! an opaque ZIP or CFB error. Checking the container signature up front
//! (`PK\x03\x04` for xlsx/xlsm/xlsb/ods, `D0 CF 11 E0` for legacy xls) gives
//! callers a meaningful error instead.
//!
//! This is also the only place where "missing" exists: empty cells and
//! cell errors become `""` here and nothing downstream sees a null.

use crate::error::SheetError;
use crate::model::{Row, Sheet, Workbook};
use calamine::{open_workbook_auto, Data, Reader};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// Extensions picked up when a directory is given as input.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// True if `path` has a spreadsheet extension.
pub fn is_spreadsheet_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|x| x.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Expand inputs: files are kept, directories contribute their spreadsheet
/// files (non-recursive, sorted by name).
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, SheetError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| SheetError::SourceRead {
                path: input.clone(),
                detail: e.to_string(),
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_spreadsheet_path(p))
                .collect();
            found.sort();
            debug!("{} spreadsheets in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// File name without extension; the file identifier used by the auditor.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string())
}

/// Validate `path` and read every sheet.
pub fn read_workbook(path: &Path) -> Result<Workbook, SheetError> {
    validate_container(path)?;

    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::SourceRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| SheetError::SourceRead {
                path: path.to_path_buf(),
                detail: format!("sheet '{name}': {e}"),
            })?;
        // The range starts at the first used cell, not at A1. Pad it back
        // so row and column positions match the source sheet.
        let (first_row, first_col) = range
            .start()
            .map_or((0, 0), |(r, c)| (r as usize, c as usize));
        let mut rows: Vec<Row> = vec![Row::new(); first_row];
        rows.extend(range.rows().map(|row| {
            let mut cells = vec![String::new(); first_col];
            cells.extend(row.iter().map(cell_text));
            cells
        }));
        debug!(sheet = %name, first_row, first_col, "Read {} rows", rows.len());
        sheets.push(Sheet::new(name, rows));
    }

    info!("Loaded {} ({} sheets)", path.display(), sheets.len());
    Ok(Workbook {
        file_stem: file_stem(path),
        sheets,
    })
}

fn validate_container(path: &Path) -> Result<(), SheetError> {
    if !path.exists() {
        return Err(SheetError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() {
                return Err(SheetError::SourceRead {
                    path: path.to_path_buf(),
                    detail: "file is shorter than 4 bytes".into(),
                });
            }
            if magic != ZIP_MAGIC && magic != OLE_MAGIC {
                return Err(SheetError::NotASpreadsheet {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(SheetError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(SheetError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Text of one cell. Integral floats print without a fractional part so
/// identifiers stored as numbers keep their digits intact.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => naive.to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("abc".into())), "abc");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::Float(987654321.0)), "987654321");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Bool(true)), "True");
    }

    #[test]
    fn test_is_spreadsheet_path() {
        assert!(is_spreadsheet_path(Path::new("a/b.xlsx")));
        assert!(is_spreadsheet_path(Path::new("B.XLS")));
        assert!(!is_spreadsheet_path(Path::new("notes.csv")));
        assert!(!is_spreadsheet_path(Path::new("noext")));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/x/data_0912.xlsx")), "data_0912");
    }

    #[test]
    fn test_missing_file() {
        let err = read_workbook(Path::new("/definitely/not/here.xlsx")).unwrap_err();
        assert!(matches!(err, SheetError::FileNotFound { .. }));
    }

    #[test]
    fn test_not_a_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("fake.xlsx");
        std::fs::write(&p, b"hello world").unwrap();
        let err = read_workbook(&p).unwrap_err();
        assert!(matches!(err, SheetError::NotASpreadsheet { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn test_corrupt_zip_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("broken.xlsx");
        std::fs::write(&p, b"PK\x03\x04garbage").unwrap();
        let err = read_workbook(&p).unwrap_err();
        assert!(matches!(err, SheetError::SourceRead { .. }));
    }

    /// Data starts at C5; row 6 carries a date cell.
    fn offset_workbook(path: &Path) {
        let mut book = rust_xlsxwriter::Workbook::new();
        let date_format = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");
        let date = rust_xlsxwriter::ExcelDateTime::from_ymd(2024, 3, 15).unwrap();
        let ws = book.add_worksheet();
        ws.set_name("Khach hang").unwrap();
        ws.write_string(4, 2, "Alpha").unwrap();
        ws.write_number(4, 3, 987654321.0).unwrap();
        ws.write_string(5, 2, "Beta").unwrap();
        ws.write_datetime_with_format(5, 3, &date, &date_format)
            .unwrap();
        book.save(path).unwrap();
    }

    #[test]
    fn test_read_keeps_source_positions() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("offset.xlsx");
        offset_workbook(&p);

        let wb = read_workbook(&p).unwrap();
        assert_eq!(wb.file_stem, "offset");
        let sheet = &wb.sheets[0];
        assert_eq!(sheet.name, "Khach hang");
        assert_eq!(sheet.rows.len(), 6);
        assert!(sheet.rows[..4].iter().all(|r| r.iter().all(|c| c.is_empty())));
        assert_eq!(sheet.rows[4], vec!["", "", "Alpha", "987654321"]);
        assert_eq!(sheet.rows[5], vec!["", "", "Beta", "2024-03-15 00:00:00"]);
    }

    #[test]
    fn test_offset_rows_paginate_with_source_labels() {
        use crate::config::PipelineConfig;
        use crate::model::RowLabel;
        use crate::pipeline::paginate::Paginator;

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("offset.xlsx");
        offset_workbook(&p);
        let wb = read_workbook(&p).unwrap();

        let paginator = Paginator::from_config(&PipelineConfig::default()).unwrap();
        let pages = paginator.paginate(&wb.file_stem, &wb.sheets[0]);
        assert_eq!(pages.len(), 1);
        let rows = &pages[0].rows;
        assert_eq!(rows[0].label, RowLabel::Source(5));
        assert_eq!(rows[1].label, RowLabel::Source(6));
        assert_eq!(rows[0].cells[2].value, "Alpha");
        assert_eq!(rows[0].cells[3].value, "*****4321");
        assert!(rows[0].cells[0].value.is_empty());
    }

    #[test]
    fn test_expand_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.xlsx", "a.xls", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let explicit = PathBuf::from("/tmp/explicit.xlsx");
        let files = expand_inputs(&[dir.path().to_path_buf(), explicit.clone()]).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.xls"), dir.path().join("b.xlsx"), explicit]
        );
    }
}
