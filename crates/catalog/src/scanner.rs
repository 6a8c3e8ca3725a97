// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # File scanning
//!
//! Enumerates the queryable units of one folder: one entry per delimited
//! text file, one entry per sheet of a spreadsheet workbook. Read-only; the
//! only probing done is opening workbooks to list their sheets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};
use tracing::debug;

use crate::error::CatalogResult;
use crate::metadata::FileKind;

/// File extensions the scanner considers queryable.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["csv", "tsv", "txt", "xlsx", "xls"];

/// One queryable unit discovered in a folder.
#[derive(Debug, Clone)]
pub struct ScannedTable {
    /// Human-facing name: the file stem, or `stem__sheet` for workbooks
    pub display: String,
    pub path: PathBuf,
    pub kind: FileKind,
    /// Sheet to bind, for spreadsheet entries with a known sheet list
    pub sheet: Option<String>,
}

/// Scan a folder for queryable units.
///
/// Files are processed in lexicographic path order for determinism.
/// Non-regular files and unsupported extensions are skipped, as is any entry
/// whose display name was already produced by this scan (first one wins).
/// A workbook whose sheet list cannot be read yields a single sheet-less
/// `stem__sheet1` entry instead of failing the scan.
pub fn scan_folder(folder: &Path) -> CatalogResult<Vec<ScannedTable>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    let mut seen: HashSet<String> = HashSet::new();
    let mut tables = Vec::new();
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
        else {
            continue;
        };
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        if ext == "xlsx" || ext == "xls" {
            match open_workbook_auto(&path) {
                Ok(workbook) => {
                    for sheet in workbook.sheet_names() {
                        let display = format!("{stem}__{sheet}");
                        if seen.insert(display.clone()) {
                            tables.push(ScannedTable {
                                display,
                                path: path.clone(),
                                kind: FileKind::Spreadsheet,
                                sheet: Some(sheet.clone()),
                            });
                        }
                    }
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "sheet enumeration failed");
                    let display = format!("{stem}__sheet1");
                    if seen.insert(display.clone()) {
                        tables.push(ScannedTable {
                            display,
                            path: path.clone(),
                            kind: FileKind::Spreadsheet,
                            sheet: None,
                        });
                    }
                }
            }
        } else if seen.insert(stem.clone()) {
            tables.push(ScannedTable {
                display: stem,
                path,
                kind: FileKind::Delimited,
                sheet: None,
            });
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("a.txt"), "y\n2\n").unwrap();
        fs::write(dir.path().join("notes.md"), "skip me").unwrap();
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let tables = scan_folder(dir.path()).unwrap();
        let displays: Vec<&str> = tables.iter().map(|t| t.display.as_str()).collect();
        assert_eq!(displays, vec!["a", "b"]);
        assert!(tables.iter().all(|t| t.kind == FileKind::Delimited));
    }

    #[test]
    fn test_scan_duplicate_display_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("data.txt"), "y\n2\n").unwrap();

        let tables = scan_folder(dir.path()).unwrap();
        assert_eq!(tables.len(), 1);
        // Lexicographic order puts data.csv first.
        assert_eq!(tables[0].path.extension().unwrap(), "csv");
    }

    #[test]
    fn test_scan_unreadable_workbook_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.xlsx"), b"not a zip archive").unwrap();

        let tables = scan_folder(dir.path()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].display, "broken__sheet1");
        assert_eq!(tables[0].kind, FileKind::Spreadsheet);
        assert!(tables[0].sheet.is_none());
    }

    #[test]
    fn test_scan_missing_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(scan_folder(&gone).is_err());
    }
}
