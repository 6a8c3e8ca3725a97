// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! On-disk fixtures for catalog tests.
//!
//! A [`FixtureFolder`] is a temporary directory that tests populate with
//! delimited files and workbooks, then bind as a schema. The directory is
//! removed when the fixture drops.

use std::path::{Path, PathBuf};

/// A temporary folder of fixture files.
pub struct FixtureFolder {
    dir: tempfile::TempDir,
}

impl FixtureFolder {
    /// Create an empty fixture folder.
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create fixture dir"),
        }
    }

    /// The folder's path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the folder (whether or not it exists yet).
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a text file into the folder and return its path.
    pub fn write_text(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Write raw bytes into the folder and return the path.
    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.file(name);
        std::fs::write(&path, bytes).expect("write fixture file");
        path
    }

    /// Write an `.xlsx` workbook with the given sheets. Each sheet is a grid
    /// of string cells, first row included as-is (tests use it as a header).
    pub fn write_workbook(&self, name: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        let path = self.file(name);
        let mut workbook = rust_xlsxwriter::Workbook::new();
        for (sheet_name, grid) in sheets {
            let ws = workbook.add_worksheet();
            ws.set_name(*sheet_name).expect("sheet name");
            for (r, row) in grid.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    ws.write_string(r as u32, c as u16, *cell).expect("write cell");
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// Write a small people table, the canonical fixture:
    /// three rows of `id,name,age`.
    pub fn write_people_csv(&self, name: &str) -> PathBuf {
        self.write_text(name, "id,name,age\n1,ann,30\n2,bob,41\n3,cara,25\n")
    }
}

impl Default for FixtureFolder {
    fn default() -> Self {
        Self::new()
    }
}

/// Render rows as delimited text with the given delimiter, quoting only
/// where needed.
pub fn delimited_text(delimiter: u8, rows: &[&[&str]]) -> String {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(*row).expect("write record");
    }
    let buf = writer.into_inner().expect("flush");
    String::from_utf8(buf).expect("utf-8 output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_folder_round_trip() {
        let folder = FixtureFolder::new();
        let path = folder.write_text("a.csv", "x\n1\n");
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x\n1\n");
    }

    #[test]
    fn test_delimited_text_quotes_when_needed() {
        let text = delimited_text(b';', &[&["id", "note"], &["1", "a;b"]]);
        assert_eq!(text, "id;note\n1;\"a;b\"\n");
    }
}
