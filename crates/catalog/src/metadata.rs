// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata types for bound relations and statement results
//!
//! These types describe what the catalog knows about each file-backed
//! relation, and carry the outcome of executed statements back to the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::sniff::TextEncoding;

/// Registry of bound relations, keyed by `(schema, internal name)`.
pub type Registry = BTreeMap<(String, String), RegMeta>;

/// The kind of file backing a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    /// Delimited text: `.csv`, `.tsv`, `.txt`
    Delimited,
    /// Spreadsheet workbook: `.xlsx`, `.xls`
    Spreadsheet,
}

/// Everything recorded at bind time that the write-back path needs to
/// persist the same file back out in the same shape.
#[derive(Debug, Clone, Serialize)]
pub struct RegMeta {
    /// Source file path
    pub path: PathBuf,
    /// File kind
    pub kind: FileKind,
    /// Sheet name, for spreadsheet relations bound to a specific sheet
    pub sheet: Option<String>,
    /// Delimiter the file was bound with, if an explicit one was used
    pub delimiter: Option<u8>,
    /// Text encoding detected at bind time, if any
    pub encoding: Option<TextEncoding>,
}

impl RegMeta {
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            sheet: None,
            delimiter: None,
            encoding: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// One column of a relation, as reported by the engine's `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// An owned tabular query result.
///
/// Cells are `None` for SQL NULL; everything else is rendered to text, which
/// matches the all-varchar typing the binder applies to file-backed relations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryOutput {
    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Remove the named column from the result, if present.
    ///
    /// Used to strip the provenance column the engine injects on multi-file
    /// reads before a result is written back to disk.
    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.columns.iter().position(|c| c == name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                if idx < row.len() {
                    row.remove(idx);
                }
            }
        }
    }
}

/// What a single executed statement produced
#[derive(Debug, Serialize)]
pub enum StatementOutcome {
    /// A plain query: its tabular result
    Rows(QueryOutput),
    /// A mutating statement persisted back into its source file
    WroteBack { path: PathBuf },
    /// A CTAS statement materialized a new file
    CreatedFile { path: PathBuf },
}

/// Per-statement result of [`Catalog::execute`](crate::Catalog::execute),
/// reported in statement order.
#[derive(Debug)]
pub struct StatementReport {
    /// The statement as executed, after identifier rewriting
    pub statement: String,
    /// Success or the error local to this statement
    pub outcome: crate::CatalogResult<StatementOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_column_removes_cells() {
        let mut out = QueryOutput {
            columns: vec!["id".into(), "filename".into(), "name".into()],
            rows: vec![
                vec![Some("1".into()), Some("a.csv".into()), Some("x".into())],
                vec![Some("2".into()), Some("a.csv".into()), None],
            ],
        };
        out.drop_column("filename");
        assert_eq!(out.columns, vec!["id", "name"]);
        assert_eq!(out.rows[0], vec![Some("1".to_string()), Some("x".to_string())]);
        assert_eq!(out.rows[1], vec![Some("2".to_string()), None]);
    }

    #[test]
    fn test_reg_meta_serializes() {
        let meta = RegMeta::new("/data/t.csv", FileKind::Delimited).with_delimiter(b';');
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "Delimited");
        assert_eq!(json["delimiter"], 59);
        assert!(json["sheet"].is_null());
    }

    #[test]
    fn test_drop_column_missing_is_noop() {
        let mut out = QueryOutput {
            columns: vec!["id".into()],
            rows: vec![vec![Some("1".into())]],
        };
        out.drop_column("filename");
        assert_eq!(out.columns, vec!["id"]);
        assert_eq!(out.rows.len(), 1);
    }
}
