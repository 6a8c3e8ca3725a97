// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Write-back of mutating statements
//!
//! INSERT/UPDATE/DELETE against a file-backed relation runs against a
//! temporary snapshot of the table, never the bound view. The statement is
//! textually redirected at the snapshot, executed, and the snapshot's final
//! contents are persisted over the source file: a timestamped backup first,
//! then a temp-file write and an atomic rename. Spreadsheet targets are
//! rebuilt sheet by sheet so unrelated sheets survive the rewrite.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use calamine::{open_workbook_auto, Data, Reader};
use regex::Regex;
use tracing::{debug, info};

use crate::backup::{atomic_replace, create_backup};
use crate::engine::{quote_ident, Engine};
use crate::error::{CatalogError, CatalogResult};
use crate::metadata::{FileKind, QueryOutput, RegMeta, Registry};
use crate::sniff::{sniff_delimiter, TextEncoding};

/// Name of the temporary snapshot table mutations run against.
pub const EDIT_TABLE: &str = "__edit_tmp__";

/// Provenance column injected by multi-file reads; never written back.
const PROVENANCE_COLUMN: &str = "filename";

static RE_MUTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?i:insert|update|delete)\b").expect("static pattern"));

static RE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INTO|UPDATE|FROM)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static pattern")
});

/// Whether a statement is an INSERT, UPDATE, or DELETE.
pub fn is_mutation(stmt: &str) -> bool {
    RE_MUTATION.is_match(stmt)
}

/// The first `schema.table` reference in the statement that names a bound
/// relation, if any. Statements that mutate only engine-native tables return
/// `None` and run as plain statements.
pub fn find_target(stmt: &str, registry: &Registry) -> Option<(String, String, RegMeta)> {
    for caps in RE_TARGET.captures_iter(stmt) {
        let key = (caps[2].to_string(), caps[3].to_string());
        if let Some(meta) = registry.get(&key) {
            return Some((key.0, key.1, meta.clone()));
        }
    }
    None
}

/// Run a mutating statement against `schema.table` and persist the result
/// into the backing file. Returns the path written.
pub fn run(
    engine: &Engine,
    schema: &str,
    table: &str,
    meta: &RegMeta,
    stmt: &str,
) -> CatalogResult<PathBuf> {
    engine.execute_batch(&format!("DROP TABLE IF EXISTS {EDIT_TABLE};"))?;
    engine.execute_batch(&format!(
        "CREATE TEMP TABLE {EDIT_TABLE} AS SELECT * FROM {}.{};",
        quote_ident(schema),
        quote_ident(table)
    ))?;

    let redirected = point_at_snapshot(stmt, schema, table);
    debug!(statement = %redirected, "mutation redirected at snapshot");

    let result = (|| {
        let affected = engine.execute(&redirected)?;
        let mut contents = engine.query(&format!("SELECT * FROM {EDIT_TABLE}"))?;
        contents.drop_column(PROVENANCE_COLUMN);
        create_backup(&meta.path)?;
        persist(meta, &contents)?;
        info!(
            path = %meta.path.display(),
            rows_affected = affected,
            rows_written = contents.row_count(),
            "write-back persisted"
        );
        Ok(())
    })();

    // Snapshot cleanup happens on both paths; a failure here is not
    // actionable for the caller.
    if let Err(err) = engine.execute_batch(&format!("DROP TABLE IF EXISTS {EDIT_TABLE};")) {
        debug!(error = %err, "snapshot cleanup failed");
    }

    result.map(|()| meta.path.clone())
}

/// Redirect every `INTO|UPDATE|FROM schema.table` reference to the target
/// relation at the snapshot table, leaving other references alone.
fn point_at_snapshot(stmt: &str, schema: &str, table: &str) -> String {
    RE_TARGET
        .replace_all(stmt, |caps: &regex::Captures| {
            if caps[2].eq_ignore_ascii_case(schema) && caps[3].eq_ignore_ascii_case(table) {
                format!("{} {EDIT_TABLE}", &caps[1])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn persist(meta: &RegMeta, contents: &QueryOutput) -> CatalogResult<()> {
    match meta.kind {
        FileKind::Delimited => persist_delimited(meta, contents),
        FileKind::Spreadsheet => persist_spreadsheet(meta, contents),
    }
}

fn tmp_path(path: &std::path::Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.tmp"))
}

/// Write the snapshot contents as delimited text, preserving the delimiter
/// and encoding the file was bound with. NULL cells become empty fields.
fn persist_delimited(meta: &RegMeta, contents: &QueryOutput) -> CatalogResult<()> {
    let delimiter = meta.delimiter.unwrap_or_else(|| sniff_delimiter(&meta.path));
    let encoding = meta.encoding.unwrap_or(TextEncoding::Utf8);

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&contents.columns)?;
    for row in &contents.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    let buf = writer
        .into_inner()
        .map_err(|err| CatalogError::Io(std::io::Error::other(err.to_string())))?;
    let text = String::from_utf8(buf)
        .map_err(|err| CatalogError::Io(std::io::Error::other(err.to_string())))?;

    let tmp = tmp_path(&meta.path);
    fs::write(&tmp, encoding.encode(&text))?;
    atomic_replace(&tmp, &meta.path)
}

/// Rebuild the workbook with the target sheet replaced by the snapshot
/// contents. Every other sheet is copied over cell by cell.
fn persist_spreadsheet(meta: &RegMeta, contents: &QueryOutput) -> CatalogResult<()> {
    let ext = meta
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ext == "xls" {
        return Err(CatalogError::UnsupportedFormat(
            "writing .xls workbooks is not supported; save the workbook as .xlsx".to_string(),
        ));
    }

    let target_sheet = meta.sheet.as_deref().unwrap_or("Sheet1");
    let mut source = open_workbook_auto(&meta.path)?;
    let sheet_names = source.sheet_names();

    let mut out = rust_xlsxwriter::Workbook::new();
    let mut replaced = false;
    for name in &sheet_names {
        let ws = out.add_worksheet();
        ws.set_name(name.as_str())?;
        if name.as_str() == target_sheet {
            write_contents(ws, contents)?;
            replaced = true;
        } else {
            let range = source.worksheet_range(name)?;
            copy_range(ws, &range)?;
        }
    }
    if !replaced {
        let ws = out.add_worksheet();
        ws.set_name(target_sheet)?;
        write_contents(ws, contents)?;
    }

    let tmp = tmp_path(&meta.path);
    out.save(&tmp)?;
    atomic_replace(&tmp, &meta.path)
}

fn write_contents(
    ws: &mut rust_xlsxwriter::Worksheet,
    contents: &QueryOutput,
) -> CatalogResult<()> {
    for (c, column) in contents.columns.iter().enumerate() {
        ws.write_string(0, c as u16, column.as_str())?;
    }
    for (r, row) in contents.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                ws.write_string((r + 1) as u32, c as u16, value.as_str())?;
            }
        }
    }
    Ok(())
}

fn copy_range(
    ws: &mut rust_xlsxwriter::Worksheet,
    range: &calamine::Range<Data>,
) -> CatalogResult<()> {
    let (r0, c0) = range.start().unwrap_or((0, 0));
    for (r, row) in range.rows().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let at_row = r0 + r as u32;
            let at_col = (c0 + c as u32) as u16;
            match cell {
                Data::Empty => {}
                Data::String(s) => {
                    ws.write_string(at_row, at_col, s.as_str())?;
                }
                Data::Float(f) => {
                    ws.write_number(at_row, at_col, *f)?;
                }
                Data::Int(i) => {
                    ws.write_number(at_row, at_col, *i as f64)?;
                }
                Data::Bool(b) => {
                    ws.write_boolean(at_row, at_col, *b)?;
                }
                other => {
                    if let Some(text) = crate::binder::cell_to_string(other) {
                        ws.write_string(at_row, at_col, text)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mutation() {
        assert!(is_mutation("INSERT INTO s.t VALUES (1)"));
        assert!(is_mutation("  update s.t set x = 1"));
        assert!(is_mutation("DELETE FROM s.t WHERE x = 1"));
        assert!(!is_mutation("SELECT * FROM s.t"));
        assert!(!is_mutation("UPDATES are described here"));
    }

    #[test]
    fn test_find_target_first_bound_reference() {
        let mut registry = Registry::new();
        registry.insert(
            ("s1".to_string(), "people".to_string()),
            RegMeta::new("/data/people.csv", FileKind::Delimited),
        );
        let hit = find_target(
            "DELETE FROM other.t WHERE id IN (SELECT id FROM s1.people)",
            &registry,
        );
        let (schema, table, meta) = hit.unwrap();
        assert_eq!(schema, "s1");
        assert_eq!(table, "people");
        assert_eq!(meta.path, std::path::Path::new("/data/people.csv"));

        assert!(find_target("UPDATE nowhere.t SET x = 1", &registry).is_none());
    }

    #[test]
    fn test_point_at_snapshot_redirects_only_target() {
        let out = point_at_snapshot(
            "UPDATE s1.people SET age = 9 WHERE id IN (SELECT id FROM s1.other)",
            "s1",
            "people",
        );
        assert_eq!(
            out,
            format!("UPDATE {EDIT_TABLE} SET age = 9 WHERE id IN (SELECT id FROM s1.other)")
        );
    }

    #[test]
    fn test_point_at_snapshot_case_insensitive_keyword_kept() {
        let out = point_at_snapshot("insert into S1.People values (1)", "S1", "People");
        assert_eq!(out, format!("insert into {EDIT_TABLE} values (1)"));
    }

    #[test]
    fn test_persist_delimited_keeps_delimiter_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "a\tb\n1\t2\n").unwrap();
        let meta = RegMeta::new(&path, FileKind::Delimited).with_delimiter(b'\t');
        let contents = QueryOutput {
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![Some("1".into()), None],
                vec![Some("3".into()), Some("4".into())],
            ],
        };
        persist_delimited(&meta, &contents).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\tb\n1\t\n3\t4\n");
    }

    #[test]
    fn test_persist_delimited_utf16_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, TextEncoding::Utf16Le.encode("a,b\n1,2\n")).unwrap();
        let meta = RegMeta::new(&path, FileKind::Delimited)
            .with_delimiter(b',')
            .with_encoding(TextEncoding::Utf16Le);
        let contents = QueryOutput {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![Some("1".into()), Some("café".into())]],
        };
        persist_delimited(&meta, &contents).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(TextEncoding::Utf16Le.decode(&bytes), "a,b\n1,café\n");
    }

    #[test]
    fn test_persist_spreadsheet_rejects_xls() {
        let meta = RegMeta::new("/data/old.xls", FileKind::Spreadsheet);
        let err = persist_spreadsheet(&meta, &QueryOutput::default()).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_persist_spreadsheet_replaces_target_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        {
            let mut wb = rust_xlsxwriter::Workbook::new();
            let ws = wb.add_worksheet();
            ws.set_name("People").unwrap();
            ws.write_string(0, 0, "name").unwrap();
            ws.write_string(1, 0, "ann").unwrap();
            let other = wb.add_worksheet();
            other.set_name("Notes").unwrap();
            other.write_string(0, 0, "keep me").unwrap();
            wb.save(&path).unwrap();
        }
        let meta = RegMeta::new(&path, FileKind::Spreadsheet).with_sheet("People");
        let contents = QueryOutput {
            columns: vec!["name".into()],
            rows: vec![vec![Some("bob".into())]],
        };
        persist_spreadsheet(&meta, &contents).unwrap();

        let mut book = open_workbook_auto(&path).unwrap();
        let people = book.worksheet_range("People").unwrap();
        assert_eq!(people.get_value((1, 0)), Some(&Data::String("bob".into())));
        let notes = book.worksheet_range("Notes").unwrap();
        assert_eq!(
            notes.get_value((0, 0)),
            Some(&Data::String("keep me".into()))
        );
    }
}
