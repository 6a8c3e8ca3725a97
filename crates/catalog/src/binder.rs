// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Binding scanned files into the engine
//!
//! Each scanned unit is bound as `schema.internal` through an ordered list of
//! strategies, from cheapest to most forgiving; the first success wins and
//! records the [`RegMeta`] the write-back path later relies on. A file that
//! defeats every strategy is skipped with a warning, never failing the whole
//! bind. All bound relations are typed as text columns so mixed-type files
//! never fail at read time.

use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::engine::{escape_literal, quote_ident, Engine};
use crate::error::{CatalogError, CatalogResult};
use crate::metadata::{FileKind, RegMeta, Registry};
use crate::resolver::NameResolver;
use crate::scanner::{scan_folder, ScannedTable};
use crate::sniff::{default_delimiter, sniff_delimiter_in, sniff_encoding, TextEncoding};

const INSERT_CHUNK_ROWS: usize = 500;

/// Bind every queryable unit of `folder` into `schema`.
///
/// The schema is created if needed. Per-file registrations land in `names`
/// and `registry`; files that cannot be bound are logged and skipped.
pub fn bind_folder(
    engine: &mut Engine,
    names: &mut NameResolver,
    registry: &mut Registry,
    schema: &str,
    folder: &Path,
) -> CatalogResult<()> {
    engine.execute_batch(&format!(
        "CREATE SCHEMA IF NOT EXISTS {};",
        quote_ident(schema)
    ))?;
    for table in scan_folder(folder)? {
        let internal = names.register(schema, &table.display);
        match bind_one(engine, schema, &internal, &table) {
            Ok(meta) => {
                debug!(
                    schema,
                    internal,
                    display = table.display,
                    path = %table.path.display(),
                    "relation bound"
                );
                registry.insert((schema.to_string(), internal), meta);
            }
            Err(err) => {
                warn!(
                    path = %table.path.display(),
                    error = %err,
                    "file skipped, no bind strategy succeeded"
                );
            }
        }
    }
    Ok(())
}

fn bind_one(
    engine: &mut Engine,
    schema: &str,
    internal: &str,
    table: &ScannedTable,
) -> CatalogResult<RegMeta> {
    match table.kind {
        FileKind::Delimited => bind_delimited(engine, schema, internal, table),
        FileKind::Spreadsheet => bind_spreadsheet(engine, schema, internal, table),
    }
}

/// Delimited strategies, in order: engine auto-detection, engine read with a
/// sniffed delimiter and lenient options, full in-memory materialization.
fn bind_delimited(
    engine: &mut Engine,
    schema: &str,
    internal: &str,
    table: &ScannedTable,
) -> CatalogResult<RegMeta> {
    let encoding = sniff_encoding(&table.path);

    // The engine's CSV reader only speaks UTF-8; wide encodings go straight
    // to the in-process materialization.
    if !matches!(encoding, TextEncoding::Utf8 | TextEncoding::Utf8Bom) {
        materialize_delimited(engine, schema, internal, &table.path, encoding)?;
        return Ok(RegMeta::new(&table.path, FileKind::Delimited).with_encoding(encoding));
    }

    let delimiter = sniff_file_delimiter(&table.path, encoding);
    match view_csv_auto(engine, schema, internal, &table.path) {
        Ok(()) if !view_collapsed(engine, schema, internal, delimiter) => {
            return Ok(RegMeta::new(&table.path, FileKind::Delimited).with_encoding(encoding));
        }
        Ok(()) => {
            debug!(path = %table.path.display(), "auto-detect view collapsed to one column");
            engine.execute_batch(&format!(
                "DROP VIEW IF EXISTS {}.{};",
                quote_ident(schema),
                quote_ident(internal)
            ))?;
        }
        Err(err) => debug!(path = %table.path.display(), error = %err, "auto-detect bind failed"),
    }

    match view_csv_lenient(engine, schema, internal, &table.path, delimiter) {
        Ok(()) => {
            return Ok(RegMeta::new(&table.path, FileKind::Delimited)
                .with_delimiter(delimiter)
                .with_encoding(encoding));
        }
        Err(err) => debug!(path = %table.path.display(), error = %err, "lenient bind failed"),
    }

    materialize_delimited(engine, schema, internal, &table.path, encoding)?;
    Ok(RegMeta::new(&table.path, FileKind::Delimited).with_encoding(encoding))
}

/// Whether an auto-detect view is the sniffer's single-column degradation.
///
/// On files it cannot make sense of, the engine's sniffer binds one untyped
/// column instead of erroring; a lone column whose name carries the sniffed
/// delimiter is that degradation, not a genuine one-column file.
fn view_collapsed(engine: &Engine, schema: &str, internal: &str, delimiter: u8) -> bool {
    match engine.query(&format!(
        "SELECT * FROM {}.{} LIMIT 0;",
        quote_ident(schema),
        quote_ident(internal)
    )) {
        Ok(out) => out.columns.len() == 1 && out.columns[0].contains(delimiter as char),
        Err(_) => true,
    }
}

fn view_csv_auto(
    engine: &Engine,
    schema: &str,
    internal: &str,
    path: &Path,
) -> CatalogResult<()> {
    engine.execute_batch(&format!(
        "CREATE OR REPLACE VIEW {}.{} AS \
         SELECT * FROM read_csv_auto('{}', HEADER=TRUE, SAMPLE_SIZE=-1, ALL_VARCHAR=TRUE);",
        quote_ident(schema),
        quote_ident(internal),
        escape_literal(&path.to_string_lossy())
    ))
}

fn view_csv_lenient(
    engine: &Engine,
    schema: &str,
    internal: &str,
    path: &Path,
    delimiter: u8,
) -> CatalogResult<()> {
    engine.execute_batch(&format!(
        "CREATE OR REPLACE VIEW {}.{} AS \
         SELECT * FROM read_csv('{}', HEADER=TRUE, DELIM='{}', QUOTE='\"', ESCAPE='\"', \
         IGNORE_ERRORS=TRUE, NULL_PADDING=TRUE, SAMPLE_SIZE=-1, ALL_VARCHAR=TRUE);",
        quote_ident(schema),
        quote_ident(internal),
        escape_literal(&path.to_string_lossy()),
        delimiter_sql(delimiter)
    ))
}

fn delimiter_sql(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

fn sniff_file_delimiter(path: &Path, encoding: TextEncoding) -> u8 {
    let default = default_delimiter(path);
    match fs::read(path) {
        Ok(bytes) => {
            let text = decode_with_fallback(&bytes, encoding);
            let sample: String = text.chars().take(64 * 1024).collect();
            sniff_delimiter_in(&sample, default)
        }
        Err(_) => default,
    }
}

/// Decode the detected encoding; a decode riddled with NULs means the file is
/// wide-encoded without a BOM, so retry as UTF-16 little-endian.
fn decode_with_fallback(bytes: &[u8], encoding: TextEncoding) -> String {
    let text = encoding.decode(bytes);
    if encoding == TextEncoding::Utf8 && text.contains('\0') {
        return TextEncoding::Utf16Le.decode(bytes);
    }
    text
}

/// Last-resort delimited bind: decode in-process, parse leniently, and load
/// the rows into an engine table. Short rows are padded with NULLs; rows
/// wider than the header are dropped as malformed.
fn materialize_delimited(
    engine: &Engine,
    schema: &str,
    internal: &str,
    path: &Path,
    encoding: TextEncoding,
) -> CatalogResult<()> {
    let bytes = fs::read(path)?;
    let text = decode_with_fallback(&bytes, encoding);
    let delimiter = sniff_delimiter_in(&text, default_delimiter(path));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = loop {
        match records.next() {
            Some(Ok(rec)) if !rec.is_empty() => break rec,
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(path = %path.display(), error = %err, "skipping malformed line");
            }
            None => {
                return Err(CatalogError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("no parseable rows in {}", path.display()),
                )));
            }
        }
    };
    let columns = unique_column_names(header.iter().map(str::to_string).collect());

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for record in records {
        let record = match record {
            Ok(rec) => rec,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping malformed line");
                continue;
            }
        };
        if record.len() > columns.len() {
            debug!(path = %path.display(), fields = record.len(), "skipping over-wide row");
            continue;
        }
        let mut row: Vec<Option<String>> =
            record.iter().map(|field| Some(field.to_string())).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    create_text_table(engine, schema, internal, &columns, &rows)
}

/// Spreadsheet strategies, in order: engine view over the sheet (when the
/// engine's spreadsheet functions load), then workbook materialization.
fn bind_spreadsheet(
    engine: &mut Engine,
    schema: &str,
    internal: &str,
    table: &ScannedTable,
) -> CatalogResult<RegMeta> {
    if engine.ensure_excel() {
        match view_sheet(engine, schema, internal, table) {
            Ok(()) => {
                let mut meta = RegMeta::new(&table.path, FileKind::Spreadsheet);
                if let Some(sheet) = &table.sheet {
                    meta = meta.with_sheet(sheet);
                }
                return Ok(meta);
            }
            Err(err) => {
                debug!(path = %table.path.display(), error = %err, "sheet view bind failed");
            }
        }
    }

    materialize_sheet(engine, schema, internal, table)?;
    let mut meta = RegMeta::new(&table.path, FileKind::Spreadsheet);
    if let Some(sheet) = &table.sheet {
        meta = meta.with_sheet(sheet);
    }
    Ok(meta)
}

fn view_sheet(
    engine: &Engine,
    schema: &str,
    internal: &str,
    table: &ScannedTable,
) -> CatalogResult<()> {
    let sheet_clause = table
        .sheet
        .as_deref()
        .map(|s| format!(", sheet = '{}'", escape_literal(s)))
        .unwrap_or_default();
    engine.execute_batch(&format!(
        "CREATE OR REPLACE VIEW {}.{} AS \
         SELECT * FROM read_xlsx('{}', all_varchar = true{});",
        quote_ident(schema),
        quote_ident(internal),
        escape_literal(&table.path.to_string_lossy()),
        sheet_clause
    ))
}

fn materialize_sheet(
    engine: &Engine,
    schema: &str,
    internal: &str,
    table: &ScannedTable,
) -> CatalogResult<()> {
    let mut workbook = open_workbook_auto(&table.path)?;
    let sheet = match &table.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| {
                CatalogError::Spreadsheet(format!("no sheets in {}", table.path.display()))
            })?,
    };
    let range = workbook.worksheet_range(&sheet)?;

    let mut rows_iter = range.rows();
    let Some(header) = rows_iter.next() else {
        return Err(CatalogError::Spreadsheet(format!(
            "sheet '{sheet}' in {} is empty",
            table.path.display()
        )));
    };
    let columns = unique_column_names(
        header
            .iter()
            .map(|cell| cell_to_string(cell).unwrap_or_default())
            .collect(),
    );
    let rows: Vec<Vec<Option<String>>> = rows_iter
        .map(|row| {
            let mut rec: Vec<Option<String>> = row.iter().map(cell_to_string).collect();
            rec.resize(columns.len(), None);
            rec
        })
        .collect();

    create_text_table(engine, schema, internal, &columns, &rows)
}

/// Render one workbook cell as an optional text value.
pub(crate) fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            // Whole floats print without the trailing fraction, matching how
            // spreadsheet tools display integer-valued cells.
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(e) => Some(format!("{e:?}")),
    }
}

/// Column names for a header row: blanks become `column<i>`, duplicates get
/// `_2`, `_3`, … suffixes.
fn unique_column_names(raw: Vec<String>) -> Vec<String> {
    let mut used = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("column{i}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while !used.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Create an all-text table and load the rows in chunked inserts.
fn create_text_table(
    engine: &Engine,
    schema: &str,
    internal: &str,
    columns: &[String],
    rows: &[Vec<Option<String>>],
) -> CatalogResult<()> {
    let column_sql: Vec<String> = columns
        .iter()
        .map(|c| format!("{} VARCHAR", quote_ident(c)))
        .collect();
    engine.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {}.{} ({});",
        quote_ident(schema),
        quote_ident(internal),
        column_sql.join(", ")
    ))?;

    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let values: Vec<String> = chunk
            .iter()
            .map(|row| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        Some(v) => format!("'{}'", escape_literal(v)),
                        None => "NULL".to_string(),
                    })
                    .collect();
                format!("({})", cells.join(", "))
            })
            .collect();
        engine.execute_batch(&format!(
            "INSERT INTO {}.{} VALUES {};",
            quote_ident(schema),
            quote_ident(internal),
            values.join(", ")
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bind_dir(dir: &Path) -> (Engine, NameResolver, Registry) {
        let mut engine = Engine::open_in_memory().unwrap();
        let mut names = NameResolver::new();
        let mut registry = Registry::new();
        bind_folder(&mut engine, &mut names, &mut registry, "s1", dir).unwrap();
        (engine, names, registry)
    }

    #[test]
    fn test_bind_clean_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("people.csv"), "id,name\n1,ann\n2,bob\n").unwrap();

        let (engine, names, registry) = bind_dir(dir.path());
        assert_eq!(names.to_internal("s1", "people"), Some("people"));
        assert!(registry.contains_key(&("s1".to_string(), "people".to_string())));

        let out = engine
            .query("SELECT name FROM s1.people ORDER BY id")
            .unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0][0], Some("ann".to_string()));
        // All-varchar typing keeps numeric-looking cells as text.
        let ids = engine.query("SELECT id FROM s1.people ORDER BY id").unwrap();
        assert_eq!(ids.rows[0][0], Some("1".to_string()));
    }

    #[test]
    fn test_bind_semicolon_delimited_txt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("euro.txt"), "id;name\n1;ann\n2;bob\n").unwrap();

        let (engine, _, _) = bind_dir(dir.path());
        let out = engine.query("SELECT * FROM s1.euro").unwrap();
        assert_eq!(out.columns, vec!["id", "name"]);
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn test_bind_ragged_file_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // Second data row is short; some strategy must still bind the file.
        fs::write(dir.path().join("ragged.csv"), "a,b,c\n1,2,3\n4,5\n").unwrap();

        let (engine, _, registry) = bind_dir(dir.path());
        let meta = registry
            .get(&("s1".to_string(), "ragged".to_string()))
            .unwrap();
        // The auto-detect view degrades to one column on this file, so the
        // bind must come from the lenient strategy with an explicit delimiter.
        assert_eq!(meta.delimiter, Some(b','));
        let out = engine.query("SELECT * FROM s1.ragged").unwrap();
        assert_eq!(out.columns.len(), 3);
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn test_genuine_single_column_file_binds_directly() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("names.csv"), "name\nann\nbob\n").unwrap();

        let (engine, _, registry) = bind_dir(dir.path());
        let meta = registry
            .get(&("s1".to_string(), "names".to_string()))
            .unwrap();
        // One real column is not the sniffer degradation; the auto view
        // stands and no explicit delimiter is recorded.
        assert!(meta.delimiter.is_none());
        let out = engine.query("SELECT * FROM s1.names").unwrap();
        assert_eq!(out.columns, vec!["name"]);
        assert_eq!(out.rows.len(), 2);
    }

    #[test]
    fn test_bind_utf16_file_via_materialization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        fs::write(&path, TextEncoding::Utf16Le.encode("id,name\n1,café\n")).unwrap();

        let (engine, _, registry) = bind_dir(dir.path());
        let meta = registry
            .get(&("s1".to_string(), "wide".to_string()))
            .unwrap();
        assert_eq!(meta.encoding, Some(TextEncoding::Utf16Le));
        let out = engine.query("SELECT name FROM s1.wide").unwrap();
        assert_eq!(out.rows[0][0], Some("café".to_string()));
    }

    #[test]
    fn test_bind_workbook_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("People").unwrap();
        ws.write_string(0, 0, "name").unwrap();
        ws.write_string(0, 1, "age").unwrap();
        ws.write_string(1, 0, "ann").unwrap();
        ws.write_string(1, 1, "30").unwrap();
        let other = wb.add_worksheet();
        other.set_name("Empty-ish").unwrap();
        other.write_string(0, 0, "x").unwrap();
        wb.save(&path).unwrap();

        let (engine, names, registry) = bind_dir(dir.path());
        assert_eq!(
            names.to_internal("s1", "book__People"),
            Some("book__People")
        );
        let meta = registry
            .get(&("s1".to_string(), "book__People".to_string()))
            .unwrap();
        assert_eq!(meta.kind, FileKind::Spreadsheet);
        assert_eq!(meta.sheet.as_deref(), Some("People"));

        let out = engine
            .query("SELECT name, age FROM s1.book__People")
            .unwrap();
        assert_eq!(out.rows[0][0], Some("ann".to_string()));
        assert_eq!(out.rows[0][1], Some("30".to_string()));
    }

    #[test]
    fn test_unreadable_file_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.csv"), "a\n1\n").unwrap();
        fs::write(dir.path().join("junk.xlsx"), b"not a workbook").unwrap();

        let (engine, _, registry) = bind_dir(dir.path());
        assert!(registry.contains_key(&("s1".to_string(), "good".to_string())));
        assert!(!registry.contains_key(&("s1".to_string(), "junk__sheet1".to_string())));
        assert!(engine.query("SELECT * FROM s1.good").is_ok());
    }

    #[test]
    fn test_unique_column_names() {
        let cols = unique_column_names(vec![
            "a".into(),
            "".into(),
            "a".into(),
            "  ".into(),
        ]);
        assert_eq!(cols, vec!["a", "column1", "a_2", "column3"]);
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Empty), None);
        assert_eq!(cell_to_string(&Data::Float(30.0)), Some("30".to_string()));
        assert_eq!(cell_to_string(&Data::Float(1.5)), Some("1.5".to_string()));
        assert_eq!(
            cell_to_string(&Data::String("x".into())),
            Some("x".to_string())
        );
        assert_eq!(cell_to_string(&Data::Bool(true)), Some("true".to_string()));
    }
}
