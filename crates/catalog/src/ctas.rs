// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # CTAS file materialization
//!
//! `CREATE TABLE schema.table AS SELECT …` against a bound schema runs the
//! SELECT through the engine and lands the result as `table.csv` in the
//! schema's folder: UTF-8, comma-delimited, with a header row. A pre-existing
//! file at that path is backed up first.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::backup::create_backup;
use crate::engine::{escape_literal, Engine};
use crate::error::CatalogResult;

static RE_CTAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*create\s+table\s+([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\s+as\s+(select\b.*)$",
    )
    .expect("static pattern")
});

/// A parsed `CREATE TABLE schema.table AS SELECT …` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtasStatement {
    pub schema: String,
    pub table: String,
    pub select: String,
}

/// Parse a statement as CTAS, if it has that shape.
///
/// Schema and table must be simple identifiers; anything else is left for
/// the plain-query path.
pub fn parse(stmt: &str) -> Option<CtasStatement> {
    let caps = RE_CTAS.captures(stmt)?;
    Some(CtasStatement {
        schema: caps[1].to_string(),
        table: caps[2].to_string(),
        select: caps[3].to_string(),
    })
}

/// Execute the SELECT and write its result as `<table>.csv` under `folder`.
/// Returns the output path.
pub fn run(engine: &Engine, folder: &Path, ctas: &CtasStatement) -> CatalogResult<PathBuf> {
    let out = folder.join(format!("{}.csv", ctas.table));
    if out.exists() {
        create_backup(&out)?;
    }
    engine.execute_batch(&format!(
        "COPY ({}) TO '{}' (HEADER, DELIMITER ',');",
        ctas.select,
        escape_literal(&out.to_string_lossy())
    ))?;
    info!(path = %out.display(), "CTAS result written");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_ctas() {
        let c = parse("CREATE TABLE sales.report AS SELECT 1 AS id").unwrap();
        assert_eq!(c.schema, "sales");
        assert_eq!(c.table, "report");
        assert_eq!(c.select, "SELECT 1 AS id");
    }

    #[test]
    fn test_parse_case_insensitive_multiline() {
        let c = parse("create table S1.t2 as\nselect *\nfrom S1.src").unwrap();
        assert_eq!(c.schema, "S1");
        assert_eq!(c.table, "t2");
        assert!(c.select.starts_with("select *"));
    }

    #[test]
    fn test_parse_rejects_non_ctas() {
        assert!(parse("SELECT 1").is_none());
        assert!(parse("CREATE TABLE noschema AS SELECT 1").is_none());
        assert!(parse("CREATE VIEW s.v AS SELECT 1").is_none());
        // Quoted identifiers are not simple identifiers.
        assert!(parse("CREATE TABLE s.\"my table\" AS SELECT 1").is_none());
    }

    #[test]
    fn test_run_writes_csv_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open_in_memory().unwrap();
        let ctas = CtasStatement {
            schema: "s".into(),
            table: "report".into(),
            select: "SELECT 1 AS id, 'ok' AS note".into(),
        };

        let out = run(&engine, dir.path(), &ctas).unwrap();
        assert_eq!(out, dir.path().join("report.csv"));
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().next(), Some("id,note"));
        assert!(text.lines().nth(1).unwrap().contains("1,ok"));

        // Running again backs up the first file.
        run(&engine, dir.path(), &ctas).unwrap();
        let baks: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("bak"))
            .collect();
        assert_eq!(baks.len(), 1);
    }
}
