// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Embedded engine wrapper
//!
//! A thin, synchronous wrapper around one in-memory DuckDB connection. The
//! catalog owns exactly one [`Engine`]; all statements flow through it. This
//! module also carries the identifier/literal quoting helpers used when the
//! catalog assembles SQL itself.

use duckdb::types::Value;
use duckdb::Connection;
use tracing::debug;

use crate::error::CatalogResult;
use crate::metadata::QueryOutput;

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a string for embedding in a single-quoted SQL literal.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// One in-memory DuckDB connection.
pub struct Engine {
    con: Connection,
    excel_loaded: bool,
}

impl Engine {
    /// Open a fresh in-memory engine.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Ok(Self {
            con: Connection::open_in_memory()?,
            excel_loaded: false,
        })
    }

    /// Execute one or more statements, discarding any result.
    pub fn execute_batch(&self, sql: &str) -> CatalogResult<()> {
        self.con.execute_batch(sql)?;
        Ok(())
    }

    /// Execute a single statement, returning the affected-row count.
    pub fn execute(&self, sql: &str) -> CatalogResult<usize> {
        Ok(self.con.execute(sql, [])?)
    }

    /// Run a query and collect its full result as text cells.
    pub fn query(&self, sql: &str) -> CatalogResult<QueryOutput> {
        let mut stmt = self.con.prepare(sql)?;
        let mut out_rows: Vec<Vec<Option<String>>> = Vec::new();
        {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let count = row.as_ref().column_count();
                let mut rec = Vec::with_capacity(count);
                for i in 0..count {
                    rec.push(render_value(row.get::<_, Value>(i)?));
                }
                out_rows.push(rec);
            }
        }
        // Column metadata is available once the statement has executed,
        // which covers zero-row results too.
        let columns = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        Ok(QueryOutput {
            columns,
            rows: out_rows,
        })
    }

    /// Try to make the engine's spreadsheet functions available.
    ///
    /// Mirrors the opportunistic `INSTALL excel; LOAD excel;` dance: failure
    /// is not an error here, it just means the spreadsheet bind falls through
    /// to the materializing strategy.
    pub fn ensure_excel(&mut self) -> bool {
        if self.excel_loaded {
            return true;
        }
        if let Err(err) = self.con.execute_batch("INSTALL excel;") {
            debug!(error = %err, "excel extension install unavailable");
        }
        match self.con.execute_batch("LOAD excel;") {
            Ok(()) => {
                self.excel_loaded = true;
                true
            }
            Err(err) => {
                debug!(error = %err, "excel extension not loaded");
                false
            }
        }
    }
}

/// Render an engine value as an optional text cell.
fn render_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Boolean(b) => Some(b.to_string()),
        Value::TinyInt(v) => Some(v.to_string()),
        Value::SmallInt(v) => Some(v.to_string()),
        Value::Int(v) => Some(v.to_string()),
        Value::BigInt(v) => Some(v.to_string()),
        Value::HugeInt(v) => Some(v.to_string()),
        Value::UTinyInt(v) => Some(v.to_string()),
        Value::USmallInt(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::UBigInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        Value::Decimal(v) => Some(v.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        other => Some(format!("{other:?}")),
    }
}
