// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # The catalog façade
//!
//! One [`Catalog`] owns the engine, the registry of file-backed relations,
//! the display↔internal name mapping, and the identifier rewriter. Scripts
//! flow through [`Catalog::execute`]: split into statements, rewritten,
//! classified, and dispatched to the CTAS, write-back, or plain-query path.
//! Statement failures are reported per statement; later statements still run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::binder;
use crate::ctas::{self, CtasStatement};
use crate::engine::{quote_ident, Engine};
use crate::error::{CatalogError, CatalogResult};
use crate::metadata::{ColumnInfo, QueryOutput, RegMeta, Registry, StatementOutcome, StatementReport};
use crate::resolver::{sanitize_identifier, NameResolver};
use crate::rewrite::{RegexRewriter, RewriteIdentifiers, SchemaTables};
use crate::splitter::split_script;
use crate::writeback;

static RE_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?i:select|with)\b").expect("static pattern"));
static RE_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\b").expect("static pattern"));

/// Placeholder used when a schema name sanitizes to nothing.
const SCHEMA_PLACEHOLDER: &str = "root";

/// How one statement will be dispatched.
#[derive(Debug)]
pub enum StatementKind {
    /// `CREATE TABLE schema.table AS SELECT …`
    Ctas(CtasStatement),
    /// INSERT, UPDATE, or DELETE
    Mutation,
    /// Everything else
    Query,
}

/// Classify one statement. CTAS is checked first so a
/// `CREATE TABLE … AS SELECT` never falls into the plain-query path.
pub fn classify(stmt: &str) -> StatementKind {
    if let Some(c) = ctas::parse(stmt) {
        StatementKind::Ctas(c)
    } else if writeback::is_mutation(stmt) {
        StatementKind::Mutation
    } else {
        StatementKind::Query
    }
}

/// The engine-backed catalog of folder-bound schemas.
pub struct Catalog {
    engine: Engine,
    registry: Registry,
    schemas: BTreeMap<String, PathBuf>,
    names: NameResolver,
    rewriter: Box<dyn RewriteIdentifiers>,
    row_cap: Option<usize>,
}

impl Catalog {
    /// Open a catalog over a fresh in-memory engine.
    pub fn new() -> CatalogResult<Self> {
        Ok(Self {
            engine: Engine::open_in_memory()?,
            registry: Registry::new(),
            schemas: BTreeMap::new(),
            names: NameResolver::new(),
            rewriter: Box::new(RegexRewriter),
            row_cap: None,
        })
    }

    /// Cap bare SELECT results at `cap` rows. Statements carrying their own
    /// LIMIT are left alone.
    pub fn with_row_cap(mut self, cap: usize) -> Self {
        self.row_cap = Some(cap);
        self
    }

    /// Bind a folder's files as a schema, returning the (sanitized) schema
    /// name actually used. Rebinding an existing schema replaces it, so the
    /// operation is idempotent.
    pub fn bind_folder(&mut self, schema: &str, folder: &Path) -> CatalogResult<String> {
        let schema = sanitize_identifier(schema, SCHEMA_PLACEHOLDER);
        if self.schemas.contains_key(&schema) {
            self.drop_schema(&schema)?;
        }
        binder::bind_folder(
            &mut self.engine,
            &mut self.names,
            &mut self.registry,
            &schema,
            folder,
        )?;
        self.schemas.insert(schema.clone(), folder.to_path_buf());
        info!(schema, folder = %folder.display(), "schema bound");
        Ok(schema)
    }

    /// Bind a root folder and each of its immediate subfolders as schemas
    /// named `<alias>_root` and `<alias>_<subfolder>`. Returns the schema
    /// names bound, root first.
    pub fn bind_server(&mut self, alias: &str, root: &Path) -> CatalogResult<Vec<String>> {
        let alias = sanitize_identifier(alias, SCHEMA_PLACEHOLDER);
        let mut bound = vec![self.bind_folder(&format!("{alias}_root"), root)?];

        let mut subdirs: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();
        for dir in subdirs {
            let stem = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let schema = format!("{alias}_{}", sanitize_identifier(stem, SCHEMA_PLACEHOLDER));
            bound.push(self.bind_folder(&schema, &dir)?);
        }
        Ok(bound)
    }

    /// Drop a schema and all catalog state tied to it. Unknown schemas are a
    /// no-op.
    pub fn drop_schema(&mut self, schema: &str) -> CatalogResult<()> {
        let schema = sanitize_identifier(schema, SCHEMA_PLACEHOLDER);
        if let Err(err) = self.engine.execute_batch(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE;",
            quote_ident(&schema)
        )) {
            debug!(schema, error = %err, "engine-side schema drop failed");
        }
        self.registry.retain(|(s, _), _| s != &schema);
        self.names.drop_schema(&schema);
        self.schemas.remove(&schema);
        Ok(())
    }

    /// Re-scan and re-bind every bound schema from its folder.
    pub fn refresh(&mut self) -> CatalogResult<()> {
        let folders: Vec<(String, PathBuf)> = self
            .schemas
            .iter()
            .map(|(s, f)| (s.clone(), f.clone()))
            .collect();
        for (schema, folder) in folders {
            self.bind_folder(&schema, &folder)?;
        }
        Ok(())
    }

    /// Drop everything and start over on a fresh engine.
    pub fn reset(&mut self) -> CatalogResult<()> {
        self.engine = Engine::open_in_memory()?;
        self.registry.clear();
        self.names = NameResolver::new();
        self.schemas.clear();
        Ok(())
    }

    /// Execute a script: split, rewrite, classify, dispatch. One report per
    /// statement, in order; a failing statement never stops the ones after it.
    pub fn execute(&mut self, script: &str) -> Vec<StatementReport> {
        let mut reports = Vec::new();
        for stmt in split_script(script) {
            let tables = self.schema_tables();
            let rewritten = self.rewriter.rewrite(&stmt, &self.names, &tables);
            let outcome = self.execute_one(&rewritten);
            if let Err(err) = &outcome {
                warn!(statement = %rewritten, error = %err, "statement failed");
            }
            reports.push(StatementReport {
                statement: rewritten,
                outcome,
            });
        }
        reports
    }

    fn execute_one(&mut self, stmt: &str) -> CatalogResult<StatementOutcome> {
        match classify(stmt) {
            StatementKind::Ctas(c) => {
                let folder = self
                    .schemas
                    .get(&c.schema)
                    .ok_or_else(|| CatalogError::UnknownSchema(c.schema.clone()))?
                    .clone();
                let path = ctas::run(&self.engine, &folder, &c)?;
                // The new file becomes queryable immediately.
                self.bind_folder(&c.schema, &folder)?;
                Ok(StatementOutcome::CreatedFile { path })
            }
            StatementKind::Mutation => {
                match writeback::find_target(stmt, &self.registry) {
                    Some((schema, table, meta)) => {
                        let path = writeback::run(&self.engine, &schema, &table, &meta, stmt)?;
                        let folder = self
                            .schemas
                            .get(&schema)
                            .cloned()
                            .or_else(|| meta.path.parent().map(Path::to_path_buf))
                            .ok_or_else(|| CatalogError::UnknownSchema(schema.clone()))?;
                        self.bind_folder(&schema, &folder)?;
                        Ok(StatementOutcome::WroteBack { path })
                    }
                    // Mutations on engine-native tables run as-is.
                    None => self.run_plain(stmt),
                }
            }
            StatementKind::Query => self.run_plain(stmt),
        }
    }

    fn run_plain(&self, stmt: &str) -> CatalogResult<StatementOutcome> {
        let sql = self.apply_row_cap(stmt);
        Ok(StatementOutcome::Rows(self.engine.query(&sql)?))
    }

    fn apply_row_cap(&self, stmt: &str) -> String {
        if let Some(cap) = self.row_cap {
            if RE_SELECT.is_match(stmt) && !RE_LIMIT.is_match(stmt) {
                return format!("SELECT * FROM ({stmt}) __capped LIMIT {cap}");
            }
        }
        stmt.to_string()
    }

    /// Display names known per schema, for the rewriter.
    fn schema_tables(&self) -> SchemaTables {
        let mut tables = SchemaTables::new();
        for (schema, internal) in self.registry.keys() {
            let display = self
                .names
                .to_display(schema, internal)
                .unwrap_or(internal)
                .to_string();
            tables.entry(schema.clone()).or_default().push(display);
        }
        tables
    }

    /// First `limit` rows of a bound relation.
    pub fn preview(&self, schema: &str, table: &str, limit: usize) -> CatalogResult<QueryOutput> {
        self.require_bound(schema, table)?;
        self.engine.query(&format!(
            "SELECT * FROM {}.{} LIMIT {limit};",
            quote_ident(schema),
            quote_ident(table)
        ))
    }

    /// Column names and engine types of a bound relation.
    pub fn describe(&self, schema: &str, table: &str) -> CatalogResult<Vec<ColumnInfo>> {
        self.require_bound(schema, table)?;
        let out = self.engine.query(&format!(
            "DESCRIBE {}.{};",
            quote_ident(schema),
            quote_ident(table)
        ))?;
        let name_idx = column_index(&out.columns, &["column_name", "name"]);
        let type_idx = column_index(&out.columns, &["column_type", "type"]);
        let (Some(name_idx), Some(type_idx)) = (name_idx, type_idx) else {
            return Err(CatalogError::UnsupportedFormat(
                "unrecognized DESCRIBE output shape".to_string(),
            ));
        };
        Ok(out
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get(name_idx).cloned().flatten().unwrap_or_default(),
                data_type: row.get(type_idx).cloned().flatten().unwrap_or_default(),
            })
            .collect())
    }

    fn require_bound(&self, schema: &str, table: &str) -> CatalogResult<()> {
        if self
            .registry
            .contains_key(&(schema.to_string(), table.to_string()))
        {
            Ok(())
        } else {
            // Display order is table first: "Table '<t>' not found in schema '<s>'".
            Err(CatalogError::TableNotFound(
                table.to_string(),
                schema.to_string(),
            ))
        }
    }

    /// Bound schema names, in order.
    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    /// `(display, internal)` pairs bound in a schema, ordered by internal name.
    pub fn tables_in(&self, schema: &str) -> Vec<(String, String)> {
        self.registry
            .keys()
            .filter(|(s, _)| s == schema)
            .map(|(s, internal)| {
                let display = self
                    .names
                    .to_display(s, internal)
                    .unwrap_or(internal)
                    .to_string();
                (display, internal.clone())
            })
            .collect()
    }

    /// Bind-time metadata for one relation.
    pub fn table_meta(&self, schema: &str, table: &str) -> Option<&RegMeta> {
        self.registry.get(&(schema.to_string(), table.to_string()))
    }

    /// Restore the newest backup under `root` over its original, then
    /// refresh every bound schema. Returns the restored file's path.
    pub fn undo_last_write(&mut self, root: &Path) -> CatalogResult<PathBuf> {
        let restored = crate::backup::restore_latest(root)?;
        self.refresh()?;
        Ok(restored)
    }
}

fn column_index(columns: &[String], candidates: &[&str]) -> Option<usize> {
    columns
        .iter()
        .position(|c| candidates.iter().any(|cand| c.eq_ignore_ascii_case(cand)))
}
