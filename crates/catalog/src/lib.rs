// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # FlatSQL - Catalog and Write-Back Engine
//!
//! This crate turns folders of flat files (CSV/TSV/TXT and spreadsheet
//! workbooks) into SQL-queryable schemas over an embedded analytical engine,
//! and persists mutations back into the source files. The main pieces:
//! - Bind a folder as a schema: one relation per text file, one per sheet
//! - Query with full SQL, addressing relations by their human display names
//! - INSERT/UPDATE/DELETE write through to the backing file, with a
//!   timestamped backup and an atomic replace
//! - `CREATE TABLE schema.table AS SELECT …` materializes a new CSV in the
//!   schema's folder
//!
//! [`Catalog`] is the entry point; everything else supports it.

pub mod backup;
pub mod binder;
pub mod catalog;
pub mod ctas;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod resolver;
pub mod rewrite;
pub mod scanner;
pub mod sniff;
pub mod splitter;
pub mod writeback;

// Re-export commonly used types
pub use catalog::{classify, Catalog, StatementKind};
pub use engine::Engine;
pub use error::{CatalogError, CatalogResult};
pub use metadata::{
    ColumnInfo, FileKind, QueryOutput, RegMeta, Registry, StatementOutcome, StatementReport,
};
pub use resolver::{sanitize_identifier, NameResolver};
pub use rewrite::{RegexRewriter, RewriteIdentifiers, SchemaTables};
pub use scanner::{scan_folder, ScannedTable, SUPPORTED_EXTENSIONS};
pub use sniff::TextEncoding;
pub use splitter::split_script;
