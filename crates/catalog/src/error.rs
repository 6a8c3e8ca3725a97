// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for catalog operations
//!
//! This module defines the error types used throughout the catalog layer.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The embedded engine rejected a statement or failed internally
    #[error("Engine error: {0}")]
    Engine(#[from] duckdb::Error),

    /// A filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing delimited text failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading or writing a spreadsheet workbook failed
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A statement referenced a schema that is not bound to any folder
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// The referenced table is not bound in the given schema
    #[error("Table '{0}' not found in schema '{1}'")]
    TableNotFound(String, String),

    /// The destination file is held open by another application.
    ///
    /// The backup taken before the write is left in place.
    #[error("Write failed: '{0}' is locked by another application. Close it and try again")]
    FileLocked(PathBuf),

    /// Writing this file format is not supported
    #[error("Format not supported: {0}")]
    UnsupportedFormat(String),
}

impl From<rust_xlsxwriter::XlsxError> for CatalogError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        CatalogError::Spreadsheet(err.to_string())
    }
}

impl From<calamine::Error> for CatalogError {
    fn from(err: calamine::Error) -> Self {
        CatalogError::Spreadsheet(err.to_string())
    }
}
