// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for FlatSQL
//!
//! This crate provides common testing components including:
//! - Temporary folder fixtures with delimited-text and workbook files
//! - Builders for delimited content with arbitrary delimiters

pub mod fixtures;

// Re-exports for convenience
pub use fixtures::{delimited_text, FixtureFolder};
