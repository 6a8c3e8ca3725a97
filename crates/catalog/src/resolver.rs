// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Name resolution between display names and engine identifiers
//!
//! Display names come from file and sheet names and may contain anything;
//! internal names are engine-safe identifiers, unique per schema. The
//! resolver keeps the two-way mapping and never lets two display names
//! collapse to the same internal name silently.

use std::collections::{HashMap, HashSet};

/// Replace every run of characters outside `[A-Za-z0-9_]` with `_`, trim
/// leading/trailing underscores, fall back to `placeholder` when nothing is
/// left, and prefix `_` when the result starts with a digit.
pub fn sanitize_identifier(name: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    let base = if trimmed.is_empty() { placeholder } else { trimmed };
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{base}")
    } else {
        base.to_string()
    }
}

/// Bidirectional display↔internal name mapping, scoped per schema.
#[derive(Debug, Default)]
pub struct NameResolver {
    display_to_internal: HashMap<(String, String), String>,
    internal_to_display: HashMap<(String, String), String>,
    used: HashSet<(String, String)>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display name in a schema, returning the derived internal
    /// name. Collisions are disambiguated with `_2`, `_3`, … suffixes.
    pub fn register(&mut self, schema: &str, display: &str) -> String {
        let base = sanitize_identifier(display, "tbl");
        let mut internal = base.clone();
        let mut n = 2;
        while self.used.contains(&(schema.to_string(), internal.clone())) {
            internal = format!("{base}_{n}");
            n += 1;
        }
        self.used.insert((schema.to_string(), internal.clone()));
        self.display_to_internal
            .insert((schema.to_string(), display.to_string()), internal.clone());
        self.internal_to_display
            .insert((schema.to_string(), internal.clone()), display.to_string());
        internal
    }

    /// O(1) lookup of the internal name for a display name.
    pub fn to_internal(&self, schema: &str, display: &str) -> Option<&str> {
        self.display_to_internal
            .get(&(schema.to_string(), display.to_string()))
            .map(String::as_str)
    }

    /// O(1) lookup of the display name for an internal name.
    pub fn to_display(&self, schema: &str, internal: &str) -> Option<&str> {
        self.internal_to_display
            .get(&(schema.to_string(), internal.to_string()))
            .map(String::as_str)
    }

    /// Remove every entry for a schema from both maps and the used set.
    pub fn drop_schema(&mut self, schema: &str) {
        self.display_to_internal.retain(|(s, _), _| s != schema);
        self.internal_to_display.retain(|(s, _), _| s != schema);
        self.used.retain(|(s, _)| s != schema);
    }

    /// All display names registered in a schema.
    pub fn displays_in(&self, schema: &str) -> Vec<String> {
        self.display_to_internal
            .keys()
            .filter(|(s, _)| s == schema)
            .map(|(_, d)| d.clone())
            .collect()
    }
}
