// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Identifier rewriting
//!
//! Rewrites user-typed `schema.display` references to the engine-safe
//! `schema.internal` form before execution. This is a best-effort textual
//! pass, not a SQL parser: references inside comments or exotic nesting may
//! be rewritten too. The trait seam exists so a token-aware pass can replace
//! the regex implementation without touching callers.

use std::collections::BTreeMap;

use regex::Regex;

use crate::resolver::NameResolver;

/// Schema name → display names known in that schema.
pub type SchemaTables = BTreeMap<String, Vec<String>>;

/// Rewrites display-name references in a statement to internal names.
pub trait RewriteIdentifiers {
    /// Rewrite every `schema.display` reference (bare, double-quoted, or
    /// bracket-quoted on either side, any case, optional whitespace around
    /// the dot) to `schema.internal`.
    fn rewrite(&self, sql: &str, names: &NameResolver, tables: &SchemaTables) -> String;
}

/// Regex-driven rewriter.
///
/// Longer display names are matched before shorter prefixes of them, and a
/// match must not touch a word character on either side, so rewriting `sales`
/// never corrupts `salesreport`.
#[derive(Debug, Default)]
pub struct RegexRewriter;

impl RewriteIdentifiers for RegexRewriter {
    fn rewrite(&self, sql: &str, names: &NameResolver, tables: &SchemaTables) -> String {
        let mut out = sql.to_string();
        for (schema, displays) in tables {
            let mut displays = displays.clone();
            displays.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            for display in &displays {
                let Some(internal) = names.to_internal(schema, display) else {
                    continue;
                };
                let replacement = format!("{schema}.{internal}");
                let Ok(re) = Regex::new(&reference_pattern(schema, display)) else {
                    continue;
                };
                out = replace_token_bounded(&re, &out, &replacement);
            }
        }
        out
    }
}

/// Pattern matching one qualified reference in bare, `"quoted"`, or
/// `[bracketed]` form, case-insensitively.
fn reference_pattern(schema: &str, display: &str) -> String {
    let s = regex::escape(schema);
    let d = regex::escape(display);
    format!(r#"(?i)(?:{s}|"{s}"|\[{s}\])\s*\.\s*(?:{d}|"{d}"|\[{d}\])"#)
}

/// Replace matches that sit on token boundaries: the match must not be
/// immediately preceded or followed by a word character.
fn replace_token_bounded(re: &Regex, input: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for m in re.find_iter(input) {
        let before_ok = input[..m.start()]
            .chars()
            .next_back()
            .is_none_or(|c| !is_word_char(c));
        let after_ok = input[m.end()..]
            .chars()
            .next()
            .is_none_or(|c| !is_word_char(c));
        if before_ok && after_ok {
            out.push_str(&input[last..m.start()]);
            out.push_str(replacement);
            last = m.end();
        }
    }
    out.push_str(&input[last..]);
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (NameResolver, SchemaTables) {
        let mut names = NameResolver::new();
        names.register("Sales", "My Report");
        names.register("Sales", "My Report Extended");
        names.register("Sales", "sales");
        let mut tables = SchemaTables::new();
        tables.insert(
            "Sales".to_string(),
            vec![
                "My Report".into(),
                "My Report Extended".into(),
                "sales".into(),
            ],
        );
        (names, tables)
    }

    #[test]
    fn test_quoted_display_is_rewritten() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite(
            "SELECT * FROM Sales.\"My Report\"",
            &names,
            &tables,
        );
        assert_eq!(out, "SELECT * FROM Sales.My_Report");
    }

    #[test]
    fn test_bracketed_and_spaced_forms() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite("SELECT * FROM [Sales] . [My Report]", &names, &tables);
        assert_eq!(out, "SELECT * FROM Sales.My_Report");
    }

    #[test]
    fn test_case_insensitive_match() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite("select * from SALES.\"my report\"", &names, &tables);
        assert_eq!(out, "select * from Sales.My_Report");
    }

    #[test]
    fn test_longer_name_wins_over_prefix() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite(
            "SELECT * FROM Sales.\"My Report Extended\"",
            &names,
            &tables,
        );
        assert_eq!(out, "SELECT * FROM Sales.My_Report_Extended");
    }

    #[test]
    fn test_token_boundary_guard() {
        let (names, tables) = setup();
        // `xSales.sales` is a different identifier and must not be touched.
        let out = RegexRewriter.rewrite("SELECT * FROM xSales.sales", &names, &tables);
        assert_eq!(out, "SELECT * FROM xSales.sales");
    }

    #[test]
    fn test_multiple_references_in_one_statement() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite(
            "SELECT * FROM Sales.\"My Report\" a JOIN Sales.\"My Report\" b ON a.id = b.id",
            &names,
            &tables,
        );
        assert_eq!(
            out,
            "SELECT * FROM Sales.My_Report a JOIN Sales.My_Report b ON a.id = b.id"
        );
    }

    #[test]
    fn test_unknown_schema_untouched() {
        let (names, tables) = setup();
        let out = RegexRewriter.rewrite("SELECT * FROM Other.\"My Report\"", &names, &tables);
        assert_eq!(out, "SELECT * FROM Other.\"My Report\"");
    }
}
