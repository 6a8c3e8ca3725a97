// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Script splitting
//!
//! Splits a script into individually executable statements on `;` and on
//! standalone `GO` batch-separator lines, honoring single- and double-quoted
//! string state in a single pass. Nothing here executes SQL.

/// Split a script into ordered, trimmed, non-empty statements.
///
/// Splits occur at `;` and at lines consisting solely of the case-insensitive
/// keyword `GO` (optionally followed by a `--` comment), provided the position
/// is outside quoted-string state.
///
/// Escape handling is a one-character lookback: a `\` immediately before a
/// quote keeps it from toggling quote state. Inputs like `'O\\'Brien'` are
/// therefore ambiguous and split as the lookback dictates; this is a known
/// limitation, not a full escape grammar. A script with unbalanced quotes
/// treats the remainder as still inside the string and yields it as one
/// trailing statement.
pub fn split_script(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut statements = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut at_line_start = true;
    let mut i = 0;

    let mut flush = |buf: &mut String, statements: &mut Vec<String>| {
        let stmt = buf.trim();
        if !stmt.is_empty() {
            statements.push(stmt.to_string());
        }
        buf.clear();
    };

    while i < chars.len() {
        if at_line_start && !in_single && !in_double {
            let line_end = chars[i..]
                .iter()
                .position(|&c| c == '\n')
                .map(|p| i + p)
                .unwrap_or(chars.len());
            let line: String = chars[i..line_end].iter().collect();
            if is_batch_separator(&line) {
                flush(&mut buf, &mut statements);
                // Skip the separator line including its newline.
                i = if line_end < chars.len() { line_end + 1 } else { chars.len() };
                continue;
            }
        }

        let ch = chars[i];
        if ch == '\\' && !escaped {
            escaped = true;
            buf.push(ch);
            at_line_start = false;
            i += 1;
            continue;
        }
        if ch == '\'' && !in_double && !escaped {
            in_single = !in_single;
        } else if ch == '"' && !in_single && !escaped {
            in_double = !in_double;
        }
        escaped = false;

        if ch == ';' && !in_single && !in_double {
            flush(&mut buf, &mut statements);
        } else {
            buf.push(ch);
        }
        at_line_start = ch == '\n';
        i += 1;
    }
    flush(&mut buf, &mut statements);
    statements
}

/// A line that is exactly the `GO` keyword, optionally followed by a comment.
fn is_batch_separator(line: &str) -> bool {
    let t = line.trim();
    // Byte index 2 is only a valid slice point when the first two characters
    // are ASCII; a line starting with a wider character is never `GO`.
    if t.len() < 2 || !t.is_char_boundary(2) || !t[..2].eq_ignore_ascii_case("go") {
        return false;
    }
    let rest = t[2..].trim_start();
    rest.is_empty() || rest.starts_with("--")
}
