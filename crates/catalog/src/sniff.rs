// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Format detection for delimited text files
//!
//! Encoding detection inspects the file's leading bytes for byte-order-mark
//! signatures and defaults to UTF-8. Delimiter detection samples the first
//! 64 KiB and scores a fixed candidate set for per-line consistency.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

/// Delimiters considered by the sniffing heuristic, in tie-break order.
pub const DELIMITER_CANDIDATES: [u8; 5] = [b',', b'\t', b';', b'|', b'^'];

const SAMPLE_BYTES: usize = 64 * 1024;
const SAMPLE_LINES: usize = 64;

/// Text encoding of a delimited file, detected from its byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl TextEncoding {
    /// Detect the encoding from the leading bytes of a buffer.
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
            TextEncoding::Utf32Le
        } else if head.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
            TextEncoding::Utf32Be
        } else if head.starts_with(&[0xFF, 0xFE]) {
            TextEncoding::Utf16Le
        } else if head.starts_with(&[0xFE, 0xFF]) {
            TextEncoding::Utf16Be
        } else if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
            TextEncoding::Utf8Bom
        } else {
            TextEncoding::Utf8
        }
    }

    /// The byte-order mark this encoding writes, if any.
    pub fn bom(&self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[],
            TextEncoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            TextEncoding::Utf16Le => &[0xFF, 0xFE],
            TextEncoding::Utf16Be => &[0xFE, 0xFF],
            TextEncoding::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            TextEncoding::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
        }
    }

    /// Decode a full file body to a string, dropping any leading BOM.
    /// Malformed sequences are replaced, never fatal.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => {
                let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
                String::from_utf8_lossy(body).into_owned()
            }
            // encoding_rs strips the matching BOM itself for UTF-16.
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE.decode(bytes).0.into_owned(),
            TextEncoding::Utf16Be => encoding_rs::UTF_16BE.decode(bytes).0.into_owned(),
            TextEncoding::Utf32Le => decode_utf32(bytes, true),
            TextEncoding::Utf32Be => decode_utf32(bytes, false),
        }
    }

    /// Encode a string for writing, including the BOM the file carried.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = self.bom().to_vec();
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => out.extend_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            TextEncoding::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            TextEncoding::Utf32Le => {
                for ch in text.chars() {
                    out.extend_from_slice(&(ch as u32).to_le_bytes());
                }
            }
            TextEncoding::Utf32Be => {
                for ch in text.chars() {
                    out.extend_from_slice(&(ch as u32).to_be_bytes());
                }
            }
        }
        out
    }
}

fn decode_utf32(bytes: &[u8], little_endian: bool) -> String {
    let body = if bytes.len() >= 4 { &bytes[4..] } else { &[][..] };
    body.chunks_exact(4)
        .map(|c| {
            let raw = if little_endian {
                u32::from_le_bytes([c[0], c[1], c[2], c[3]])
            } else {
                u32::from_be_bytes([c[0], c[1], c[2], c[3]])
            };
            char::from_u32(raw).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}

/// Detect the text encoding of a file from its byte-order mark.
///
/// Unreadable files default to UTF-8, matching the behavior of the bind
/// fallback chain (the read attempt surfaces the real error).
pub fn sniff_encoding(path: &Path) -> TextEncoding {
    let mut head = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read(&mut head)) {
        Ok(n) => TextEncoding::detect(&head[..n]),
        Err(_) => TextEncoding::Utf8,
    }
}

/// Sniff the field delimiter of a delimited text file.
///
/// Samples the first 64 KiB and picks the candidate whose per-line count is
/// most consistent. Falls back to tab for `.tsv` files and comma otherwise.
pub fn sniff_delimiter(path: &Path) -> u8 {
    let default = default_delimiter(path);
    let mut buf = vec![0u8; SAMPLE_BYTES];
    let sample = match File::open(path).and_then(|mut f| f.read(&mut buf)) {
        Ok(n) => String::from_utf8_lossy(&buf[..n]).into_owned(),
        Err(_) => return default,
    };
    sniff_delimiter_in(&sample, default)
}

/// The extension-based fallback delimiter for a path.
pub fn default_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Delimiter sniffing over an in-memory sample.
pub fn sniff_delimiter_in(sample: &str, default: u8) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();
    if lines.is_empty() {
        return default;
    }

    // Score: consistent non-zero per-line counts beat inconsistent ones,
    // higher counts beat lower. Candidate order breaks ties.
    let mut best: Option<(usize, u8)> = None;
    for &cand in &DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.bytes().filter(|&b| b == cand).count())
            .collect();
        let min = *counts.iter().min().unwrap_or(&0);
        if min == 0 {
            continue;
        }
        let consistent = counts.iter().all(|&c| c == counts[0]);
        let score = min + if consistent { 1000 } else { 0 };
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, cand));
        }
    }
    best.map(|(_, d)| d).unwrap_or(default)
}
