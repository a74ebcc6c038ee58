//! Parser for `key.properties` files.
//!
//! Follows the `java.util.Properties` text format that Gradle build scripts
//! read: `key=value`, `key: value` or `key value` pairs, `#`/`!` comments,
//! backslash line continuations and escape sequences.

use std::collections::HashMap;

/// Parses properties text into a key/value map.
///
/// Later duplicates override earlier ones.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();

    for line in logical_lines(content) {
        let (raw_key, raw_value) = split_key_value(&line);
        properties.insert(unescape(raw_key), unescape(raw_value));
    }

    properties
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Joins natural lines into logical lines, dropping comments and blanks.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for natural in content.lines() {
        let trimmed = natural.trim_start_matches(is_blank);

        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')) {
            continue;
        }

        let trailing_backslashes = trimmed.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_backslashes % 2 == 1 {
            current.push_str(&trimmed[..trimmed.len() - 1]);
            continuing = true;
            continue;
        }

        current.push_str(trimmed);
        continuing = false;
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
    }

    // A continuation on the last line still terminates the entry.
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Splits a logical line at the first unescaped separator.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || is_blank(c) {
            key_end = i;
            break;
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }

    (key, rest)
}

/// Resolves backslash escapes, including `\uXXXX` (with surrogate pairs).
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars().peekable();

    let flush = |units: &mut Vec<u16>, out: &mut String| {
        if !units.is_empty() {
            out.extend(
                char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
            );
        }
    };

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush(&mut units, &mut out);
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u16::from_str_radix(&hex, 16) {
                    Ok(unit) if hex.len() == 4 => {
                        for _ in 0..4 {
                            chars.next();
                        }
                        units.push(unit);
                    }
                    _ => {
                        flush(&mut units, &mut out);
                        out.push('u');
                    }
                }
            }
            Some(other) => {
                flush(&mut units, &mut out);
                out.push(match other {
                    't' => '\t',
                    'n' => '\n',
                    'r' => '\r',
                    'f' => '\x0c',
                    c => c,
                });
            }
            None => flush(&mut units, &mut out),
        }
    }

    flush(&mut units, &mut out);
    out
}
