//! Parsing for environment-style configuration snapshots

use std::collections::HashMap;

/// Parse KEY=VALUE configuration text into a mapping.
///
/// Each line is trimmed; blank lines and `#` comments are skipped.
/// Remaining lines split on their first `=` (lines without one are
/// ignored, as are lines with an empty key). Values wrapped in matching
/// single or double quotes have the quotes stripped and `\"` / `\'`
/// escapes inside them unescaped. When a key repeats, the last
/// occurrence wins.
///
/// Parsing never fails; unrecognized lines are simply dropped.
pub fn parse(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        values.insert(key.to_string(), unquote(value.trim()));
    }

    values
}

/// Strip matching surrounding quotes and unescape embedded quotes.
fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            let inner = &value[1..value.len() - 1];
            return inner.replace("\\\"", "\"").replace("\\'", "'");
        }
    }
    value.to_string()
}
