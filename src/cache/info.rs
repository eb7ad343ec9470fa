//! INFO Parsing
//!
//! Turns a line-oriented `key:value` diagnostics block into a map.

use std::collections::HashMap;

/// Parses every `key:value` line of `text`; other lines are ignored.
///
/// Only the first `:` splits a line, so values may contain colons. Keys and
/// values are trimmed.
pub fn parse_info(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}
