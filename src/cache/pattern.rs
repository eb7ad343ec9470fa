//! Glob Pattern Matching
//!
//! Redis-style `KEYS` patterns for the in-memory backend: `*`, `?`,
//! `[abc]`, `[^abc]`, `[a-z]` and `\` escapes. Patterns are translated to
//! an anchored [`Regex`] once and then matched against every key.

use regex::Regex;

/// Compiles a glob `pattern` into an anchored regex.
///
/// An unterminated `[` and a trailing `\` are taken literally, as Redis does.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut out, chars[i]);
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push('$');
    Regex::new(&out)
}

/// Returns true if `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    match glob_to_regex(pattern) {
        Ok(regex) => regex.is_match(key),
        Err(_) => pattern == key,
    }
}

fn push_literal(out: &mut String, c: char) {
    out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
}

/// Index of the `]` closing the class opened at `chars[start]`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if i < chars.len() && chars[i] == '^' {
        i += 1;
    }
    while i < chars.len() && chars[i] != ']' {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 2;
        } else {
            i += 1;
        }
    }
    (i < chars.len()).then_some(i)
}

/// Emits the class whose members are `body` (between the brackets).
fn push_class(out: &mut String, body: &[char]) {
    let (negate, body) = match body.split_first() {
        Some(('^', rest)) => (true, rest),
        _ => (false, body),
    };

    if body.is_empty() {
        // `[]` never matches, `[^]` matches any single character
        out.push_str(if negate { "." } else { r"[^\x00-\x{10FFFF}]" });
        return;
    }

    out.push('[');
    if negate {
        out.push('^');
    }
    let mut i = 0;
    while i < body.len() {
        if body[i] == '\\' && i + 1 < body.len() {
            push_literal(out, body[i + 1]);
            i += 2;
        } else if i + 2 < body.len() && body[i + 1] == '-' {
            let (lo, hi) = if body[i] <= body[i + 2] {
                (body[i], body[i + 2])
            } else {
                (body[i + 2], body[i])
            };
            push_literal(out, lo);
            out.push('-');
            push_literal(out, hi);
            i += 3;
        } else {
            push_literal(out, body[i]);
            i += 1;
        }
    }
    out.push(']');
}
