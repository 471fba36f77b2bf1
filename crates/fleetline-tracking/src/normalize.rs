//! Lenient payload normalizer.
//!
//! The background native process emits object-literal text that is JSON in
//! spirit but may use single quotes, bare identifier keys, or a trailing
//! comma before a closing bracket. `normalize` rewrites such text into
//! strict JSON. It is a character scanner that tracks string-literal
//! context explicitly, so the contents of double-quoted strings (including
//! apostrophes) pass through untouched.
//!
//! The documented malformations are not known to be exhaustive; anything
//! the scanner cannot repair still comes out as a string and fails strict
//! parsing downstream, where it is logged and dropped.

/// Rewrite loosely formatted object-literal text into strict JSON.
///
/// Total: never panics, always returns a string. Empty input (after
/// trimming) maps to an empty string. Already-strict JSON passes through
/// unchanged apart from the surrounding trim.
#[must_use]
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut out = String::with_capacity(trimmed.len() + 8);
    // Last significant (non-whitespace) input character already consumed;
    // decides whether a bare identifier sits in key position.
    let mut prev_significant: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                i = copy_double_quoted(&chars, i, &mut out);
                prev_significant = Some('"');
            }
            '\'' => {
                i = rewrite_single_quoted(&chars, i, &mut out);
                prev_significant = Some('"');
            }
            ',' => {
                // A comma whose next significant character closes a
                // container is a trailing comma; drop it.
                if !closes_container(&chars, i + 1) {
                    out.push(',');
                }
                prev_significant = Some(',');
                i += 1;
            }
            c if c.is_whitespace() => {
                out.push(c);
                i += 1;
            }
            c if is_ident_char(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let key_position = matches!(prev_significant, Some('{' | ','))
                    && followed_by_colon(&chars, i);
                if key_position {
                    out.push('"');
                    out.extend(&chars[start..i]);
                    out.push('"');
                } else {
                    out.extend(&chars[start..i]);
                }
                prev_significant = Some(c);
            }
            c => {
                out.push(c);
                prev_significant = Some(c);
                i += 1;
            }
        }
    }

    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn closes_container(chars: &[char], mut i: usize) -> bool {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    matches!(chars.get(i), Some('}' | ']'))
}

fn followed_by_colon(chars: &[char], mut i: usize) -> bool {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    chars.get(i) == Some(&':')
}

/// Copy a double-quoted string literal verbatim, escapes included.
/// Returns the index just past the closing quote (or the end of input for
/// an unterminated literal, which stays unparsable downstream).
fn copy_double_quoted(chars: &[char], mut i: usize, out: &mut String) -> usize {
    out.push('"');
    i += 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push('\\');
                out.push(chars[i + 1]);
                i += 2;
            }
            '"' => {
                out.push('"');
                return i + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    i
}

/// Re-emit a single-quoted string literal as a double-quoted one: embedded
/// double quotes gain an escape, escaped single quotes lose theirs.
fn rewrite_single_quoted(chars: &[char], mut i: usize, out: &mut String) -> usize {
    out.push('"');
    i += 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                if chars[i + 1] == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(chars[i + 1]);
                }
                i += 2;
            }
            '\'' => {
                i += 1;
                break;
            }
            '"' => {
                out.push('\\');
                out.push('"');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push('"');
    i
}
