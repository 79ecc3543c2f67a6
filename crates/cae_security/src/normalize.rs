//! The single text-normalization entry point (§3.2). Every alias match,
//! fingerprint, hint condition comparison, and history dedupe check
//! goes through this function; no other module strips accents or
//! lower-cases text itself.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Unicode NFKD -> strip combining marks -> lower-case -> collapse
/// whitespace -> trim.
pub fn normalize(input: &str) -> String {
    let decomposed: String = input.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = decomposed.to_lowercase();
    collapse_whitespace(&lowered)
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}
