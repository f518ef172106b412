//! Primitive value matchers shared by all filters.
//!
//! Phrase and prefix matching are token-boundary aware: when the pattern
//! starts (or ends) with a token rune, the match must not start (or end) in
//! the middle of a word.

use crate::tokenizer::is_token_rune;
use crate::values::{try_parse_f64, try_parse_ipv4};

/// Returns true if `s` contains `prefix` starting at a word boundary.
///
/// An empty prefix matches any non-empty string.
pub fn match_prefix(s: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return !s.is_empty();
    }
    if prefix.len() > s.len() {
        return false;
    }
    let starts_with_token = prefix.chars().next().map_or(false, is_token_rune);
    let mut offset = 0;
    while let Some(n) = s[offset..].find(prefix) {
        offset += n;
        if starts_with_token && is_token_before(s, offset) {
            offset = next_char_boundary(s, offset);
            continue;
        }
        return true;
    }
    false
}

/// Returns true if `s` contains `phrase` with word boundaries on both ends.
///
/// An empty phrase matches only an empty string.
pub fn match_phrase(s: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return s.is_empty();
    }
    phrase_pos(s, phrase).is_some()
}

/// Byte offset of the first boundary-respecting occurrence of `phrase` in `s`.
pub fn phrase_pos(s: &str, phrase: &str) -> Option<usize> {
    if phrase.is_empty() {
        return Some(0);
    }
    if phrase.len() > s.len() {
        return None;
    }
    let starts_with_token = phrase.chars().next().map_or(false, is_token_rune);
    let ends_with_token = phrase.chars().next_back().map_or(false, is_token_rune);
    let mut pos = 0;
    while let Some(n) = s[pos..].find(phrase) {
        pos += n;
        let end = pos + phrase.len();
        if (starts_with_token && is_token_before(s, pos)) || (ends_with_token && is_token_after(s, end)) {
            pos = next_char_boundary(s, pos);
            continue;
        }
        return Some(pos);
    }
    None
}

#[inline]
fn is_token_before(s: &str, pos: usize) -> bool {
    s[..pos].chars().next_back().map_or(false, is_token_rune)
}

#[inline]
fn is_token_after(s: &str, pos: usize) -> bool {
    s[pos..].chars().next().map_or(false, is_token_rune)
}

#[inline]
fn next_char_boundary(s: &str, pos: usize) -> usize {
    let mut next = pos + 1;
    while next < s.len() && !s.is_char_boundary(next) {
        next += 1;
    }
    next
}

/// Case-insensitive [`match_prefix`]; `prefix_lowercase` must already be lowercase.
pub fn match_any_case_prefix(s: &str, prefix_lowercase: &str) -> bool {
    if prefix_lowercase.is_empty() {
        return !s.is_empty();
    }
    if prefix_lowercase.len() > s.len() {
        return false;
    }
    if is_ascii_lowercase(s) {
        return match_prefix(s, prefix_lowercase);
    }
    match_prefix(&s.to_lowercase(), prefix_lowercase)
}

/// Case-insensitive [`match_phrase`]; `phrase_lowercase` must already be lowercase.
pub fn match_any_case_phrase(s: &str, phrase_lowercase: &str) -> bool {
    if phrase_lowercase.is_empty() {
        return s.is_empty();
    }
    if phrase_lowercase.len() > s.len() {
        return false;
    }
    if is_ascii_lowercase(s) {
        return match_phrase(s, phrase_lowercase);
    }
    match_phrase(&s.to_lowercase(), phrase_lowercase)
}

/// Returns true when `s` is pure ASCII without uppercase letters.
pub fn is_ascii_lowercase(s: &str) -> bool {
    s.bytes().all(|c| c.is_ascii() && !c.is_ascii_uppercase())
}

/// Half-open lexicographic range `[min_value, max_value)`.
#[inline]
pub fn match_string_range(s: &str, min_value: &str, max_value: &str) -> bool {
    s >= min_value && s < max_value
}

/// Closed range on the length of `s` counted in code points.
#[inline]
pub fn match_len_range(s: &str, min_len: u64, max_len: u64) -> bool {
    let n = s.chars().count() as u64;
    n >= min_len && n <= max_len
}

/// Closed numeric range; values that are not numbers never match.
pub fn match_range(s: &str, min_value: f64, max_value: f64) -> bool {
    match try_parse_f64(s) {
        Some(f) => f >= min_value && f <= max_value,
        None => false,
    }
}

/// Closed range over IPv4 addresses; values that are not addresses never match.
pub fn match_ipv4_range(s: &str, min_value: u32, max_value: u32) -> bool {
    match try_parse_ipv4(s) {
        Some(n) => n >= min_value && n <= max_value,
        None => false,
    }
}

/// Convert a closed float range into the matching closed unsigned range.
pub(crate) fn to_u64_range(min_value: f64, max_value: f64) -> (u64, u64) {
    (to_u64_clamp(min_value.ceil()), to_u64_clamp(max_value.floor()))
}

fn to_u64_clamp(f: f64) -> u64 {
    if f < 0.0 {
        return 0;
    }
    if f > u64::MAX as f64 {
        return u64::MAX;
    }
    f as u64
}
