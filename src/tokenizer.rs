//! Word tokenization shared by bloom filter construction and query-time lookups.
//!
//! The same rule must be used on both sides, otherwise bloom lookups produce
//! false negatives.

use rustc_hash::FxHashSet;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Returns true for runes that belong to a token: Unicode letters, decimal
/// digits and `_`.
///
/// Other numerics (`½`, `²`, `Ⅻ`) and combining marks separate tokens.
#[inline]
pub fn is_token_rune(c: char) -> bool {
    if c.is_ascii() {
        return c == '_' || c.is_ascii_alphanumeric();
    }
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Append the distinct tokens found in `strings` to `dst` in first-seen order.
pub fn tokenize_strings(mut dst: Vec<String>, strings: &[&str]) -> Vec<String> {
    let mut seen: FxHashSet<String> = dst.iter().cloned().collect();
    for s in strings {
        for token in s.split(|c: char| !is_token_rune(c)) {
            if token.is_empty() {
                continue;
            }
            if seen.insert(token.to_string()) {
                dst.push(token.to_string());
            }
        }
    }
    dst
}

/// Tokenize `s` after dropping its trailing run of token runes.
///
/// The trailing word of a prefix may be incomplete, so it cannot be required
/// to be present in the bloom filter.
pub fn tokens_skip_last(s: &str) -> Vec<String> {
    let trimmed = s.trim_end_matches(is_token_rune);
    tokenize_strings(Vec::new(), &[trimmed])
}
