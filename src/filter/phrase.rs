use std::fmt;
use std::sync::OnceLock;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::matchers::{match_any_case_phrase, match_phrase};
use crate::tokenizer::tokenize_strings;
use crate::values::{try_parse_f64, try_parse_ipv4, try_parse_timestamp_iso8601, ValueType};

use super::exact::match_binary_exact_value;
use super::{
    match_bloom_filter_all_tokens, match_values_dict, quote_field_name_if_needed, quote_token_if_needed,
    visit_rendered_values, visit_strings, TokenHashes,
};

/// `field:phrase`: the field value contains `phrase` on word boundaries.
///
/// An empty phrase matches only empty values.
#[derive(Debug)]
pub struct PhraseFilter {
    field_name: String,
    phrase: String,
    tokens: TokenHashes,
}

impl PhraseFilter {
    pub fn new(field_name: impl Into<String>, phrase: impl Into<String>) -> Self {
        PhraseFilter {
            field_name: field_name.into(),
            phrase: phrase.into(),
            tokens: TokenHashes::default(),
        }
    }

    fn token_hashes(&self) -> &[u64] {
        self.tokens
            .get_or_init(&self.field_name, || tokenize_strings(Vec::new(), &[self.phrase.as_str()]))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let phrase = self.phrase.as_str();

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_phrase(v, phrase) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !phrase.is_empty() {
                    bm.reset_bits();
                }
                return;
            }
        };

        let hashes = self.token_hashes();
        match ch.value_type {
            ValueType::String => {
                if !match_bloom_filter_all_tokens(bs, ch, hashes) {
                    bm.reset_bits();
                    return;
                }
                visit_strings(bs, ch, bm, |v| match_phrase(v, phrase));
            }
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_phrase(v, phrase)),
            _ => match_binary_by_phrase(bs, ch, bm, phrase, hashes),
        }
    }
}

impl fmt::Display for PhraseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            quote_field_name_if_needed(&self.field_name),
            quote_token_if_needed(&self.phrase)
        )
    }
}

/// `field:i(phrase)`: case-insensitive [`PhraseFilter`].
#[derive(Debug)]
pub struct AnyCasePhraseFilter {
    field_name: String,
    phrase: String,
    phrase_lowercase: OnceLock<String>,
    phrase_uppercase: OnceLock<String>,
    tokens: TokenHashes,
    tokens_uppercase: TokenHashes,
}

impl AnyCasePhraseFilter {
    pub fn new(field_name: impl Into<String>, phrase: impl Into<String>) -> Self {
        AnyCasePhraseFilter {
            field_name: field_name.into(),
            phrase: phrase.into(),
            phrase_lowercase: OnceLock::new(),
            phrase_uppercase: OnceLock::new(),
            tokens: TokenHashes::default(),
            tokens_uppercase: TokenHashes::default(),
        }
    }

    fn phrase_lowercase(&self) -> &str {
        self.phrase_lowercase.get_or_init(|| self.phrase.to_lowercase())
    }

    fn phrase_uppercase(&self) -> &str {
        self.phrase_uppercase.get_or_init(|| self.phrase.to_uppercase())
    }

    fn token_hashes(&self) -> &[u64] {
        self.tokens
            .get_or_init(&self.field_name, || tokenize_strings(Vec::new(), &[self.phrase_lowercase()]))
    }

    fn token_hashes_uppercase(&self) -> &[u64] {
        self.tokens_uppercase
            .get_or_init(&self.field_name, || tokenize_strings(Vec::new(), &[self.phrase_uppercase()]))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let phrase_lowercase = self.phrase_lowercase();

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_any_case_phrase(v, phrase_lowercase) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !phrase_lowercase.is_empty() {
                    bm.reset_bits();
                }
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_any_case_phrase(v, phrase_lowercase)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_any_case_phrase(v, phrase_lowercase)),
            ValueType::TimestampISO8601 => {
                let phrase_uppercase = self.phrase_uppercase();
                let hashes = self.token_hashes_uppercase();
                match_binary_by_phrase(bs, ch, bm, phrase_uppercase, hashes)
            }
            _ => match_binary_by_phrase(bs, ch, bm, phrase_lowercase, self.token_hashes()),
        }
    }
}

impl fmt::Display for AnyCasePhraseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}i({})",
            quote_field_name_if_needed(&self.field_name),
            quote_token_if_needed(&self.phrase)
        )
    }
}

/// Phrase search over a fixed-width column.
///
/// Phrases that are complete literals of the column type turn into exact
/// value lookups; partial ones are matched against the rendered values.
fn match_binary_by_phrase(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, phrase: &str, hashes: &[u64]) {
    match ch.value_type {
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            match_binary_exact_value(bs, ch, bm, phrase, hashes)
        }
        ValueType::Float64 => {
            if try_parse_f64(phrase).is_none() && !matches!(phrase, "." | "+" | "-") {
                bm.reset_bits();
                return;
            }
            // A dot with digits on both sides can only match a whole number.
            if let Some(n) = phrase.find('.') {
                if n > 0 && n < phrase.len() - 1 {
                    match_binary_exact_value(bs, ch, bm, phrase, hashes);
                    return;
                }
            }
            match_rendered_by_phrase(bs, ch, bm, phrase, hashes);
        }
        ValueType::IPv4 => {
            if try_parse_ipv4(phrase).is_some() {
                match_binary_exact_value(bs, ch, bm, phrase, hashes);
                return;
            }
            match_rendered_by_phrase(bs, ch, bm, phrase, hashes);
        }
        ValueType::TimestampISO8601 => {
            if try_parse_timestamp_iso8601(phrase).is_some() {
                match_binary_exact_value(bs, ch, bm, phrase, hashes);
                return;
            }
            match_rendered_by_phrase(bs, ch, bm, phrase, hashes);
        }
        ValueType::String | ValueType::Dict => bm.reset_bits(),
    }
}

fn match_rendered_by_phrase(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, phrase: &str, hashes: &[u64]) {
    if !match_bloom_filter_all_tokens(bs, ch, hashes) {
        bm.reset_bits();
        return;
    }
    visit_rendered_values(bs, ch, bm, |s| match_phrase(s, phrase));
}
