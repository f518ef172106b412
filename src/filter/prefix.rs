use std::fmt;
use std::sync::OnceLock;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::matchers::{match_any_case_prefix, match_prefix};
use crate::tokenizer::tokens_skip_last;
use crate::values::{try_parse_f64, try_parse_u64, ValueType};

use super::{
    match_bloom_filter_all_tokens, match_values_dict, quote_field_name_if_needed, quote_token_if_needed,
    visit_rendered_values, visit_strings, TokenHashes,
};

/// `field:prefix*`: some word of the field value starts with `prefix`.
///
/// An empty prefix matches any non-empty value.
#[derive(Debug)]
pub struct PrefixFilter {
    field_name: String,
    prefix: String,
    tokens: TokenHashes,
}

impl PrefixFilter {
    pub fn new(field_name: impl Into<String>, prefix: impl Into<String>) -> Self {
        PrefixFilter {
            field_name: field_name.into(),
            prefix: prefix.into(),
            tokens: TokenHashes::default(),
        }
    }

    fn token_hashes(&self) -> &[u64] {
        self.tokens.get_or_init(&self.field_name, || tokens_skip_last(&self.prefix))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let prefix = self.prefix.as_str();

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_prefix(v, prefix) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                bm.reset_bits();
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
                visit_strings(bs, ch, bm, |v| match_prefix(v, prefix));
            }
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_prefix(v, prefix)),
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                match_uint_by_prefix(bs, ch, bm, prefix)
            }
            ValueType::Float64 => match_float64_by_prefix(bs, ch, bm, prefix, hashes),
            ValueType::IPv4 | ValueType::TimestampISO8601 => match_rendered_by_prefix(bs, ch, bm, prefix, hashes),
        }
    }
}

impl fmt::Display for PrefixFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = quote_field_name_if_needed(&self.field_name);
        if self.prefix.is_empty() {
            return write!(f, "{}*", field);
        }
        write!(f, "{}{}*", field, quote_token_if_needed(&self.prefix))
    }
}

/// `field:i(prefix*)`: case-insensitive [`PrefixFilter`].
#[derive(Debug)]
pub struct AnyCasePrefixFilter {
    field_name: String,
    prefix: String,
    prefix_lowercase: OnceLock<String>,
    prefix_uppercase: OnceLock<String>,
    tokens: TokenHashes,
    tokens_uppercase: TokenHashes,
}

impl AnyCasePrefixFilter {
    pub fn new(field_name: impl Into<String>, prefix: impl Into<String>) -> Self {
        AnyCasePrefixFilter {
            field_name: field_name.into(),
            prefix: prefix.into(),
            prefix_lowercase: OnceLock::new(),
            prefix_uppercase: OnceLock::new(),
            tokens: TokenHashes::default(),
            tokens_uppercase: TokenHashes::default(),
        }
    }

    fn prefix_lowercase(&self) -> &str {
        self.prefix_lowercase.get_or_init(|| self.prefix.to_lowercase())
    }

    // Timestamps render with an uppercase `T` and `Z`.
    fn prefix_uppercase(&self) -> &str {
        self.prefix_uppercase.get_or_init(|| self.prefix.to_uppercase())
    }

    fn token_hashes(&self) -> &[u64] {
        self.tokens
            .get_or_init(&self.field_name, || tokens_skip_last(self.prefix_lowercase()))
    }

    fn token_hashes_uppercase(&self) -> &[u64] {
        self.tokens_uppercase
            .get_or_init(&self.field_name, || tokens_skip_last(self.prefix_uppercase()))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let prefix_lowercase = self.prefix_lowercase();

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_any_case_prefix(v, prefix_lowercase) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                bm.reset_bits();
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_any_case_prefix(v, prefix_lowercase)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_any_case_prefix(v, prefix_lowercase)),
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                match_uint_by_prefix(bs, ch, bm, prefix_lowercase)
            }
            ValueType::Float64 => match_float64_by_prefix(bs, ch, bm, prefix_lowercase, self.token_hashes()),
            ValueType::IPv4 => match_rendered_by_prefix(bs, ch, bm, prefix_lowercase, self.token_hashes()),
            ValueType::TimestampISO8601 => {
                let prefix_uppercase = self.prefix_uppercase();
                let hashes = self.token_hashes_uppercase();
                match_rendered_by_prefix(bs, ch, bm, prefix_uppercase, hashes)
            }
        }
    }
}

impl fmt::Display for AnyCasePrefixFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = quote_field_name_if_needed(&self.field_name);
        if self.prefix.is_empty() {
            return write!(f, "{}i(*)", field);
        }
        write!(f, "{}i({}*)", field, quote_token_if_needed(&self.prefix))
    }
}

fn match_uint_by_prefix(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, prefix: &str) {
    if prefix.is_empty() {
        // Numbers are never empty.
        return;
    }
    // Every number starting with the prefix digits is at least that large.
    match try_parse_u64(prefix) {
        Some(n) if n <= ch.max_value => {}
        _ => {
            bm.reset_bits();
            return;
        }
    }
    visit_rendered_values(bs, ch, bm, |s| match_prefix(s, prefix));
}

fn match_float64_by_prefix(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, prefix: &str, hashes: &[u64]) {
    if prefix.is_empty() {
        return;
    }
    if try_parse_f64(prefix).is_none()
        && !matches!(prefix, "." | "+" | "-")
        && !prefix.starts_with('e')
        && !prefix.starts_with('E')
    {
        bm.reset_bits();
        return;
    }
    match_rendered_by_prefix(bs, ch, bm, prefix, hashes);
}

fn match_rendered_by_prefix(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, prefix: &str, hashes: &[u64]) {
    if prefix.is_empty() {
        return;
    }
    if !match_bloom_filter_all_tokens(bs, ch, hashes) {
        bm.reset_bits();
        return;
    }
    visit_rendered_values(bs, ch, bm, |s| match_prefix(s, prefix));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::InMemoryBlock;
    use crate::stream::StreamId;
    use crate::values::try_parse_timestamp_iso8601;

    fn apply_prefix(field: &str, prefix: &str, bs: &InMemoryBlock) -> Vec<usize> {
        let mut bm = Bitmap::new(bs.rows_count());
        PrefixFilter::new(field, prefix).apply(bs, &mut bm);
        bm.set_indices()
    }

    fn apply_any_case(field: &str, prefix: &str, bs: &InMemoryBlock) -> Vec<usize> {
        let mut bm = Bitmap::new(bs.rows_count());
        AnyCasePrefixFilter::new(field, prefix).apply(bs, &mut bm);
        bm.set_indices()
    }

    #[test]
    fn test_prefix_string() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 4).with_string_column(
            "msg",
            &["foo bar", "xfoo", "error: foobar", ""],
        );
        assert_eq!(apply_prefix("msg", "foo", &bs), vec![0, 2]);
        assert_eq!(apply_prefix("msg", "error: foo", &bs), vec![2]);
        assert_eq!(apply_prefix("msg", "", &bs), vec![0, 1, 2]);
        assert!(apply_prefix("msg", "missing fo", &bs).is_empty());
    }

    #[test]
    fn test_prefix_missing_and_const() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_const_column("host", "web-01");
        assert_eq!(apply_prefix("host", "web", &bs), vec![0, 1]);
        assert_eq!(apply_prefix("host", "01", &bs), vec![0, 1]);
        assert!(apply_prefix("host", "eb", &bs).is_empty());
        assert!(apply_prefix("missing", "", &bs).is_empty());
    }

    #[test]
    fn test_prefix_uint() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 4).with_uint16_column("status", &[200, 404, 20, 500]);
        assert_eq!(apply_prefix("status", "20", &bs), vec![0, 2]);
        assert_eq!(apply_prefix("status", "", &bs), vec![0, 1, 2, 3]);
        assert!(apply_prefix("status", "600", &bs).is_empty());
        assert!(apply_prefix("status", "x", &bs).is_empty());
    }

    #[test]
    fn test_prefix_float_and_ipv4() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_float64_column("f", &[1.25, 12.5, -1.0]);
        assert_eq!(apply_prefix("f", "1", &bs), vec![0, 1, 2]);
        assert_eq!(apply_prefix("f", "1.2", &bs), vec![0]);
        assert_eq!(apply_prefix("f", "-", &bs), vec![2]);
        assert!(apply_prefix("f", "abc", &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_ipv4_column("ip", &[0x0a00_0001, 0xc0a8_0001]);
        assert_eq!(apply_prefix("ip", "192.168", &bs), vec![1]);
        assert_eq!(apply_prefix("ip", "", &bs), vec![0, 1]);
    }

    #[test]
    fn test_any_case_prefix() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_string_column("msg", &["FooBar", "xfoo", "Some FOO"]);
        assert_eq!(apply_any_case("msg", "fOO", &bs), vec![0, 2]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_dict_column("lvl", &["ERROR", "info"]);
        assert_eq!(apply_any_case("lvl", "Err", &bs), vec![0]);

        let ts = try_parse_timestamp_iso8601("2024-03-05T10:20:30.456Z").unwrap();
        let bs = InMemoryBlock::new("p", StreamId::default(), 1).with_timestamp_column("t", &[ts]);
        assert_eq!(apply_any_case("t", "2024-03-05t10", &bs), vec![0]);
        assert_eq!(apply_any_case("t", "2024-03-05t10:2", &bs), vec![0]);
    }

    #[test]
    fn test_prefix_display() {
        assert_eq!(PrefixFilter::new("f", "").to_string(), "f:*");
        assert_eq!(PrefixFilter::new("_msg", "foo").to_string(), "foo*");
        assert_eq!(AnyCasePrefixFilter::new("", "").to_string(), "i(*)");
        assert_eq!(AnyCasePrefixFilter::new("f", "Ab").to_string(), "f:i(Ab*)");
    }
}
