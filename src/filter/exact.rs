use std::fmt;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::tokenizer::tokenize_strings;
use crate::values::{
    marshal_ipv4, marshal_uint, try_parse_f64, try_parse_ipv4, try_parse_timestamp_iso8601, try_parse_u64,
    ValueType,
};

use super::{
    match_binary_value, match_bloom_filter_all_tokens, match_values_dict, quote_field_name_if_needed,
    quote_token_if_needed, visit_values, TokenHashes,
};

/// `field:exact(value)`: the whole field value equals `value`.
#[derive(Debug)]
pub struct ExactFilter {
    field_name: String,
    value: String,
    tokens: TokenHashes,
}

impl ExactFilter {
    pub fn new(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        ExactFilter {
            field_name: field_name.into(),
            value: value.into(),
            tokens: TokenHashes::default(),
        }
    }

    fn token_hashes(&self) -> &[u64] {
        self.tokens
            .get_or_init(&self.field_name, || tokenize_strings(Vec::new(), &[self.value.as_str()]))
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let value = self.value.as_str();

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if value != v {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                // A missing column holds empty values.
                if !value.is_empty() {
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
                visit_values(bs, ch, bm, |v| v == value.as_bytes());
            }
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| v == value),
            _ => match_binary_exact_value(bs, ch, bm, value, hashes),
        }
    }
}

impl fmt::Display for ExactFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}exact({})",
            quote_field_name_if_needed(&self.field_name),
            quote_token_if_needed(&self.value)
        )
    }
}

/// Keep rows of a fixed-width column whose value equals the literal `value`.
///
/// Literals that cannot be represented by the column type, or that fall
/// outside the block's min/max bounds, clear the bitmap without a scan.
pub(super) fn match_binary_exact_value(
    bs: &dyn BlockSearch,
    ch: &ColumnHeader,
    bm: &mut Bitmap,
    value: &str,
    hashes: &[u64],
) {
    let mut bin_value = Vec::with_capacity(8);
    let ok = match ch.value_type {
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            match try_parse_u64(value) {
                Some(n) if n >= ch.min_value && n <= ch.max_value => {
                    marshal_uint(ch.value_type, n, &mut bin_value);
                    true
                }
                _ => false,
            }
        }
        ValueType::Float64 => match try_parse_f64(value) {
            Some(f) if f >= f64::from_bits(ch.min_value) && f <= f64::from_bits(ch.max_value) => {
                bin_value.extend_from_slice(&f.to_bits().to_be_bytes());
                true
            }
            _ => false,
        },
        ValueType::IPv4 => match try_parse_ipv4(value) {
            Some(n) if (n as u64) >= ch.min_value && (n as u64) <= ch.max_value => {
                bin_value.extend_from_slice(&marshal_ipv4(n));
                true
            }
            _ => false,
        },
        ValueType::TimestampISO8601 => match try_parse_timestamp_iso8601(value) {
            Some(n) if n >= ch.min_value && n <= ch.max_value => {
                bin_value.extend_from_slice(&n.to_be_bytes());
                true
            }
            _ => false,
        },
        ValueType::String | ValueType::Dict => false,
    };
    if !ok {
        bm.reset_bits();
        return;
    }
    match_binary_value(bs, ch, bm, &bin_value, hashes);
}
