use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashSet;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::bloom_filter::append_tokens_hashes;
use crate::config::SearchConfig;
use crate::tokenizer::tokenize_strings;
use crate::values::{
    marshal_ipv4, marshal_uint, try_parse_f64, try_parse_ipv4, try_parse_timestamp_iso8601, try_parse_u64,
    ValueType,
};

use super::{
    match_bloom_filter_any_token_set, match_values_dict, quote_field_name_if_needed, quote_token_if_needed,
    visit_values,
};

type ValueSet = FxHashSet<Vec<u8>>;

/// Number of per-type binary sets: one for each fixed-width value type.
const BIN_SETS_COUNT: usize = 7;

/// `field:in(v1, ..., vN)`: the field value equals one of the given values.
#[derive(Debug)]
pub struct InFilter {
    field_name: String,
    values: Vec<String>,
    config: SearchConfig,

    token_sets: OnceLock<Vec<Vec<u64>>>,
    string_values: OnceLock<ValueSet>,
    bin_values: [OnceLock<ValueSet>; BIN_SETS_COUNT],
}

impl InFilter {
    pub fn new(field_name: impl Into<String>, values: Vec<String>) -> Self {
        InFilter::with_config(field_name, values, SearchConfig::default())
    }

    pub fn with_config(field_name: impl Into<String>, values: Vec<String>, config: SearchConfig) -> Self {
        InFilter {
            field_name: field_name.into(),
            values,
            config,
            token_sets: OnceLock::new(),
            string_values: OnceLock::new(),
            bin_values: Default::default(),
        }
    }

    /// Bloom hashes of every value's tokens.
    ///
    /// Building stops once there are more sets than the bloom pre-check is
    /// willing to check; such a list makes the pre-check pass unconditionally.
    fn token_sets(&self) -> &[Vec<u64>] {
        self.token_sets.get_or_init(|| {
            let max = self.config.max_token_sets;
            let mut token_sets = Vec::with_capacity(self.values.len().min(max + 1));
            for v in &self.values {
                let tokens = tokenize_strings(Vec::new(), &[v.as_str()]);
                token_sets.push(append_tokens_hashes(Vec::new(), &tokens));
                if token_sets.len() > max {
                    break;
                }
            }
            tracing::debug!(field = %self.field_name, token_sets = token_sets.len(), "initialized in() token sets");
            token_sets
        })
    }

    fn string_values(&self) -> &ValueSet {
        self.string_values
            .get_or_init(|| self.values.iter().map(|v| v.as_bytes().to_vec()).collect())
    }

    /// Values that parse as literals of `vt`, in its binary encoding.
    fn bin_values(&self, vt: ValueType) -> &ValueSet {
        let idx = usize::from(vt.tag() - ValueType::Uint8.tag());
        self.bin_values[idx].get_or_init(|| {
            let mut set = ValueSet::default();
            for v in &self.values {
                let mut buf = Vec::with_capacity(8);
                let ok = match vt {
                    ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                        match try_parse_u64(v) {
                            Some(n) if n <= vt.uint_max() => {
                                marshal_uint(vt, n, &mut buf);
                                true
                            }
                            _ => false,
                        }
                    }
                    ValueType::Float64 => try_parse_f64(v)
                        .map(|f| buf.extend_from_slice(&f.to_bits().to_be_bytes()))
                        .is_some(),
                    ValueType::IPv4 => try_parse_ipv4(v)
                        .map(|n| buf.extend_from_slice(&marshal_ipv4(n)))
                        .is_some(),
                    ValueType::TimestampISO8601 => try_parse_timestamp_iso8601(v)
                        .map(|n| buf.extend_from_slice(&n.to_be_bytes()))
                        .is_some(),
                    ValueType::String | ValueType::Dict => false,
                };
                if ok {
                    set.insert(buf);
                }
            }
            tracing::debug!(field = %self.field_name, value_type = vt.name(), values = set.len(), "initialized in() binary values");
            set
        })
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        if self.values.is_empty() {
            bm.reset_bits();
            return;
        }

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !self.string_values().contains(v.as_bytes()) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !self.string_values().contains("".as_bytes()) {
                    bm.reset_bits();
                }
                return;
            }
        };

        match ch.value_type {
            ValueType::String => self.match_any_value(bs, ch, bm, self.string_values()),
            ValueType::Dict => {
                let values = self.string_values();
                match_values_dict(bs, ch, bm, |v| values.contains(v.as_bytes()));
            }
            vt => self.match_any_value(bs, ch, bm, self.bin_values(vt)),
        }
    }

    fn match_any_value(&self, bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, values: &ValueSet) {
        if values.is_empty() {
            bm.reset_bits();
            return;
        }
        if !match_bloom_filter_any_token_set(bs, ch, self.token_sets(), &self.config) {
            bm.reset_bits();
            return;
        }
        visit_values(bs, ch, bm, |v| values.contains(v));
    }
}

impl fmt::Display for InFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(|v| quote_token_if_needed(v)).collect();
        write!(f, "{}in({})", quote_field_name_if_needed(&self.field_name), values.join(","))
    }
}
