//! Query predicates evaluated against one block at a time.
//!
//! Every filter narrows a block [`Bitmap`] by clearing the rows it rejects.
//! Filters are built once per query and shared read-only by all the workers
//! scanning blocks for it; derived caches are computed once on first use.

use std::fmt;
use std::fmt::Write as _;
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::bloom_filter::append_tokens_hashes;
use crate::config::SearchConfig;
use crate::error::fatal;
use crate::tokenizer::is_token_rune;
use crate::values::{append_binary_value_string, must_fixed_width};

mod exact;
mod in_set;
mod phrase;
mod prefix;
mod range;
mod regexp;
mod stream;

pub use exact::ExactFilter;
pub use in_set::InFilter;
pub use phrase::{AnyCasePhraseFilter, PhraseFilter};
pub use prefix::{AnyCasePrefixFilter, PrefixFilter};
pub use range::{Ipv4RangeFilter, LenRangeFilter, RangeFilter, StringRangeFilter};
pub use regexp::RegexpFilter;
pub use stream::StreamIdFilter;

/// A single predicate of a parsed query.
#[derive(Debug)]
pub enum Filter {
    Stream(StreamIdFilter),
    Exact(ExactFilter),
    In(InFilter),
    Prefix(PrefixFilter),
    AnyCasePrefix(AnyCasePrefixFilter),
    Phrase(PhraseFilter),
    AnyCasePhrase(AnyCasePhraseFilter),
    Regexp(RegexpFilter),
    Range(RangeFilter),
    StringRange(StringRangeFilter),
    LenRange(LenRangeFilter),
    Ipv4Range(Ipv4RangeFilter),
}

impl Filter {
    /// Clear the bits of `bm` for the rows of `bs` that do not match.
    ///
    /// Bits that are already cleared stay cleared.
    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        match self {
            Filter::Stream(f) => f.apply(bs, bm),
            Filter::Exact(f) => f.apply(bs, bm),
            Filter::In(f) => f.apply(bs, bm),
            Filter::Prefix(f) => f.apply(bs, bm),
            Filter::AnyCasePrefix(f) => f.apply(bs, bm),
            Filter::Phrase(f) => f.apply(bs, bm),
            Filter::AnyCasePhrase(f) => f.apply(bs, bm),
            Filter::Regexp(f) => f.apply(bs, bm),
            Filter::Range(f) => f.apply(bs, bm),
            Filter::StringRange(f) => f.apply(bs, bm),
            Filter::LenRange(f) => f.apply(bs, bm),
            Filter::Ipv4Range(f) => f.apply(bs, bm),
        }
    }

    /// Evaluate the filter over a whole block, starting from all rows set.
    pub fn matching_rows(&self, bs: &dyn BlockSearch) -> Bitmap {
        let mut bm = Bitmap::new(bs.rows_count());
        self.apply(bs, &mut bm);
        bm
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Stream(x) => x.fmt(f),
            Filter::Exact(x) => x.fmt(f),
            Filter::In(x) => x.fmt(f),
            Filter::Prefix(x) => x.fmt(f),
            Filter::AnyCasePrefix(x) => x.fmt(f),
            Filter::Phrase(x) => x.fmt(f),
            Filter::AnyCasePhrase(x) => x.fmt(f),
            Filter::Regexp(x) => x.fmt(f),
            Filter::Range(x) => x.fmt(f),
            Filter::StringRange(x) => x.fmt(f),
            Filter::LenRange(x) => x.fmt(f),
            Filter::Ipv4Range(x) => x.fmt(f),
        }
    }
}

macro_rules! impl_from_filter {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Filter {
                fn from(f: $ty) -> Self {
                    Filter::$variant(f)
                }
            }
        )*
    };
}

impl_from_filter! {
    Stream => StreamIdFilter,
    Exact => ExactFilter,
    In => InFilter,
    Prefix => PrefixFilter,
    AnyCasePrefix => AnyCasePrefixFilter,
    Phrase => PhraseFilter,
    AnyCasePhrase => AnyCasePhraseFilter,
    Regexp => RegexpFilter,
    Range => RangeFilter,
    StringRange => StringRangeFilter,
    LenRange => LenRangeFilter,
    Ipv4Range => Ipv4RangeFilter,
}

/// Bloom probe positions for a set of tokens, computed once per filter.
#[derive(Debug, Default)]
pub(crate) struct TokenHashes {
    cell: OnceLock<Vec<u64>>,
}

impl TokenHashes {
    pub(crate) fn get_or_init<F>(&self, field_name: &str, tokenize: F) -> &[u64]
    where
        F: FnOnce() -> Vec<String>,
    {
        self.cell.get_or_init(|| {
            let tokens = tokenize();
            tracing::debug!(field = field_name, tokens = tokens.len(), "initialized filter tokens");
            append_tokens_hashes(Vec::new(), &tokens)
        })
    }
}

/// Returns false only if the column's bloom filter proves that some token is absent.
pub(crate) fn match_bloom_filter_all_tokens(bs: &dyn BlockSearch, ch: &ColumnHeader, hashes: &[u64]) -> bool {
    if hashes.is_empty() {
        return true;
    }
    let ok = bs.bloom_filter(ch).contains_all(hashes);
    if !ok {
        tracing::trace!(part_path = bs.part_path(), column = %ch.name, "bloom filter excludes block");
    }
    ok
}

/// Returns false only if the bloom filter proves that no token set is fully present.
pub(crate) fn match_bloom_filter_any_token_set(
    bs: &dyn BlockSearch,
    ch: &ColumnHeader,
    token_sets: &[Vec<u64>],
    config: &SearchConfig,
) -> bool {
    if token_sets.is_empty() {
        return false;
    }
    let rows_count = bs.rows_count() as u64;
    if token_sets.len() > config.max_token_sets
        || token_sets.len() as u64 > config.token_sets_per_row.saturating_mul(rows_count)
    {
        // Checking every row is cheaper than probing this many token sets.
        return true;
    }
    let bf = bs.bloom_filter(ch);
    token_sets.iter().any(|hashes| bf.contains_all(hashes))
}

/// Call `f` for every still-set row, clearing the rows it rejects.
pub(crate) fn visit_values<F>(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, mut f: F)
where
    F: FnMut(&[u8]) -> bool,
{
    if bm.is_zero() {
        return;
    }
    let values = bs.column_values(ch);
    if values.len() != bm.len() {
        fatal(
            bs.part_path(),
            format_args!(
                "unexpected number of values for column {}: got {}; want {}",
                ch.name,
                values.len(),
                bm.len()
            ),
        );
    }
    bm.for_each_set_bit(|idx| f(values[idx].as_slice()));
}

/// [`visit_values`] over the text values of a string column.
///
/// Values that are not valid UTF-8 never match.
pub(crate) fn visit_strings<F>(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, mut f: F)
where
    F: FnMut(&str) -> bool,
{
    visit_values(bs, ch, bm, |v| std::str::from_utf8(v).map_or(false, &mut f));
}

/// [`visit_values`] over the canonical string form of a fixed-width column.
pub(crate) fn visit_rendered_values<F>(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, mut f: F)
where
    F: FnMut(&str) -> bool,
{
    let vt = ch.value_type;
    let part_path = bs.part_path();
    let mut buf = String::new();
    visit_values(bs, ch, bm, |v| {
        let v = must_fixed_width(part_path, vt, v);
        buf.clear();
        append_binary_value_string(&mut buf, vt, v);
        f(&buf)
    });
}

/// Keep rows whose binary value equals `bin_value`.
pub(crate) fn match_binary_value(
    bs: &dyn BlockSearch,
    ch: &ColumnHeader,
    bm: &mut Bitmap,
    bin_value: &[u8],
    hashes: &[u64],
) {
    if !match_bloom_filter_all_tokens(bs, ch, hashes) {
        bm.reset_bits();
        return;
    }
    visit_values(bs, ch, bm, |v| v == bin_value);
}

/// Reduce a dict column to the dictionary entries accepted by `pred`, then
/// scan the one-byte row indexes.
pub(crate) fn match_values_dict<F>(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, pred: F)
where
    F: Fn(&str) -> bool,
{
    let encoded: SmallVec<[u8; 64]> = ch
        .values_dict
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| pred(v.as_str()))
        .map(|(i, _)| i as u8)
        .collect();
    match_encoded_values_dict(bs, ch, bm, &encoded);
}

fn match_encoded_values_dict(bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap, encoded: &[u8]) {
    if encoded.is_empty() {
        bm.reset_bits();
        return;
    }
    let part_path = bs.part_path();
    visit_values(bs, ch, bm, |v| {
        if v.len() != 1 {
            fatal(part_path, format_args!("unexpected length for dict value: got {}; want 1", v.len()));
        }
        encoded.contains(&v[0])
    });
}

const RESERVED_WORDS: &[&str] = &[
    "and",
    "or",
    "not",
    "exact",
    "i",
    "in",
    "ipv4_range",
    "len_range",
    "range",
    "re",
    "string_range",
    "_stream",
    "_time",
];

/// Render `s` as a query token, quoting it when it would not parse back as one.
pub fn quote_token_if_needed(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }
    if !s.chars().all(is_token_rune) || RESERVED_WORDS.contains(&s.to_lowercase().as_str()) {
        return quote_string(s);
    }
    s.to_string()
}

/// Double-quote `s`, escaping quotes, backslashes and control characters.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x80 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Field prefix of a rendered filter; the message field has none.
pub(crate) fn quote_field_name_if_needed(field_name: &str) -> String {
    if is_msg_field_name(field_name) {
        return String::new();
    }
    quote_token_if_needed(field_name) + ":"
}

pub(crate) fn is_msg_field_name(field_name: &str) -> bool {
    field_name.is_empty() || field_name == "_msg"
}
