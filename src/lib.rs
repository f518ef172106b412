//! Predicate evaluation over columnar log blocks.
//!
//! A query is a list of [`Filter`]s. Each one narrows a per-block [`Bitmap`]
//! of candidate rows using the block's column headers, values and bloom
//! filters, all exposed through [`BlockSearch`].

mod bitmap;
mod block;
mod bloom_filter;
mod config;
mod error;
pub mod filter;
pub mod matchers;
mod stream;
mod tokenizer;
pub mod values;

pub use bitmap::Bitmap;
pub use block::{BlockSearch, ColumnHeader, InMemoryBlock, ValuesDict, MAX_DICT_VALUES};
pub use bloom_filter::{
    append_hashes_hashes, append_tokens_hashes, bloom_filter_marshal_hashes, bloom_filter_marshal_tokens,
    BloomFilter, BLOOM_FILTER_BITS_PER_ITEM, BLOOM_FILTER_HASHES_COUNT,
};
pub use config::SearchConfig;
pub use error::{FilterError, Result};
pub use filter::{
    AnyCasePhraseFilter, AnyCasePrefixFilter, ExactFilter, Filter, InFilter, Ipv4RangeFilter, LenRangeFilter,
    PhraseFilter, PrefixFilter, RangeFilter, RegexpFilter, StreamIdFilter, StringRangeFilter,
};
pub use stream::{StreamFilter, StreamId, StreamIndex, StreamTagFilter, StreamTagOp, TenantId};
pub use tokenizer::{is_token_rune, tokenize_strings, tokens_skip_last};
pub use values::ValueType;

/// Apply every filter in order, stopping once no row is left.
pub fn apply_filters(filters: &[Filter], bs: &dyn BlockSearch, bm: &mut Bitmap) {
    for f in filters {
        if bm.is_zero() {
            return;
        }
        f.apply(bs, bm);
    }
}
