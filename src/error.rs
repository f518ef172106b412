use std::fmt;

use thiserror::Error;

/// Errors surfaced by filter construction and index loading.
///
/// Matching itself never returns errors: literals that cannot be parsed for a
/// column simply match nothing.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Serialized bloom filter whose length is not a whole number of words.
    #[error("cannot unmarshal bloom filter from {len} bytes; length must be a multiple of 8")]
    InvalidBloomFilter { len: usize },
    /// Stored value-type tag that no known reader produces.
    #[error("unknown value type tag {0}")]
    UnknownValueType(u8),
    #[error("cannot compile regexp: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("invalid search config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Report on-disk corruption and abort the evaluation.
#[cold]
#[inline(never)]
pub(crate) fn fatal(part_path: &str, msg: fmt::Arguments<'_>) -> ! {
    tracing::error!(part_path, "{}", msg);
    panic!("FATAL: {}: {}", part_path, msg);
}
