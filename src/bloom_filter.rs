//! Per-column bloom filter over value tokens.
//!
//! The filter is a plain array of 64-bit words. Each token contributes
//! [`BLOOM_FILTER_HASHES_COUNT`] bit positions derived from a hash chain seeded
//! by the token hash. The chain must stay bit-identical between index build and
//! query time: any divergence turns into silent false negatives.

use xxhash_rust::xxh64::xxh64;

use crate::error::{FilterError, Result};

/// Number of bit positions set per indexed item.
pub const BLOOM_FILTER_HASHES_COUNT: usize = 6;

/// Bits budget per indexed item.
pub const BLOOM_FILTER_BITS_PER_ITEM: usize = 16;

/// Bloom filter bits for one column of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
}

impl BloomFilter {
    /// A filter without bits, standing in for a column that has no index.
    pub const fn empty() -> Self {
        BloomFilter { bits: Vec::new() }
    }

    /// Build a filter indexing `tokens`.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut bf = BloomFilter::default();
        bf.init_tokens(tokens);
        bf
    }

    /// Build a filter indexing precomputed item hashes.
    pub fn from_hashes(hashes: &[u64]) -> Self {
        let mut bf = BloomFilter::default();
        bf.init_hashes(hashes);
        bf
    }

    /// Parse a filter from its serialized form.
    pub fn unmarshal(src: &[u8]) -> Result<Self> {
        let mut bf = BloomFilter::default();
        bf.unmarshal_from(src)?;
        Ok(bf)
    }

    pub fn reset(&mut self) {
        self.bits.clear();
    }

    /// Raw 64-bit words of the filter.
    pub fn words(&self) -> &[u64] {
        &self.bits
    }

    /// Returns true when the filter holds no bits; such a filter matches everything.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Append the serialized filter to `dst`: little-endian words, no header.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        dst.reserve(self.bits.len() * 8);
        for word in &self.bits {
            dst.extend_from_slice(&word.to_le_bytes());
        }
    }

    /// Replace the contents of the filter with the words serialized in `src`.
    pub fn unmarshal_from(&mut self, src: &[u8]) -> Result<()> {
        if src.len() % 8 != 0 {
            return Err(FilterError::InvalidBloomFilter { len: src.len() });
        }
        self.reset();
        self.bits.extend(src.chunks_exact(8).map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        }));
        Ok(())
    }

    /// Size the filter for `tokens` and set their bits.
    pub fn init_tokens<S: AsRef<str>>(&mut self, tokens: &[S]) {
        let hashes = append_tokens_hashes(Vec::new(), tokens);
        self.init_bits(tokens.len(), &hashes);
    }

    /// Size the filter for `hashes` and set their bits.
    pub fn init_hashes(&mut self, hashes: &[u64]) {
        let probes = append_hashes_hashes(Vec::new(), hashes);
        self.init_bits(hashes.len(), &probes);
    }

    fn init_bits(&mut self, items_count: usize, probes: &[u64]) {
        let bits_count = items_count * BLOOM_FILTER_BITS_PER_ITEM;
        let words_count = (bits_count + 63) / 64;
        self.bits.clear();
        self.bits.resize(words_count, 0);
        if words_count == 0 {
            return;
        }
        let max_bits = self.bits.len() as u64 * 64;
        for &h in probes {
            let idx = h % max_bits;
            self.bits[(idx / 64) as usize] |= 1 << (idx % 64);
        }
    }

    /// Returns true if every probe position produced by [`append_tokens_hashes`]
    /// is set. An empty filter means the column has no index and matches all.
    pub fn contains_all(&self, hashes: &[u64]) -> bool {
        let bits = &self.bits;
        if bits.is_empty() {
            return true;
        }
        let max_bits = bits.len() as u64 * 64;
        hashes.iter().all(|&h| {
            let idx = h % max_bits;
            bits[(idx / 64) as usize] & (1 << (idx % 64)) != 0
        })
    }
}

/// Append the probe positions for `tokens` to `dst`.
///
/// The result can be passed to [`BloomFilter::contains_all`].
pub fn append_tokens_hashes<S: AsRef<str>>(mut dst: Vec<u64>, tokens: &[S]) -> Vec<u64> {
    dst.reserve(tokens.len() * BLOOM_FILTER_HASHES_COUNT);
    for token in tokens {
        let seed = xxh64(token.as_ref().as_bytes(), 0);
        append_hash_chain(&mut dst, seed);
    }
    dst
}

/// Append the probe positions for precomputed item hashes to `dst`.
pub fn append_hashes_hashes(mut dst: Vec<u64>, hashes: &[u64]) -> Vec<u64> {
    dst.reserve(hashes.len() * BLOOM_FILTER_HASHES_COUNT);
    for &h in hashes {
        append_hash_chain(&mut dst, h);
    }
    dst
}

// Probe i is xxh64 of the little-endian bytes of (seed + i).
#[inline]
fn append_hash_chain(dst: &mut Vec<u64>, seed: u64) {
    let mut counter = seed;
    for _ in 0..BLOOM_FILTER_HASHES_COUNT {
        dst.push(xxh64(&counter.to_le_bytes(), 0));
        counter = counter.wrapping_add(1);
    }
}

/// Append a serialized bloom filter built from `tokens` to `dst`.
pub fn bloom_filter_marshal_tokens<S: AsRef<str>>(dst: &mut Vec<u8>, tokens: &[S]) {
    BloomFilter::from_tokens(tokens).marshal(dst);
}

/// Append a serialized bloom filter built from item hashes to `dst`.
pub fn bloom_filter_marshal_hashes(dst: &mut Vec<u8>, hashes: &[u64]) {
    BloomFilter::from_hashes(hashes).marshal(dst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn probes(tokens: &[&str]) -> Vec<u64> {
        append_tokens_hashes(Vec::new(), tokens)
    }

    #[test]
    fn test_sizing() {
        let bf = BloomFilter::from_tokens(&["a"]);
        assert_eq!(bf.words().len(), 1);
        let tokens: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        assert_eq!(BloomFilter::from_tokens(&tokens).words().len(), 2);
        assert!(BloomFilter::from_tokens::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_contains_all_indexed_tokens() {
        let tokens = ["foo", "bar", "baz", "quick", "brown", "fox"];
        let bf = BloomFilter::from_tokens(&tokens);
        assert!(bf.contains_all(&probes(&tokens)));
        for token in tokens {
            assert!(bf.contains_all(&probes(&[token])));
        }
    }

    #[test]
    fn test_missing_tokens_mostly_rejected() {
        let tokens: Vec<String> = (0..1000).map(|i| format!("token_{}", i)).collect();
        let bf = BloomFilter::from_tokens(&tokens);
        let mut false_positives = 0;
        for i in 0..10_000 {
            let missing = format!("missing_{}", i);
            if bf.contains_all(&probes(&[missing.as_str()])) {
                false_positives += 1;
            }
        }
        // 16 bits and 6 probes per item gives well under 1% false positives.
        assert!(false_positives < 100, "false positives: {}", false_positives);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let bf = BloomFilter::default();
        assert!(bf.contains_all(&probes(&["anything"])));
    }

    #[test]
    fn test_hash_chain_is_stable() {
        let seed = xxh64(b"foo", 0);
        let got = probes(&["foo"]);
        assert_eq!(got.len(), BLOOM_FILTER_HASHES_COUNT);
        assert_eq!(got[0], xxh64(&seed.to_le_bytes(), 0));
        assert_eq!(got[5], xxh64(&seed.wrapping_add(5).to_le_bytes(), 0));
        assert_eq!(append_hashes_hashes(Vec::new(), &[seed]), got);
    }

    #[test]
    fn test_unmarshal_rejects_partial_words() {
        for len in [1usize, 7, 9, 15] {
            let err = BloomFilter::unmarshal(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, FilterError::InvalidBloomFilter { len: l } if l == len));
        }
        assert!(BloomFilter::unmarshal(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_marshal_tokens_helpers() {
        let mut dst = vec![0xff];
        bloom_filter_marshal_tokens(&mut dst, &["a", "b"]);
        assert_eq!(dst.len(), 1 + 8);
        let bf = BloomFilter::unmarshal(&dst[1..]).unwrap();
        assert!(bf.contains_all(&probes(&["a", "b"])));

        let hashes = [1u64, 2, 3, 4, 5];
        let mut dst = Vec::new();
        bloom_filter_marshal_hashes(&mut dst, &hashes);
        let bf = BloomFilter::unmarshal(&dst).unwrap();
        assert!(bf.contains_all(&append_hashes_hashes(Vec::new(), &hashes)));
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(tokens in prop::collection::vec("[a-z0-9_]{1,12}", 1..64)) {
            let bf = BloomFilter::from_tokens(&tokens);
            let hashes = append_tokens_hashes(Vec::new(), &tokens);
            prop_assert!(bf.contains_all(&hashes));

            let mut buf = Vec::new();
            bf.marshal(&mut buf);
            let restored = BloomFilter::unmarshal(&buf).unwrap();
            prop_assert_eq!(&restored, &bf);
            for token in &tokens {
                let h = append_tokens_hashes(Vec::new(), std::slice::from_ref(token));
                prop_assert!(restored.contains_all(&h));
            }
        }

        #[test]
        fn prop_marshal_unmarshal_identity(words in prop::collection::vec(any::<u64>(), 0..32)) {
            let mut bytes = Vec::new();
            for w in &words {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
            let bf = BloomFilter::unmarshal(&bytes).unwrap();
            let mut out = Vec::new();
            bf.marshal(&mut out);
            prop_assert_eq!(out, bytes);
        }
    }
}
