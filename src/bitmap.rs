use bitvec::prelude::*;

/// Per-block row bitmap. A set bit marks a row that is still a candidate match.
///
/// Filters only ever clear bits; a cleared row is never brought back.
#[derive(Debug, Clone)]
pub struct Bitmap {
    bits: BitVec<u64, Lsb0>,
}

impl Bitmap {
    /// Create a bitmap for `rows_count` rows with every row set.
    pub fn new(rows_count: usize) -> Self {
        Bitmap {
            bits: BitVec::repeat(true, rows_count),
        }
    }

    /// Number of rows covered by the bitmap.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Clear every row.
    pub fn reset_bits(&mut self) {
        self.bits.fill(false);
    }

    pub fn is_set_bit(&self, idx: usize) -> bool {
        self.bits.get(idx).map(|b| *b).unwrap_or(false)
    }

    /// Returns true when no row is set.
    pub fn is_zero(&self) -> bool {
        self.bits.not_any()
    }

    pub fn are_all_bits_set(&self) -> bool {
        self.bits.all()
    }

    pub fn ones_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Indices of the rows that are still set.
    pub fn set_indices(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    /// Visit every set row; rows for which `f` returns false are cleared.
    pub fn for_each_set_bit<F>(&mut self, mut f: F)
    where
        F: FnMut(usize) -> bool,
    {
        let len = self.bits.len();
        for (i, word) in self.bits.as_raw_mut_slice().iter_mut().enumerate() {
            let mut w = *word;
            if w == 0 {
                continue;
            }
            let mut cleared = 0u64;
            while w != 0 {
                let j = w.trailing_zeros() as usize;
                let mask = 1u64 << j;
                w &= !mask;
                let idx = i * 64 + j;
                if idx >= len {
                    break;
                }
                if !f(idx) {
                    cleared |= mask;
                }
            }
            *word &= !cleared;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bitmap_all_set() {
        let bm = Bitmap::new(130);
        assert_eq!(bm.len(), 130);
        assert!(bm.are_all_bits_set());
        assert_eq!(bm.ones_count(), 130);
        assert!(!bm.is_zero());
    }

    #[test]
    fn test_reset_bits() {
        let mut bm = Bitmap::new(70);
        bm.reset_bits();
        assert!(bm.is_zero());
        assert_eq!(bm.ones_count(), 0);
    }

    #[test]
    fn test_for_each_set_bit_clears_rejected_rows() {
        let mut bm = Bitmap::new(200);
        bm.for_each_set_bit(|idx| idx % 3 == 0);
        assert_eq!(bm.ones_count(), 67);
        assert!(bm.is_set_bit(0));
        assert!(!bm.is_set_bit(1));
        assert!(bm.is_set_bit(198));
        assert!(!bm.is_set_bit(199));

        // Cleared rows are not visited again.
        let mut visited = 0;
        bm.for_each_set_bit(|idx| {
            assert_eq!(idx % 3, 0);
            visited += 1;
            true
        });
        assert_eq!(visited, 67);
    }

    #[test]
    fn test_for_each_set_bit_empty() {
        let mut bm = Bitmap::new(0);
        assert!(bm.is_empty());
        bm.for_each_set_bit(|_| panic!("no rows to visit"));
        assert!(bm.is_zero());
    }
}
