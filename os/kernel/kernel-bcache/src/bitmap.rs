//! Occupancy set for cache slots.

use alloc::vec;
use alloc::vec::Vec;

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-size bitmap; a set bit marks an occupied slot.
///
/// # Invariants
/// - Bits at positions `>= len` in the last word are always zero.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlotBitmap {
    words: Vec<u64>,
    len: usize,
}

impl SlotBitmap {
    /// A bitmap of `len` clear bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    const fn locate(index: usize) -> (usize, u64) {
        (index / WORD_BITS, 1 << (index % WORD_BITS))
    }

    /// Whether slot `index` is occupied.
    #[inline]
    #[must_use]
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "slot index out of range");
        let (w, mask) = Self::locate(index);
        self.words[w] & mask != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len, "slot index out of range");
        let (w, mask) = Self::locate(index);
        self.words[w] |= mask;
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len, "slot index out of range");
        let (w, mask) = Self::locate(index);
        self.words[w] &= !mask;
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of free slots.
    #[must_use]
    pub fn count_free(&self) -> usize {
        self.len - self.count_set()
    }

    /// Lowest free slot index, if any.
    #[must_use]
    pub fn first_free(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, w)| **w != u64::MAX)
            .map(|(i, w)| i * WORD_BITS + w.trailing_ones() as usize)
            .filter(|&index| index < self.len)
    }

    /// Indices of all occupied slots, ascending.
    #[must_use = "iterators are lazy"]
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.test(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bitmap_is_all_free() {
        let b = SlotBitmap::new(70);
        assert_eq!(b.len(), 70);
        assert_eq!(b.count_free(), 70);
        assert_eq!(b.first_free(), Some(0));
    }

    #[test]
    fn first_free_skips_full_words() {
        let mut b = SlotBitmap::new(130);
        for i in 0..100 {
            b.set(i);
        }
        assert_eq!(b.first_free(), Some(100));
        b.clear(3);
        assert_eq!(b.first_free(), Some(3));
        assert_eq!(b.count_set(), 99);
    }

    #[test]
    fn full_bitmap_has_no_free_slot() {
        // 64 exercises the exact word boundary, 5 the padded tail.
        for len in [5, 64] {
            let mut b = SlotBitmap::new(len);
            (0..len).for_each(|i| b.set(i));
            assert_eq!(b.first_free(), None, "len {len}");
            assert_eq!(b.count_free(), 0);
        }
    }

    #[test]
    fn iter_set_lists_occupied_slots() {
        let mut b = SlotBitmap::new(10);
        b.set(1);
        b.set(7);
        assert_eq!(b.iter_set().collect::<Vec<_>>(), [1, 7]);
    }
}
