//! Fixed-size bit vector backed by `u32` blocks, as used by the Huffman
//! coder to track which of the 256 byte values are still live candidates.

const BITS_PER_BLOCK: usize = u32::BITS as usize;

/// A bit vector of `num_bits` bits, stored `u32`-block little-endian by
/// index (bit 0 lives in block 0).
#[derive(Debug, Clone)]
pub struct Bitmap {
    blocks: Vec<u32>,
    num_bits: usize,
}

impl Bitmap {
    #[must_use]
    pub fn new(num_bits: usize) -> Self {
        let num_blocks = num_bits.div_ceil(BITS_PER_BLOCK);
        Bitmap { blocks: vec![0u32; num_blocks], num_bits }
    }

    #[must_use]
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }

    fn locate(&self, bit_position: usize) -> (usize, u32) {
        let block_pos = bit_position / BITS_PER_BLOCK;
        let block_bit = bit_position % BITS_PER_BLOCK;
        (block_pos, 1u32 << block_bit)
    }

    pub fn set(&mut self, bit_position: usize, on: bool) {
        let (block_pos, mask) = self.locate(bit_position);
        if on {
            self.blocks[block_pos] |= mask;
        } else {
            self.blocks[block_pos] &= !mask;
        }
    }

    #[must_use]
    pub fn get(&self, bit_position: usize) -> bool {
        let (block_pos, mask) = self.locate(bit_position);
        self.blocks[block_pos] & mask != 0
    }

    /// Shift every bit one position towards the most-significant end: bit
    /// `i` takes the old value of bit `i - 1`, and bit `0` becomes `false`.
    /// Mirrors the reference implementation's top-down in-place rewrite.
    pub fn lshift(&mut self) {
        for i in (0..self.num_bits).rev() {
            let f = if i > 0 { self.get(i - 1) } else { false };
            self.set(i, f);
        }
    }

    /// Export the backing blocks in reverse order (highest-index block
    /// first), the layout the Huffman table serializer expects on disk.
    #[must_use]
    pub fn blocks_reversed(&self) -> Vec<u32> {
        self.blocks.iter().rev().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut bm = Bitmap::new(40);
        bm.set(0, true);
        bm.set(33, true);
        assert!(bm.get(0));
        assert!(bm.get(33));
        assert!(!bm.get(1));
    }

    #[test]
    fn lshift_moves_bits_up() {
        let mut bm = Bitmap::new(8);
        bm.set(2, true);
        bm.lshift();
        assert!(bm.get(3));
        assert!(!bm.get(2));
        assert!(!bm.get(0));
    }

    #[test]
    fn blocks_reversed_matches_manual_reverse() {
        let mut bm = Bitmap::new(64);
        bm.set(0, true);
        bm.set(40, true);
        let mut expected = bm.blocks.clone();
        expected.reverse();
        assert_eq!(bm.blocks_reversed(), expected);
    }
}
