//! `MemBlock`: an owned, resizable byte buffer that tracks how much of its
//! capacity has actually been written to.

use crate::error::{Error, Result};

/// An owned block of bytes with a high-water mark (`len`) distinct from its
/// allocated capacity. Resizing never truncates data below `len`; growing
/// zero-fills the new region.
#[derive(Debug, Clone)]
pub struct MemBlock {
    bytes: Vec<u8>,
    /// Number of bytes actually written so far; `<= bytes.len()`.
    len: usize,
}

impl MemBlock {
    /// Allocate a new block of `size` zeroed bytes, with nothing written.
    #[must_use]
    pub fn new(size: usize) -> Self {
        MemBlock { bytes: vec![0u8; size], len: 0 }
    }

    /// Wrap an existing byte vector as a fully-written block.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        MemBlock { bytes, len }
    }

    /// Capacity of the underlying allocation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of bytes written so far (the high-water mark).
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resize the backing allocation to exactly `size` bytes. Growing
    /// zero-fills; shrinking below `len` clamps the watermark down too.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        self.bytes.resize(size, 0);
        if self.len > size {
            self.len = size;
        }
        Ok(())
    }

    /// Drop unused capacity beyond the high-water mark.
    pub fn shrink(&mut self) {
        self.bytes.truncate(self.len);
    }

    /// Write `data` at `position`, growing the block if necessary, and
    /// advance the watermark past the write if it extended it.
    pub fn write(&mut self, position: usize, data: &[u8]) -> Result<()> {
        let end = position.checked_add(data.len()).ok_or(Error::Alloc)?;
        if end > self.bytes.len() {
            self.resize(end)?;
        }
        self.bytes[position..end].copy_from_slice(data);
        if end > self.len {
            self.len = end;
        }
        Ok(())
    }

    /// Borrow the written prefix of the block.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Borrow the full backing allocation, including unwritten tail bytes.
    #[must_use]
    pub fn raw_data(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the block, returning the written prefix as an owned `Vec`.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.len);
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_extends_watermark_and_capacity() {
        let mut block = MemBlock::new(4);
        block.write(2, &[1, 2, 3]).unwrap();
        assert_eq!(block.len(), 5);
        assert_eq!(block.as_slice(), &[0, 0, 1, 2, 3]);
    }

    #[test]
    fn shrink_drops_unused_capacity() {
        let mut block = MemBlock::new(64);
        block.write(0, &[9, 9]).unwrap();
        block.shrink();
        assert_eq!(block.capacity(), 2);
    }

    #[test]
    fn resize_down_clamps_len() {
        let mut block = MemBlock::new(8);
        block.write(0, &[1, 2, 3, 4]).unwrap();
        block.resize(2).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.as_slice(), &[1, 2]);
    }
}
