//! The string-table compressor framework: a small tagged set of
//! implementations (`None`, `Huffman`) chosen when a string table is built
//! and recorded as a flag byte so the reader can reconstruct the same one.
//!
//! A compressor only ever owns the *body* of a string-table entry — the
//! `StringEntryHeader` framing (marker, linked-list pointer, id, decoded
//! length) is owned by the archive writer/reader, since it's identical
//! across every compressor.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Error, Result};
use crate::format::CompressorFlags;
use crate::huffman::{self, HuffmanTable};
use crate::mem::MemFile;

/// A compressor ready to encode strings: either a no-op passthrough, or a
/// Huffman coder already carrying a built code table.
#[derive(Debug, Clone)]
pub enum Compressor {
    None,
    Huffman(HuffmanTable),
}

impl Compressor {
    /// The flag byte stored in the string table header for this choice.
    #[must_use]
    pub fn flag_bit(&self) -> u8 {
        match self {
            Compressor::None => CompressorFlags::NONE.bits(),
            Compressor::Huffman(_) => CompressorFlags::HUFFMAN.bits(),
        }
    }

    /// Build whatever book-keeping this compressor needs from the full set
    /// of strings about to be written, and serialize it to `dst` as the
    /// string table's `CompressorExtra` block. Must run exactly once,
    /// before any `encode_string` call.
    pub fn build_and_store(strings: &[&str], dst: &mut MemFile, tag: CompressorTag) -> Result<Compressor> {
        match tag {
            CompressorTag::None => Ok(Compressor::None),
            CompressorTag::Huffman => {
                let table = HuffmanTable::build(strings)?;
                write_huffman_dict(dst, &table)?;
                Ok(Compressor::Huffman(table))
            }
        }
    }

    /// Encode one string's body into `dst`. The caller has already written
    /// (and will back-patch) the entry's `StringEntryHeader`.
    pub fn encode_string(&self, dst: &mut MemFile, s: &str) -> Result<()> {
        match self {
            Compressor::None => dst.write(s.as_bytes()),
            Compressor::Huffman(table) => {
                dst.begin_bit_mode();
                table.encode_str(dst, s)?;
                dst.end_bit_mode()?;
                Ok(())
            }
        }
    }

    /// Decode one string body of `decoded_len` bytes from `src`.
    pub fn decode_string(&self, src: &mut MemFile, decoded_len: usize) -> Result<String> {
        match self {
            Compressor::None => {
                let bytes = src.read(decoded_len)?.to_vec();
                String::from_utf8(bytes).map_err(|_| Error::DecompressFailed)
            }
            Compressor::Huffman(table) => {
                src.begin_bit_mode();
                let s = table.decode_str(src, decoded_len)?;
                src.end_bit_mode()?;
                Ok(s)
            }
        }
    }

    /// Reconstruct a `None` compressor, or a `Huffman` compressor by reading
    /// back its dictionary, based on the flags read from a string table's
    /// header.
    pub fn from_flags(flags: CompressorFlags, src: &mut MemFile) -> Result<Compressor> {
        if flags.contains(CompressorFlags::HUFFMAN) {
            Ok(Compressor::Huffman(read_huffman_dict(src)?))
        } else if flags.contains(CompressorFlags::NONE) {
            Ok(Compressor::None)
        } else {
            Err(Error::NoCompressor(flags.bits()))
        }
    }

    /// Render the dictionary in human-readable form for diagnostics.
    #[must_use]
    pub fn dump_dict(&self) -> String {
        match self {
            Compressor::None => "(none)".to_string(),
            Compressor::Huffman(table) => {
                let mut out = String::new();
                for entry in table.entries() {
                    let bits: String = entry.code.iter().map(|&b| if b { '1' } else { '0' }).collect();
                    out.push_str(&format!("{:#04x} -> {bits}\n", entry.letter));
                }
                out
            }
        }
    }
}

/// Which compressor implementation to use when building a fresh string
/// table; distinct from [`Compressor`] because `None` carries no state and
/// `Huffman` does not exist yet until the table is built.
///
/// Carries a `u8` discriminant (matching the corresponding
/// [`CompressorFlags`] bit position) so a tag can round-trip through a
/// config byte via `TryFromPrimitive`/`IntoPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CompressorTag {
    None = 0,
    Huffman = 1,
}

fn write_huffman_dict(dst: &mut MemFile, table: &HuffmanTable) -> Result<()> {
    dst.write(&(table.entries().len() as u32).to_le_bytes())?;
    for entry in table.entries() {
        huffman::write_entry(dst, entry)?;
    }
    Ok(())
}

fn read_huffman_dict(src: &mut MemFile) -> Result<HuffmanTable> {
    let count = u32::from_le_bytes(src.read(4)?.try_into().unwrap()) as usize;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(huffman::read_entry(src)?);
    }
    HuffmanTable::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{MemBlock, file::Mode};

    #[test]
    fn none_round_trip() {
        let mut file = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
        let compressor = Compressor::None;
        compressor.encode_string(&mut file, "hello").unwrap();
        file.rewind().unwrap();
        let s = compressor.decode_string(&mut file, "hello".len()).unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn huffman_round_trip_through_flags() {
        let mut dict_file = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
        let strings = ["hello", "world"];
        let compressor = Compressor::build_and_store(&strings, &mut dict_file, CompressorTag::Huffman).unwrap();

        let mut payload = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
        compressor.encode_string(&mut payload, "hello").unwrap();

        dict_file.rewind().unwrap();
        let reloaded = Compressor::from_flags(CompressorFlags::HUFFMAN, &mut dict_file).unwrap();

        payload.rewind().unwrap();
        let s = reloaded.decode_string(&mut payload, "hello".len()).unwrap();
        assert_eq!(s, "hello");
    }
}
