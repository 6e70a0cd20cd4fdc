//! Fixed-size on-disk struct layouts: the file header, the string-table
//! header, the record header, and the 26-slot property-group schedule every
//! object's header addresses through its offset vector.
//!
//! Every offset that appears inside the record table (property-group
//! offsets, value offsets for nested objects, column-group/column/entry
//! offsets) is stored relative to `R`, the absolute file offset of the
//! `RecordHeader`'s marker byte — never as an absolute file offset and never
//! relative to the object that stores it. [`to_table_index`]/[`to_relative`]
//! convert between that convention and an index into the in-memory record
//! table buffer, which starts at `R + RecordHeader::LEN`.

use crate::error::{Error, Result};
use crate::format::{self, CompressorFlags, RecordFlags};
use crate::mem::MemFile;
use crate::value::ValueType;

/// File-level header: magic, version, and the two top-level offsets an
/// archive is entered through.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub version: u8,
    /// Absolute file offset of the `RecordHeader` marker byte (`R`).
    pub root_object_header_offset: u64,
    /// Absolute file offset of a secondary string-id-to-offset index. This
    /// crate never builds that index; the field is always `0` and a reader
    /// must not dereference it.
    pub string_id_to_offset_index_offset: u64,
}

impl FileHeader {
    pub const LEN: u64 = format::MAGIC.len() as u64 + 1 + 8 + 8;

    pub fn write(file: &mut MemFile, header: &FileHeader) -> Result<()> {
        file.write(&format::MAGIC)?;
        file.write(&[header.version])?;
        file.write(&header.root_object_header_offset.to_le_bytes())?;
        file.write(&header.string_id_to_offset_index_offset.to_le_bytes())?;
        Ok(())
    }

    pub fn read(file: &mut MemFile) -> Result<FileHeader> {
        let magic = file.read(format::MAGIC.len())?.to_vec();
        if magic != format::MAGIC {
            return Err(Error::BadMagicOrVersion);
        }
        let version = file.read(1)?[0];
        if version != format::VERSION {
            return Err(Error::BadMagicOrVersion);
        }
        let root_object_header_offset = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        let string_id_to_offset_index_offset = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        if root_object_header_offset == 0 {
            return Err(Error::IllegalState("root object header offset is zero"));
        }
        Ok(FileHeader { version, root_object_header_offset, string_id_to_offset_index_offset })
    }
}

/// Header opening the string table: how many entries it holds, which
/// compressor encoded them, and where the linked list of entries starts.
#[derive(Debug, Clone, Copy)]
pub struct StringTableHeader {
    pub num_entries: u32,
    pub flags: CompressorFlags,
    /// Absolute file offset of the first [`MARKER_STRING_ENTRY`] record, or
    /// `0` if `num_entries == 0`.
    ///
    /// [`MARKER_STRING_ENTRY`]: format::MARKER_STRING_ENTRY
    pub first_entry: u64,
}

impl StringTableHeader {
    pub const LEN: u64 = 1 + 4 + 1 + 8;

    pub fn write(file: &mut MemFile, header: &StringTableHeader) -> Result<()> {
        file.write(&[format::MARKER_STRING_TABLE_HEADER])?;
        file.write(&header.num_entries.to_le_bytes())?;
        file.write(&[header.flags.bits()])?;
        file.write(&header.first_entry.to_le_bytes())?;
        Ok(())
    }

    pub fn read(file: &mut MemFile) -> Result<StringTableHeader> {
        let marker = file.read(1)?[0];
        if marker != format::MARKER_STRING_TABLE_HEADER {
            return Err(Error::Corrupted { expected: format::MARKER_STRING_TABLE_HEADER, found: marker });
        }
        let num_entries = u32::from_le_bytes(file.read(4)?.try_into().unwrap());
        let flags = CompressorFlags::from_bits_truncate(file.read(1)?[0]);
        let first_entry = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        Ok(StringTableHeader { num_entries, flags, first_entry })
    }
}

/// Header of one string-table entry: a node in the table's singly-linked
/// list. `string_len` is the *decoded* length of the string, the bound a
/// Huffman decode runs to; for the `None` compressor it also happens to be
/// exactly how many payload bytes follow.
#[derive(Debug, Clone, Copy)]
pub struct StringEntryHeader {
    pub next_entry_off: u64,
    pub string_id: u64,
    pub string_len: u32,
}

impl StringEntryHeader {
    pub const LEN: u64 = 1 + 8 + 8 + 4;

    pub fn write(file: &mut MemFile, header: &StringEntryHeader) -> Result<()> {
        file.write(&[format::MARKER_STRING_ENTRY])?;
        file.write(&header.next_entry_off.to_le_bytes())?;
        file.write(&header.string_id.to_le_bytes())?;
        file.write(&header.string_len.to_le_bytes())?;
        Ok(())
    }

    pub fn read(file: &mut MemFile) -> Result<StringEntryHeader> {
        let marker = file.read(1)?[0];
        if marker != format::MARKER_STRING_ENTRY {
            return Err(Error::Corrupted { expected: format::MARKER_STRING_ENTRY, found: marker });
        }
        let next_entry_off = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        let string_id = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        let string_len = u32::from_le_bytes(file.read(4)?.try_into().unwrap());
        Ok(StringEntryHeader { next_entry_off, string_id, string_len })
    }
}

/// Header opening the record table: the byte span holding the whole object
/// graph reachable from the root object.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub flags: RecordFlags,
    pub record_size: u64,
}

impl RecordHeader {
    pub const LEN: u64 = 1 + 1 + 8;

    pub fn write(file: &mut MemFile, header: &RecordHeader) -> Result<()> {
        file.write(&[format::MARKER_RECORD_HEADER])?;
        file.write(&[header.flags.bits()])?;
        file.write(&header.record_size.to_le_bytes())?;
        Ok(())
    }

    pub fn read(file: &mut MemFile) -> Result<RecordHeader> {
        let marker = file.read(1)?[0];
        if marker != format::MARKER_RECORD_HEADER {
            return Err(Error::Corrupted { expected: format::MARKER_RECORD_HEADER, found: marker });
        }
        let flags = RecordFlags::from_bits_truncate(file.read(1)?[0]);
        let record_size = u64::from_le_bytes(file.read(8)?.try_into().unwrap());
        Ok(RecordHeader { flags, record_size })
    }
}

/// Fixed portion of an object header, ahead of its variable-length offset
/// vector: the opening marker, its id, and its 26-bit present-group mask.
pub const OBJECT_HEADER_FIXED_LEN: u64 = 1 + 8 + 4;

/// An object header parsed from a record-table buffer: its id, which
/// schedule slots are present, each present slot's table-relative offset
/// (in ascending slot order), and the offset of a chained successor object
/// (`0` for nil — only used by object-typed column entries).
#[derive(Debug, Clone)]
pub struct ObjectHeader {
    pub object_id: u64,
    pub flags: u32,
    pub slot_offsets: Vec<(usize, u64)>,
    pub next_object_or_nil: u64,
}

impl ObjectHeader {
    /// Parse the object header starting at `at` (a byte index into `table`).
    /// Returns the header and the index one past its last byte.
    pub fn read_at(table: &[u8], at: usize) -> Result<(ObjectHeader, usize)> {
        let mut pos = at;
        let marker = read_u8(table, pos)?;
        if marker != format::MARKER_OBJECT_BEGIN {
            return Err(Error::Corrupted { expected: format::MARKER_OBJECT_BEGIN, found: marker });
        }
        pos += 1;
        let object_id = read_u64(table, pos)?;
        pos += 8;
        let flags = read_u32(table, pos)?;
        pos += 4;
        let mut slot_offsets = Vec::new();
        for slot in 0..format::SCHEDULE_LEN {
            if flags & (1 << slot) != 0 {
                let off = read_u64(table, pos)?;
                pos += 8;
                slot_offsets.push((slot, off));
            }
        }
        let next_object_or_nil = read_u64(table, pos)?;
        pos += 8;
        Ok((ObjectHeader { object_id, flags, slot_offsets, next_object_or_nil }, pos))
    }

    #[must_use]
    pub fn offset_for_slot(&self, slot: usize) -> Option<u64> {
        self.slot_offsets.iter().find(|(s, _)| *s == slot).map(|(_, off)| *off)
    }
}

/// Read a `u8` out of `buf` at `at`, bounds-checked.
pub fn read_u8(buf: &[u8], at: usize) -> Result<u8> {
    buf.get(at)
        .copied()
        .ok_or(Error::ReadOutOfBounds { at: at as u64, requested: 1, len: buf.len() as u64 })
}

fn read_exact<'a>(buf: &'a [u8], at: usize, len: usize) -> Result<&'a [u8]> {
    let end = at.checked_add(len).ok_or(Error::Alloc)?;
    buf.get(at..end)
        .ok_or(Error::ReadOutOfBounds { at: at as u64, requested: len as u64, len: buf.len() as u64 })
}

/// Read a little-endian `u32` out of `buf` at `at`, bounds-checked.
pub fn read_u32(buf: &[u8], at: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_exact(buf, at, 4)?.try_into().unwrap()))
}

/// Read a little-endian `u64` out of `buf` at `at`, bounds-checked.
pub fn read_u64(buf: &[u8], at: usize) -> Result<u64> {
    Ok(u64::from_le_bytes(read_exact(buf, at, 8)?.try_into().unwrap()))
}

/// Read a little-endian `f32` out of `buf` at `at`, bounds-checked.
pub fn read_f32(buf: &[u8], at: usize) -> Result<f32> {
    Ok(f32::from_le_bytes(read_exact(buf, at, 4)?.try_into().unwrap()))
}

/// Borrow `len` bytes out of `buf` at `at`, bounds-checked.
pub fn read_bytes<'a>(buf: &'a [u8], at: usize, len: usize) -> Result<&'a [u8]> {
    read_exact(buf, at, len)
}

/// Convert a record-table-relative offset (as stored on disk, relative to
/// `R`) into a byte index into the in-memory record-table buffer, which
/// holds only the bytes from `R + RecordHeader::LEN` onward.
#[must_use]
pub fn to_table_index(relative_offset: u64) -> usize {
    (relative_offset - RecordHeader::LEN) as usize
}

/// The inverse of [`to_table_index`]: express a table-buffer byte index as
/// an offset relative to `R`, ready to be stored on disk.
#[must_use]
pub fn to_relative(table_index: usize) -> u64 {
    table_index as u64 + RecordHeader::LEN
}

/// Which schedule slot (`0..SCHEDULE_LEN`) a given type/array-ness pair maps
/// to. Scalar slots are `0..13`, array slots are `13..25` (excluding
/// `Object`, which has no homogeneous-array slot of its own), and slot `25`
/// is the one object-array slot.
#[must_use]
pub fn schedule_slot(ty: ValueType, is_array: bool) -> usize {
    if !is_array {
        ty.schedule_index()
    } else if ty == ValueType::Object {
        format::SCHEDULE_LEN - 1
    } else {
        13 + ty.schedule_index()
    }
}

/// The inverse of [`schedule_slot`] for slots `0..25`; slot `25` (the
/// object-array group) has no `(ValueType, bool)` counterpart and must be
/// handled by the caller before calling this.
#[must_use]
pub fn slot_schedule(slot: usize) -> (ValueType, bool) {
    if slot < 13 {
        (ValueType::ALL[slot], false)
    } else {
        (ValueType::ALL[slot - 13], true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{MemBlock, file::Mode};

    #[test]
    fn file_header_round_trip() {
        let mut file = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
        let header =
            FileHeader { version: format::VERSION, root_object_header_offset: 42, string_id_to_offset_index_offset: 0 };
        FileHeader::write(&mut file, &header).unwrap();
        assert_eq!(file.tell() as u64, FileHeader::LEN);
        file.rewind().unwrap();
        let back = FileHeader::read(&mut file).unwrap();
        assert_eq!(back.root_object_header_offset, 42);
    }

    #[test]
    fn schedule_slot_round_trips_for_non_object_array() {
        for ty in ValueType::ALL {
            assert_eq!(slot_schedule(schedule_slot(ty, false)), (ty, false));
            if ty != ValueType::Object {
                assert_eq!(slot_schedule(schedule_slot(ty, true)), (ty, true));
            }
        }
        assert_eq!(schedule_slot(ValueType::Object, true), format::SCHEDULE_LEN - 1);
    }

    #[test]
    fn table_index_conversion_round_trips() {
        assert_eq!(to_table_index(to_relative(0)), 0);
        assert_eq!(to_table_index(to_relative(57)), 57);
    }
}
