//! Parses a CARBON byte stream back into a [`Document`] tree.
//!
//! Decoding walks the lazy [`crate::record::props::PropertyIter`]/
//! [`crate::record::columns`] machinery but eagerly builds a full
//! [`Document`] for the result: this reader resolves every string id and
//! recurses into every nested object up front, rather than handing back
//! iterators a caller would have to drive themselves (that's what
//! [`crate::visitor`] is for).

use std::collections::HashMap;
use std::path::Path;

use crate::compressor::Compressor;
use crate::error::{Error, Result};
use crate::format;
use crate::ids::StringId;
use crate::io_context::IoContext;
use crate::layout::{self, FileHeader, ObjectHeader, RecordHeader, StringEntryHeader, StringTableHeader};
use crate::mem::file::Mode;
use crate::mem::{MemBlock, MemFile};
use crate::model::{ArrayValue, Document, Value};
use crate::record::columns::{CollectionIter, EntryValues};
use crate::record::props::{PropertyIter, PropertyMask, RawArray, RawValue};

/// A fully-parsed archive: the root document plus the string table it was
/// resolved against and the [`IoContext`] it was read through, kept around
/// so a [`crate::query::Query`] can re-fetch string entries without
/// re-parsing the whole record.
pub struct Archive {
    pub root: Document,
    pub(crate) strings: HashMap<StringId, String>,
    pub(crate) io: IoContext,
    pub(crate) string_table_offset: u64,
}

impl Archive {
    /// Open an archive from a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Archive> {
        open_with_io(IoContext::open_path(path)?)
    }

    /// All `(id, text)` pairs in the string table, in ascending id order.
    #[must_use]
    pub fn string_table(&self) -> Vec<(StringId, &str)> {
        let mut entries: Vec<_> = self.strings.iter().map(|(id, s)| (*id, s.as_str())).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.strings.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn io(&self) -> &IoContext {
        &self.io
    }

    #[must_use]
    pub fn string_table_offset(&self) -> u64 {
        self.string_table_offset
    }
}

/// Parse a complete in-memory archive, keeping both the root document and
/// its string table.
pub fn open_bytes(bytes: &[u8]) -> Result<Archive> {
    open_with_io(IoContext::from_bytes(bytes.to_vec()))
}

/// Parse a complete archive byte stream into its root [`Document`], when
/// the string table itself is of no further interest.
pub fn read(bytes: &[u8]) -> Result<Document> {
    Ok(open_bytes(bytes)?.root)
}

fn open_with_io(io: IoContext) -> Result<Archive> {
    let bytes = io.read_all()?;
    let mut file = MemFile::open(MemBlock::from_vec(bytes.clone()), Mode::ReadOnly);

    let file_header = FileHeader::read(&mut file)?;
    let string_table_offset = file.tell() as u64;

    let sth = StringTableHeader::read(&mut file)?;
    let compressor = Compressor::from_flags(sth.flags, &mut file)?;

    let mut strings = HashMap::with_capacity(sth.num_entries as usize);
    let mut next = sth.first_entry;
    while next != 0 {
        file.seek(next as usize)?;
        let entry = StringEntryHeader::read(&mut file)?;
        let s = compressor.decode_string(&mut file, entry.string_len as usize)?;
        strings.insert(StringId(entry.string_id), s);
        next = entry.next_entry_off;
    }
    tracing::debug!(strings = strings.len(), "loaded string table");

    let r = file_header.root_object_header_offset;
    file.seek(r as usize)?;
    RecordHeader::read(&mut file)?;
    let table_start = r as usize + RecordHeader::LEN as usize;
    let table = &bytes[table_start..];

    let (root_header, _) = ObjectHeader::read_at(table, 0)?;
    let root = decode_object(table, &strings, &root_header)?;

    Ok(Archive { root, strings, io, string_table_offset })
}

fn resolve(strings: &HashMap<StringId, String>, id: StringId) -> Result<String> {
    strings.get(&id).cloned().ok_or(Error::NotFound)
}

fn decode_object(table: &[u8], strings: &HashMap<StringId, String>, header: &ObjectHeader) -> Result<Document> {
    let mut doc = Document::new();

    for item in PropertyIter::new(table, header, PropertyMask::ANY) {
        let (_ty, is_array, vector) = item?;
        for i in 0..vector.len() {
            let key = resolve(strings, vector.key_at(i)?)?;
            let value = if is_array {
                Value::Array(array_value_from_raw(vector.array_at(i)?, strings)?)
            } else {
                scalar_value_from_raw(vector.value_at(i)?, table, strings)?
            };
            doc.insert(key, value);
        }
    }

    if let Some(off) = header.offset_for_slot(format::SCHEDULE_LEN - 1) {
        read_object_array_group(table, strings, off, &mut doc)?;
    }

    Ok(doc)
}

fn scalar_value_from_raw(raw: RawValue, table: &[u8], strings: &HashMap<StringId, String>) -> Result<Value> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(b),
        RawValue::I8(v) => Value::I8(v),
        RawValue::I16(v) => Value::I16(v),
        RawValue::I32(v) => Value::I32(v),
        RawValue::I64(v) => Value::I64(v),
        RawValue::U8(v) => Value::U8(v),
        RawValue::U16(v) => Value::U16(v),
        RawValue::U32(v) => Value::U32(v),
        RawValue::U64(v) => Value::U64(v),
        RawValue::F32(v) => Value::F32(v),
        RawValue::StringId(id) => Value::String(resolve(strings, id)?),
        RawValue::ObjectOffset(off) => {
            let (header, _) = ObjectHeader::read_at(table, layout::to_table_index(off))?;
            Value::Object(decode_object(table, strings, &header)?)
        }
    })
}

fn array_value_from_raw(raw: RawArray, strings: &HashMap<StringId, String>) -> Result<ArrayValue> {
    Ok(match raw {
        RawArray::Null(n) => ArrayValue::Null(n),
        RawArray::Bool(v) => ArrayValue::Bool(v),
        RawArray::I8(v) => ArrayValue::I8(v),
        RawArray::I16(v) => ArrayValue::I16(v),
        RawArray::I32(v) => ArrayValue::I32(v),
        RawArray::I64(v) => ArrayValue::I64(v),
        RawArray::U8(v) => ArrayValue::U8(v),
        RawArray::U16(v) => ArrayValue::U16(v),
        RawArray::U32(v) => ArrayValue::U32(v),
        RawArray::U64(v) => ArrayValue::U64(v),
        RawArray::F32(v) => ArrayValue::F32(v),
        RawArray::StringId(ids) => {
            ArrayValue::String(ids.into_iter().map(|id| resolve(strings, id)).collect::<Result<_>>()?)
        }
    })
}

/// The value at index `idx` of one column entry's decoded run. This writer
/// only ever stores one value per entry, so callers always pass `idx: 0`;
/// the indexing stays general so a reader can tolerate an archive written
/// by something that chains more.
fn raw_array_element(raw: &RawArray, idx: usize) -> Option<RawValue> {
    Some(match raw {
        RawArray::Null(n) => {
            if idx < *n {
                RawValue::Null
            } else {
                return None;
            }
        }
        RawArray::Bool(v) => RawValue::Bool(*v.get(idx)?),
        RawArray::I8(v) => RawValue::I8(*v.get(idx)?),
        RawArray::I16(v) => RawValue::I16(*v.get(idx)?),
        RawArray::I32(v) => RawValue::I32(*v.get(idx)?),
        RawArray::I64(v) => RawValue::I64(*v.get(idx)?),
        RawArray::U8(v) => RawValue::U8(*v.get(idx)?),
        RawArray::U16(v) => RawValue::U16(*v.get(idx)?),
        RawArray::U32(v) => RawValue::U32(*v.get(idx)?),
        RawArray::U64(v) => RawValue::U64(*v.get(idx)?),
        RawArray::F32(v) => RawValue::F32(*v.get(idx)?),
        RawArray::StringId(v) => RawValue::StringId(*v.get(idx)?),
    })
}

fn read_object_array_group(
    table: &[u8],
    strings: &HashMap<StringId, String>,
    offset: u64,
    doc: &mut Document,
) -> Result<()> {
    for entry in CollectionIter::open(table, offset)? {
        let (key_id, column_group) = entry?;
        let key = resolve(strings, key_id)?;
        let num_objects = column_group.num_objects() as usize;
        let mut rows = vec![Document::new(); num_objects];

        for column in column_group {
            let column = column?;
            let col_key = resolve(strings, column.column_name())?;
            for entry in column.entries() {
                let (position, values) = entry?;
                let value = match values {
                    EntryValues::Fixed(raw) => {
                        let raw_value = raw_array_element(&raw, 0)
                            .ok_or(Error::IllegalState("column entry has no values"))?;
                        scalar_value_from_raw(raw_value, table, strings)?
                    }
                    EntryValues::Objects(offsets) => {
                        let off = *offsets.first().ok_or(Error::IllegalState("object column entry has no values"))?;
                        let (header, _) = ObjectHeader::read_at(table, layout::to_table_index(off))?;
                        Value::Object(decode_object(table, strings, &header)?)
                    }
                };
                rows[position as usize].insert(col_key.clone(), value);
            }
        }

        doc.insert(key, Value::Array(ArrayValue::Object(rows)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;

    #[test]
    fn rejects_bad_magic() {
        let err = read(b"not-a-carbon-file-at-all").unwrap_err();
        assert!(matches!(err, Error::BadMagicOrVersion));
    }

    #[test]
    fn round_trips_nested_and_array_fields() {
        let mut inner = Document::new();
        inner.insert("x", Value::I32(1));
        inner.insert("y", Value::I32(2));

        let mut doc = Document::new();
        doc.insert("id", Value::U64(42));
        doc.insert("point", Value::Object(inner));
        doc.insert("tags", Value::Array(ArrayValue::String(vec!["a".into(), "b".into()])));

        let bytes = writer::write(&doc).unwrap();
        let back = read(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn round_trips_homogeneous_object_array_as_columns() {
        let mut a = Document::new();
        a.insert("n", Value::I32(1));
        a.insert("label", Value::String("a".into()));
        let mut b = Document::new();
        b.insert("n", Value::I32(2));
        b.insert("label", Value::String("b".into()));

        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![a, b])));

        let bytes = writer::write(&doc).unwrap();
        let back = read(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn round_trips_heterogeneous_object_array() {
        let mut a = Document::new();
        a.insert("n", Value::I32(1));
        let mut b = Document::new();
        b.insert("other", Value::String("x".into()));

        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![a, b])));

        let bytes = writer::write(&doc).unwrap();
        let back = read(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn open_reads_an_archive_from_disk() {
        let mut doc = Document::new();
        doc.insert("name", Value::String("ada".into()));
        let dir = std::env::temp_dir().join(format!("carbon-reader-test-{:?}", std::thread::current().id()));
        writer::write_to_path(&dir, &doc).unwrap();
        let archive = Archive::open(&dir).unwrap();
        assert_eq!(archive.root.get("name"), Some(&Value::String("ada".into())));
        std::fs::remove_file(&dir).ok();
    }
}
