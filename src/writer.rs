//! Assembles a [`Document`] into an on-disk archive: a `FileHeader`, a
//! string table, and a record table holding the root object and everything
//! reachable from it.
//!
//! Every offset that lands inside the record table is reserved with a zero
//! placeholder, then back-patched once the thing it points at has actually
//! been written — the table is built with a single forward pass plus
//! in-place patches, never a second full pass.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use crate::compressor::{Compressor, CompressorTag};
use crate::error::{Error, Result};
use crate::format;
use crate::ids::{ObjectIdGen, StringId};
use crate::layout::{FileHeader, RecordHeader, StringEntryHeader, StringTableHeader};
use crate::mem::file::Mode;
use crate::mem::{MemBlock, MemFile};
use crate::model::{ArrayValue, Document, Value};
use crate::value::ValueType;

/// Build an archive from `doc` using the Huffman string compressor.
pub fn write(doc: &Document) -> Result<Vec<u8>> {
    write_with_compressor(doc, CompressorTag::Huffman)
}

/// Build an archive from `doc`, writing it straight to `path`.
pub fn write_to_path(path: impl AsRef<Path>, doc: &Document) -> Result<()> {
    let bytes = write(doc)?;
    let mut file = File::create(path).map_err(Error::OpenForWrite)?;
    file.write_all(&bytes).map_err(Error::Io)
}

/// Build an archive from `doc` with an explicit choice of string compressor.
pub fn write_with_compressor(doc: &Document, tag: CompressorTag) -> Result<Vec<u8>> {
    let index = StringIndex::build(doc);

    let mut file = MemFile::open(MemBlock::new(0), Mode::ReadWrite);
    FileHeader::write(
        &mut file,
        &FileHeader { version: format::VERSION, root_object_header_offset: 0, string_id_to_offset_index_offset: 0 },
    )?;

    write_string_table(&mut file, &index, tag)?;

    let r = file.tell() as u64;
    RecordHeader::write(&mut file, &RecordHeader { flags: format::RecordFlags::empty(), record_size: 0 })?;
    let table_start = file.tell();

    let mut object_ids = ObjectIdGen::new();
    encode_object(&mut file, r, &index, &mut object_ids, doc)?;
    let record_size = file.tell() as u64 - table_start as u64;

    patch_u64(&mut file, r as usize + 2, record_size)?;
    patch_u64(&mut file, format::MAGIC.len() + 1, r)?;

    Ok(file.into_block().into_vec())
}

/// Every string reachable from the document, deduplicated and assigned
/// sequential ids in first-seen order (`1..`, since `0` is the null-string
/// sentinel).
struct StringIndex {
    ordered: Vec<String>,
    ids: std::collections::HashMap<String, StringId>,
}

impl StringIndex {
    fn build(doc: &Document) -> Self {
        let mut seen = Vec::new();
        doc.collect_strings(&mut seen);
        let mut ordered = Vec::new();
        let mut ids = std::collections::HashMap::new();
        for s in seen {
            if !ids.contains_key(s) {
                ids.insert(s.to_string(), StringId((ordered.len() + 1) as u64));
                ordered.push(s.to_string());
            }
        }
        StringIndex { ordered, ids }
    }

    fn id_of(&self, s: &str) -> Result<StringId> {
        self.ids.get(s).copied().ok_or(Error::IllegalState("string was not collected into the string index"))
    }
}

fn write_string_table(file: &mut MemFile, index: &StringIndex, tag: CompressorTag) -> Result<Compressor> {
    let header_pos = file.tell();
    StringTableHeader::write(
        file,
        &StringTableHeader { num_entries: 0, flags: format::CompressorFlags::empty(), first_entry: 0 },
    )?;

    let refs: Vec<&str> = index.ordered.iter().map(String::as_str).collect();
    let compressor = Compressor::build_and_store(&refs, file, tag)?;

    let mut prior_next_patch: Option<usize> = None;
    let mut first_entry = 0u64;
    for (i, s) in index.ordered.iter().enumerate() {
        let entry_pos = file.tell();
        if i == 0 {
            first_entry = entry_pos as u64;
        }
        if let Some(patch_at) = prior_next_patch {
            patch_u64(file, patch_at, entry_pos as u64)?;
        }
        StringEntryHeader::write(
            file,
            &StringEntryHeader { next_entry_off: 0, string_id: (i + 1) as u64, string_len: s.len() as u32 },
        )?;
        prior_next_patch = Some(entry_pos + 1);
        compressor.encode_string(file, s)?;
    }

    let save = file.tell();
    file.seek(header_pos)?;
    StringTableHeader::write(
        file,
        &StringTableHeader {
            num_entries: index.ordered.len() as u32,
            flags: format::CompressorFlags::from_bits_truncate(compressor.flag_bit()),
            first_entry,
        },
    )?;
    file.seek(save)?;
    Ok(compressor)
}

fn patch_u64(file: &mut MemFile, at: usize, value: u64) -> Result<()> {
    let save = file.tell();
    file.seek(at)?;
    file.write(&value.to_le_bytes())?;
    file.seek(save)?;
    Ok(())
}

fn patch_u64_list(file: &mut MemFile, at: usize, values: &[u64]) -> Result<()> {
    let save = file.tell();
    file.seek(at)?;
    for v in values {
        file.write(&v.to_le_bytes())?;
    }
    file.seek(save)?;
    Ok(())
}

/// Bytes written so far, expressed relative to `r`.
fn rel(file: &MemFile, r: u64) -> u64 {
    file.tell() as u64 - r
}

fn scalar_type_of(value: &Value) -> Result<ValueType> {
    Ok(match value {
        Value::Null => ValueType::Null,
        Value::Bool(_) => ValueType::Bool,
        Value::I8(_) => ValueType::I8,
        Value::I16(_) => ValueType::I16,
        Value::I32(_) => ValueType::I32,
        Value::I64(_) => ValueType::I64,
        Value::U8(_) => ValueType::U8,
        Value::U16(_) => ValueType::U16,
        Value::U32(_) => ValueType::U32,
        Value::U64(_) => ValueType::U64,
        Value::F32(_) => ValueType::F32,
        Value::String(_) => ValueType::String,
        Value::Object(_) => ValueType::Object,
        Value::Array(_) => return Err(Error::IllegalState("array value has no scalar type")),
    })
}

fn array_type_of(av: &ArrayValue) -> ValueType {
    match av {
        ArrayValue::Null(_) => ValueType::Null,
        ArrayValue::Bool(_) => ValueType::Bool,
        ArrayValue::I8(_) => ValueType::I8,
        ArrayValue::I16(_) => ValueType::I16,
        ArrayValue::I32(_) => ValueType::I32,
        ArrayValue::I64(_) => ValueType::I64,
        ArrayValue::U8(_) => ValueType::U8,
        ArrayValue::U16(_) => ValueType::U16,
        ArrayValue::U32(_) => ValueType::U32,
        ArrayValue::U64(_) => ValueType::U64,
        ArrayValue::F32(_) => ValueType::F32,
        ArrayValue::String(_) => ValueType::String,
        ArrayValue::Object(_) => ValueType::Object,
    }
}

fn write_scalar_bytes(file: &mut MemFile, index: &StringIndex, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Bool(b) => file.write(&[u8::from(*b)]),
        Value::I8(v) => file.write(&v.to_le_bytes()),
        Value::I16(v) => file.write(&v.to_le_bytes()),
        Value::I32(v) => file.write(&v.to_le_bytes()),
        Value::I64(v) => file.write(&v.to_le_bytes()),
        Value::U8(v) => file.write(&[*v]),
        Value::U16(v) => file.write(&v.to_le_bytes()),
        Value::U32(v) => file.write(&v.to_le_bytes()),
        Value::U64(v) => file.write(&v.to_le_bytes()),
        Value::F32(v) => file.write(&v.to_le_bytes()),
        Value::String(s) => {
            let id = index.id_of(s)?;
            file.write(&id.0.to_le_bytes())
        }
        Value::Object(_) | Value::Array(_) => Err(Error::IllegalState("not a fixed scalar value")),
    }
}

fn write_array_values(file: &mut MemFile, index: &StringIndex, av: &ArrayValue) -> Result<()> {
    match av {
        ArrayValue::Null(_) => Ok(()),
        ArrayValue::Bool(v) => v.iter().try_for_each(|b| file.write(&[u8::from(*b)])),
        ArrayValue::I8(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::I16(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::I32(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::I64(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::U8(v) => file.write(v),
        ArrayValue::U16(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::U32(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::U64(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::F32(v) => v.iter().try_for_each(|x| file.write(&x.to_le_bytes())),
        ArrayValue::String(v) => v.iter().try_for_each(|s| {
            let id = index.id_of(s)?;
            file.write(&id.0.to_le_bytes())
        }),
        ArrayValue::Object(_) => Err(Error::IllegalState("object arrays use the column-group construct")),
    }
}

/// Write one property-group payload (the part after the group's `keys`
/// block), for slots `0..25`.
fn write_group(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    ty: ValueType,
    is_array: bool,
    entries: &[(StringId, &Value)],
) -> Result<()> {
    let marker = if is_array {
        ty.array_marker().ok_or(Error::IllegalState("object has no homogeneous array group marker"))?
    } else {
        ty.scalar_marker()
    };
    file.write(&[marker])?;
    file.write(&(entries.len() as u32).to_le_bytes())?;
    for (key_id, _) in entries {
        file.write(&key_id.0.to_le_bytes())?;
    }

    match (ty, is_array) {
        (ValueType::Null, false) => {}
        (ValueType::Object, false) => {
            let patch_at = file.tell();
            for _ in entries {
                file.write(&0u64.to_le_bytes())?;
            }
            let mut offsets = Vec::with_capacity(entries.len());
            for (_, value) in entries {
                let doc = match value {
                    Value::Object(d) => d,
                    _ => return Err(Error::TypeMismatch { expected: "object", found: "other" }),
                };
                offsets.push(encode_object(file, r, index, object_ids, doc)?);
            }
            patch_u64_list(file, patch_at, &offsets)?;
        }
        (ValueType::Null, true) => {
            for (_, value) in entries {
                let n = match value {
                    Value::Array(ArrayValue::Null(n)) => *n as u32,
                    _ => return Err(Error::TypeMismatch { expected: "null array", found: "other" }),
                };
                file.write(&n.to_le_bytes())?;
            }
        }
        (_, false) => {
            for (_, value) in entries {
                write_scalar_bytes(file, index, value)?;
            }
        }
        (_, true) => {
            for (_, value) in entries {
                let av = match value {
                    Value::Array(av) => av,
                    _ => return Err(Error::TypeMismatch { expected: "array", found: "scalar" }),
                };
                file.write(&(av.len() as u32).to_le_bytes())?;
            }
            for (_, value) in entries {
                let av = match value {
                    Value::Array(av) => av,
                    _ => unreachable!("checked above"),
                };
                write_array_values(file, index, av)?;
            }
        }
    }
    Ok(())
}

/// Write the object header (and, transitively, everything it reaches) at
/// the current file position, returning its offset relative to `r`.
fn encode_object(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    doc: &Document,
) -> Result<u64> {
    let object_id = object_ids.next()?.0;

    let mut slots: std::collections::BTreeMap<usize, Vec<(StringId, &Value)>> = std::collections::BTreeMap::new();
    for (key, value) in doc.fields() {
        let key_id = index.id_of(key)?;
        let slot = match value {
            Value::Array(ArrayValue::Object(_)) => format::SCHEDULE_LEN - 1,
            Value::Array(av) => crate::layout::schedule_slot(array_type_of(av), true),
            other => crate::layout::schedule_slot(scalar_type_of(other)?, false),
        };
        slots.entry(slot).or_default().push((key_id, value));
    }

    let header_start = file.tell();
    file.write(&[format::MARKER_OBJECT_BEGIN])?;
    file.write(&object_id.to_le_bytes())?;

    let mut flags: u32 = 0;
    for &slot in slots.keys() {
        flags |= 1 << slot;
    }
    file.write(&flags.to_le_bytes())?;

    let offsets_patch_at = file.tell();
    for _ in &slots {
        file.write(&0u64.to_le_bytes())?;
    }
    file.write(&0u64.to_le_bytes())?; // next_object_or_nil: this writer never chains objects

    let mut offsets = Vec::with_capacity(slots.len());
    for (slot, entries) in &slots {
        offsets.push(rel(file, r));
        if *slot == format::SCHEDULE_LEN - 1 {
            write_object_array_group(file, r, index, object_ids, entries)?;
        } else {
            let (ty, is_array) = crate::layout::slot_schedule(*slot);
            write_group(file, r, index, object_ids, ty, is_array, entries)?;
        }
    }
    patch_u64_list(file, offsets_patch_at, &offsets)?;

    file.write(&[format::MARKER_OBJECT_END])?;
    Ok(header_start as u64 - r)
}

fn write_object_array_group(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    entries: &[(StringId, &Value)],
) -> Result<()> {
    if entries.len() > u8::MAX as usize {
        return Err(Error::IllegalArgument("an object may not hold more than 255 object-array fields"));
    }
    file.write(&[format::MARKER_OBJECT_ARRAY_GROUP])?;
    file.write(&[entries.len() as u8])?;
    for (key_id, _) in entries {
        file.write(&key_id.0.to_le_bytes())?;
    }
    let patch_at = file.tell();
    for _ in entries {
        file.write(&0u64.to_le_bytes())?;
    }
    let mut offsets = Vec::with_capacity(entries.len());
    for (_, value) in entries {
        let docs = match value {
            Value::Array(ArrayValue::Object(d)) => d,
            _ => return Err(Error::TypeMismatch { expected: "object array", found: "other" }),
        };
        offsets.push(write_column_group(file, r, index, object_ids, docs)?);
    }
    patch_u64_list(file, patch_at, &offsets)?;
    Ok(())
}

/// Transpose `docs` into one column per `(key, value_type)` pair actually
/// observed, writing the column group and returning its offset relative to
/// `r`. Every row field must be a scalar value: an array-valued row field
/// (including a nested object array) has no representation as a single
/// column entry and is rejected, since this writer only ever emits one
/// value per entry.
fn write_column_group(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    docs: &[Document],
) -> Result<u64> {
    let num_objects = docs.len() as u32;
    let mut object_id_list = Vec::with_capacity(docs.len());
    for _ in docs {
        object_id_list.push(object_ids.next()?.0);
    }

    let mut columns: Vec<((StringId, ValueType), Vec<(u32, &Value)>)> = Vec::new();
    let mut column_index: std::collections::HashMap<(StringId, ValueType), usize> = std::collections::HashMap::new();
    for (pos, doc) in docs.iter().enumerate() {
        for (key, value) in doc.fields() {
            if matches!(value, Value::Array(_)) {
                return Err(Error::IllegalArgument("object-array row fields must be scalar values"));
            }
            let key_id = index.id_of(key)?;
            let ty = scalar_type_of(value)?;
            let k = (key_id, ty);
            let idx = *column_index.entry(k).or_insert_with(|| {
                columns.push((k, Vec::new()));
                columns.len() - 1
            });
            columns[idx].1.push((pos as u32, value));
        }
    }

    let header_start = file.tell();
    file.write(&[format::MARKER_COLUMN_GROUP])?;
    file.write(&(columns.len() as u32).to_le_bytes())?;
    file.write(&num_objects.to_le_bytes())?;
    for id in &object_id_list {
        file.write(&id.to_le_bytes())?;
    }
    let columns_patch_at = file.tell();
    for _ in &columns {
        file.write(&0u64.to_le_bytes())?;
    }
    let mut column_offsets = Vec::with_capacity(columns.len());
    for ((key_id, ty), entries) in &columns {
        column_offsets.push(rel(file, r));
        write_column(file, r, index, object_ids, *key_id, *ty, entries)?;
    }
    patch_u64_list(file, columns_patch_at, &column_offsets)?;
    Ok(header_start as u64 - r)
}

fn write_column(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    key_id: StringId,
    ty: ValueType,
    entries: &[(u32, &Value)],
) -> Result<()> {
    file.write(&[format::MARKER_COLUMN])?;
    file.write(&key_id.0.to_le_bytes())?;
    file.write(&[ty.scalar_marker()])?;
    file.write(&(entries.len() as u32).to_le_bytes())?;

    let entry_offsets_patch_at = file.tell();
    for _ in entries {
        file.write(&0u64.to_le_bytes())?;
    }
    for (position, _) in entries {
        file.write(&position.to_le_bytes())?;
    }

    let mut entry_offsets = Vec::with_capacity(entries.len());
    for (_, value) in entries {
        entry_offsets.push(rel(file, r));
        write_entry(file, r, index, object_ids, ty, value)?;
    }
    patch_u64_list(file, entry_offsets_patch_at, &entry_offsets)?;
    Ok(())
}

/// Write one column entry. `num_values` is always `1`: this writer never
/// builds a chained run of objects behind a single entry, though
/// [`crate::record::columns::ObjectIter`] on the read side tolerates one.
fn write_entry(
    file: &mut MemFile,
    r: u64,
    index: &StringIndex,
    object_ids: &mut ObjectIdGen,
    ty: ValueType,
    value: &Value,
) -> Result<()> {
    file.write(&1u32.to_le_bytes())?;
    if ty == ValueType::Object {
        let doc = match value {
            Value::Object(d) => d,
            _ => return Err(Error::TypeMismatch { expected: "object", found: "other" }),
        };
        let offset = encode_object(file, r, index, object_ids, doc)?;
        file.write(&offset.to_le_bytes())?;
    } else {
        write_scalar_bytes(file, index, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    #[test]
    fn writes_a_file_header_readers_accept() {
        let mut doc = Document::new();
        doc.insert("name", Value::String("ada".into()));
        let bytes = write(&doc).unwrap();
        assert_eq!(&bytes[..format::MAGIC.len()], &format::MAGIC);
        let back = reader::read(&bytes).unwrap();
        assert_eq!(back.get("name"), Some(&Value::String("ada".into())));
    }

    #[test]
    fn round_trips_scalars_arrays_and_nested_objects() {
        let mut inner = Document::new();
        inner.insert("city", Value::String("nyc".into()));
        let mut doc = Document::new();
        doc.insert("age", Value::I32(30));
        doc.insert("active", Value::Bool(true));
        doc.insert("score", Value::F32(1.5));
        doc.insert("address", Value::Object(inner));
        doc.insert("tags", Value::Array(ArrayValue::String(vec!["a".into(), "b".into()])));
        doc.insert("nothing", Value::Null);

        let bytes = write(&doc).unwrap();
        let back = reader::read(&bytes).unwrap();
        assert_eq!(back.get("age"), Some(&Value::I32(30)));
        assert_eq!(back.get("active"), Some(&Value::Bool(true)));
        assert_eq!(back.get("nothing"), Some(&Value::Null));
        assert_eq!(back.get("tags"), Some(&Value::Array(ArrayValue::String(vec!["a".into(), "b".into()]))));
        match back.get("address") {
            Some(Value::Object(a)) => assert_eq!(a.get("city"), Some(&Value::String("nyc".into()))),
            other => panic!("expected nested object, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_a_heterogeneous_object_array() {
        let mut a = Document::new();
        a.insert("id", Value::I64(1));
        a.insert("name", Value::String("x".into()));
        let mut b = Document::new();
        b.insert("id", Value::I64(2));

        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![a, b])));

        let bytes = write(&doc).unwrap();
        let back = reader::read(&bytes).unwrap();
        match back.get("items") {
            Some(Value::Array(ArrayValue::Object(docs))) => {
                assert_eq!(docs.len(), 2);
                assert_eq!(docs[0].get("id"), Some(&Value::I64(1)));
                assert_eq!(docs[0].get("name"), Some(&Value::String("x".into())));
                assert_eq!(docs[1].get("id"), Some(&Value::I64(2)));
                assert_eq!(docs[1].get("name"), None);
            }
            other => panic!("expected object array, got {other:?}"),
        }
    }

    #[test]
    fn rejects_array_valued_row_fields_in_an_object_array() {
        let mut row = Document::new();
        row.insert("tags", Value::Array(ArrayValue::String(vec!["x".into()])));
        let mut doc = Document::new();
        doc.insert("items", Value::Array(ArrayValue::Object(vec![row])));
        assert!(matches!(write(&doc), Err(Error::IllegalArgument(_))));
    }
}
