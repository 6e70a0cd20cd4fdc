//! The object-array/column-group construct: how an array of objects is
//! stored transposed (one column per `(key, value_type)` pair actually
//! observed across the array's elements) instead of as N separate row
//! records.
//!
//! Columns are keyed by `(key, value_type)` rather than just `key` so that
//! genuinely heterogeneous data — the same field holding an `I64` in one
//! element and a `String` in another — gets one column per observed type
//! instead of forcing a row-major fallback. A column is sparse: its
//! `positions` array lists exactly which array indices it covers, so not
//! every column needs an entry for every object.
//!
//! On disk: `ObjectArrayGroup{marker='O', num_entries:u8, keys[n]:u64,
//! column_group_offset[n]:u64}`, each offset reached lazily through
//! [`CollectionIter`]; `ColumnGroupHeader{marker='X', num_columns:u32,
//! num_objects:u32, object_id[num_objects]:u64, column_offset[num_columns]:
//! u64}` through [`ColumnGroupIter`]; `ColumnHeader{marker='x',
//! column_name:u64, value_type:u8, num_entries:u32, entry_offsets
//! [num_entries]:u64, positions[num_entries]:u32}` through [`ColumnIter`];
//! and one `Entry{num_values:u32, values[num_values]}` per covered position
//! through [`EntryIter`]. An `Object`-typed entry's values are nested object
//! headers chained through each header's own `next_object_or_nil` field,
//! walked by [`ObjectIter`].

use crate::error::{Error, Result};
use crate::ids::StringId;
use crate::layout::{self, ObjectHeader};
use crate::record::props::RawArray;
use crate::value::ValueType;

/// One observed column's decoded entry values: either a run of fixed-width
/// scalars, or the table offsets of a chain of nested objects.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryValues {
    Fixed(RawArray),
    Objects(Vec<u64>),
}

/// Lazily walks an object-array group's keys, yielding each key alongside a
/// [`ColumnGroupIter`] over its columns without parsing any column group
/// other than the one currently being asked for.
pub struct CollectionIter<'a> {
    table: &'a [u8],
    entries: std::vec::IntoIter<(StringId, u64)>,
}

impl<'a> CollectionIter<'a> {
    /// Open the object-array group at table-relative `offset`.
    pub fn open(table: &'a [u8], offset: u64) -> Result<Self> {
        let idx = layout::to_table_index(offset);
        let marker = layout::read_u8(table, idx)?;
        if marker != crate::format::MARKER_OBJECT_ARRAY_GROUP {
            return Err(Error::Corrupted { expected: crate::format::MARKER_OBJECT_ARRAY_GROUP, found: marker });
        }
        let num_entries = layout::read_u8(table, idx + 1)? as usize;
        let keys_at = idx + 2;
        let offsets_at = keys_at + num_entries * 8;
        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let key = StringId(layout::read_u64(table, keys_at + i * 8)?);
            let offset = layout::read_u64(table, offsets_at + i * 8)?;
            entries.push((key, offset));
        }
        Ok(CollectionIter { table, entries: entries.into_iter() })
    }
}

impl<'a> Iterator for CollectionIter<'a> {
    type Item = Result<(StringId, ColumnGroupIter<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, offset) = self.entries.next()?;
        Some(ColumnGroupIter::open(self.table, offset).map(|iter| (key, iter)))
    }
}

/// Lazily walks one object-array field's columns.
pub struct ColumnGroupIter<'a> {
    table: &'a [u8],
    num_objects: u32,
    object_id_offset: usize,
    columns: std::vec::IntoIter<u64>,
}

impl<'a> ColumnGroupIter<'a> {
    /// Open the column group at table-relative `offset`.
    pub fn open(table: &'a [u8], offset: u64) -> Result<Self> {
        let idx = layout::to_table_index(offset);
        let marker = layout::read_u8(table, idx)?;
        if marker != crate::format::MARKER_COLUMN_GROUP {
            return Err(Error::Corrupted { expected: crate::format::MARKER_COLUMN_GROUP, found: marker });
        }
        let num_columns = layout::read_u32(table, idx + 1)? as usize;
        let num_objects = layout::read_u32(table, idx + 5)?;
        let object_id_offset = idx + 9;
        let column_offsets_at = object_id_offset + num_objects as usize * 8;
        let mut columns = Vec::with_capacity(num_columns);
        for i in 0..num_columns {
            columns.push(layout::read_u64(table, column_offsets_at + i * 8)?);
        }
        Ok(ColumnGroupIter { table, num_objects, object_id_offset, columns: columns.into_iter() })
    }

    #[must_use]
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The synthetic object id assigned to array position `i`.
    pub fn object_id_at(&self, i: u32) -> Result<u64> {
        if i >= self.num_objects {
            return Err(Error::OutOfBounds { index: i as usize, len: self.num_objects as usize });
        }
        layout::read_u64(self.table, self.object_id_offset + i as usize * 8)
    }
}

impl<'a> Iterator for ColumnGroupIter<'a> {
    type Item = Result<ColumnIter<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.columns.next()?;
        Some(ColumnIter::open(self.table, offset))
    }
}

/// One column's header plus its sparse `(position, entry_offset)` pairs.
pub struct ColumnIter<'a> {
    table: &'a [u8],
    column_name: StringId,
    value_type: ValueType,
    entry_offsets: Vec<u64>,
    positions: Vec<u32>,
}

impl<'a> ColumnIter<'a> {
    /// Open the column header at table-relative `offset`.
    pub fn open(table: &'a [u8], offset: u64) -> Result<Self> {
        let idx = layout::to_table_index(offset);
        let marker = layout::read_u8(table, idx)?;
        if marker != crate::format::MARKER_COLUMN {
            return Err(Error::Corrupted { expected: crate::format::MARKER_COLUMN, found: marker });
        }
        let column_name = StringId(layout::read_u64(table, idx + 1)?);
        let value_type_marker = layout::read_u8(table, idx + 9)?;
        let (value_type, is_array) = ValueType::from_marker(value_type_marker)?;
        if is_array {
            return Err(Error::IllegalState("column value type marker must be scalar"));
        }
        let num_entries = layout::read_u32(table, idx + 10)? as usize;
        let entry_offsets_at = idx + 14;
        let positions_at = entry_offsets_at + num_entries * 8;
        let mut entry_offsets = Vec::with_capacity(num_entries);
        let mut positions = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            entry_offsets.push(layout::read_u64(table, entry_offsets_at + i * 8)?);
            positions.push(layout::read_u32(table, positions_at + i * 4)?);
        }
        Ok(ColumnIter { table, column_name, value_type, entry_offsets, positions })
    }

    #[must_use]
    pub fn column_name(&self) -> StringId {
        self.column_name
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entry_offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_offsets.is_empty()
    }

    /// Walk this column's sparse `(position, entry)` pairs, decoding one
    /// entry's values at a time.
    #[must_use]
    pub fn entries(&self) -> EntryIter<'a> {
        EntryIter {
            table: self.table,
            value_type: self.value_type,
            positions: self.positions.clone(),
            entry_offsets: self.entry_offsets.clone(),
            idx: 0,
        }
    }
}

/// Lazily decodes one column's entries, one at a time, in position order.
pub struct EntryIter<'a> {
    table: &'a [u8],
    value_type: ValueType,
    positions: Vec<u32>,
    entry_offsets: Vec<u64>,
    idx: usize,
}

impl<'a> Iterator for EntryIter<'a> {
    type Item = Result<(u32, EntryValues)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.positions.len() {
            return None;
        }
        let position = self.positions[self.idx];
        let offset = self.entry_offsets[self.idx];
        self.idx += 1;
        Some(read_entry(self.table, self.value_type, offset).map(|v| (position, v)))
    }
}

fn read_entry(table: &[u8], value_type: ValueType, offset: u64) -> Result<EntryValues> {
    let idx = layout::to_table_index(offset);
    let num_values = layout::read_u32(table, idx)? as usize;
    let values_at = idx + 4;
    if value_type == ValueType::Object {
        let mut offsets = Vec::with_capacity(num_values);
        let mut cur = layout::read_u64(table, values_at)?;
        for _ in 0..num_values {
            offsets.push(cur);
            let (header, _) = ObjectHeader::read_at(table, layout::to_table_index(cur))?;
            cur = header.next_object_or_nil;
        }
        return Ok(EntryValues::Objects(offsets));
    }
    let width = value_type.fixed_width().unwrap_or(0);
    let values = layout::read_bytes(table, values_at, num_values * width)?;
    Ok(EntryValues::Fixed(decode_fixed_run(value_type, values, num_values)?))
}

/// Decode `count` consecutive fixed-width values of `ty` starting at the
/// beginning of `values`, with no lengths block involved.
pub fn decode_fixed_run(ty: ValueType, values: &[u8], count: usize) -> Result<RawArray> {
    let width = ty.fixed_width().unwrap_or(0);
    Ok(match ty {
        ValueType::Null => RawArray::Null(count),
        ValueType::Bool => RawArray::Bool((0..count).map(|k| layout::read_u8(values, k * width).map(|b| b != 0)).collect::<Result<_>>()?),
        ValueType::I8 => RawArray::I8((0..count).map(|k| layout::read_u8(values, k * width).map(|b| b as i8)).collect::<Result<_>>()?),
        ValueType::I16 => RawArray::I16(
            (0..count).map(|k| Ok(i16::from_le_bytes(layout::read_bytes(values, k * width, 2)?.try_into().unwrap()))).collect::<Result<_>>()?,
        ),
        ValueType::I32 => RawArray::I32(
            (0..count).map(|k| Ok(i32::from_le_bytes(layout::read_bytes(values, k * width, 4)?.try_into().unwrap()))).collect::<Result<_>>()?,
        ),
        ValueType::I64 => RawArray::I64(
            (0..count).map(|k| Ok(i64::from_le_bytes(layout::read_bytes(values, k * width, 8)?.try_into().unwrap()))).collect::<Result<_>>()?,
        ),
        ValueType::U8 => RawArray::U8((0..count).map(|k| layout::read_u8(values, k * width)).collect::<Result<_>>()?),
        ValueType::U16 => RawArray::U16(
            (0..count).map(|k| Ok(u16::from_le_bytes(layout::read_bytes(values, k * width, 2)?.try_into().unwrap()))).collect::<Result<_>>()?,
        ),
        ValueType::U32 => RawArray::U32((0..count).map(|k| layout::read_u32(values, k * width)).collect::<Result<_>>()?),
        ValueType::U64 => RawArray::U64((0..count).map(|k| layout::read_u64(values, k * width)).collect::<Result<_>>()?),
        ValueType::F32 => RawArray::F32((0..count).map(|k| layout::read_f32(values, k * width)).collect::<Result<_>>()?),
        ValueType::String => {
            RawArray::StringId((0..count).map(|k| layout::read_u64(values, k * width).map(StringId)).collect::<Result<_>>()?)
        }
        ValueType::Object => unreachable!("object columns are decoded through read_entry's chain walk"),
    })
}

/// Walks a chain of nested object headers linked through `next_object_or_nil`.
pub struct ObjectIter<'a> {
    table: &'a [u8],
    next: Option<u64>,
}

impl<'a> ObjectIter<'a> {
    #[must_use]
    pub fn starting_at(table: &'a [u8], offset: u64) -> Self {
        ObjectIter { table, next: Some(offset) }
    }
}

impl<'a> Iterator for ObjectIter<'a> {
    type Item = Result<ObjectHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next?;
        let idx = layout::to_table_index(offset);
        match ObjectHeader::read_at(self.table, idx) {
            Ok((header, _)) => {
                self.next = if header.next_object_or_nil == 0 { None } else { Some(header.next_object_or_nil) };
                Some(Ok(header))
            }
            Err(e) => {
                self.next = None;
                Some(Err(e))
            }
        }
    }
}
