//! Property groups: the scalar and homogeneous-array slots of an object's
//! 26-slot schedule, plus the lazy, offset-addressed types a caller walks
//! them with ([`PropertyIter`], [`ValueVector`]) instead of materializing a
//! whole object up front.
//!
//! On disk every group is struct-of-arrays: `marker, count:u32, keys[count]:
//! u64`, then a second block whose shape depends on the group's kind —
//! fixed-width values, reserved-then-patched object offsets, or (for array
//! groups) a `lengths[count]:u32` block followed by the concatenated
//! element values. Storing keys and values in separate contiguous runs
//! (rather than interleaved `(key, value)` pairs) is what lets
//! [`ValueVector`] fetch a single key or a single value without walking
//! every entry ahead of it.
//!
//! Decoding here never resolves a [`StringId`] to text or recurses into a
//! nested object: [`RawValue`]/[`RawArray`] hand those back to the caller as
//! an id or a table offset, since only the caller (an [`crate::reader`]
//! archive, which owns the string table) can finish either job.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::ids::StringId;
use crate::layout::{self, ObjectHeader};
use crate::value::ValueType;

bitflags! {
    /// Filter applied while walking an object's property groups, mirroring
    /// the on-disk 16-bit mask a caller can pass to scope a scan down to a
    /// subset of types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyMask: u16 {
        const PRIMITIVES = 1 << 1;
        const ARRAYS = 1 << 2;
        const I8 = 1 << 3;
        const I16 = 1 << 4;
        const I32 = 1 << 5;
        const I64 = 1 << 6;
        const U8 = 1 << 7;
        const U16 = 1 << 8;
        const U32 = 1 << 9;
        const U64 = 1 << 10;
        const NUMBER = 1 << 11;
        const STRING = 1 << 12;
        const BOOLEAN = 1 << 13;
        const NULL = 1 << 14;
        const OBJECT = 1 << 15;

        const INTEGER = Self::I8.bits() | Self::I16.bits() | Self::I32.bits() | Self::I64.bits()
            | Self::U8.bits() | Self::U16.bits() | Self::U32.bits() | Self::U64.bits();
        const ANY = u16::MAX;
    }
}

impl PropertyMask {
    /// Whether this mask admits the given type/array-ness pair.
    #[must_use]
    pub fn admits(self, ty: ValueType, is_array: bool) -> bool {
        if is_array && !self.contains(PropertyMask::ARRAYS) {
            return false;
        }
        if !is_array && !self.contains(PropertyMask::PRIMITIVES) && ty != ValueType::Object {
            return false;
        }
        match ty {
            ValueType::Null => self.contains(PropertyMask::NULL),
            ValueType::Bool => self.contains(PropertyMask::BOOLEAN),
            ValueType::I8 => self.contains(PropertyMask::I8),
            ValueType::I16 => self.contains(PropertyMask::I16),
            ValueType::I32 => self.contains(PropertyMask::I32),
            ValueType::I64 => self.contains(PropertyMask::I64),
            ValueType::U8 => self.contains(PropertyMask::U8),
            ValueType::U16 => self.contains(PropertyMask::U16),
            ValueType::U32 => self.contains(PropertyMask::U32),
            ValueType::U64 => self.contains(PropertyMask::U64),
            ValueType::F32 => self.contains(PropertyMask::NUMBER),
            ValueType::String => self.contains(PropertyMask::STRING),
            ValueType::Object => self.contains(PropertyMask::OBJECT),
        }
    }
}

/// A scalar value as decoded straight off the wire: strings are still
/// [`StringId`]s, and an object value is still just the table offset its
/// header starts at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    StringId(StringId),
    ObjectOffset(u64),
}

/// A homogeneous array value as decoded straight off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawArray {
    Null(usize),
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    StringId(Vec<StringId>),
}

/// One parsed property group, addressed lazily: constructing it reads only
/// the group's own header and its SoA blocks (as borrowed slices), never the
/// values behind an `Object` group's offsets.
#[derive(Debug, Clone, Copy)]
pub enum ValueVector<'a> {
    Null { keys: &'a [u8] },
    Fixed { ty: ValueType, keys: &'a [u8], values: &'a [u8] },
    Object { keys: &'a [u8], value_offsets: &'a [u8] },
    NullArray { keys: &'a [u8], lengths: &'a [u8] },
    Array { ty: ValueType, keys: &'a [u8], lengths: &'a [u8], values: &'a [u8] },
}

impl<'a> ValueVector<'a> {
    fn keys(&self) -> &'a [u8] {
        match self {
            ValueVector::Null { keys }
            | ValueVector::Fixed { keys, .. }
            | ValueVector::Object { keys, .. }
            | ValueVector::NullArray { keys, .. }
            | ValueVector::Array { keys, .. } => keys,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys().len() / 8
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The key at index `i`, without touching any value.
    pub fn key_at(&self, i: usize) -> Result<StringId> {
        let keys = self.keys();
        if i * 8 >= keys.len() {
            return Err(Error::OutOfBounds { index: i, len: keys.len() / 8 });
        }
        Ok(StringId(layout::read_u64(keys, i * 8)?))
    }

    /// Decode the scalar value at index `i`. Returns an error for `Array`
    /// and `NullArray` groups (use [`ValueVector::array_at`] there instead).
    pub fn value_at(&self, i: usize) -> Result<RawValue> {
        if i >= self.len() {
            return Err(Error::OutOfBounds { index: i, len: self.len() });
        }
        match self {
            ValueVector::Null { .. } => Ok(RawValue::Null),
            ValueVector::Fixed { ty, values, .. } => decode_fixed(*ty, values, i),
            ValueVector::Object { value_offsets, .. } => {
                Ok(RawValue::ObjectOffset(layout::read_u64(value_offsets, i * 8)?))
            }
            ValueVector::NullArray { .. } | ValueVector::Array { .. } => {
                Err(Error::IllegalState("value_at called on an array-shaped group"))
            }
        }
    }

    /// Decode the array value at index `i`.
    pub fn array_at(&self, i: usize) -> Result<RawArray> {
        if i >= self.len() {
            return Err(Error::OutOfBounds { index: i, len: self.len() });
        }
        match self {
            ValueVector::NullArray { lengths, .. } => {
                let len = layout::read_u32(lengths, i * 4)? as usize;
                Ok(RawArray::Null(len))
            }
            ValueVector::Array { ty, lengths, values, .. } => decode_array(*ty, lengths, values, i),
            _ => Err(Error::IllegalState("array_at called on a scalar-shaped group")),
        }
    }
}

fn decode_fixed(ty: ValueType, values: &[u8], i: usize) -> Result<RawValue> {
    let width = ty.fixed_width().expect("fixed scalar group always has a fixed width");
    let at = i * width;
    Ok(match ty {
        ValueType::Bool => RawValue::Bool(layout::read_u8(values, at)? != 0),
        ValueType::I8 => RawValue::I8(layout::read_u8(values, at)? as i8),
        ValueType::I16 => RawValue::I16(i16::from_le_bytes(layout::read_bytes(values, at, 2)?.try_into().unwrap())),
        ValueType::I32 => RawValue::I32(i32::from_le_bytes(layout::read_bytes(values, at, 4)?.try_into().unwrap())),
        ValueType::I64 => RawValue::I64(i64::from_le_bytes(layout::read_bytes(values, at, 8)?.try_into().unwrap())),
        ValueType::U8 => RawValue::U8(layout::read_u8(values, at)?),
        ValueType::U16 => RawValue::U16(u16::from_le_bytes(layout::read_bytes(values, at, 2)?.try_into().unwrap())),
        ValueType::U32 => RawValue::U32(layout::read_u32(values, at)?),
        ValueType::U64 => RawValue::U64(layout::read_u64(values, at)?),
        ValueType::F32 => RawValue::F32(layout::read_f32(values, at)?),
        ValueType::String => RawValue::StringId(StringId(layout::read_u64(values, at)?)),
        ValueType::Null | ValueType::Object => unreachable!("handled by other ValueVector variants"),
    })
}

fn decode_array(ty: ValueType, lengths: &[u8], values: &[u8], i: usize) -> Result<RawArray> {
    let count = lengths.len() / 4;
    if i >= count {
        return Err(Error::OutOfBounds { index: i, len: count });
    }
    let mut start = 0usize;
    for j in 0..i {
        start += layout::read_u32(lengths, j * 4)? as usize;
    }
    let len = layout::read_u32(lengths, i * 4)? as usize;
    let width = ty.fixed_width().expect("fixed array group always has a fixed element width");
    Ok(match ty {
        ValueType::Bool => {
            RawArray::Bool((0..len).map(|k| layout::read_u8(values, (start + k) * width).map(|b| b != 0)).collect::<Result<_>>()?)
        }
        ValueType::I8 => {
            RawArray::I8((0..len).map(|k| layout::read_u8(values, (start + k) * width).map(|b| b as i8)).collect::<Result<_>>()?)
        }
        ValueType::I16 => RawArray::I16(
            (0..len)
                .map(|k| Ok(i16::from_le_bytes(layout::read_bytes(values, (start + k) * width, 2)?.try_into().unwrap())))
                .collect::<Result<_>>()?,
        ),
        ValueType::I32 => RawArray::I32(
            (0..len)
                .map(|k| Ok(i32::from_le_bytes(layout::read_bytes(values, (start + k) * width, 4)?.try_into().unwrap())))
                .collect::<Result<_>>()?,
        ),
        ValueType::I64 => RawArray::I64(
            (0..len)
                .map(|k| Ok(i64::from_le_bytes(layout::read_bytes(values, (start + k) * width, 8)?.try_into().unwrap())))
                .collect::<Result<_>>()?,
        ),
        ValueType::U8 => RawArray::U8((0..len).map(|k| layout::read_u8(values, (start + k) * width)).collect::<Result<_>>()?),
        ValueType::U16 => RawArray::U16(
            (0..len)
                .map(|k| Ok(u16::from_le_bytes(layout::read_bytes(values, (start + k) * width, 2)?.try_into().unwrap())))
                .collect::<Result<_>>()?,
        ),
        ValueType::U32 => RawArray::U32((0..len).map(|k| layout::read_u32(values, (start + k) * width)).collect::<Result<_>>()?),
        ValueType::U64 => RawArray::U64((0..len).map(|k| layout::read_u64(values, (start + k) * width)).collect::<Result<_>>()?),
        ValueType::F32 => RawArray::F32((0..len).map(|k| layout::read_f32(values, (start + k) * width)).collect::<Result<_>>()?),
        ValueType::String => RawArray::StringId(
            (0..len).map(|k| layout::read_u64(values, (start + k) * width).map(StringId)).collect::<Result<_>>()?,
        ),
        ValueType::Null | ValueType::Object => unreachable!("handled by other ValueVector variants"),
    })
}

/// Lazily walks one object's present property-group slots (`0..25`; slot
/// `25`, the object-array group, is addressed separately through
/// [`crate::record::columns`]), yielding each one's type and [`ValueVector`]
/// without decoding any other slot's payload.
pub struct PropertyIter<'a> {
    table: &'a [u8],
    slots: std::vec::IntoIter<(usize, u64)>,
    mask: PropertyMask,
}

impl<'a> PropertyIter<'a> {
    #[must_use]
    pub fn new(table: &'a [u8], header: &ObjectHeader, mask: PropertyMask) -> Self {
        let slots: Vec<_> = header.slot_offsets.iter().copied().filter(|(slot, _)| *slot < 25).collect();
        PropertyIter { table, slots: slots.into_iter(), mask }
    }
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = Result<(ValueType, bool, ValueVector<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (slot, offset) = self.slots.next()?;
            let (ty, is_array) = layout::slot_schedule(slot);
            if !self.mask.admits(ty, is_array) {
                continue;
            }
            return Some(parse_group(self.table, slot, offset));
        }
    }
}

fn parse_group(table: &[u8], slot: usize, offset: u64) -> Result<(ValueType, bool, ValueVector<'_>)> {
    let (ty, is_array) = layout::slot_schedule(slot);
    let idx = layout::to_table_index(offset);
    let marker = layout::read_u8(table, idx)?;
    let expected = if is_array { ty.array_marker().expect("non-object array slot") } else { ty.scalar_marker() };
    if marker != expected {
        return Err(Error::Corrupted { expected, found: marker });
    }
    let count = layout::read_u32(table, idx + 1)? as usize;
    let keys_at = idx + 5;
    let keys = layout::read_bytes(table, keys_at, count * 8)?;
    let after_keys = keys_at + count * 8;

    let vector = match (ty, is_array) {
        (ValueType::Null, false) => ValueVector::Null { keys },
        (ValueType::Object, false) => {
            let value_offsets = layout::read_bytes(table, after_keys, count * 8)?;
            ValueVector::Object { keys, value_offsets }
        }
        (_, false) => {
            let width = ty.fixed_width().expect("non-null, non-object scalar group has a fixed width");
            let values = layout::read_bytes(table, after_keys, count * width)?;
            ValueVector::Fixed { ty, keys, values }
        }
        (ValueType::Null, true) => {
            let lengths = layout::read_bytes(table, after_keys, count * 4)?;
            ValueVector::NullArray { keys, lengths }
        }
        (_, true) => {
            let lengths = layout::read_bytes(table, after_keys, count * 4)?;
            let after_lengths = after_keys + count * 4;
            let mut total = 0usize;
            for i in 0..count {
                total += layout::read_u32(lengths, i * 4)? as usize;
            }
            let width = ty.fixed_width().expect("non-null array element type has a fixed width");
            let values = layout::read_bytes(table, after_lengths, total * width)?;
            ValueVector::Array { ty, keys, lengths, values }
        }
    };
    Ok((ty, is_array, vector))
}
