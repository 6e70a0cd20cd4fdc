//! On-disk constants: file magic, version, and structural marker bytes that
//! are not already covered by [`crate::value::ValueType`].

use bitflags::bitflags;

/// Magic bytes at offset 0 of every archive.
pub const MAGIC: [u8; 9] = *b"MP/CARBON";

/// Current on-disk format version written by this crate.
pub const VERSION: u8 = 1;

/// Marker opening an object record: `{object_id, flags, offsets..., next}`.
pub const MARKER_OBJECT_BEGIN: u8 = b'{';
/// Marker closing an object record.
pub const MARKER_OBJECT_END: u8 = b'}';

/// Marker opening the `RecordHeader` that precedes the root object (and,
/// recursively, nothing else — nested objects are reached through their
/// owning group's offsets, not through another `RecordHeader`).
pub const MARKER_RECORD_HEADER: u8 = b'r';

/// Marker opening the string table's header.
pub const MARKER_STRING_TABLE_HEADER: u8 = b'D';
/// Marker opening one string-table entry in the table's linked list.
pub const MARKER_STRING_ENTRY: u8 = b'-';
/// Marker preceding one Huffman dictionary entry (letter + prefix bits).
pub const MARKER_HUFFMAN_DICT_ENTRY: u8 = b'd';

/// Marker opening an object-array group (the heterogeneous column-group
/// construct; see [`crate::record::columns`]).
pub const MARKER_OBJECT_ARRAY_GROUP: u8 = b'O';
/// Marker opening one column group within an object-array group.
pub const MARKER_COLUMN_GROUP: u8 = b'X';
/// Marker opening one column within a column group.
pub const MARKER_COLUMN: u8 = b'x';

bitflags! {
    /// String-table compressor selector, stored as the flags byte of
    /// [`crate::layout::StringTableHeader`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompressorFlags: u8 {
        const NONE = 1 << 0;
        const HUFFMAN = 1 << 1;
    }
}

bitflags! {
    /// Flags byte of [`crate::layout::RecordHeader`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u8 {
        /// Set when the string dictionary backing this record was built in
        /// sorted order. Informational only; a reader doesn't need it.
        const IS_SORTED = 1 << 0;
    }
}

/// Number of slots in an object's property-group schedule: thirteen scalar
/// groups (one per [`crate::value::ValueType`]) followed by thirteen
/// array-shaped slots (twelve homogeneous primitive-array groups plus the
/// one object-array group, which has no scalar counterpart of its own).
pub const SCHEDULE_LEN: usize = 26;
