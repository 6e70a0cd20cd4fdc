use std::{error, fmt, io};

/// Flat error taxonomy for every fallible CARBON operation.
///
/// Kinds follow the four families used throughout this crate: resource
/// exhaustion, I/O, on-disk format violations and logic errors raised by a
/// caller misusing an API. Each variant carries whatever detail is needed to
/// reconstruct a useful message; nothing here transforms on propagation,
/// except where the call site explicitly re-contextualizes (e.g. a decode
/// failure discovered during a predicate scan becomes `DecompressFailed`).
#[derive(Debug)]
pub enum Error {
    /// A `MemBlock`/`Vec` allocation or resize failed.
    Alloc,
    /// A single-writer object id generator ran out of ids.
    ObjectIdsExhausted,

    /// Failed to open a file for reading.
    OpenForRead(io::Error),
    /// Failed to open a file for writing.
    OpenForWrite(io::Error),
    /// A read would run past the end of the backing buffer or file.
    ReadOutOfBounds { at: u64, requested: u64, len: u64 },
    /// A write was attempted on a read-only `MemFile`.
    WriteProtected,
    /// Generic I/O failure while streaming an archive to/from disk.
    Io(io::Error),

    /// The file magic did not match `"MP/CARBON"`, or the version is unknown.
    BadMagicOrVersion,
    /// A marker byte did not match what the reader expected at this offset.
    Corrupted { expected: u8, found: u8 },
    /// A type marker did not correspond to any known primitive type.
    NoType(u8),
    /// The string-table flags did not select a known compressor.
    NoCompressor(u8),
    /// The Huffman table has no code for the requested byte.
    HuffmanNoEntry(u8),
    /// Decoding a string out of the string table failed.
    DecompressFailed,

    /// An index was out of the bounds of a vector/slice/group.
    OutOfBounds { index: usize, len: usize },
    /// A caller-supplied argument was not acceptable.
    IllegalArgument(&'static str),
    /// An internal invariant was violated; indicates an implementation bug.
    IllegalState(&'static str),
    /// A lookup found nothing matching the given key.
    NotFound,
    /// A typed getter was called against a value of a different type.
    TypeMismatch { expected: &'static str, found: &'static str },

    /// The JSON front door (`model::Document::from_json_value`) failed to parse its input.
    #[cfg(feature = "json")]
    JsonParse(serde_json::Error),
    /// A predicate supplied to `Query::find_ids` returned an error.
    PredicateFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc => f.write_str("allocation failed"),
            Self::ObjectIdsExhausted => f.write_str("object id generator is out of ids"),
            Self::OpenForRead(e) => write!(f, "failed to open file for reading: {e}"),
            Self::OpenForWrite(e) => write!(f, "failed to open file for writing: {e}"),
            Self::ReadOutOfBounds { at, requested, len } => write!(
                f,
                "read of {requested} bytes at offset {at} exceeds buffer of length {len}"
            ),
            Self::WriteProtected => f.write_str("memfile is opened read-only"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::BadMagicOrVersion => f.write_str("bad archive magic or unsupported version"),
            Self::Corrupted { expected, found } => write!(
                f,
                "corrupted archive: expected marker {:?}, found {:?}",
                *expected as char, *found as char
            ),
            Self::NoType(marker) => write!(f, "no such type marker: {marker:#04x}"),
            Self::NoCompressor(flags) => write!(f, "no compressor for string table flags {flags:#04x}"),
            Self::HuffmanNoEntry(b) => write!(f, "no huffman code for byte {b:#04x}"),
            Self::DecompressFailed => f.write_str("failed to decode string from string table"),
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::IllegalArgument(msg) => write!(f, "illegal argument: {msg}"),
            Self::IllegalState(msg) => write!(f, "illegal internal state: {msg}"),
            Self::NotFound => f.write_str("not found"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            #[cfg(feature = "json")]
            Self::JsonParse(e) => write!(f, "json parse error: {e}"),
            Self::PredicateFailed => f.write_str("predicate evaluation failed"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::OpenForRead(e) | Self::OpenForWrite(e) | Self::Io(e) => Some(e),
            #[cfg(feature = "json")]
            Self::JsonParse(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::JsonParse(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
