//! CARBON: a read-optimized, self-describing binary archive format for
//! JSON-shaped documents.
//!
//! A [`model::Document`] is the in-memory value tree; [`writer::write`]
//! serializes one to the on-disk byte layout and [`reader::read`] (or
//! [`reader::open_bytes`]/[`reader::Archive::open`], when the string table
//! itself is wanted) parses it back. [`query::Query`] and
//! [`visitor::Visitor`] give read-side ways to scan an archive without
//! materializing the whole tree up front.

pub mod bitmap;
pub mod cache;
pub mod compressor;
pub mod error;
pub mod format;
pub mod huffman;
pub mod ids;
pub mod io_context;
pub mod layout;
pub mod mem;
pub mod model;
pub mod query;
pub mod reader;
pub mod record;
pub mod value;
pub mod visitor;
pub mod writer;

pub use self::cache::{LruCacheOptions, LruStringCache};
pub use self::error::{Error, Result};
pub use self::ids::{ObjectId, ObjectIdGen, StringId};
pub use self::io_context::IoContext;
pub use self::model::{ArrayValue, Document, Value};
pub use self::query::{Query, StridIter};
pub use self::reader::{Archive, open_bytes, read};
pub use self::value::ValueType;
pub use self::visitor::{CollectingVisitor, Policy, Visitor, walk};
pub use self::writer::{write, write_to_path};
