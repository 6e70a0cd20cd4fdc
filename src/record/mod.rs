//! Codecs for the two constructs every object record is built from: a
//! scalar/homogeneous-array property group ([`props`]) and a column-group
//! used to store arrays of objects columnarly ([`columns`]).

pub mod columns;
pub mod props;
