//! Database row structs.
//!
//! Each submodule contains a `FromRow` entity matching the table row and the
//! conversion into the matching core domain type.

pub mod reading;
