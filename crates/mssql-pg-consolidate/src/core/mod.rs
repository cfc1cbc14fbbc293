//! Core types shared across the migration pipeline.

pub mod identifier;
pub mod schema;
pub mod value;

pub use schema::{Column, ForeignKey, Table};
pub use value::{coerce, CellValue};
