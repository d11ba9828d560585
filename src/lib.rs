//! Decoder for legacy Borland Paradox database artifacts: `.DB` tables,
//! `.MB` memo/blob stores, `.PX`/`.Xnn`/`.Ynn` indexes, `.TV` table-view
//! containers, and `.FAM` family manifests.
//!
//! The public entry points are [`facade::load`] and [`facade::load_bytes`];
//! everything else is exposed for callers who want to drive an individual
//! decoder directly (e.g. to decode bytes that didn't come from a file on
//! disk).

pub mod blob;
pub mod bytestream;
pub mod error;
pub mod facade;
pub mod family;
pub mod header;
pub mod index;
pub mod numeric;
pub mod strings;
pub mod table;
pub mod tableview;

pub use error::{ParadoxError, Result};
pub use facade::{load, load_bytes, File, ParadoxDetails, ParadoxFormat};
pub use table::{FieldValue, ParadoxRecord, ParadoxTable, ParadoxValue};
