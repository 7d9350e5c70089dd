//! Ingestion-boundary extraction.
//!
//! Coerces loosely typed upstream JSON into the typed records the rest of the
//! pipeline works on.

pub mod envelope;
pub mod institute;
pub mod json_path;
pub mod record;

pub use envelope::*;
pub use institute::*;
pub use json_path::*;
pub use record::*;
