//! Pipeline orchestration module.
//!
//! Main dashboard pipeline that coordinates:
//! - Test-device screening
//! - Institute join
//! - Load and render passes over the resident dataset

pub mod context;
pub mod ingestion;
pub mod merge;
pub mod screening;

pub use context::*;
pub use ingestion::*;
pub use merge::*;
pub use screening::*;
