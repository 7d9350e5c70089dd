//! Time-windowed dashboard metrics.
//!
//! - `window` - inclusive day-aligned date ranges and the ms/s heuristic
//! - `classify` - organization type rules
//! - `aggregate` - the metric snapshot

pub mod aggregate;
pub mod classify;
pub mod window;

pub use aggregate::*;
pub use classify::*;
pub use window::*;
