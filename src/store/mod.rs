//! In-memory device dataset shared between aggregation passes and the lock
//! action.

pub mod device_store;

pub use device_store::*;
