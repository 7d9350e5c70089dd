//! Structured logging with run context.
//!
//! Provides logging macros and utilities that include the run id (and the
//! device key, when a line concerns one record) in every log message.

pub mod structured;

pub use structured::*;
