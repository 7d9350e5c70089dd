//! IFPLens Core - device-onboarding dashboard pipeline
//!
//! Joins device records from the onboarding backend with institute metadata,
//! resolves Indian pincodes to state, city and coordinates, and computes the
//! time-windowed metrics and geographic breakdowns the dashboard shows. The
//! implementation prioritizes:
//!
//! 1. **Totality** - Malformed upstream data degrades to defaults, never errors
//! 2. **Logging** - Every pass logged with its run context
//! 3. **Explicit policy** - Every behavioral choice is a named, configurable enum
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Load/render orchestrator, institute join, screening
//! - `extraction` - Envelope decoding and record sanitization
//! - `geo` - Pincode lookup, name normalization, geographic breakdowns
//! - `metrics` - Time windows, org-type classification, metric aggregation
//! - `store` - Resident dataset and lock/unlock patching
//! - `sources` - Upstream collaborator traits
//! - `config` - Pipeline configuration
//! - `logging` - Structured logging with run context

pub mod config;
pub mod error;
pub mod extraction;
pub mod geo;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use config::PipelineConfig;
pub use error::{ActionError, SourceError, TableError};
pub use pipeline::ingestion::{Dashboard, DashboardSnapshot, LoadReport};

/// Initialize the process-wide logger.
///
/// `level` is a `log` level name; unknown names fall back to info. Calling
/// this more than once is harmless.
pub fn init_logger(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Info);
    let _ = env_logger::builder()
        .filter_level(filter)
        .format_timestamp_millis()
        .try_init();
}
