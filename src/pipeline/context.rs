//! Run context for load and render passes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Identity of one load or render pass.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: format!("run-{}", &Uuid::new_v4().simple().to_string()[..8]),
            started_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.run_id)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
