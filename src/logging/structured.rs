//! Structured logging utilities.
//!
//! Provides context-aware logging with run_id and device key included
//! in every log message.

use std::fmt;

/// Logging context for one load or render pass.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub device: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            device: None,
        }
    }

    pub fn with_device(&self, device: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            device: Some(device.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "[run={}] [device={}]", self.run_id, device),
            None => write!(f, "[run={}]", self.run_id),
        }
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*) $(, $value)*)
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::warn!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*) $(, $value)*)
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::error!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*) $(, $value)*)
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::debug!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*) $(, $value)*)
        );
    };
}
