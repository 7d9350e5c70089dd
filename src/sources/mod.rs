//! Upstream collaborators.
//!
//! The HTTP layer lives outside this crate. Each endpoint the dashboard
//! talks to is a trait returning the raw JSON envelope; decoding happens in
//! [`crate::extraction::envelope`]. Closures implement every trait, which
//! keeps in-memory wiring short.

use serde_json::Value;

use crate::error::{ActionError, SourceError};

/// Device record listing.
pub trait DeviceSource: Send + Sync {
    /// Fetch every device record known to the backend.
    fn fetch_devices(&self) -> Result<Value, SourceError>;
}

/// Institute metadata batch lookup.
pub trait InstituteLookup: Send + Sync {
    /// Fetch metadata for `ids`, keyed by institute ID.
    fn lookup(&self, ids: &[String]) -> Result<Value, SourceError>;
}

/// Linking/delinking counts for a date range.
pub trait LinkingStatsSource: Send + Sync {
    /// Bounds are inclusive epoch seconds.
    fn fetch_stats(&self, start_secs: f64, end_secs: f64) -> Result<Value, SourceError>;
}

/// Live active-device counts keyed by pincode or institute ID.
pub trait ActiveDeviceFeed: Send + Sync {
    fn fetch_active(&self) -> Result<Value, SourceError>;
}

/// Remote lock/unlock of a device by serial number.
pub trait LockAction: Send + Sync {
    fn set_lock(&self, serial: &str, locked: bool) -> Result<(), ActionError>;
}

impl<F> DeviceSource for F
where
    F: Fn() -> Result<Value, SourceError> + Send + Sync,
{
    fn fetch_devices(&self) -> Result<Value, SourceError> {
        self()
    }
}

impl<F> InstituteLookup for F
where
    F: Fn(&[String]) -> Result<Value, SourceError> + Send + Sync,
{
    fn lookup(&self, ids: &[String]) -> Result<Value, SourceError> {
        self(ids)
    }
}

impl<F> LinkingStatsSource for F
where
    F: Fn(f64, f64) -> Result<Value, SourceError> + Send + Sync,
{
    fn fetch_stats(&self, start_secs: f64, end_secs: f64) -> Result<Value, SourceError> {
        self(start_secs, end_secs)
    }
}

impl<F> LockAction for F
where
    F: Fn(&str, bool) -> Result<(), ActionError> + Send + Sync,
{
    fn set_lock(&self, serial: &str, locked: bool) -> Result<(), ActionError> {
        self(serial, locked)
    }
}

impl<F> ActiveDeviceFeed for F
where
    F: Fn() -> Result<Value, SourceError> + Send + Sync,
{
    fn fetch_active(&self) -> Result<Value, SourceError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closures_implement_sources() {
        let devices = || -> Result<Value, SourceError> { Ok(json!([{"_id": "a"}])) };
        assert_eq!(devices.fetch_devices().unwrap()[0]["_id"], "a");

        let lookup = |ids: &[String]| -> Result<Value, SourceError> {
            Ok(json!({"obj": {"count": ids.len()}}))
        };
        assert_eq!(lookup.lookup(&["x".to_string()]).unwrap()["obj"]["count"], 1);

        let stats = |start: f64, end: f64| -> Result<Value, SourceError> {
            Ok(json!({"span": end - start}))
        };
        assert_eq!(stats.fetch_stats(10.0, 25.0).unwrap()["span"], 15.0);

        let action = |serial: &str, _locked: bool| {
            if serial.is_empty() {
                Err(ActionError::UnknownDevice(serial.to_string()))
            } else {
                Ok(())
            }
        };
        assert!(action.set_lock("SN1", true).is_ok());
        assert!(action.set_lock("", true).is_err());
    }

    #[test]
    fn test_closure_active_feed() {
        let feed = || -> Result<Value, SourceError> { Err(SourceError::Status(503)) };
        assert!(matches!(feed.fetch_active(), Err(SourceError::Status(503))));
    }
}
