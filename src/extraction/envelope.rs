//! Upstream response envelopes.
//!
//! Every upstream endpoint wraps its payload as `{"status": .., "obj": ..}`.
//! The device endpoint has two observed shapes for `obj` (an object carrying
//! `data` plus `codes_generated_today`, or the bare list), and tests feed bare
//! arrays directly.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SourceError;
use crate::extraction::institute::InstituteDirectory;
use crate::extraction::json_path::{value_to_count, value_to_flag};
use crate::extraction::record::{sanitize_records, DeviceRecord};
use crate::metrics::aggregate::LinkingStats;

/// Decoded device endpoint payload.
#[derive(Debug, Clone, Default)]
pub struct DevicePayload {
    pub records: Vec<DeviceRecord>,
    pub codes_generated_today: u64,
}

/// Decode the device endpoint response.
pub fn decode_device_envelope(raw: &Value) -> Result<DevicePayload, SourceError> {
    if let Value::Array(items) = raw {
        return Ok(DevicePayload {
            records: sanitize_records(items),
            codes_generated_today: 0,
        });
    }

    match raw.get("obj") {
        Some(Value::Array(items)) => Ok(DevicePayload {
            records: sanitize_records(items),
            codes_generated_today: 0,
        }),
        Some(obj @ Value::Object(_)) => match obj.get("data") {
            Some(Value::Array(items)) => Ok(DevicePayload {
                records: sanitize_records(items),
                codes_generated_today: obj
                    .get("codes_generated_today")
                    .and_then(value_to_count)
                    .unwrap_or(0),
            }),
            _ => Err(SourceError::Envelope(
                "device payload has no data array".to_string(),
            )),
        },
        _ => Err(SourceError::Envelope(
            "device payload has no obj field".to_string(),
        )),
    }
}

/// Decode the institute batch lookup response.
pub fn decode_institute_envelope(raw: &Value) -> Result<InstituteDirectory, SourceError> {
    match raw.get("obj") {
        Some(obj @ Value::Object(_)) => Ok(InstituteDirectory::from_value(obj)),
        _ => Err(SourceError::Envelope(
            "institute payload has no obj mapping".to_string(),
        )),
    }
}

/// Decode the linking/delinking statistics response.
///
/// Each count that is missing or not a non-negative number reads as 0.
pub fn decode_stats_envelope(raw: &Value) -> Result<LinkingStats, SourceError> {
    let obj = successful_obj(raw, "stats")?;
    let count = |field: &str| obj.get(field).and_then(value_to_count).unwrap_or(0);
    Ok(LinkingStats {
        delinking_count: count("delinking_count"),
        linking_count: count("linking_count"),
    })
}

/// Decode the active-device feed: key (pincode or institute ID) -> live count.
///
/// Entries whose count is not a non-negative number are dropped.
pub fn decode_active_envelope(raw: &Value) -> Result<BTreeMap<String, u64>, SourceError> {
    let obj = successful_obj(raw, "active devices")?;
    let map = obj
        .as_object()
        .ok_or_else(|| SourceError::Envelope("active devices obj is not a mapping".to_string()))?;

    Ok(map
        .iter()
        .filter_map(|(key, count)| value_to_count(count).map(|c| (key.clone(), c)))
        .collect())
}

/// Return `obj` when the envelope reports success.
fn successful_obj<'a>(raw: &'a Value, what: &str) -> Result<&'a Value, SourceError> {
    let ok = raw.get("status").and_then(value_to_flag).unwrap_or(false);
    if !ok {
        return Err(SourceError::Envelope(format!("{} envelope status is not true", what)));
    }
    raw.get("obj")
        .filter(|obj| !obj.is_null())
        .ok_or_else(|| SourceError::Envelope(format!("{} envelope has no obj", what)))
}
