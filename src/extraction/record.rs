//! Device record sanitization.
//!
//! Upstream device records are loosely typed: flags arrive as booleans or
//! strings, timestamps as seconds or milliseconds, geography at the top level
//! or under `institute_address`. Everything is coerced once here so the rest
//! of the pipeline works on a typed [`DeviceRecord`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::json_path::{
    first_of, resolve_json_path, value_is_true, value_to_epoch, value_to_flag, value_to_text,
};

const RECORD_ID_PATHS: &[&str] = &["_id"];
const DEVICE_ID_PATHS: &[&str] = &["unique_device_id", "uniqueDeviceId"];
const SERIAL_PATHS: &[&str] = &["device_serial_no", "serial_number", "serialNumber"];
const CREATED_AT_PATHS: &[&str] = &["c", "created_at", "createdAt"];
const UPDATED_AT_PATHS: &[&str] = &["u", "updated_at", "updatedAt"];
const DELETED_PATHS: &[&str] = &["deleted"];
const ONBOARDING_PATHS: &[&str] = &["onboarding_setup", "onboardingSetup"];
const LOCKED_PATHS: &[&str] = &["is_locked", "isLocked"];
const LOCKED_AT_PATHS: &[&str] = &["locked_at", "lockedAt"];
const INSTITUTE_ID_PATHS: &[&str] = &["institute_id", "instituteId"];
const INSTITUTE_NAME_PATHS: &[&str] = &["institute_name", "instituteName"];
const INSTITUTE_TYPE_PATHS: &[&str] = &["institute_type", "instituteType"];
const LINKING_SOURCE_PATHS: &[&str] = &["linking_source", "linkingSource"];
const COUNTRY_PATHS: &[&str] = &[
    "country",
    "institute_address.country",
    "instituteAddress.country",
];
const PINCODE_PATHS: &[&str] = &[
    "pincode",
    "institute_address.pincode",
    "instituteAddress.pincode",
];

/// Locations of the training flag. Any one of them being true marks the
/// device as needing a training ticket.
pub const TRAINING_FLAG_PATHS: &[&str] = &[
    "training_required",
    "trainingRequired",
    "meta.training_required",
    "meta.trainingRequired",
    "meta.is_training_required",
    "meta.isTrainingRequired",
];

/// Channel through which a device was linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkingSource {
    Ifp,
    AdminWeb,
    CustomerOnboardMobile,
    #[default]
    Other,
}

impl LinkingSource {
    /// Exact match on the upstream enum strings; anything else is `Other`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("IFP") => LinkingSource::Ifp,
            Some("ADMIN_WEB") => LinkingSource::AdminWeb,
            Some("CUSTOMER_ONBOARD_MOBILE") => LinkingSource::CustomerOnboardMobile,
            _ => LinkingSource::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkingSource::Ifp => "IFP",
            LinkingSource::AdminWeb => "ADMIN_WEB",
            LinkingSource::CustomerOnboardMobile => "CUSTOMER_ONBOARD_MOBILE",
            LinkingSource::Other => "other",
        }
    }
}

/// One onboarding/lifecycle event for a physical device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub record_id: Option<String>,
    pub device_id: Option<String>,
    pub serial_number: Option<String>,

    // Raw epoch numbers, seconds or milliseconds
    pub created_at: Option<f64>,
    pub updated_at: Option<f64>,

    pub deleted: bool,
    pub onboarding_setup: bool,
    pub is_locked: bool,
    pub locked_at: Option<f64>,

    pub institute_id: Option<String>,
    pub institute_name: Option<String>,
    pub institute_type: Option<String>,
    pub linking_source: LinkingSource,

    pub country: Option<String>,
    pub pincode: Option<String>,

    pub training_required: bool,
}

impl DeviceRecord {
    /// Key used to count distinct devices: `unique_device_id`, else `_id`.
    pub fn device_key(&self) -> Option<&str> {
        self.device_id.as_deref().or(self.record_id.as_deref())
    }

    /// Human-readable label for log lines.
    pub fn log_label(&self) -> &str {
        self.device_key()
            .or(self.serial_number.as_deref())
            .unwrap_or("unknown")
    }
}

/// Coerce one raw upstream record into a [`DeviceRecord`].
///
/// Never fails: missing or malformed fields fall back to absent/false.
pub fn sanitize_record(raw: &Value) -> DeviceRecord {
    let text = |paths: &[&str]| first_of(raw, paths, value_to_text);
    let epoch = |paths: &[&str]| first_of(raw, paths, value_to_epoch);
    let flag = |paths: &[&str]| first_of(raw, paths, value_to_flag).unwrap_or(false);

    DeviceRecord {
        record_id: text(RECORD_ID_PATHS),
        device_id: text(DEVICE_ID_PATHS),
        serial_number: text(SERIAL_PATHS),
        created_at: epoch(CREATED_AT_PATHS),
        updated_at: epoch(UPDATED_AT_PATHS),
        deleted: flag(DELETED_PATHS),
        onboarding_setup: flag(ONBOARDING_PATHS),
        is_locked: flag(LOCKED_PATHS),
        locked_at: epoch(LOCKED_AT_PATHS),
        institute_id: text(INSTITUTE_ID_PATHS),
        institute_name: text(INSTITUTE_NAME_PATHS),
        institute_type: text(INSTITUTE_TYPE_PATHS),
        linking_source: LinkingSource::from_raw(
            first_of(raw, LINKING_SOURCE_PATHS, Value::as_str),
        ),
        country: text(COUNTRY_PATHS),
        pincode: text(PINCODE_PATHS),
        training_required: training_flag(raw),
    }
}

/// OR across every training flag location.
fn training_flag(raw: &Value) -> bool {
    TRAINING_FLAG_PATHS
        .iter()
        .filter_map(|path| resolve_json_path(raw, path))
        .any(value_is_true)
}

/// Sanitize a list of raw records, skipping entries that are not JSON objects.
pub fn sanitize_records(raw: &[Value]) -> Vec<DeviceRecord> {
    raw.iter()
        .filter(|item| item.is_object())
        .map(sanitize_record)
        .collect()
}
