//! Test device screening.
//!
//! Devices whose serial number contains "test" (case-insensitive) are QA
//! hardware and are dropped before the merge.

use crate::extraction::record::DeviceRecord;
use crate::logging::structured::LogContext;

/// Check if a serial number marks a test device.
///
/// # Examples
/// ```
/// use ifplens_core::pipeline::screening::is_test_serial;
/// assert!(is_test_serial("IFP-TEST-0042"));
/// assert!(is_test_serial("latest-unit"));
/// assert!(!is_test_serial("SN100045"));
/// ```
pub fn is_test_serial(serial: &str) -> bool {
    serial.to_lowercase().contains("test")
}

/// Check if a record is a test device. Records without a serial are kept.
pub fn is_test_device(record: &DeviceRecord) -> bool {
    record.serial_number.as_deref().is_some_and(is_test_serial)
}

/// Drop test devices, returning the kept records and how many were dropped.
pub fn screen_test_devices(
    records: Vec<DeviceRecord>,
    ctx: &LogContext,
) -> (Vec<DeviceRecord>, usize) {
    let total = records.len();
    let kept: Vec<DeviceRecord> = records
        .into_iter()
        .filter(|record| {
            let test = is_test_device(record);
            if test {
                log::debug!(
                    "{} TEST_DEVICE_SCREENED serial={:?}",
                    ctx.with_device(record.log_label()),
                    record.serial_number
                );
            }
            !test
        })
        .collect();

    let dropped = total - kept.len();
    if dropped > 0 {
        log::info!("{} TEST_DEVICES_SCREENED dropped={} kept={}", ctx, dropped, kept.len());
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_serial(serial: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            serial_number: serial.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_serial() {
        assert!(is_test_serial("TEST123"));
        assert!(is_test_serial("sn-Test-9"));
        assert!(!is_test_serial("SN123"));
        assert!(!is_test_serial(""));
    }

    #[test]
    fn test_records_without_serial_are_kept() {
        assert!(!is_test_device(&with_serial(None)));
        assert!(is_test_device(&with_serial(Some("qa_TeSt"))));
    }

    #[test]
    fn test_screen_test_devices() {
        let ctx = LogContext::new("run-test");
        let records = vec![
            with_serial(Some("SN1")),
            with_serial(Some("TESTUNIT")),
            with_serial(None),
            with_serial(Some("sn-test-2")),
        ];

        let (kept, dropped) = screen_test_devices(records, &ctx);
        assert_eq!(dropped, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].serial_number.as_deref(), Some("SN1"));
        assert_eq!(kept[1].serial_number, None);
    }
}
