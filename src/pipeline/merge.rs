//! Join device records with institute metadata.
//!
//! The institute's geography and classification win over whatever the device
//! record carries; the record's own values are the fallback.

use serde::{Deserialize, Serialize};

use crate::extraction::institute::{InstituteDirectory, InstituteMetadata};
use crate::extraction::record::DeviceRecord;
use crate::geo::normalize::NameNormalizer;
use crate::logging::structured::LogContext;

/// Country placeholders that upstream sends instead of leaving the field out.
const UNKNOWN_COUNTRY_MARKERS: &[&str] = &["unknown", "null"];

/// Country assumed for records that only carry a 6-character pincode.
pub const DEFAULT_PINCODE_COUNTRY: &str = "India";

/// What happens to the country of records with no institute match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedCountryPolicy {
    /// Keep the record's own country verbatim.
    #[default]
    PassThrough,
    /// Apply the same inference and normalization as matched records.
    Normalize,
}

/// A device record after the institute join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub device: DeviceRecord,
    pub institute_matched: bool,
}

impl MergedRecord {
    /// Wrap a record that did not go through the institute join.
    pub fn unmatched(device: DeviceRecord) -> Self {
        Self {
            device,
            institute_matched: false,
        }
    }
}

/// Joins device records against an [`InstituteDirectory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordMerger {
    normalizer: NameNormalizer,
    unmatched: UnmatchedCountryPolicy,
}

impl RecordMerger {
    pub fn new(normalizer: NameNormalizer, unmatched: UnmatchedCountryPolicy) -> Self {
        Self {
            normalizer,
            unmatched,
        }
    }

    /// Merge every record. Order and cardinality are preserved.
    pub fn merge(
        &self,
        records: Vec<DeviceRecord>,
        directory: &InstituteDirectory,
        ctx: &LogContext,
    ) -> Vec<MergedRecord> {
        let total = records.len();
        let merged: Vec<MergedRecord> = records
            .into_iter()
            .map(|record| self.merge_one(record, directory))
            .collect();

        let matched = merged.iter().filter(|m| m.institute_matched).count();
        crate::log_info!(
            ctx,
            "MERGE_COMPLETE",
            records = total,
            matched = matched,
            unmatched = total - matched,
            directory_size = directory.len(),
        );

        merged
    }

    /// Merge a single record.
    pub fn merge_one(&self, record: DeviceRecord, directory: &InstituteDirectory) -> MergedRecord {
        let institute = record
            .institute_id
            .as_deref()
            .and_then(|id| directory.find(id));

        match institute {
            Some(meta) => MergedRecord {
                device: self.apply_institute(record, meta),
                institute_matched: true,
            },
            None => match self.unmatched {
                UnmatchedCountryPolicy::PassThrough => MergedRecord::unmatched(record),
                UnmatchedCountryPolicy::Normalize => {
                    let mut device = record;
                    device.country =
                        self.resolve_country(device.country.take(), device.pincode.as_deref());
                    MergedRecord::unmatched(device)
                }
            },
        }
    }

    fn apply_institute(&self, mut device: DeviceRecord, meta: &InstituteMetadata) -> DeviceRecord {
        if meta.name.is_some() {
            device.institute_name = meta.name.clone();
        }
        if meta.pincode.is_some() {
            device.pincode = meta.pincode.clone();
        }
        if meta.institution_type.is_some() {
            device.institute_type = meta.institution_type.clone();
        }

        let raw_country = meta.country.clone().or(device.country.take());
        device.country = self.resolve_country(raw_country, device.pincode.as_deref());
        device
    }

    fn resolve_country(&self, raw: Option<String>, pincode: Option<&str>) -> Option<String> {
        let inferred = infer_country(raw, pincode);
        self.normalizer.normalize_opt(inferred.as_deref())
    }
}

/// Default the country to India when it is missing or a placeholder and a
/// 6-character pincode is present.
pub fn infer_country(country: Option<String>, pincode: Option<&str>) -> Option<String> {
    if is_unknown_country(country.as_deref()) && has_six_char_pincode(pincode) {
        return Some(DEFAULT_PINCODE_COUNTRY.to_string());
    }
    country
}

/// Missing, blank, or one of the upstream placeholder strings.
pub fn is_unknown_country(country: Option<&str>) -> bool {
    match country.map(str::trim) {
        None | Some("") => true,
        Some(c) => UNKNOWN_COUNTRY_MARKERS
            .iter()
            .any(|marker| c.eq_ignore_ascii_case(marker)),
    }
}

fn has_six_char_pincode(pincode: Option<&str>) -> bool {
    pincode.is_some_and(|p| p.trim().chars().count() == 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::normalize::TitleCasePolicy;

    fn ctx() -> LogContext {
        LogContext::new("run-test")
    }

    fn directory() -> InstituteDirectory {
        let mut dir = InstituteDirectory::new();
        dir.insert(
            "inst-1",
            InstituteMetadata {
                name: Some("Sunrise Public School".to_string()),
                country: Some("IN".to_string()),
                pincode: Some("560001".to_string()),
                institution_type: Some("Primary School".to_string()),
            },
        );
        dir.insert(
            " inst-2",
            InstituteMetadata {
                name: None,
                country: Some("null".to_string()),
                pincode: None,
                institution_type: None,
            },
        );
        dir
    }

    fn record(id: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            institute_id: id.map(str::to_string),
            institute_name: Some("Device Side Name".to_string()),
            institute_type: Some("Coaching".to_string()),
            country: Some("united kingdom".to_string()),
            pincode: Some("110001".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_institute_values_win() {
        let merger = RecordMerger::default();
        let merged = merger.merge_one(record(Some("inst-1")), &directory());

        assert!(merged.institute_matched);
        let d = &merged.device;
        assert_eq!(d.institute_name.as_deref(), Some("Sunrise Public School"));
        assert_eq!(d.pincode.as_deref(), Some("560001"));
        assert_eq!(d.country.as_deref(), Some("India"));
        assert_eq!(d.institute_type.as_deref(), Some("Primary School"));
    }

    #[test]
    fn test_record_values_are_fallback() {
        let merger = RecordMerger::default();
        let merged = merger.merge_one(record(Some("inst-2")), &directory());

        assert!(merged.institute_matched);
        let d = &merged.device;
        assert_eq!(d.institute_name.as_deref(), Some("Device Side Name"));
        assert_eq!(d.pincode.as_deref(), Some("110001"));
        assert_eq!(d.institute_type.as_deref(), Some("Coaching"));
        // The institute's "null" placeholder shadows the record's country,
        // then the pincode heuristic replaces it.
        assert_eq!(d.country.as_deref(), Some("India"));
    }

    #[test]
    fn test_missing_country_with_pincode_becomes_india() {
        let merger = RecordMerger::default();
        let mut rec = record(Some("inst-2"));
        rec.country = None;
        let merged = merger.merge_one(rec, &InstituteDirectory::from_iter([(
            "inst-2".to_string(),
            InstituteMetadata::default(),
        )]));
        assert_eq!(merged.device.country.as_deref(), Some("India"));
    }

    #[test]
    fn test_unmatched_pass_through_is_verbatim() {
        let merger = RecordMerger::default();
        let original = record(Some("nope"));
        let merged = merger.merge_one(original.clone(), &directory());

        assert!(!merged.institute_matched);
        assert_eq!(merged.device, original);
        assert_eq!(merged.device.country.as_deref(), Some("united kingdom"));
    }

    #[test]
    fn test_unmatched_normalize_policy() {
        let merger = RecordMerger::new(
            NameNormalizer::new(TitleCasePolicy::ConnectorAware),
            UnmatchedCountryPolicy::Normalize,
        );
        let merged = merger.merge_one(record(None), &directory());
        assert_eq!(merged.device.country.as_deref(), Some("United Kingdom"));

        let mut rec = record(None);
        rec.country = Some("Unknown".to_string());
        let merged = merger.merge_one(rec, &directory());
        assert_eq!(merged.device.country.as_deref(), Some("India"));
    }

    #[test]
    fn test_merge_preserves_order_and_cardinality() {
        let merger = RecordMerger::default();
        let records = vec![record(Some("inst-1")), record(None), record(Some("inst-2"))];
        let merged = merger.merge(records, &directory(), &ctx());

        assert_eq!(merged.len(), 3);
        assert!(merged[0].institute_matched);
        assert!(!merged[1].institute_matched);
        assert!(merged[2].institute_matched);
    }

    #[test]
    fn test_is_unknown_country() {
        assert!(is_unknown_country(None));
        assert!(is_unknown_country(Some(" ")));
        assert!(is_unknown_country(Some("UNKNOWN")));
        assert!(is_unknown_country(Some("Null")));
        assert!(!is_unknown_country(Some("India")));
    }

    #[test]
    fn test_infer_country_requires_six_characters() {
        assert_eq!(infer_country(None, Some("11000")), None);
        assert_eq!(infer_country(None, Some("110001")).as_deref(), Some("India"));
        assert_eq!(
            infer_country(Some("Nepal".to_string()), Some("110001")).as_deref(),
            Some("Nepal")
        );
    }
}
