//! Windowed dashboard metrics.
//!
//! Recomputed from resident records on every date-range change. Delinked and
//! generated counts are not derived here: they come from the statistics
//! endpoint for the same window and are passed through.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::extraction::record::{DeviceRecord, LinkingSource};
use crate::metrics::classify::{classify_org_type, OrgType};
use crate::metrics::window::{MissingTimestampPolicy, TimeWindow};
use crate::pipeline::merge::MergedRecord;

/// Institutes with strictly more registered devices than this in the window
/// are high-volume.
pub const DEFAULT_HIGH_VOLUME_THRESHOLD: usize = 50;

/// Name shown for institutes whose records carry none.
pub const UNKNOWN_INSTITUTE_NAME: &str = "Unknown";

/// Linking/delinking counts for a window, as reported upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkingStats {
    #[serde(default)]
    pub delinking_count: u64,
    #[serde(default)]
    pub linking_count: u64,
}

/// Which records count as registered devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationRule {
    /// Every record not flagged deleted.
    #[default]
    NotDeleted,
    /// Not deleted and `onboarding_setup` completed.
    NotDeletedAndOnboarded,
}

impl RegistrationRule {
    pub fn is_registered(&self, device: &DeviceRecord) -> bool {
        match self {
            RegistrationRule::NotDeleted => !device.deleted,
            RegistrationRule::NotDeletedAndOnboarded => !device.deleted && device.onboarding_setup,
        }
    }
}

/// Whether a locked device must carry `locked_at` to be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockedTimestampPolicy {
    /// Only devices locked inside the window count.
    #[default]
    Required,
    /// Locked devices with no `locked_at` count in every window.
    Optional,
}

/// Per-institute device count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstituteCount {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// Device total and per-institute list for one organization type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgTypeBucket {
    pub org_type: OrgType,
    pub device_count: usize,
    pub institutes: Vec<InstituteCount>,
}

/// Buckets for every [`OrgType`], in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgTypeBreakdown {
    pub buckets: Vec<OrgTypeBucket>,
}

impl OrgTypeBreakdown {
    pub fn count(&self, org_type: OrgType) -> usize {
        self.bucket(org_type).map_or(0, |b| b.device_count)
    }

    pub fn institutes(&self, org_type: OrgType) -> &[InstituteCount] {
        self.bucket(org_type)
            .map(|b| b.institutes.as_slice())
            .unwrap_or(&[])
    }

    fn bucket(&self, org_type: OrgType) -> Option<&OrgTypeBucket> {
        self.buckets.iter().find(|b| b.org_type == org_type)
    }
}

impl Default for OrgTypeBreakdown {
    fn default() -> Self {
        Self {
            buckets: OrgType::ALL
                .iter()
                .map(|org_type| OrgTypeBucket {
                    org_type: *org_type,
                    device_count: 0,
                    institutes: Vec::new(),
                })
                .collect(),
        }
    }
}

/// Registered devices by linking channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub ifp: usize,
    pub web: usize,
    pub mobile: usize,
    pub other: usize,
}

impl SourceBreakdown {
    fn record(&mut self, source: LinkingSource) {
        match source {
            LinkingSource::Ifp => self.ifp += 1,
            LinkingSource::AdminWeb => self.web += 1,
            LinkingSource::CustomerOnboardMobile => self.mobile += 1,
            LinkingSource::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ifp + self.web + self.mobile + self.other
    }
}

/// Metric snapshot for one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub registered: usize,
    pub delinked: u64,
    pub generated: u64,
    pub unique_institutes: usize,
    pub high_volume_institutes: Vec<InstituteCount>,
    pub locked: usize,
    pub training_tickets: usize,
    pub org_types: OrgTypeBreakdown,
    pub by_source: SourceBreakdown,
}

/// Computes [`AggregatedMetrics`] from merged records.
#[derive(Debug, Clone, Copy)]
pub struct MetricsAggregator {
    pub registration: RegistrationRule,
    pub missing_timestamps: MissingTimestampPolicy,
    pub locked_timestamps: LockedTimestampPolicy,
    pub high_volume_threshold: usize,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self {
            registration: RegistrationRule::default(),
            missing_timestamps: MissingTimestampPolicy::default(),
            locked_timestamps: LockedTimestampPolicy::default(),
            high_volume_threshold: DEFAULT_HIGH_VOLUME_THRESHOLD,
        }
    }
}

impl MetricsAggregator {
    /// Registered records, regardless of window.
    pub fn registered<'a>(
        &self,
        records: &'a [MergedRecord],
    ) -> impl Iterator<Item = &'a MergedRecord> + 'a {
        let rule = self.registration;
        records
            .iter()
            .filter(move |record| rule.is_registered(&record.device))
    }

    /// Registered records created inside `window`.
    pub fn registered_in_window<'a>(
        &self,
        records: &'a [MergedRecord],
        window: &TimeWindow,
    ) -> Vec<&'a MergedRecord> {
        let missing = self.missing_timestamps;
        self.registered(records)
            .filter(|record| window.contains(record.device.created_at, missing))
            .collect()
    }

    /// Compute the metric snapshot for `window`.
    pub fn aggregate(
        &self,
        records: &[MergedRecord],
        window: &TimeWindow,
        stats: LinkingStats,
    ) -> AggregatedMetrics {
        let registered = self.registered_in_window(records, window);

        let mut by_source = SourceBreakdown::default();
        let mut institutes = InstituteTally::default();
        let mut org_tallies: HashMap<OrgType, (usize, InstituteTally)> = HashMap::new();
        let mut training_tickets = 0;

        for record in &registered {
            let device = &record.device;
            by_source.record(device.linking_source);
            institutes.add(device);

            if device.training_required {
                training_tickets += 1;
            }

            let org_type = classify_org_type(device.institute_type.as_deref());
            let (count, tally) = org_tallies.entry(org_type).or_default();
            *count += 1;
            tally.add(device);
        }

        let org_types = OrgTypeBreakdown {
            buckets: OrgType::ALL
                .iter()
                .map(|org_type| {
                    let (device_count, tally) = org_tallies.remove(org_type).unwrap_or_default();
                    OrgTypeBucket {
                        org_type: *org_type,
                        device_count,
                        institutes: tally.into_sorted(),
                    }
                })
                .collect(),
        };

        let unique_institutes = institutes.len();
        let threshold = self.high_volume_threshold;
        let high_volume_institutes = institutes
            .into_sorted()
            .into_iter()
            .filter(|inst| inst.count > threshold)
            .collect();

        AggregatedMetrics {
            registered: registered.len(),
            delinked: stats.delinking_count,
            generated: stats.linking_count,
            unique_institutes,
            high_volume_institutes,
            locked: self.count_locked(records, window),
            training_tickets,
            org_types,
            by_source,
        }
    }

    /// Distinct locked devices whose lock falls inside `window`.
    ///
    /// Looks at every record, not only registered ones. Records with no
    /// device key cannot be deduplicated and are skipped.
    pub fn count_locked(&self, records: &[MergedRecord], window: &TimeWindow) -> usize {
        let missing = match self.locked_timestamps {
            LockedTimestampPolicy::Required => MissingTimestampPolicy::Exclude,
            LockedTimestampPolicy::Optional => MissingTimestampPolicy::Include,
        };

        records
            .iter()
            .map(|record| &record.device)
            .filter(|device| device.is_locked && window.contains(device.locked_at, missing))
            .filter_map(DeviceRecord::device_key)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Per-institute counts, keyed by institute ID.
#[derive(Debug, Default)]
struct InstituteTally {
    by_id: HashMap<String, InstituteCount>,
}

impl InstituteTally {
    /// Count a device against its institute. Devices without an institute
    /// ID are ignored.
    fn add(&mut self, device: &DeviceRecord) {
        let Some(id) = device.institute_id.as_deref() else {
            return;
        };
        self.by_id
            .entry(id.to_string())
            .or_insert_with(|| InstituteCount {
                id: id.to_string(),
                name: device
                    .institute_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_INSTITUTE_NAME.to_string()),
                count: 0,
            })
            .count += 1;
    }

    fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Descending by count, ties broken by ID.
    fn into_sorted(self) -> Vec<InstituteCount> {
        let mut list: Vec<InstituteCount> = self.by_id.into_values().collect();
        list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2023-11-14T22:13:20Z
    const INSIDE: f64 = 1_700_000_000.0;
    // 2023-10-01T00:00:00Z
    const OUTSIDE: f64 = 1_696_118_400.0;

    fn window() -> TimeWindow {
        TimeWindow::from_dates(
            NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 30).unwrap(),
        )
    }

    fn device(institute: Option<&str>, created_at: Option<f64>) -> DeviceRecord {
        DeviceRecord {
            institute_id: institute.map(str::to_string),
            institute_name: institute.map(|id| format!("Institute {}", id)),
            created_at,
            ..Default::default()
        }
    }

    fn merged(devices: Vec<DeviceRecord>) -> Vec<MergedRecord> {
        devices.into_iter().map(MergedRecord::unmatched).collect()
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let metrics =
            MetricsAggregator::default().aggregate(&[], &window(), LinkingStats::default());
        assert_eq!(metrics, AggregatedMetrics::default());
        assert_eq!(metrics.org_types.count(OrgType::School), 0);
        assert!(metrics.org_types.institutes(OrgType::Others).is_empty());
        assert_eq!(metrics.by_source.total(), 0);
    }

    #[test]
    fn test_stats_pass_through() {
        let stats = LinkingStats {
            delinking_count: 3,
            linking_count: 11,
        };
        let metrics = MetricsAggregator::default().aggregate(&[], &window(), stats);
        assert_eq!(metrics.delinked, 3);
        assert_eq!(metrics.generated, 11);
    }

    #[test]
    fn test_registration_rules() {
        let mut onboarded = device(Some("A"), Some(INSIDE));
        onboarded.onboarding_setup = true;
        let plain = device(Some("A"), Some(INSIDE));
        let mut deleted = device(Some("A"), Some(INSIDE));
        deleted.deleted = true;
        let records = merged(vec![onboarded, plain, deleted]);

        let loose = MetricsAggregator::default();
        assert_eq!(loose.aggregate(&records, &window(), LinkingStats::default()).registered, 2);

        let strict = MetricsAggregator {
            registration: RegistrationRule::NotDeletedAndOnboarded,
            ..Default::default()
        };
        assert_eq!(strict.aggregate(&records, &window(), LinkingStats::default()).registered, 1);
    }

    #[test]
    fn test_missing_created_at_policy() {
        let records = merged(vec![device(Some("A"), None), device(Some("B"), Some(OUTSIDE))]);

        let permissive = MetricsAggregator::default();
        assert_eq!(permissive.registered_in_window(&records, &window()).len(), 1);

        let strict = MetricsAggregator {
            missing_timestamps: MissingTimestampPolicy::Exclude,
            ..Default::default()
        };
        assert!(strict.registered_in_window(&records, &window()).is_empty());
    }

    #[test]
    fn test_high_volume_threshold_is_strict() {
        let mut devices: Vec<DeviceRecord> = (0..50)
            .map(|_| device(Some("EXACT50"), Some(INSIDE)))
            .collect();
        devices.extend((0..51).map(|_| device(Some("BIG1"), Some(INSIDE))));
        devices.extend((0..60).map(|_| device(Some("BIG2"), Some(INSIDE))));

        let metrics = MetricsAggregator::default().aggregate(
            &merged(devices),
            &window(),
            LinkingStats::default(),
        );
        assert_eq!(metrics.unique_institutes, 3);
        let ids: Vec<&str> = metrics.high_volume_institutes.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["BIG2", "BIG1"]);
        assert_eq!(metrics.high_volume_institutes[1].count, 51);
        assert_eq!(metrics.high_volume_institutes[1].name, "Institute BIG1");
    }

    #[test]
    fn test_locked_count_is_distinct_and_windowed() {
        let locked = |id: &str, at: Option<f64>, flag: bool| DeviceRecord {
            device_id: Some(id.to_string()),
            is_locked: flag,
            locked_at: at,
            deleted: true,
            ..Default::default()
        };
        let records = merged(vec![
            locked("d1", Some(INSIDE), true),
            locked("d1", Some(INSIDE * 1000.0), true),
            locked("d2", Some(OUTSIDE), true),
            locked("d3", None, true),
            locked("d4", Some(INSIDE), false),
            DeviceRecord {
                is_locked: true,
                locked_at: Some(INSIDE),
                ..Default::default()
            },
        ]);

        let strict = MetricsAggregator::default();
        assert_eq!(strict.count_locked(&records, &window()), 1);

        let optional = MetricsAggregator {
            locked_timestamps: LockedTimestampPolicy::Optional,
            ..Default::default()
        };
        assert_eq!(optional.count_locked(&records, &window()), 2);
    }

    #[test]
    fn test_training_and_source_breakdown() {
        let mut a = device(Some("A"), Some(INSIDE));
        a.training_required = true;
        a.linking_source = LinkingSource::Ifp;
        let mut b = device(Some("A"), Some(INSIDE));
        b.linking_source = LinkingSource::AdminWeb;
        let mut c = device(None, Some(INSIDE));
        c.linking_source = LinkingSource::CustomerOnboardMobile;
        c.training_required = true;
        let mut d = device(None, Some(OUTSIDE));
        d.training_required = true;

        let metrics = MetricsAggregator::default().aggregate(
            &merged(vec![a, b, c, d]),
            &window(),
            LinkingStats::default(),
        );
        assert_eq!(metrics.training_tickets, 2);
        assert_eq!(
            metrics.by_source,
            SourceBreakdown {
                ifp: 1,
                web: 1,
                mobile: 1,
                other: 0
            }
        );
    }

    #[test]
    fn test_org_type_breakdown() {
        let typed = |id: Option<&str>, kind: &str| DeviceRecord {
            institute_type: Some(kind.to_string()),
            ..device(id, Some(INSIDE))
        };
        let records = merged(vec![
            typed(Some("S1"), "Primary School"),
            typed(Some("S1"), "Primary School"),
            typed(Some("S2"), "High School"),
            typed(None, "school"),
            typed(Some("C1"), "Coaching Center"),
            typed(Some("X1"), "Government Office"),
        ]);

        let metrics =
            MetricsAggregator::default().aggregate(&records, &window(), LinkingStats::default());
        let org = &metrics.org_types;
        assert_eq!(org.count(OrgType::School), 4);
        assert_eq!(org.count(OrgType::Coaching), 1);
        assert_eq!(org.count(OrgType::Others), 1);
        assert_eq!(org.count(OrgType::College), 0);

        let schools = org.institutes(OrgType::School);
        assert_eq!(schools.len(), 2);
        assert_eq!(schools[0].id, "S1");
        assert_eq!(schools[0].count, 2);
        assert_eq!(org.buckets.len(), OrgType::ALL.len());
    }
}
