//! Live active-device counts by pincode.
//!
//! The feed is keyed either by pincode or by institute ID. Institute keys are
//! folded into their institute's pincode so the map has one bucket per code.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::extraction::institute::InstituteDirectory;
use crate::geo::aggregate::UNKNOWN_REGION;
use crate::geo::postal::{is_pincode, PostalLookup};
use crate::logging::structured::LogContext;

/// Fold a raw active-device feed into per-pincode counts.
///
/// Institute keys land under the institute's pincode as stored, even when it
/// is not six digits; such buckets count toward totals but get no map point.
/// Keys that are neither a pincode nor a known institute with a pincode are
/// logged and skipped.
pub fn bucket_active_devices(
    feed: &BTreeMap<String, u64>,
    directory: &InstituteDirectory,
    ctx: &LogContext,
) -> BTreeMap<String, u64> {
    let mut by_pincode: BTreeMap<String, u64> = BTreeMap::new();
    let mut skipped = 0usize;

    for (raw_key, count) in feed {
        let key = raw_key.trim();
        let pincode = if is_pincode(key) {
            Some(key.to_string())
        } else {
            directory
                .find(key)
                .and_then(|meta| meta.pincode.as_deref())
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
        };

        match pincode {
            Some(pincode) => *by_pincode.entry(pincode).or_insert(0) += count,
            None => {
                skipped += 1;
                crate::log_debug!(ctx, "ACTIVE_KEY_UNRESOLVED", key = key, count = count);
            }
        }
    }

    crate::log_info!(
        ctx,
        "ACTIVE_DEVICES_BUCKETED",
        keys = feed.len(),
        pincodes = by_pincode.len(),
        skipped = skipped,
    );
    by_pincode
}

/// A map marker for one pincode with live devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePoint {
    pub pincode: String,
    pub count: u64,
    pub lat: f64,
    pub lng: f64,
    pub state: String,
}

/// Active devices placed on the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveDeviceSummary {
    pub total: u64,
    /// Descending by count, ties by state name.
    pub state_totals: Vec<(String, u64)>,
    pub points: Vec<ActivePoint>,
}

impl ActiveDeviceSummary {
    /// Place bucketed counts using exact-table hits only. Pincodes missing
    /// from the table still count toward `total`.
    pub fn build(by_pincode: &BTreeMap<String, u64>, lookup: &PostalLookup) -> Self {
        let mut states: HashMap<String, u64> = HashMap::new();
        let mut points = Vec::new();

        for (pincode, count) in by_pincode {
            let Some(entry) = lookup.exact(pincode) else {
                continue;
            };
            let state = match entry.state.trim() {
                "" => UNKNOWN_REGION.to_string(),
                s => s.to_string(),
            };
            *states.entry(state.clone()).or_insert(0) += count;
            points.push(ActivePoint {
                pincode: pincode.clone(),
                count: *count,
                lat: entry.lat,
                lng: entry.lng,
                state,
            });
        }

        let mut state_totals: Vec<(String, u64)> = states.into_iter().collect();
        state_totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            total: by_pincode.values().sum(),
            state_totals,
            points,
        }
    }
}
