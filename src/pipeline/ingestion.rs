//! Dashboard orchestration.
//!
//! Load pass:
//! 1. Device records and the active-device feed (fetched concurrently)
//! 2. Test-device screening
//! 3. Institute batch lookup for device institutes and active-feed keys
//! 4. Institute join
//! 5. Active-device bucketing by pincode
//! 6. Swap the new dataset into the store
//!
//! Render pass: linking stats for the window, then metrics, geography and
//! active-device summary over a store snapshot. Rendering never refetches
//! device or institute data.

use std::collections::BTreeSet;
use std::fmt;
use std::thread;

use chrono::Utc;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::SourceError;
use crate::extraction::envelope::{
    decode_active_envelope, decode_device_envelope, decode_institute_envelope,
    decode_stats_envelope, DevicePayload,
};
use crate::extraction::institute::InstituteDirectory;
use crate::geo::active::{bucket_active_devices, ActiveDeviceSummary};
use crate::geo::aggregate::{GeoAggregator, GeoStats, GeoWindowPolicy};
use crate::geo::postal::{is_pincode, PostalLookup};
use crate::logging::structured::LogContext;
use crate::metrics::aggregate::{AggregatedMetrics, LinkingStats};
use crate::metrics::window::TimeWindow;
use crate::pipeline::screening::screen_test_devices;
use crate::sources::{
    ActiveDeviceFeed, DeviceSource, InstituteLookup, LinkingStatsSource, LockAction,
};
use crate::store::device_store::{Dataset, DeviceStore, LockActionResult};

use super::context::RunContext;

/// Which upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Devices,
    Institutes,
    ActiveDevices,
    LinkingStats,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Upstream::Devices => "devices",
            Upstream::Institutes => "institutes",
            Upstream::ActiveDevices => "active_devices",
            Upstream::LinkingStats => "linking_stats",
        };
        f.write_str(name)
    }
}

/// An upstream failure the pass recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamFailure {
    pub source: Upstream,
    pub message: String,
}

impl UpstreamFailure {
    fn new(source: Upstream, err: &SourceError) -> Self {
        Self {
            source,
            message: err.to_string(),
        }
    }
}

/// Summary of a load pass.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub run_id: String,
    pub fetched: usize,
    pub screened_out: usize,
    pub records: usize,
    pub institutes: usize,
    pub active_pincodes: usize,
    pub failures: Vec<UpstreamFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything the dashboard shows for one window.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub run_id: String,
    pub window: TimeWindow,
    pub metrics: AggregatedMetrics,
    pub geo: GeoStats,
    pub active: ActiveDeviceSummary,
    pub codes_generated_today: u64,
    pub failures: Vec<UpstreamFailure>,
}

/// Resident dashboard state plus the configuration it is computed with.
pub struct Dashboard {
    config: PipelineConfig,
    lookup: PostalLookup,
    store: DeviceStore,
}

impl Dashboard {
    pub fn new(config: PipelineConfig, lookup: PostalLookup) -> Self {
        Self {
            config,
            lookup,
            store: DeviceStore::default(),
        }
    }

    /// Build with the pincode table named by `config`.
    pub fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let lookup = config.postal_lookup()?;
        Ok(Self::new(config, lookup))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn lookup(&self) -> &PostalLookup {
        &self.lookup
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Fetch, join and store the dataset.
    ///
    /// Upstream failures are logged and reported; the pass carries on with
    /// whatever data it has.
    pub fn load(
        &self,
        devices: &dyn DeviceSource,
        institutes: &dyn InstituteLookup,
        active: &dyn ActiveDeviceFeed,
    ) -> LoadReport {
        let run = RunContext::new();
        let ctx = run.log_context();
        let mut failures = Vec::new();

        crate::log_info!(ctx, "LOAD_START");

        let (device_result, active_result) = thread::scope(|s| {
            let device_handle = s.spawn(|| {
                devices
                    .fetch_devices()
                    .and_then(|raw| decode_device_envelope(&raw))
            });
            let active_handle = s.spawn(|| {
                active
                    .fetch_active()
                    .and_then(|raw| decode_active_envelope(&raw))
            });
            (
                device_handle.join().unwrap_or_else(|_| Err(panicked(Upstream::Devices))),
                active_handle.join().unwrap_or_else(|_| Err(panicked(Upstream::ActiveDevices))),
            )
        });

        let payload = match device_result {
            Ok(payload) => payload,
            Err(e) => {
                crate::log_error!(ctx, "DEVICE_FETCH_FAILED", error = e.to_string());
                failures.push(UpstreamFailure::new(Upstream::Devices, &e));
                DevicePayload::default()
            }
        };

        let active_feed = match active_result {
            Ok(feed) => feed,
            Err(e) => {
                crate::log_warn!(ctx, "ACTIVE_FETCH_FAILED", error = e.to_string());
                failures.push(UpstreamFailure::new(Upstream::ActiveDevices, &e));
                Default::default()
            }
        };

        let fetched = payload.records.len();
        let (records, screened_out) = if self.config.exclude_test_devices {
            screen_test_devices(payload.records, &ctx)
        } else {
            (payload.records, 0)
        };

        // Active-feed keys that are pincodes need no lookup; device
        // institute IDs are always looked up, even when they are six digits.
        let active_institutes = active_feed
            .keys()
            .map(|key| key.trim())
            .filter(|key| !is_pincode(key));
        let ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.institute_id.as_deref())
            .map(str::trim)
            .chain(active_institutes)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let directory = self.lookup_institutes(institutes, &ids, &ctx, &mut failures);
        let merged = self.config.record_merger().merge(records, &directory, &ctx);
        let active_by_pincode = bucket_active_devices(&active_feed, &directory, &ctx);

        let report = LoadReport {
            run_id: run.run_id.clone(),
            fetched,
            screened_out,
            records: merged.len(),
            institutes: directory.len(),
            active_pincodes: active_by_pincode.len(),
            failures,
        };

        self.store.replace(Dataset {
            records: merged,
            institutes: directory,
            active_by_pincode,
            codes_generated_today: payload.codes_generated_today,
        });

        crate::log_info!(
            ctx,
            "LOAD_COMPLETE",
            fetched = report.fetched,
            screened_out = report.screened_out,
            records = report.records,
            institutes = report.institutes,
            failures = report.failures.len(),
        );
        report
    }

    fn lookup_institutes(
        &self,
        institutes: &dyn InstituteLookup,
        ids: &[String],
        ctx: &LogContext,
        failures: &mut Vec<UpstreamFailure>,
    ) -> InstituteDirectory {
        if ids.is_empty() {
            return InstituteDirectory::new();
        }

        match institutes.lookup(ids).and_then(|raw| decode_institute_envelope(&raw)) {
            Ok(directory) => {
                crate::log_debug!(
                    ctx,
                    "INSTITUTE_LOOKUP_COMPLETE",
                    requested = ids.len(),
                    found = directory.len(),
                );
                directory
            }
            Err(e) => {
                crate::log_warn!(
                    ctx,
                    "INSTITUTE_LOOKUP_FAILED",
                    requested = ids.len(),
                    error = e.to_string(),
                );
                failures.push(UpstreamFailure::new(Upstream::Institutes, &e));
                InstituteDirectory::new()
            }
        }
    }

    /// Compute everything shown for `window` from the resident dataset.
    pub fn render(&self, window: &TimeWindow, stats: &dyn LinkingStatsSource) -> DashboardSnapshot {
        let run = RunContext::new();
        let ctx = run.log_context();
        let mut failures = Vec::new();
        let dataset = self.store.snapshot();

        let (start, end) = window.bounds_epoch_secs();
        let fetched = stats
            .fetch_stats(start, end)
            .and_then(|raw| decode_stats_envelope(&raw));
        let linking = match fetched {
            Ok(linking) => linking,
            Err(e) => {
                crate::log_warn!(
                    ctx,
                    "STATS_FETCH_FAILED",
                    window = window.to_string(),
                    error = e.to_string(),
                );
                failures.push(UpstreamFailure::new(Upstream::LinkingStats, &e));
                LinkingStats::default()
            }
        };

        let aggregator = self.config.metrics_aggregator();
        let metrics = aggregator.aggregate(&dataset.records, window, linking);

        let geo_aggregator = GeoAggregator::new(&self.lookup, self.config.normalizer());
        let geo = match self.config.geo_window {
            GeoWindowPolicy::AllTime => {
                geo_aggregator.aggregate(aggregator.registered(&dataset.records))
            }
            GeoWindowPolicy::SelectedWindow => {
                geo_aggregator.aggregate(aggregator.registered_in_window(&dataset.records, window))
            }
        };

        let active = ActiveDeviceSummary::build(&dataset.active_by_pincode, &self.lookup);

        crate::log_info!(
            ctx,
            "RENDER_COMPLETE",
            window = window.to_string(),
            registered = metrics.registered,
            locked = metrics.locked,
            countries = geo.by_country.len(),
            failures = failures.len(),
        );

        DashboardSnapshot {
            run_id: run.run_id,
            window: *window,
            metrics,
            geo,
            active,
            codes_generated_today: dataset.codes_generated_today,
            failures,
        }
    }

    /// Lock or unlock a device and patch the resident dataset on success.
    pub fn toggle_lock(
        &self,
        action: &dyn LockAction,
        serial: &str,
        locked: bool,
    ) -> LockActionResult {
        let run = RunContext::new();
        let now_secs = Utc::now().timestamp_millis() as f64 / 1000.0;
        self.store
            .apply_lock_action(action, serial, locked, now_secs, &run.log_context())
    }
}

fn panicked(source: Upstream) -> SourceError {
    SourceError::Transport(format!("{} fetch panicked", source))
}
