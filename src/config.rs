//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration. `IFPLENS_*` environment variables override the file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::geo::aggregate::GeoWindowPolicy;
use crate::geo::normalize::{NameNormalizer, TitleCasePolicy};
use crate::geo::postal::{PostalLookup, PrefixStatePolicy};
use crate::metrics::aggregate::{
    LockedTimestampPolicy, MetricsAggregator, RegistrationRule, DEFAULT_HIGH_VOLUME_THRESHOLD,
};
use crate::metrics::window::MissingTimestampPolicy;
use crate::pipeline::merge::{RecordMerger, UnmatchedCountryPolicy};

pub const ENV_LOG_LEVEL: &str = "IFPLENS_LOG_LEVEL";
pub const ENV_HIGH_VOLUME_THRESHOLD: &str = "IFPLENS_HIGH_VOLUME_THRESHOLD";
pub const ENV_EXCLUDE_TEST_DEVICES: &str = "IFPLENS_EXCLUDE_TEST_DEVICES";
pub const ENV_GEO_WINDOW: &str = "IFPLENS_GEO_WINDOW";

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Knobs for one dashboard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Logging verbosity (error, warn, info, debug, trace). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Institutes above this many devices in the window are high-volume. Default: 50.
    #[serde(default = "default_high_volume_threshold")]
    pub high_volume_threshold: usize,

    /// Drop devices whose serial contains "test". Default: true.
    #[serde(default = "default_true")]
    pub exclude_test_devices: bool,

    #[serde(default)]
    pub registration_rule: RegistrationRule,

    #[serde(default)]
    pub missing_timestamps: MissingTimestampPolicy,

    #[serde(default)]
    pub locked_timestamps: LockedTimestampPolicy,

    #[serde(default)]
    pub unmatched_country: UnmatchedCountryPolicy,

    #[serde(default)]
    pub title_case: TitleCasePolicy,

    #[serde(default)]
    pub prefix_state: PrefixStatePolicy,

    #[serde(default)]
    pub geo_window: GeoWindowPolicy,

    /// Exact pincode table to use instead of the bundled one.
    #[serde(default)]
    pub pincode_table: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            high_volume_threshold: default_high_volume_threshold(),
            exclude_test_devices: true,
            registration_rule: RegistrationRule::default(),
            missing_timestamps: MissingTimestampPolicy::default(),
            locked_timestamps: LockedTimestampPolicy::default(),
            unmatched_country: UnmatchedCountryPolicy::default(),
            title_case: TitleCasePolicy::default(),
            prefix_state: PrefixStatePolicy::default(),
            geo_window: GeoWindowPolicy::default(),
            pincode_table: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_json_str(&data)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Apply `IFPLENS_*` overrides read through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.log_level = level.trim().to_lowercase();
        }
        if let Some(raw) = var(ENV_HIGH_VOLUME_THRESHOLD) {
            self.high_volume_threshold = raw
                .trim()
                .parse()
                .with_context(|| {
                    format!(
                        "{} must be a non-negative integer, got {:?}",
                        ENV_HIGH_VOLUME_THRESHOLD, raw
                    )
                })?;
        }
        if let Some(raw) = var(ENV_EXCLUDE_TEST_DEVICES) {
            self.exclude_test_devices = parse_bool(&raw)
                .with_context(|| {
                    format!(
                        "{} must be true or false, got {:?}",
                        ENV_EXCLUDE_TEST_DEVICES, raw
                    )
                })?;
        }
        if let Some(raw) = var(ENV_GEO_WINDOW) {
            self.geo_window = parse_policy(&raw)
                .with_context(|| {
                    format!("{} must be all_time or selected_window", ENV_GEO_WINDOW)
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("log_level must be one of {:?}, got {:?}", LOG_LEVELS, self.log_level);
        }
        Ok(())
    }

    pub fn normalizer(&self) -> NameNormalizer {
        NameNormalizer::new(self.title_case)
    }

    pub fn record_merger(&self) -> RecordMerger {
        RecordMerger::new(self.normalizer(), self.unmatched_country)
    }

    pub fn metrics_aggregator(&self) -> MetricsAggregator {
        MetricsAggregator {
            registration: self.registration_rule,
            missing_timestamps: self.missing_timestamps,
            locked_timestamps: self.locked_timestamps,
            high_volume_threshold: self.high_volume_threshold,
        }
    }

    /// The configured pincode table, or the bundled one.
    pub fn postal_lookup(&self) -> Result<PostalLookup> {
        let lookup = match &self.pincode_table {
            Some(path) => PostalLookup::from_path(path)?,
            None => PostalLookup::builtin().context("loading bundled pincode table")?,
        };
        Ok(lookup.with_prefix_state(self.prefix_state))
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => bail!("not a boolean: {:?}", other),
    }
}

/// Parse a snake_case policy name through its serde representation.
fn parse_policy<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        raw.trim().to_lowercase(),
    ))?)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_high_volume_threshold() -> usize {
    DEFAULT_HIGH_VOLUME_THRESHOLD
}

fn default_true() -> bool {
    true
}
