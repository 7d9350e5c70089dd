//! Geographic distribution of registered devices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::normalize::NameNormalizer;
use crate::geo::postal::{PostalLookup, Resolution};
use crate::pipeline::merge::{
    infer_country, is_unknown_country, MergedRecord, DEFAULT_PINCODE_COUNTRY,
};

/// Bucket name for records with no usable country or state.
pub const UNKNOWN_REGION: &str = "Unknown";

/// Which records feed the geographic breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoWindowPolicy {
    /// Every registered device, whatever the selected dates.
    #[default]
    AllTime,
    /// Only devices registered inside the selected window.
    SelectedWindow,
}

/// Device count and mean position for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityStats {
    pub count: usize,
    pub lat: f64,
    pub lng: f64,
    pub state: String,
}

impl CityStats {
    fn new(state: &str) -> Self {
        Self {
            count: 0,
            lat: 0.0,
            lng: 0.0,
            state: state.to_string(),
        }
    }

    /// Fold one more point into the running mean.
    fn add_point(&mut self, lat: f64, lng: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.lat += (lat - self.lat) / n;
        self.lng += (lng - self.lng) / n;
    }
}

/// Country, Indian state and city breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoStats {
    pub by_country: BTreeMap<String, usize>,
    pub by_indian_state: BTreeMap<String, usize>,
    pub by_city: BTreeMap<String, CityStats>,
}

impl GeoStats {
    pub fn total(&self) -> usize {
        self.by_country.values().sum()
    }
}

/// Buckets records by country, and Indian records by state and city.
#[derive(Debug, Clone, Copy)]
pub struct GeoAggregator<'a> {
    lookup: &'a PostalLookup,
    normalizer: NameNormalizer,
}

impl<'a> GeoAggregator<'a> {
    pub fn new(lookup: &'a PostalLookup, normalizer: NameNormalizer) -> Self {
        Self { lookup, normalizer }
    }

    /// Compute the breakdown. Records are not modified.
    pub fn aggregate<'r, I>(&self, records: I) -> GeoStats
    where
        I: IntoIterator<Item = &'r MergedRecord>,
    {
        let mut stats = GeoStats::default();

        for record in records {
            let device = &record.device;
            let pincode = device.pincode.as_deref().map(str::trim).filter(|p| !p.is_empty());

            let inferred = infer_country(device.country.clone(), pincode);
            let country = if is_unknown_country(inferred.as_deref()) {
                UNKNOWN_REGION.to_string()
            } else {
                self.normalizer
                    .normalize_opt(inferred.as_deref())
                    .unwrap_or_else(|| UNKNOWN_REGION.to_string())
            };
            let is_indian = country == DEFAULT_PINCODE_COUNTRY;
            *stats.by_country.entry(country).or_insert(0) += 1;

            let Some(pincode) = pincode.filter(|_| is_indian) else {
                continue;
            };

            match self.lookup.locate(pincode) {
                Resolution::Exact(entry) => {
                    let state = self.state_name(Some(&entry.state));
                    *stats.by_indian_state.entry(state.clone()).or_insert(0) += 1;
                    if !entry.city.trim().is_empty() {
                        stats
                            .by_city
                            .entry(entry.city.trim().to_string())
                            .or_insert_with(|| CityStats::new(&state))
                            .add_point(entry.lat, entry.lng);
                    }
                }
                other => {
                    let state = self.state_name(other.state());
                    *stats.by_indian_state.entry(state).or_insert(0) += 1;
                }
            }
        }

        stats
    }

    fn state_name(&self, raw: Option<&str>) -> String {
        self.normalizer
            .normalize_opt(raw)
            .unwrap_or_else(|| UNKNOWN_REGION.to_string())
    }
}
