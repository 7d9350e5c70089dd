//! Pincode resolution.
//!
//! Maps a 6-digit Indian pincode to state, city and coordinates. Three tiers:
//! the exact table, a two-digit prefix centroid (jittered so unresolved codes
//! sharing a prefix do not stack on one marker), and the country centroid.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Bundled exact table, in the `{pincode: {lat, lng, state, city}}` format
/// produced by the CSV conversion script.
const BUILTIN_TABLE: &str = include_str!("../../data/pincodes.json");

/// Total jitter span per axis; offsets fall in `[-JITTER_SPAN / 2, JITTER_SPAN / 2)`.
pub const JITTER_SPAN: f64 = 0.1;

/// Geographic centre of India, used when nothing better is known.
pub const COUNTRY_CENTROID: Coordinates = Coordinates {
    lat: 20.5937,
    lng: 78.9629,
};

/// State-level centroids keyed by the first two pincode digits.
const PREFIX_CENTROIDS: &[(&str, f64, f64, &str)] = &[
    ("11", 28.6139, 77.2090, "Delhi"),
    ("12", 29.0588, 76.0856, "Haryana"),
    ("13", 29.0588, 76.0856, "Haryana"),
    ("14", 30.7333, 76.7794, "Punjab"),
    ("15", 30.7333, 76.7794, "Punjab"),
    ("17", 31.1048, 77.1734, "Himachal Pradesh"),
    ("20", 26.8467, 80.9462, "Uttar Pradesh"),
    ("21", 26.8467, 80.9462, "Uttar Pradesh"),
    ("22", 26.8467, 80.9462, "Uttar Pradesh"),
    ("23", 26.8467, 80.9462, "Uttar Pradesh"),
    ("24", 26.8467, 80.9462, "Uttar Pradesh"),
    ("25", 26.8467, 80.9462, "Uttar Pradesh"),
    ("26", 26.8467, 80.9462, "Uttar Pradesh"),
    ("27", 26.8467, 80.9462, "Uttar Pradesh"),
    ("28", 26.8467, 80.9462, "Uttar Pradesh"),
    ("30", 26.9124, 75.7873, "Rajasthan"),
    ("40", 19.0760, 72.8777, "Maharashtra"),
    ("50", 17.3850, 78.4867, "Telangana"),
    ("56", 12.9716, 77.5946, "Karnataka"),
    ("60", 13.0827, 80.2707, "Tamil Nadu"),
    ("70", 22.5726, 88.3639, "West Bengal"),
];

lazy_static! {
    /// Exactly six ASCII digits.
    static ref PINCODE_PATTERN: Regex = Regex::new(r"^[0-9]{6}$").unwrap();
}

/// True when `s` (already trimmed) is a 6-digit pincode.
pub fn is_pincode(s: &str) -> bool {
    PINCODE_PATTERN.is_match(s)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One row of the exact table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalEntry {
    pub pincode: String,
    pub state: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
}

/// Table row as stored on disk; the pincode is the map key.
#[derive(Debug, Deserialize)]
struct TableRow {
    lat: f64,
    lng: f64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    city: String,
}

/// Whether the prefix tier attributes the prefix's nominal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixStatePolicy {
    /// Approximate hits stay "Unknown" for state attribution.
    #[default]
    Unknown,
    /// Approximate hits carry the nominal state of their prefix.
    Nominal,
}

/// Outcome of resolving a pincode.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Exact(PostalEntry),
    Approximate {
        lat: f64,
        lng: f64,
        state: Option<String>,
    },
    CountryCentroid {
        lat: f64,
        lng: f64,
    },
    Unresolved,
}

impl Resolution {
    /// Attributed state, if any.
    pub fn state(&self) -> Option<&str> {
        match self {
            Resolution::Exact(entry) => Some(entry.state.as_str()).filter(|s| !s.is_empty()),
            Resolution::Approximate { state, .. } => state.as_deref(),
            _ => None,
        }
    }

    /// City attribution exists only for exact hits.
    pub fn city(&self) -> Option<&str> {
        match self {
            Resolution::Exact(entry) => Some(entry.city.as_str()).filter(|c| !c.is_empty()),
            _ => None,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Resolution::Exact(entry) => Some(Coordinates {
                lat: entry.lat,
                lng: entry.lng,
            }),
            Resolution::Approximate { lat, lng, .. } | Resolution::CountryCentroid { lat, lng } => {
                Some(Coordinates { lat: *lat, lng: *lng })
            }
            Resolution::Unresolved => None,
        }
    }
}

/// Immutable pincode lookup, loaded once and passed by reference.
#[derive(Debug, Clone, Default)]
pub struct PostalLookup {
    exact: HashMap<String, PostalEntry>,
    prefix_state: PrefixStatePolicy,
}

impl PostalLookup {
    pub fn new(entries: impl IntoIterator<Item = PostalEntry>) -> Self {
        Self {
            exact: entries
                .into_iter()
                .map(|entry| (entry.pincode.clone(), entry))
                .collect(),
            prefix_state: PrefixStatePolicy::default(),
        }
    }

    pub fn with_prefix_state(mut self, policy: PrefixStatePolicy) -> Self {
        self.prefix_state = policy;
        self
    }

    /// Parse a `{pincode: {lat, lng, state, city}}` table.
    pub fn from_table_json(json: &str) -> Result<Self, TableError> {
        let rows: HashMap<String, TableRow> = serde_json::from_str(json)?;
        let mut entries = Vec::with_capacity(rows.len());

        for (pincode, row) in rows {
            let pincode = pincode.trim().to_string();
            if !is_pincode(&pincode) {
                return Err(TableError::InvalidPincode(pincode));
            }
            entries.push(PostalEntry {
                pincode,
                state: row.state.trim().to_string(),
                city: row.city.trim().to_string(),
                lat: row.lat,
                lng: row.lng,
            });
        }

        log::info!("PINCODE_TABLE_LOADED entries={}", entries.len());
        Ok(Self::new(entries))
    }

    /// Load a table file written by the conversion script.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(TableError::Io)
            .with_context(|| format!("reading pincode table {}", path.display()))?;
        Self::from_table_json(&json)
            .with_context(|| format!("parsing pincode table {}", path.display()))
    }

    /// The table bundled with the crate.
    pub fn builtin() -> Result<Self, TableError> {
        Self::from_table_json(BUILTIN_TABLE)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn prefix_state_policy(&self) -> PrefixStatePolicy {
        self.prefix_state
    }

    /// Exact-table entry for a pincode.
    pub fn exact(&self, pincode: &str) -> Option<&PostalEntry> {
        self.exact.get(pincode.trim())
    }

    /// Deterministic resolution: the approximate tier returns the bare
    /// prefix centroid.
    pub fn locate(&self, pincode: &str) -> Resolution {
        let code = pincode.trim();
        if !is_pincode(code) {
            return Resolution::Unresolved;
        }

        if let Some(entry) = self.exact.get(code) {
            return Resolution::Exact(entry.clone());
        }

        match prefix_centroid(&code[..2]) {
            Some((lat, lng, state)) => Resolution::Approximate {
                lat,
                lng,
                state: match self.prefix_state {
                    PrefixStatePolicy::Unknown => None,
                    PrefixStatePolicy::Nominal => Some(state.to_string()),
                },
            },
            None => Resolution::CountryCentroid {
                lat: COUNTRY_CENTROID.lat,
                lng: COUNTRY_CENTROID.lng,
            },
        }
    }

    /// Resolution for map markers: approximate hits are jittered using `rng`.
    pub fn resolve<R: Rng + ?Sized>(&self, pincode: &str, rng: &mut R) -> Resolution {
        match self.locate(pincode) {
            Resolution::Approximate { lat, lng, state } => Resolution::Approximate {
                lat: lat + jitter(rng),
                lng: lng + jitter(rng),
                state,
            },
            other => other,
        }
    }
}

fn prefix_centroid(prefix: &str) -> Option<(f64, f64, &'static str)> {
    PREFIX_CENTROIDS
        .iter()
        .find(|(p, ..)| *p == prefix)
        .map(|(_, lat, lng, state)| (*lat, *lng, *state))
}

fn jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    (rng.random::<f64>() - 0.5) * JITTER_SPAN
}
