//! Institute metadata directory.
//!
//! Built from the batch lookup response and treated as immutable for the
//! duration of one aggregation pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::json_path::{first_of, value_to_text};

const INSTITUTION_TYPE_PATHS: &[&str] = &["institution_type", "institute_type"];

/// Canonical metadata for one institute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstituteMetadata {
    pub name: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub institution_type: Option<String>,
}

impl InstituteMetadata {
    /// Coerce one raw metadata object. Empty strings count as absent.
    pub fn from_value(raw: &Value) -> Self {
        Self {
            name: first_of(raw, &["name"], value_to_text),
            country: first_of(raw, &["country"], value_to_text),
            pincode: first_of(raw, &["pincode"], value_to_text),
            institution_type: first_of(raw, INSTITUTION_TYPE_PATHS, value_to_text),
        }
    }
}

/// Institute metadata keyed by institute identifier.
#[derive(Debug, Clone, Default)]
pub struct InstituteDirectory {
    entries: HashMap<String, InstituteMetadata>,
}

impl InstituteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw `{id: {...}}` mapping. Non-object values are skipped.
    pub fn from_value(raw: &Value) -> Self {
        let entries = raw
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(_, meta)| meta.is_object())
                    .map(|(id, meta)| (id.clone(), InstituteMetadata::from_value(meta)))
                    .collect()
            })
            .unwrap_or_default();
        Self { entries }
    }

    pub fn insert(&mut self, id: &str, meta: InstituteMetadata) {
        self.entries.insert(id.to_string(), meta);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an institute by identifier.
    ///
    /// Tries the trimmed key directly, then scans for a stored key that
    /// matches once trimmed (upstream keys may carry stray whitespace).
    pub fn find(&self, id: &str) -> Option<&InstituteMetadata> {
        let key = id.trim();
        if key.is_empty() {
            return None;
        }
        self.entries.get(key).or_else(|| {
            self.entries
                .iter()
                .find(|(stored, _)| stored.trim() == key)
                .map(|(_, meta)| meta)
        })
    }
}

impl FromIterator<(String, InstituteMetadata)> for InstituteDirectory {
    fn from_iter<I: IntoIterator<Item = (String, InstituteMetadata)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
