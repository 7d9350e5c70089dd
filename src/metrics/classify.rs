//! Organization type classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Organization category shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    School,
    Coaching,
    College,
    Corporate,
    Others,
}

impl OrgType {
    /// Display order.
    pub const ALL: [OrgType; 5] = [
        OrgType::School,
        OrgType::Coaching,
        OrgType::College,
        OrgType::Corporate,
        OrgType::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrgType::School => "school",
            OrgType::Coaching => "coaching",
            OrgType::College => "college",
            OrgType::Corporate => "corporate",
            OrgType::Others => "others",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrgType::School => "School",
            OrgType::Coaching => "Coaching/Tuition",
            OrgType::College => "College",
            OrgType::Corporate => "Corporate/Business",
            OrgType::Others => "Others",
        }
    }
}

impl fmt::Display for OrgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring rules, evaluated in order; the first rule with a matching
/// keyword wins. Note "others" maps to Corporate, not Others.
pub const ORG_TYPE_RULES: &[(OrgType, &[&str])] = &[
    (OrgType::School, &["school"]),
    (OrgType::Coaching, &["coaching", "tuition"]),
    (OrgType::College, &["college", "university"]),
    (
        OrgType::Corporate,
        &["personal", "home", "others", "corporate", "business"],
    ),
];

/// Classify a free-text institute type.
pub fn classify_org_type(raw: Option<&str>) -> OrgType {
    let lowered = raw.unwrap_or("").to_lowercase();
    ORG_TYPE_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(org_type, _)| *org_type)
        .unwrap_or(OrgType::Others)
}
