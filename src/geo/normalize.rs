//! Country and state name normalization.

use serde::{Deserialize, Serialize};

/// Lowercase connector words kept lowercase after the first token.
pub const CONNECTOR_WORDS: &[&str] = &[
    "and", "of", "the", "in", "on", "at", "to", "for", "by", "with",
];

/// How free-text names are title-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleCasePolicy {
    /// "jammu and kashmir" -> "Jammu and Kashmir".
    #[default]
    ConnectorAware,
    /// Every token capitalized: "Jammu And Kashmir".
    Plain,
}

/// Canonicalizes country/state names into a stable display form.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameNormalizer {
    policy: TitleCasePolicy,
}

impl NameNormalizer {
    pub fn new(policy: TitleCasePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TitleCasePolicy {
        self.policy
    }

    /// Normalize a raw name. Empty input yields an empty string.
    pub fn normalize(&self, raw: &str) -> String {
        let words: Vec<&str> = raw.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        if let Some(canonical) = special_case(&words.join(" ")) {
            return canonical.to_string();
        }

        words
            .into_iter()
            .enumerate()
            .map(|(index, word)| {
                let lower = word.to_lowercase();
                if index > 0
                    && self.policy == TitleCasePolicy::ConnectorAware
                    && CONNECTOR_WORDS.contains(&lower.as_str())
                {
                    lower
                } else {
                    capitalize(&lower)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Normalize an optional name, mapping an empty result to `None`.
    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<String> {
        let normalized = self.normalize(raw.unwrap_or(""));
        (!normalized.is_empty()).then_some(normalized)
    }
}

/// Known abbreviations and long forms, matched case-insensitively.
fn special_case(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "IN" => Some("India"),
        "USA" | "US" | "UNITED STATES OF AMERICA" => Some("United States"),
        "UK" | "UNITED KINGDOM" => Some("United Kingdom"),
        "UAE" | "UNITED ARAB EMIRATES" => Some("United Arab Emirates"),
        _ => None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
