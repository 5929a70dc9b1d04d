//! Global configuration types for Dossier.
//!
//! `DossierConfig` represents the top-level `config.toml` that controls the
//! trusted frame origin, autosave and save timing, the draft namespace, the
//! submission endpoint and the ordered list of questionnaire sections.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::section::{SectionEntry, SectionKey};

/// Top-level configuration. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierConfig {
    /// Origin every cross-frame message must come from.
    #[serde(default = "default_expected_origin")]
    pub expected_origin: String,

    /// Quiet period after the last trusted input before an autosave push.
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,

    /// How long an explicit save waits for the section's reply.
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,

    /// Prefix of the persisted draft key (`<namespace>:<identity>`).
    #[serde(default = "default_draft_namespace")]
    pub draft_namespace: String,

    /// Endpoint receiving the final consolidated draft.
    #[serde(default = "default_submission_url")]
    pub submission_url: String,

    /// Ordered questionnaire sections.
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionEntry>,
}

impl DossierConfig {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    /// Whether `key` names one of the configured sections.
    pub fn is_known_section(&self, key: &SectionKey) -> bool {
        self.sections.iter().any(|entry| &entry.key == key)
    }

    pub fn section(&self, key: &SectionKey) -> Option<&SectionEntry> {
        self.sections.iter().find(|entry| &entry.key == key)
    }
}

fn default_expected_origin() -> String {
    "http://localhost:8888".to_string()
}

fn default_autosave_debounce_ms() -> u64 {
    1_000
}

fn default_save_timeout_ms() -> u64 {
    5_000
}

fn default_draft_namespace() -> String {
    "draft".to_string()
}

fn default_submission_url() -> String {
    "http://localhost:8888/.netlify/functions/submit-application".to_string()
}

/// Sections of the questionnaire in navigation order.
pub fn default_sections() -> Vec<SectionEntry> {
    [
        ("applicant_details", "Applicant Details"),
        ("parents", "Parent's Information"),
        ("siblings", "Sibling's Information"),
        ("education", "Education History"),
        ("employment", "Employment History"),
        ("absence", "Absence From Singapore"),
        ("passports", "Travel Documents (Passports)"),
        ("national_service", "National Service Details"),
        ("prev_marriage", "Previous Marriage Information"),
        ("prev_children", "Children from Previous Marriages"),
    ]
    .into_iter()
    .filter_map(|(key, title)| SectionKey::new(key).map(|key| SectionEntry::new(key, title)))
    .collect()
}

impl Default for DossierConfig {
    fn default() -> Self {
        Self {
            expected_origin: default_expected_origin(),
            autosave_debounce_ms: default_autosave_debounce_ms(),
            save_timeout_ms: default_save_timeout_ms(),
            draft_namespace: default_draft_namespace(),
            submission_url: default_submission_url(),
            sections: default_sections(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = DossierConfig::default();
        assert_eq!(config.autosave_debounce(), Duration::from_secs(1));
        assert_eq!(config.save_timeout(), Duration::from_secs(5));
        assert_eq!(config.draft_namespace, "draft");
        assert_eq!(config.sections.len(), 10);
        assert_eq!(config.sections[0].key.as_str(), "applicant_details");
    }

    #[test]
    fn test_config_partial_toml_uses_defaults() {
        let config: DossierConfig = toml::from_str(
            r#"
expected_origin = "https://forms.example.org"
autosave_debounce_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.expected_origin, "https://forms.example.org");
        assert_eq!(config.autosave_debounce_ms, 250);
        assert_eq!(config.save_timeout_ms, 5_000);
        assert_eq!(config.sections, default_sections());
    }

    #[test]
    fn test_config_custom_sections() {
        let config: DossierConfig = toml::from_str(
            r#"
[[sections]]
key = "applicant_details"
title = "About you"

[[sections]]
key = "review"
title = "Review"
path = "/sections/section-review.html"
"#,
        )
        .unwrap();
        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.sections[1].resource_path(), "/sections/section-review.html");
        assert!(config.is_known_section(&SectionKey::new("review").unwrap()));
        assert!(!config.is_known_section(&SectionKey::new("parents").unwrap()));
    }
}
