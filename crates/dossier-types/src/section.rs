//! Section identity for Dossier.
//!
//! A section is one page of the questionnaire. Its `SectionKey` is derived
//! from the page's resource path (`/sections/section-prev-marriage.html` ⇄
//! `prev_marriage`) so that data saved under a key can always be found again
//! by revisiting the same path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filename prefix shared by every section page.
const SECTION_PREFIX: &str = "section-";

/// Filename suffix of section pages. Optional when deriving keys.
const SECTION_SUFFIX: &str = ".html";

/// Directory that section pages are served from.
pub const SECTIONS_DIR: &str = "/sections/";

/// Stable identifier of one questionnaire section (e.g. `applicant_details`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionKey(String);

impl SectionKey {
    /// Build a key from its underscore form.
    ///
    /// Returns `None` for empty keys or keys containing characters other than
    /// ASCII alphanumerics and `_`.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Some(Self(key))
        } else {
            None
        }
    }

    /// Derive a key from a section resource path.
    ///
    /// Only the final path segment is considered; query strings and fragments
    /// are ignored. The segment must look like `section-<slug>[.html]` where
    /// `<slug>` is made of ASCII alphanumerics, `_` and `-`. Dashes become
    /// underscores.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let file = path.rsplit('/').next()?;
        let slug = file.strip_prefix(SECTION_PREFIX)?;
        let slug = slug.strip_suffix(SECTION_SUFFIX).unwrap_or(slug);

        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return None;
        }

        Some(Self(slug.replace('-', "_")))
    }

    /// The canonical resource path of this section's page.
    pub fn to_path(&self) -> String {
        format!(
            "{SECTIONS_DIR}{SECTION_PREFIX}{}{SECTION_SUFFIX}",
            self.0.replace('_', "-")
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the questionnaire navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    /// Section key the page stores its data under.
    pub key: SectionKey,
    /// Human-readable title shown in navigation and review.
    pub title: String,
    /// Resource path of the section page. Defaults to the canonical path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SectionEntry {
    pub fn new(key: SectionKey, title: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            path: None,
        }
    }

    /// Resource path used when navigating to this entry.
    pub fn resource_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| self.key.to_path())
    }
}
