//! Form data records.
//!
//! `SectionRecord` is what a section page collects from and populates into
//! its own fields. It serializes as one flat JSON object where top-level
//! fields map to scalars, booleans or string lists, and repeatable groups map
//! to arrays of objects:
//!
//! ```json
//! { "applicant_name": "Jane Tan", "sibling": [{ "name": "A" }, { "name": "B" }] }
//! ```
//!
//! `ConsolidatedDraft` maps section keys to section records and is the unit
//! that is persisted and submitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::section::SectionKey;

/// Value of a single named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Free text, select value or checked radio value.
    Text(String),
    /// Standalone checkbox.
    Flag(bool),
    /// Checked values of a multi checkbox group, in document order.
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Interpret the value as a checkbox state.
    ///
    /// Text values `true`, `yes` and `on` (case-insensitive) count as checked.
    pub fn as_flag(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Text(text) => matches!(text.to_ascii_lowercase().as_str(), "true" | "yes" | "on"),
            Self::List(_) => false,
        }
    }

    /// Text form used for text inputs and radio comparisons.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Flag(flag) => flag.to_string(),
            Self::List(items) => items.join(","),
        }
    }
}

/// Mapping of field name to value for one item or one section.
pub type FieldRecord = BTreeMap<String, FieldValue>;

/// One top-level entry of a section record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordEntry {
    Value(FieldValue),
    Group(Vec<FieldRecord>),
}

/// Field record plus repeatable groups for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionRecord {
    entries: BTreeMap<String, RecordEntry>,
}

impl SectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Set a top-level field, replacing any previous entry with that name.
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.entries.insert(name.into(), RecordEntry::Value(value));
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        match self.entries.get(name) {
            Some(RecordEntry::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        match self.entries.get_mut(name) {
            Some(RecordEntry::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Items of a repeatable group, if the record carries that group.
    pub fn group(&self, name: &str) -> Option<&[FieldRecord]> {
        match self.entries.get(name) {
            Some(RecordEntry::Group(items)) => Some(items),
            _ => None,
        }
    }

    /// Mutable access to a group, creating it if absent.
    ///
    /// A plain field with the same name is replaced by an empty group.
    pub fn group_mut(&mut self, name: &str) -> &mut Vec<FieldRecord> {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| RecordEntry::Group(Vec::new()));
        if !matches!(entry, RecordEntry::Group(_)) {
            *entry = RecordEntry::Group(Vec::new());
        }
        match entry {
            RecordEntry::Group(items) => items,
            RecordEntry::Value(_) => unreachable!("entry was just replaced by a group"),
        }
    }

    pub fn set_group(&mut self, name: impl Into<String>, items: Vec<FieldRecord>) {
        self.entries.insert(name.into(), RecordEntry::Group(items));
    }

    /// Names and items of every repeatable group in the record.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[FieldRecord])> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            RecordEntry::Group(items) => Some((name.as_str(), items.as_slice())),
            RecordEntry::Value(_) => None,
        })
    }

    /// Names and values of every top-level field.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            RecordEntry::Value(value) => Some((name.as_str(), value)),
            RecordEntry::Group(_) => None,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RecordEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Parse a record from an untrusted JSON payload.
    ///
    /// Anything other than a JSON object whose values are strings, booleans,
    /// string arrays or arrays of such objects is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// Full multi-section saved state for one user.
///
/// A missing key means the section was never saved, not that it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsolidatedDraft {
    sections: BTreeMap<SectionKey, SectionRecord>,
}

impl ConsolidatedDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, key: &SectionKey) -> Option<&SectionRecord> {
        self.sections.get(key)
    }

    /// Replace the whole record of a section (last write wins).
    ///
    /// Returns the previous record, if any.
    pub fn replace_section(
        &mut self,
        key: SectionKey,
        record: SectionRecord,
    ) -> Option<SectionRecord> {
        self.sections.insert(key, record)
    }

    pub fn remove_section(&mut self, key: &SectionKey) -> Option<SectionRecord> {
        self.sections.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SectionKey> {
        self.sections.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionKey, &SectionRecord)> {
        self.sections.iter()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }
}
