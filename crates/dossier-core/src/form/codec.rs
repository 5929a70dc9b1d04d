//! Form field codec: page fields ⇄ `SectionRecord`.

use dossier_types::record::{FieldRecord, FieldValue, SectionRecord};

use crate::document::name::MULTI_MARKER;
use crate::document::{Document, FieldName, FieldState, IndexPart, InputKind, NodeId};

/// Where a field's value lives in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot<'a> {
    Top {
        name: &'a str,
        multi: bool,
    },
    Item {
        group: &'a str,
        /// 0-based.
        index: usize,
        field: &'a str,
        multi: bool,
    },
}

fn slot(raw: &str) -> Option<Slot<'_>> {
    match FieldName::parse(raw) {
        Some(FieldName::Plain { name, multi }) => Some(Slot::Top { name, multi }),
        Some(FieldName::Indexed {
            group,
            index: IndexPart::Position(position),
            field,
            multi,
        }) => Some(Slot::Item {
            group,
            index: position - 1,
            field,
            multi,
        }),
        // Unassigned template copies carry no data.
        Some(FieldName::Indexed {
            index: IndexPart::Placeholder,
            ..
        }) => None,
        None => {
            let (name, multi) = match raw.strip_suffix(MULTI_MARKER) {
                Some(base) => (base, true),
                None => (raw, false),
            };
            Some(Slot::Top { name, multi })
        }
    }
}

/// Checkbox without a meaningful value of its own: collects to a boolean.
fn is_flag_checkbox(field: &FieldState) -> bool {
    field.value.is_empty() || field.value.eq_ignore_ascii_case("on")
}

enum Collected {
    Set(FieldValue),
    /// Checkbox contributing to an ordered list of checked values.
    ListMember(Option<String>),
    Skip,
}

fn collected(field: &FieldState, multi: bool) -> Collected {
    match field.kind {
        InputKind::Checkbox if multi || !is_flag_checkbox(field) => {
            Collected::ListMember(field.checked.then(|| field.value.clone()))
        }
        InputKind::Checkbox => Collected::Set(FieldValue::Flag(field.checked)),
        InputKind::Radio if field.checked => Collected::Set(FieldValue::text(&field.value)),
        InputKind::Radio | InputKind::Button => Collected::Skip,
        _ => Collected::Set(FieldValue::text(&field.value)),
    }
}

fn store(target: &mut FieldRecord, name: &str, value: Collected) {
    match value {
        Collected::Set(value) => {
            target.insert(name.to_string(), value);
        }
        Collected::ListMember(member) => {
            let entry = target
                .entry(name.to_string())
                .or_insert_with(|| FieldValue::List(Vec::new()));
            if !matches!(entry, FieldValue::List(_)) {
                *entry = FieldValue::List(Vec::new());
            }
            if let (FieldValue::List(items), Some(member)) = (entry, member) {
                items.push(member);
            }
        }
        Collected::Skip => {}
    }
}

/// Collect every visible, named field within `scope` into a record.
///
/// Group items are placed by the index in their field names; gaps are
/// padded with empty items.
pub fn collect(doc: &Document, scope: NodeId) -> SectionRecord {
    let mut top = FieldRecord::new();
    let mut record = SectionRecord::new();

    for id in doc.fields(scope) {
        if doc.is_hidden(id) {
            continue;
        }
        let Some(field) = doc.field(id) else { continue };
        let Some(slot) = slot(&field.name) else { continue };

        match slot {
            Slot::Top { name, multi } => store(&mut top, name, collected(field, multi)),
            Slot::Item {
                group,
                index,
                field: item_field,
                multi,
            } => {
                let items = record.group_mut(group);
                if items.len() <= index {
                    items.resize_with(index + 1, FieldRecord::new);
                }
                store(&mut items[index], item_field, collected(field, multi));
            }
        }
    }

    for (name, value) in top {
        if record.group(&name).is_none() {
            record.set_field(name, value);
        }
    }
    record
}

/// Assign record values to the fields within `scope`.
///
/// Returns the fields that received a value, in document order, so the
/// caller can notify listeners once every assignment is done. Radios with
/// no saved value are unchecked; other fields without a value keep theirs.
pub fn assign(doc: &mut Document, scope: NodeId, record: &SectionRecord) -> Vec<NodeId> {
    let mut assigned = Vec::new();

    for id in doc.fields(scope) {
        let Some(field) = doc.field_mut(id) else { continue };
        let value = match slot(&field.name) {
            Some(Slot::Top { name, .. }) => record.field(name).cloned(),
            Some(Slot::Item {
                group,
                index,
                field: item_field,
                ..
            }) => record
                .group(group)
                .and_then(|items| items.get(index))
                .and_then(|item| item.get(item_field))
                .cloned(),
            None => None,
        };

        let Some(value) = value else {
            if field.kind == InputKind::Radio {
                field.checked = false;
            }
            continue;
        };

        match field.kind {
            InputKind::Checkbox => {
                field.checked = match &value {
                    FieldValue::List(items) => items.contains(&field.value),
                    other => other.as_flag(),
                };
            }
            InputKind::Radio => field.checked = field.value == value.as_text(),
            InputKind::Button => continue,
            _ => field.value = value.as_text(),
        }
        assigned.push(id);
    }
    assigned
}

/// Item counts a record needs, per repeatable group.
pub fn group_counts(record: &SectionRecord) -> Vec<(&str, usize)> {
    record
        .groups()
        .filter(|(_, items)| !items.is_empty())
        .map(|(name, items)| (name, items.len()))
        .collect()
}

/// Force `required` off for every hidden field within `scope`.
pub fn sync_required(doc: &mut Document, scope: NodeId) {
    for id in doc.fields(scope) {
        let hidden = doc.is_hidden(id);
        if let Some(field) = doc.field_mut(id) {
            field.required = field.required_when_visible && !hidden;
        }
    }
}
