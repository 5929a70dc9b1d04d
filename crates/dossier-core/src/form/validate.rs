//! Submit-time validation of required fields.

use dossier_types::error::ValidationError;

use crate::document::{Document, InputKind, NodeId};

/// First visible required field within `scope` that has no value.
pub fn first_missing(doc: &Document, scope: NodeId) -> Option<NodeId> {
    doc.fields(scope).into_iter().find(|&id| {
        let Some(field) = doc.field(id) else {
            return false;
        };
        if !field.required || doc.is_hidden(id) {
            return false;
        }
        match field.kind {
            InputKind::Checkbox => !field.checked,
            InputKind::Radio => !doc
                .radio_group(scope, &field.name)
                .into_iter()
                .any(|r| doc.field(r).is_some_and(|f| f.checked)),
            _ => field.value.trim().is_empty(),
        }
    })
}

/// Validate `scope`, focusing the first offending field on failure.
pub fn validate(doc: &mut Document, scope: NodeId) -> Result<(), ValidationError> {
    match first_missing(doc, scope) {
        Some(id) => {
            let field = doc.field(id).map(|f| f.name.clone()).unwrap_or_default();
            doc.focus(id);
            Err(ValidationError { field })
        }
        None => Ok(()),
    }
}
