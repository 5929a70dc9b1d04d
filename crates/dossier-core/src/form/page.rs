//! One section page: document, repeatable groups and visibility rules.

use tracing::{debug, info};

use dossier_types::error::ValidationError;
use dossier_types::record::SectionRecord;
use dossier_types::section::SectionKey;

use super::codec;
use super::groups::{questionnaire_groups, GroupSpec, ItemHandle, RepeatableGroups};
use super::validate;
use super::visibility::{
    DelegatedRule, Outcome, Predicate, SectionToggle, SideEffect, VisibilityEngine, VisibilityRule,
};
use crate::document::{Document, InputKind, NodeId, Selector};

/// Static wiring of a section page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub groups: Vec<GroupSpec>,
    pub rules: Vec<VisibilityRule>,
    pub delegated: Vec<DelegatedRule>,
}

impl PageLayout {
    /// Wiring shared by every questionnaire section. Parts that are not on a
    /// given page are skipped at setup.
    pub fn questionnaire() -> Self {
        let mut prev_marriage = VisibilityRule::new(
            Selector::id("prev-marriage-applicable"),
            Selector::id("prev-marriage-container"),
            Predicate::Checked,
        )
        .with_side_effect(SideEffect::Region(Selector::id("add-prev-marriage")));
        if let Some(children) = SectionKey::new("prev_children") {
            prev_marriage = prev_marriage.with_side_effect(SideEffect::Section(children));
        }

        Self {
            groups: questionnaire_groups(),
            rules: vec![
                VisibilityRule::new(
                    Selector::id("ns-applicable"),
                    Selector::id("ns-details-container"),
                    Predicate::Checked,
                ),
                prev_marriage,
            ],
            delegated: vec![DelegatedRule {
                container: Selector::id("prev-children-container"),
                group: "prev_child".to_string(),
                field: "employed".to_string(),
                region: Selector::class("employment-details"),
                predicate: Predicate::Equals("yes".to_string()),
            }],
        }
    }
}

/// Result of clicking a node on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Click {
    Added(ItemHandle),
    Removed(ItemHandle),
    /// Remove refused or nothing wired to the node.
    Ignored,
}

/// A live section page.
#[derive(Debug, Clone)]
pub struct SectionPage {
    key: SectionKey,
    path: String,
    doc: Document,
    scope: NodeId,
    layout: PageLayout,
    groups: RepeatableGroups,
    visibility: VisibilityEngine,
    section_toggles: Vec<SectionToggle>,
}

impl SectionPage {
    /// Wire up a loaded section document.
    ///
    /// Returns `None` when `path` is not a section resource.
    pub fn setup(path: &str, mut doc: Document, layout: PageLayout) -> Option<Self> {
        let key = SectionKey::from_path(path)?;
        let scope = doc
            .get_by_id(&format!("section-{}", key.as_str().replace('_', "-")))
            .unwrap_or_else(|| doc.root());

        let root = doc.root();

        let groups = RepeatableGroups::setup(&mut doc, &layout.groups);
        let mut visibility = VisibilityEngine::new();
        let mut outcome = Outcome::default();
        for rule in &layout.rules {
            if let Some(initial) = visibility.bind(&mut doc, root, rule) {
                outcome.extend(initial);
            }
        }
        for rule in &layout.delegated {
            if let Some(initial) = visibility.bind_delegated(&mut doc, rule) {
                outcome.extend(initial);
            }
        }
        codec::sync_required(&mut doc, root);

        info!(section = %key, groups = groups.names().count(), rules = visibility.binding_count(), "section page ready");

        Some(Self {
            key,
            path: path.to_string(),
            doc,
            scope,
            layout,
            groups,
            visibility,
            section_toggles: outcome.sections,
        })
    }

    pub fn key(&self) -> &SectionKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn groups(&self) -> &RepeatableGroups {
        &self.groups
    }

    pub fn visibility(&self) -> &VisibilityEngine {
        &self.visibility
    }

    /// Current state of this section.
    pub fn collect(&self) -> SectionRecord {
        codec::collect(&self.doc, self.scope)
    }

    /// Apply saved state: grow groups, assign every field, then notify each
    /// assigned field once. Returns the number of assigned fields.
    pub fn populate(&mut self, record: &SectionRecord) -> usize {
        if record.is_empty() {
            debug!(section = %self.key, "nothing to populate");
            return 0;
        }

        let mut outcome = Outcome::default();
        for (group, count) in codec::group_counts(record) {
            match self.groups.ensure_count(&mut self.doc, group, count) {
                Ok(added) => {
                    for handle in added {
                        outcome.extend(self.visibility.bind_scope(
                            &mut self.doc,
                            handle.node,
                            &self.layout.rules,
                        ));
                    }
                }
                Err(err) => debug!(section = %self.key, error = %err, "skipping group"),
            }
        }

        let assigned = codec::assign(&mut self.doc, self.scope, record);
        for &id in &assigned {
            outcome.extend(self.visibility.on_change(&mut self.doc, id));
        }
        outcome.extend(self.visibility.refresh(&mut self.doc));
        let root = self.doc.root();
        codec::sync_required(&mut self.doc, root);

        self.section_toggles.extend(outcome.sections);
        debug!(section = %self.key, fields = assigned.len(), "populated section");
        assigned.len()
    }

    /// First field named `name`, if any.
    pub fn field_by_name(&self, name: &str) -> Option<NodeId> {
        self.doc.select_first(self.doc.root(), &Selector::name(name))
    }

    /// User edit of a text-like field.
    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) -> bool {
        let Some(field) = self.doc.field_mut(node) else {
            return false;
        };
        field.value = value.into();
        self.changed(node);
        true
    }

    /// User toggle of a checkbox or selection of a radio.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) -> bool {
        let Some(field) = self.doc.field(node) else {
            return false;
        };
        if field.kind == InputKind::Radio && checked {
            let name = field.name.clone();
            for other in self.doc.radio_group(self.doc.root(), &name) {
                if let Some(radio) = self.doc.field_mut(other) {
                    radio.checked = false;
                }
            }
        }
        if let Some(field) = self.doc.field_mut(node) {
            field.checked = checked;
        }
        self.changed(node);
        true
    }

    /// Click on an add or remove control.
    pub fn click(&mut self, node: NodeId) -> Click {
        if let Some(group) = self.groups.group_for_add_button(node).map(str::to_string) {
            return match self.groups.add_item(&mut self.doc, &group) {
                Ok(handle) => {
                    let outcome =
                        self.visibility
                            .bind_scope(&mut self.doc, handle.node, &self.layout.rules);
                    self.section_toggles.extend(outcome.sections);
                    Click::Added(handle)
                }
                Err(err) => {
                    debug!(error = %err, "add control without group");
                    Click::Ignored
                }
            };
        }
        if let Some(handle) = self.groups.item_for_remove_button(&self.doc, node) {
            if self.groups.remove_item(&mut self.doc, &handle) {
                self.visibility.prune(&self.doc);
                return Click::Removed(handle);
            }
        }
        Click::Ignored
    }

    /// Section visibility requests raised since the last call.
    pub fn take_section_toggles(&mut self) -> Vec<SectionToggle> {
        std::mem::take(&mut self.section_toggles)
    }

    /// Check required fields, focusing the first empty one.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate::validate(&mut self.doc, self.scope)
    }

    fn changed(&mut self, node: NodeId) {
        let outcome = self.visibility.on_change(&mut self.doc, node);
        self.section_toggles.extend(outcome.sections);
    }
}
