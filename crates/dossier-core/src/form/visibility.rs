//! Conditional visibility engine.
//!
//! A rule ties a trigger field to a region: whenever the trigger changes the
//! predicate is evaluated, and the region (plus any side-effect regions) is
//! shown or hidden. Fields inside a shown region get their "required when
//! visible" flag back; fields inside a hidden region are never required.
//!
//! Delegated rules cover repeatable items created after setup: they listen
//! for changes of `group[*][field]` anywhere inside a container and toggle
//! the region belonging to the one item that changed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use dossier_types::section::SectionKey;

use super::groups::ITEM_CLASS;
use crate::document::{Document, FieldName, InputKind, NodeId, Selector};

/// Condition evaluated against a trigger's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Checked,
    Unchecked,
    Equals(String),
    OneOf(Vec<String>),
    NotEmpty,
}

/// Observed state of a trigger field (or radio group).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerState {
    pub checked: bool,
    /// Checked radio value, checked checkbox value, or text value.
    pub value: Option<String>,
}

impl TriggerState {
    /// Read the combined state of the trigger nodes.
    pub fn read(doc: &Document, nodes: &[NodeId]) -> Self {
        let mut state = Self::default();
        for &id in nodes {
            let Some(field) = doc.field(id) else { continue };
            match field.kind {
                InputKind::Radio | InputKind::Checkbox => {
                    if field.checked {
                        state.checked = true;
                        state.value = Some(field.value.clone());
                    }
                }
                _ => {
                    state.checked = !field.value.is_empty();
                    state.value = Some(field.value.clone());
                }
            }
        }
        state
    }
}

impl Predicate {
    pub fn evaluate(&self, state: &TriggerState) -> bool {
        match self {
            Self::Checked => state.checked,
            Self::Unchecked => !state.checked,
            Self::Equals(expected) => state.value.as_deref() == Some(expected.as_str()),
            Self::OneOf(options) => state
                .value
                .as_ref()
                .is_some_and(|v| options.iter().any(|o| o == v)),
            Self::NotEmpty => state.value.as_ref().is_some_and(|v| !v.trim().is_empty()),
        }
    }
}

/// Extra effect toggled in lockstep with a rule's region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Another region on the same page.
    Region(Selector),
    /// A whole section in the parent's navigation.
    Section(SectionKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub trigger: Selector,
    pub region: Selector,
    pub predicate: Predicate,
    #[serde(default)]
    pub side_effects: Vec<SideEffect>,
}

impl VisibilityRule {
    pub fn new(trigger: Selector, region: Selector, predicate: Predicate) -> Self {
        Self {
            trigger,
            region,
            predicate,
            side_effects: Vec::new(),
        }
    }

    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effects.push(effect);
        self
    }
}

/// Rule evaluated per repeatable item for fields named `group[n][field]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedRule {
    pub container: Selector,
    pub group: String,
    pub field: String,
    /// Region looked up inside the item whose field changed.
    pub region: Selector,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Hidden,
    Visible,
}

impl RegionState {
    fn from_show(show: bool) -> Self {
        if show { Self::Visible } else { Self::Hidden }
    }
}

/// One region toggled by an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionToggle {
    pub region: NodeId,
    pub state: RegionState,
}

/// Request to show or hide a section in the navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionToggle {
    pub key: SectionKey,
    pub show: bool,
}

/// What an evaluation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub toggles: Vec<RegionToggle>,
    pub sections: Vec<SectionToggle>,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty() && self.sections.is_empty()
    }

    pub fn extend(&mut self, other: Outcome) {
        self.toggles.extend(other.toggles);
        self.sections.extend(other.sections);
    }
}

#[derive(Debug, Clone)]
struct Binding {
    triggers: Vec<NodeId>,
    region: NodeId,
    extra_regions: Vec<NodeId>,
    sections: Vec<SectionKey>,
    predicate: Predicate,
    state: RegionState,
}

#[derive(Debug, Clone)]
struct DelegatedBinding {
    container: NodeId,
    rule: DelegatedRule,
}

/// Per-page visibility rules and their current region states.
#[derive(Debug, Clone, Default)]
pub struct VisibilityEngine {
    bindings: Vec<Binding>,
    delegated: Vec<DelegatedBinding>,
}

impl VisibilityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a rule within `scope` and apply its initial state.
    ///
    /// Binding the same trigger and region twice is a no-op, so a trigger
    /// change always evaluates a rule exactly once. Returns `None` when the
    /// rule does not apply to this scope or is already bound.
    pub fn bind(
        &mut self,
        doc: &mut Document,
        scope: NodeId,
        rule: &VisibilityRule,
    ) -> Option<Outcome> {
        let triggers = doc.select(scope, &rule.trigger);
        let region = doc.select_first(scope, &rule.region)?;
        let first_trigger = *triggers.first()?;

        if self
            .bindings
            .iter()
            .any(|b| b.region == region && b.triggers.contains(&first_trigger))
        {
            debug!(trigger = %rule.trigger, region = %rule.region, "rule already bound");
            return None;
        }

        let mut extra_regions = Vec::new();
        let mut sections = Vec::new();
        for effect in &rule.side_effects {
            match effect {
                SideEffect::Region(selector) => extra_regions.extend(doc.select(scope, selector)),
                SideEffect::Section(key) => sections.push(key.clone()),
            }
        }

        self.bindings.push(Binding {
            triggers,
            region,
            extra_regions,
            sections,
            predicate: rule.predicate.clone(),
            state: RegionState::Hidden,
        });
        debug!(trigger = %rule.trigger, region = %rule.region, "bound visibility rule");

        let index = self.bindings.len() - 1;
        Some(self.evaluate(doc, index))
    }

    /// Bind a delegated rule and evaluate every item already present.
    pub fn bind_delegated(&mut self, doc: &mut Document, rule: &DelegatedRule) -> Option<Outcome> {
        let container = doc.select_first(doc.root(), &rule.container)?;
        if self
            .delegated
            .iter()
            .any(|d| d.container == container && d.rule == *rule)
        {
            return None;
        }
        self.delegated.push(DelegatedBinding {
            container,
            rule: rule.clone(),
        });
        debug!(container = %rule.container, group = %rule.group, field = %rule.field, "bound delegated rule");
        Some(self.init_delegated(doc, container))
    }

    /// Bind every rule that resolves within `scope` and evaluate delegated
    /// rules for the items inside it. Used for freshly added items.
    pub fn bind_scope(
        &mut self,
        doc: &mut Document,
        scope: NodeId,
        rules: &[VisibilityRule],
    ) -> Outcome {
        let mut outcome = Outcome::default();
        for rule in rules {
            if let Some(initial) = self.bind(doc, scope, rule) {
                outcome.extend(initial);
            }
        }
        outcome.extend(self.init_delegated(doc, scope));
        outcome
    }

    /// React to a change of `node`.
    pub fn on_change(&mut self, doc: &mut Document, node: NodeId) -> Outcome {
        let mut outcome = Outcome::default();

        let hits: Vec<usize> = self
            .bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.triggers.contains(&node) && doc.is_attached(b.region))
            .map(|(i, _)| i)
            .collect();
        for index in hits {
            outcome.extend(self.evaluate(doc, index));
        }

        outcome.toggles.extend(self.delegated_change(doc, node));
        outcome
    }

    /// Re-evaluate every bound rule against the current field state.
    pub fn refresh(&mut self, doc: &mut Document) -> Outcome {
        let mut outcome = Outcome::default();
        for index in 0..self.bindings.len() {
            if doc.is_attached(self.bindings[index].region) {
                outcome.extend(self.evaluate(doc, index));
            }
        }
        let containers: Vec<NodeId> = self.delegated.iter().map(|d| d.container).collect();
        for container in containers {
            outcome.extend(self.init_delegated(doc, container));
        }
        outcome
    }

    /// Drop bindings whose region or triggers left the page, e.g. after a
    /// repeatable item was removed. Returns the number dropped.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.bindings.len() + self.delegated.len();
        self.bindings.retain_mut(|b| {
            b.triggers.retain(|&t| doc.is_attached(t));
            b.extra_regions.retain(|&r| doc.is_attached(r));
            doc.is_attached(b.region) && !b.triggers.is_empty()
        });
        self.delegated.retain(|d| doc.is_attached(d.container));
        let dropped = before - self.bindings.len() - self.delegated.len();
        if dropped > 0 {
            debug!(dropped, "pruned detached visibility bindings");
        }
        dropped
    }

    /// Current state of a bound region.
    pub fn region_state(&self, region: NodeId) -> Option<RegionState> {
        self.bindings
            .iter()
            .find(|b| b.region == region)
            .map(|b| b.state)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn evaluate(&mut self, doc: &mut Document, index: usize) -> Outcome {
        let binding = &self.bindings[index];
        let show = binding
            .predicate
            .evaluate(&TriggerState::read(doc, &binding.triggers));
        let state = RegionState::from_show(show);

        let mut outcome = Outcome::default();
        for &region in std::iter::once(&binding.region).chain(&binding.extra_regions) {
            apply(doc, region, show);
            outcome.toggles.push(RegionToggle { region, state });
        }
        outcome.sections.extend(
            binding
                .sections
                .iter()
                .map(|key| SectionToggle { key: key.clone(), show }),
        );

        self.bindings[index].state = state;
        outcome
    }

    fn init_delegated(&self, doc: &mut Document, scope: NodeId) -> Outcome {
        let mut outcome = Outcome::default();
        for delegated in &self.delegated {
            if !doc.is_descendant_or_self(scope, delegated.container)
                && !doc.is_descendant_or_self(delegated.container, scope)
            {
                continue;
            }
            let items: Vec<NodeId> = doc
                .subtree(scope)
                .into_iter()
                .filter(|&id| {
                    doc.node(id).has_class(ITEM_CLASS)
                        && doc.is_descendant_or_self(id, delegated.container)
                })
                .collect();
            for item in items {
                if let Some(toggle) = evaluate_item(doc, &delegated.rule, item) {
                    outcome.toggles.push(toggle);
                }
            }
        }
        outcome
    }

    /// Evaluate every delegated rule listening for the changed field.
    fn delegated_change(&self, doc: &mut Document, node: NodeId) -> Vec<RegionToggle> {
        let Some(name) = doc.field(node).map(|f| f.name.clone()) else {
            return Vec::new();
        };
        let Some(FieldName::Indexed { group, field, .. }) = FieldName::parse(&name) else {
            return Vec::new();
        };
        let Some(item) = doc.closest(node, |n| n.has_class(ITEM_CLASS)) else {
            return Vec::new();
        };
        let rules: Vec<&DelegatedRule> = self
            .delegated
            .iter()
            .filter(|d| {
                d.rule.group == group
                    && d.rule.field == field
                    && doc.is_descendant_or_self(node, d.container)
            })
            .map(|d| &d.rule)
            .collect();
        rules
            .into_iter()
            .filter_map(|rule| evaluate_item(doc, rule, item))
            .collect()
    }
}

/// Evaluate a delegated rule for one item.
fn evaluate_item(doc: &mut Document, rule: &DelegatedRule, item: NodeId) -> Option<RegionToggle> {
    let region = doc.select_first(item, &rule.region)?;
    let triggers: Vec<NodeId> = doc
        .fields(item)
        .into_iter()
        .filter(|&id| {
            doc.field(id).is_some_and(|f| {
                matches!(
                    FieldName::parse(&f.name),
                    Some(FieldName::Indexed { group, field, .. })
                        if group == rule.group && field == rule.field
                )
            })
        })
        .collect();
    if triggers.is_empty() {
        return None;
    }
    let show = rule.predicate.evaluate(&TriggerState::read(doc, &triggers));
    apply(doc, region, show);
    Some(RegionToggle {
        region,
        state: RegionState::from_show(show),
    })
}

/// Show or hide a region and recompute `required` for the fields inside it.
fn apply(doc: &mut Document, region: NodeId, show: bool) {
    doc.set_hidden(region, !show);
    for id in doc.subtree(region) {
        let hidden = doc.is_hidden(id);
        if let Some(field) = doc.field_mut(id) {
            field.required = field.required_when_visible && !hidden;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    fn ns_page(checked: bool) -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let mut checkbox = Node::checkbox("ns_applicable").with_id("ns-applicable");
        if checked {
            checkbox = checkbox.checked();
        }
        let trigger = doc.append(doc.root(), checkbox);
        let region = doc.append(doc.root(), Node::element("div").with_id("ns-details-container"));
        let unit = doc.append(region, Node::text_input("ns_unit").required());
        (doc, trigger, region, unit)
    }

    fn ns_rule() -> VisibilityRule {
        VisibilityRule::new(
            Selector::id("ns-applicable"),
            Selector::id("ns-details-container"),
            Predicate::Checked,
        )
    }

    #[test]
    fn test_predicates() {
        let state = TriggerState {
            checked: true,
            value: Some("yes".to_string()),
        };
        assert!(Predicate::Checked.evaluate(&state));
        assert!(!Predicate::Unchecked.evaluate(&state));
        assert!(Predicate::Equals("yes".to_string()).evaluate(&state));
        assert!(Predicate::OneOf(vec!["no".into(), "yes".into()]).evaluate(&state));
        assert!(Predicate::NotEmpty.evaluate(&state));
        assert!(!Predicate::NotEmpty.evaluate(&TriggerState::default()));
    }

    #[test]
    fn test_bind_self_initializes() {
        let (mut doc, _trigger, region, unit) = ns_page(false);
        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        let outcome = engine.bind(&mut doc, root, &ns_rule()).unwrap();
        assert_eq!(outcome.toggles, vec![RegionToggle { region, state: RegionState::Hidden }]);
        assert!(doc.is_hidden(region));
        assert!(!doc.field(unit).unwrap().required);
    }

    #[test]
    fn test_hiding_clears_required_and_showing_restores_it() {
        let (mut doc, trigger, region, unit) = ns_page(true);
        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        engine.bind(&mut doc, root, &ns_rule());
        assert!(doc.field(unit).unwrap().required);

        doc.field_mut(trigger).unwrap().checked = false;
        engine.on_change(&mut doc, trigger);
        assert_eq!(engine.region_state(region), Some(RegionState::Hidden));
        assert!(!doc.field(unit).unwrap().required);

        doc.field_mut(trigger).unwrap().checked = true;
        engine.on_change(&mut doc, trigger);
        assert_eq!(engine.region_state(region), Some(RegionState::Visible));
        assert!(doc.field(unit).unwrap().required);
    }

    #[test]
    fn test_bind_is_idempotent() {
        let (mut doc, trigger, _region, _unit) = ns_page(false);
        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        assert!(engine.bind(&mut doc, root, &ns_rule()).is_some());
        assert!(engine.bind(&mut doc, root, &ns_rule()).is_none());
        assert_eq!(engine.binding_count(), 1);

        doc.field_mut(trigger).unwrap().checked = true;
        let outcome = engine.on_change(&mut doc, trigger);
        assert_eq!(outcome.toggles.len(), 1);
    }

    #[test]
    fn test_rule_not_on_page_is_skipped() {
        let mut doc = Document::new();
        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        assert!(engine.bind(&mut doc, root, &ns_rule()).is_none());
        assert_eq!(engine.binding_count(), 0);
    }

    #[test]
    fn test_side_effects_toggle_in_lockstep() {
        let mut doc = Document::new();
        let trigger = doc.append(
            doc.root(),
            Node::checkbox("prev_marriage_applicable").with_id("prev-marriage-applicable"),
        );
        let container = doc.append(doc.root(), Node::element("div").with_id("prev-marriage-container"));
        let add = doc.append(doc.root(), Node::button().with_id("add-prev-marriage"));
        let key = SectionKey::new("prev_children").unwrap();
        let rule = VisibilityRule::new(
            Selector::id("prev-marriage-applicable"),
            Selector::id("prev-marriage-container"),
            Predicate::Checked,
        )
        .with_side_effect(SideEffect::Region(Selector::id("add-prev-marriage")))
        .with_side_effect(SideEffect::Section(key.clone()));

        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        let initial = engine.bind(&mut doc, root, &rule).unwrap();
        assert!(doc.is_hidden(container) && doc.is_hidden(add));
        assert_eq!(initial.sections, vec![SectionToggle { key: key.clone(), show: false }]);

        doc.field_mut(trigger).unwrap().checked = true;
        let outcome = engine.on_change(&mut doc, trigger);
        assert!(!doc.is_hidden(container) && !doc.is_hidden(add));
        assert_eq!(outcome.sections, vec![SectionToggle { key, show: true }]);
    }

    #[test]
    fn test_radio_group_trigger() {
        let mut doc = Document::new();
        let yes = doc.append(doc.root(), Node::radio("employed", "yes"));
        let no = doc.append(doc.root(), Node::radio("employed", "no").checked());
        let region = doc.append(doc.root(), Node::element("div").with_id("employer"));
        let rule = VisibilityRule::new(
            Selector::name("employed"),
            Selector::id("employer"),
            Predicate::Equals("yes".to_string()),
        );
        let mut engine = VisibilityEngine::new();
        let root = doc.root();
        engine.bind(&mut doc, root, &rule);
        assert!(doc.is_hidden(region));

        doc.field_mut(no).unwrap().checked = false;
        doc.field_mut(yes).unwrap().checked = true;
        engine.on_change(&mut doc, yes);
        assert!(!doc.is_hidden(region));
    }

    fn child_item(doc: &mut Document, container: NodeId, n: usize, employed: &str) -> (NodeId, NodeId) {
        let item = doc.append(container, Node::element("fieldset").with_class(ITEM_CLASS));
        let name = format!("prev_child[{n}][employed]");
        let mut yes = Node::radio(name.clone(), "yes");
        let mut no = Node::radio(name, "no");
        if employed == "yes" {
            yes = yes.checked();
        } else {
            no = no.checked();
        }
        doc.append(item, yes);
        doc.append(item, no);
        let details = doc.append(item, Node::element("div").with_class("employment-details"));
        doc.append(details, Node::text_input(format!("prev_child[{n}][employer]")).required());
        (item, details)
    }

    fn employed_rule() -> DelegatedRule {
        DelegatedRule {
            container: Selector::id("prev-children-container"),
            group: "prev_child".to_string(),
            field: "employed".to_string(),
            region: Selector::class("employment-details"),
            predicate: Predicate::Equals("yes".to_string()),
        }
    }

    #[test]
    fn test_delegated_rule_toggles_only_changed_item() {
        let mut doc = Document::new();
        let container = doc.append(doc.root(), Node::element("div").with_id("prev-children-container"));
        let (_first, first_details) = child_item(&mut doc, container, 1, "yes");
        let (second, second_details) = child_item(&mut doc, container, 2, "no");

        let mut engine = VisibilityEngine::new();
        let initial = engine.bind_delegated(&mut doc, &employed_rule()).unwrap();
        assert_eq!(initial.toggles.len(), 2);
        assert!(!doc.is_hidden(first_details));
        assert!(doc.is_hidden(second_details));

        let radios = doc.fields(second);
        doc.field_mut(radios[0]).unwrap().checked = true;
        doc.field_mut(radios[1]).unwrap().checked = false;
        let outcome = engine.on_change(&mut doc, radios[0]);
        assert_eq!(
            outcome.toggles,
            vec![RegionToggle { region: second_details, state: RegionState::Visible }]
        );
        assert!(!doc.is_hidden(first_details));
        let employer = doc.fields(second_details)[0];
        assert!(doc.field(employer).unwrap().required);
    }

    #[test]
    fn test_every_delegated_rule_for_a_field_is_applied() {
        let mut doc = Document::new();
        let container = doc.append(doc.root(), Node::element("div").with_id("prev-children-container"));
        let (item, details) = child_item(&mut doc, container, 1, "no");
        let reason = doc.append(item, Node::element("div").with_class("unemployment-reason"));

        let mut engine = VisibilityEngine::new();
        engine.bind_delegated(&mut doc, &employed_rule());
        let unemployed = DelegatedRule {
            region: Selector::class("unemployment-reason"),
            predicate: Predicate::Equals("no".to_string()),
            ..employed_rule()
        };
        assert!(engine.bind_delegated(&mut doc, &unemployed).is_some());
        assert!(engine.bind_delegated(&mut doc, &unemployed).is_none());
        assert!(doc.is_hidden(details));
        assert!(!doc.is_hidden(reason));

        let radios = doc.fields(item);
        doc.field_mut(radios[0]).unwrap().checked = true;
        doc.field_mut(radios[1]).unwrap().checked = false;
        let outcome = engine.on_change(&mut doc, radios[0]);
        assert_eq!(
            outcome.toggles,
            vec![
                RegionToggle { region: details, state: RegionState::Visible },
                RegionToggle { region: reason, state: RegionState::Hidden },
            ]
        );
        assert!(!doc.is_hidden(details));
        assert!(doc.is_hidden(reason));
    }

    #[test]
    fn test_prune_drops_bindings_of_removed_items() {
        let mut doc = Document::new();
        let container = doc.append(doc.root(), Node::element("div").with_id("items"));
        let item = doc.append(container, Node::element("fieldset").with_class(ITEM_CLASS));
        let trigger = doc.append(item, Node::checkbox("ns_applicable").with_id("ns-applicable"));
        doc.append(item, Node::element("div").with_id("ns-details-container"));

        let mut engine = VisibilityEngine::new();
        engine.bind_scope(&mut doc, item, &[ns_rule()]);
        assert_eq!(engine.binding_count(), 1);
        assert_eq!(engine.prune(&doc), 0);

        doc.detach(item);
        assert_eq!(engine.prune(&doc), 1);
        assert_eq!(engine.binding_count(), 0);
        assert!(engine.on_change(&mut doc, trigger).is_empty());
    }

    #[test]
    fn test_bind_scope_initializes_new_item() {
        let mut doc = Document::new();
        let container = doc.append(doc.root(), Node::element("div").with_id("prev-children-container"));
        let mut engine = VisibilityEngine::new();
        engine.bind_delegated(&mut doc, &employed_rule());

        let (item, details) = child_item(&mut doc, container, 1, "no");
        let outcome = engine.bind_scope(&mut doc, item, &[ns_rule()]);
        assert_eq!(outcome.toggles.len(), 1);
        assert!(doc.is_hidden(details));
    }
}
