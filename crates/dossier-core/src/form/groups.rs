//! Repeatable group manager.
//!
//! A repeatable group is a container of same-shaped items cloned from a
//! template (siblings, education entries, passports...). Item indices are
//! kept contiguous: every add or remove renumbers the remaining items,
//! rewriting field names (`sibling[3][name]` → `sibling[2][name]`), element
//! ids, label `for` bindings and legend text.
//!
//! Templates use `#` as the index placeholder (`sibling[#][name]`,
//! `sibling-name-#`). When an item enters the page, every id, label binding
//! and legend that embeds its index is remembered as a pattern in the node's
//! `data-*` attributes, so later renumbering only has to refill patterns.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::name::{fill_pattern, index_pattern, with_position};
use crate::document::{Document, FieldName, IndexPart, NodeId, NodeKind, Selector};

/// Class carried by every repeatable item root.
pub const ITEM_CLASS: &str = "repeatable-item";

/// Class of the per-item remove control.
pub const REMOVE_CLASS: &str = "remove-item-button";

const DATA_GROUP: &str = "group";
const DATA_INDEX: &str = "index";
const DATA_ID_PATTERN: &str = "id-pattern";
const DATA_FOR_PATTERN: &str = "for-pattern";
const DATA_LEGEND_PATTERN: &str = "legend-pattern";

/// Wiring of one repeatable group on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name used in field names (`sibling`).
    pub name: String,
    /// Id of the element holding the items.
    pub container_id: String,
    /// Id of the "add" control.
    pub add_button_id: String,
    /// Id of the item template.
    pub template_id: String,
    /// Whether the group may have zero items.
    #[serde(default)]
    pub can_be_empty: bool,
}

impl GroupSpec {
    pub fn new(
        name: impl Into<String>,
        container_id: impl Into<String>,
        add_button_id: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container_id: container_id.into(),
            add_button_id: add_button_id.into(),
            template_id: template_id.into(),
            can_be_empty: false,
        }
    }

    pub fn allow_empty(mut self) -> Self {
        self.can_be_empty = true;
        self
    }
}

/// Repeatable groups of the questionnaire.
pub fn questionnaire_groups() -> Vec<GroupSpec> {
    vec![
        GroupSpec::new("sibling", "siblings-container", "add-sibling", "sibling-template"),
        GroupSpec::new("education", "education-container", "add-education", "education-template"),
        GroupSpec::new("employment", "employment-container", "add-employment", "employment-template"),
        GroupSpec::new("absence", "absence-container", "add-absence", "absence-template")
            .allow_empty(),
        GroupSpec::new("passport", "passport-container", "add-passport", "passport-template"),
        GroupSpec::new(
            "prev_marriage",
            "prev-marriage-container",
            "add-prev-marriage",
            "prev-marriage-template",
        ),
        GroupSpec::new(
            "prev_child",
            "prev-children-container",
            "add-prev-child",
            "prev-child-template",
        )
        .allow_empty(),
    ]
}

/// The group is not wired up on this page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("repeatable group '{0}' is not applicable to this page")]
pub struct GroupNotApplicable(pub String);

/// Handle to one item of a repeatable group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    pub group: String,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
struct BoundGroup {
    spec: GroupSpec,
    container: NodeId,
    add_button: NodeId,
    template_item: NodeId,
}

/// Repeatable groups wired up on one page.
#[derive(Debug, Clone, Default)]
pub struct RepeatableGroups {
    groups: Vec<BoundGroup>,
}

impl RepeatableGroups {
    /// Resolve every spec against the document and normalize existing items.
    ///
    /// Groups whose container is absent are skipped silently; groups with a
    /// container but no add control or template are logged and skipped.
    pub fn setup(doc: &mut Document, specs: &[GroupSpec]) -> Self {
        let mut groups = Vec::new();

        for spec in specs {
            let Some(container) = doc.get_by_id(&spec.container_id) else {
                debug!(group = %spec.name, "container not on this page");
                continue;
            };
            let add_button = doc.get_by_id(&spec.add_button_id);
            let template_item = doc
                .get_by_id(&spec.template_id)
                .and_then(|t| doc.template_content(t));

            let (Some(add_button), Some(template_item)) = (add_button, template_item) else {
                warn!(
                    group = %spec.name,
                    add_button = %spec.add_button_id,
                    template = %spec.template_id,
                    "missing add control or template for repeatable group"
                );
                continue;
            };

            doc.node_mut(template_item)
                .data
                .insert(DATA_GROUP.to_string(), spec.name.clone());

            let bound = BoundGroup {
                spec: spec.clone(),
                container,
                add_button,
                template_item,
            };

            for item in direct_items(doc, &bound) {
                doc.node_mut(item)
                    .data
                    .insert(DATA_GROUP.to_string(), spec.name.clone());
                remember_patterns(doc, item);
            }
            renumber_group(doc, &bound);

            debug!(group = %spec.name, "repeatable group ready");
            groups.push(bound);
        }

        Self { groups }
    }

    pub fn is_applicable(&self, group: &str) -> bool {
        self.bound(group).is_some()
    }

    /// Names of the groups wired up on this page.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.spec.name.as_str())
    }

    pub fn spec(&self, group: &str) -> Option<&GroupSpec> {
        self.bound(group).map(|g| &g.spec)
    }

    fn bound(&self, group: &str) -> Option<&BoundGroup> {
        self.groups.iter().find(|g| g.spec.name == group)
    }

    /// Current items of a group in document order.
    pub fn items(&self, doc: &Document, group: &str) -> Vec<NodeId> {
        self.bound(group)
            .map(|g| direct_items(doc, g))
            .unwrap_or_default()
    }

    /// Clone the template, append it after the existing items and renumber.
    pub fn add_item(
        &self,
        doc: &mut Document,
        group: &str,
    ) -> Result<ItemHandle, GroupNotApplicable> {
        let bound = self
            .bound(group)
            .ok_or_else(|| GroupNotApplicable(group.to_string()))?;

        let item = doc.clone_subtree(bound.template_item);
        doc.append_child(bound.container, item);
        remember_patterns(doc, item);

        for remove in doc.select(item, &Selector::class(REMOVE_CLASS)) {
            doc.set_hidden(remove, false);
        }

        renumber_group(doc, bound);
        debug!(group, items = direct_items(doc, bound).len(), "added repeatable item");

        Ok(ItemHandle {
            group: group.to_string(),
            node: item,
        })
    }

    /// Detach an item and renumber the rest of its group.
    ///
    /// Refuses to remove the last item of a group that may not be empty.
    /// Returns whether the item was removed.
    pub fn remove_item(&self, doc: &mut Document, handle: &ItemHandle) -> bool {
        let Some(bound) = self.bound(&handle.group) else {
            return false;
        };
        let items = direct_items(doc, bound);
        if !items.contains(&handle.node) {
            debug!(group = %handle.group, "item is not part of the group");
            return false;
        }
        if items.len() <= 1 && !bound.spec.can_be_empty {
            warn!(group = %handle.group, "refusing to remove the last required item");
            return false;
        }

        doc.detach(handle.node);
        renumber_group(doc, bound);
        debug!(group = %handle.group, items = items.len() - 1, "removed repeatable item");
        true
    }

    /// Grow a group to at least `count` items. Never shrinks.
    ///
    /// Returns the handles of newly added items.
    pub fn ensure_count(
        &self,
        doc: &mut Document,
        group: &str,
        count: usize,
    ) -> Result<Vec<ItemHandle>, GroupNotApplicable> {
        let existing = self.items(doc, group).len();
        if !self.is_applicable(group) {
            return Err(GroupNotApplicable(group.to_string()));
        }
        (existing..count).map(|_| self.add_item(doc, group)).collect()
    }

    /// Renumber one group. Runs automatically after every add and remove.
    pub fn renumber(&self, doc: &mut Document, group: &str) {
        if let Some(bound) = self.bound(group) {
            renumber_group(doc, bound);
        }
    }

    /// Group whose add control is `node`.
    pub fn group_for_add_button(&self, node: NodeId) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.add_button == node)
            .map(|g| g.spec.name.as_str())
    }

    /// Item that a remove control belongs to.
    pub fn item_for_remove_button(&self, doc: &Document, node: NodeId) -> Option<ItemHandle> {
        if !doc.node(node).has_class(REMOVE_CLASS) {
            return None;
        }
        self.item_containing(doc, node)
    }

    /// Item enclosing `node`, if any.
    pub fn item_containing(&self, doc: &Document, node: NodeId) -> Option<ItemHandle> {
        let item = doc.closest(node, |n| n.has_class(ITEM_CLASS))?;
        let group = doc.node(item).data.get(DATA_GROUP)?.clone();
        self.is_applicable(&group).then_some(ItemHandle { group, node: item })
    }
}

/// Items of a bound group: item roots inside the container tagged with the
/// group (or untagged markup items directly under the container).
fn direct_items(doc: &Document, bound: &BoundGroup) -> Vec<NodeId> {
    doc.descendants(bound.container)
        .into_iter()
        .filter(|&id| {
            let node = doc.node(id);
            node.has_class(ITEM_CLASS)
                && match node.data.get(DATA_GROUP) {
                    Some(group) => group == &bound.spec.name,
                    None => node.parent() == Some(bound.container),
                }
        })
        .collect()
}

/// Current 1-based index of an item, from its bookkeeping or its field names.
fn current_index(doc: &Document, item: NodeId) -> Option<usize> {
    if let Some(index) = doc.node(item).data.get(DATA_INDEX) {
        return index.parse().ok();
    }
    doc.fields(item).into_iter().find_map(|id| {
        let field = doc.field(id)?;
        match FieldName::parse(&field.name)? {
            FieldName::Indexed {
                index: IndexPart::Position(n),
                ..
            } => Some(n),
            _ => None,
        }
    })
}

/// Record renumbering patterns for every id, label binding and legend in an
/// item that embeds its index.
fn remember_patterns(doc: &mut Document, item: NodeId) {
    let current = current_index(doc, item);

    for id in doc.subtree(item) {
        let node = doc.node(id);
        let id_pattern = node
            .id
            .as_deref()
            .filter(|_| !node.data.contains_key(DATA_ID_PATTERN))
            .and_then(|raw| index_pattern(raw, current));
        let (for_pattern, legend_pattern) = match &node.kind {
            NodeKind::Label {
                for_id: Some(for_id),
                ..
            } if !node.data.contains_key(DATA_FOR_PATTERN) => (index_pattern(for_id, current), None),
            NodeKind::Legend { text } if !node.data.contains_key(DATA_LEGEND_PATTERN) => {
                (None, index_pattern(text, None))
            }
            _ => (None, None),
        };

        let data = &mut doc.node_mut(id).data;
        if let Some(pattern) = id_pattern {
            data.insert(DATA_ID_PATTERN.to_string(), pattern);
        }
        if let Some(pattern) = for_pattern {
            data.insert(DATA_FOR_PATTERN.to_string(), pattern);
        }
        if let Some(pattern) = legend_pattern {
            data.insert(DATA_LEGEND_PATTERN.to_string(), pattern);
        }
    }
}

fn renumber_group(doc: &mut Document, bound: &BoundGroup) {
    let items = direct_items(doc, bound);
    let hide_remove = items.len() == 1 && !bound.spec.can_be_empty;

    for (offset, &item) in items.iter().enumerate() {
        let position = offset + 1;
        doc.node_mut(item)
            .data
            .insert(DATA_INDEX.to_string(), position.to_string());

        for id in doc.subtree(item) {
            let hidden = doc.is_hidden(id);
            let node = doc.node_mut(id);

            if let Some(pattern) = node.data.get(DATA_ID_PATTERN) {
                node.id = Some(fill_pattern(pattern, position));
            }
            let for_pattern = node.data.get(DATA_FOR_PATTERN).cloned();
            let legend_pattern = node.data.get(DATA_LEGEND_PATTERN).cloned();

            match &mut node.kind {
                NodeKind::Field(field) => {
                    field.name = with_position(&field.name, position);
                    field.required = field.required_when_visible && !hidden;
                }
                NodeKind::Label { for_id, .. } => {
                    if let Some(pattern) = for_pattern {
                        *for_id = Some(fill_pattern(&pattern, position));
                    }
                }
                NodeKind::Legend { text } => {
                    if let Some(pattern) = legend_pattern {
                        *text = fill_pattern(&pattern, position);
                    }
                }
                _ => {}
            }

            if node.has_class(REMOVE_CLASS) {
                node.hidden = hide_remove;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    /// Page with a siblings group holding one markup item.
    fn siblings_page(markup_items: usize) -> Document {
        let mut doc = Document::new();
        let section = doc.append(doc.root(), Node::element("section"));
        let container = doc.append(section, Node::element("div").with_id("siblings-container"));
        for n in 1..=markup_items {
            let item = doc.append(container, Node::element("fieldset").with_class(ITEM_CLASS));
            doc.append(item, Node::legend(format!("Sibling {n}")));
            doc.append(item, Node::label(format!("sibling-name-{n}"), "Name"));
            doc.append(
                item,
                Node::text_input(format!("sibling[{n}][name]"))
                    .with_id(format!("sibling-name-{n}"))
                    .required(),
            );
            doc.append(item, Node::button().with_class(REMOVE_CLASS));
        }
        doc.append(section, Node::button().with_id("add-sibling"));
        let template = doc.append_template(
            section,
            "sibling-template",
            Node::element("fieldset").with_class(ITEM_CLASS),
        );
        doc.append(template, Node::legend("Sibling #"));
        doc.append(template, Node::label("sibling-name-#", "Name"));
        doc.append(
            template,
            Node::text_input("sibling[#][name]")
                .with_id("sibling-name-#")
                .required(),
        );
        doc.append(template, Node::button().with_class(REMOVE_CLASS).hidden());
        doc
    }

    fn sibling_spec() -> Vec<GroupSpec> {
        vec![GroupSpec::new(
            "sibling",
            "siblings-container",
            "add-sibling",
            "sibling-template",
        )]
    }

    fn names(doc: &Document, item: NodeId) -> Vec<String> {
        doc.fields(item)
            .into_iter()
            .map(|id| doc.field(id).unwrap().name.clone())
            .collect()
    }

    fn assert_contiguous(doc: &Document, groups: &RepeatableGroups) {
        let items = groups.items(doc, "sibling");
        for (i, &item) in items.iter().enumerate() {
            let position = i + 1;
            assert_eq!(names(doc, item), vec![format!("sibling[{position}][name]")]);
            let input = doc.fields(item)[0];
            assert_eq!(
                doc.node(input).id.as_deref(),
                Some(format!("sibling-name-{position}").as_str())
            );
            let label = doc
                .descendants(item)
                .into_iter()
                .find(|&id| matches!(doc.node(id).kind, NodeKind::Label { .. }))
                .unwrap();
            match &doc.node(label).kind {
                NodeKind::Label { for_id, .. } => {
                    assert_eq!(for_id.as_deref(), doc.node(input).id.as_deref())
                }
                _ => unreachable!(),
            }
        }
    }

    fn remove_button(doc: &Document, item: NodeId) -> NodeId {
        doc.select_first(item, &Selector::class(REMOVE_CLASS)).unwrap()
    }

    #[test]
    fn test_setup_skips_groups_not_on_page() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &questionnaire_groups());
        assert!(groups.is_applicable("sibling"));
        assert!(!groups.is_applicable("education"));
        assert_eq!(
            groups.add_item(&mut doc, "education"),
            Err(GroupNotApplicable("education".to_string()))
        );
    }

    #[test]
    fn test_setup_skips_group_without_template() {
        let mut doc = Document::new();
        doc.append(doc.root(), Node::element("div").with_id("siblings-container"));
        doc.append(doc.root(), Node::button().with_id("add-sibling"));
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        assert!(!groups.is_applicable("sibling"));
    }

    #[test]
    fn test_single_item_hides_remove_control() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let items = groups.items(&doc, "sibling");
        assert_eq!(items.len(), 1);
        assert!(doc.node(remove_button(&doc, items[0])).hidden);
    }

    #[test]
    fn test_add_item_appends_and_renumbers() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());

        let handle = groups.add_item(&mut doc, "sibling").unwrap();
        let items = groups.items(&doc, "sibling");
        assert_eq!(items, vec![items[0], handle.node]);
        assert_eq!(names(&doc, handle.node), vec!["sibling[2][name]".to_string()]);
        for &item in &items {
            assert!(!doc.node(remove_button(&doc, item)).hidden);
        }
        assert_contiguous(&doc, &groups);
    }

    #[test]
    fn test_legend_is_renumbered() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let second = groups.add_item(&mut doc, "sibling").unwrap();
        let legend = doc.descendants(second.node)[0];
        assert_eq!(doc.node(legend).kind, NodeKind::Legend { text: "Sibling 2".to_string() });
    }

    #[test]
    fn test_remove_middle_item_renumbers_followers() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let second = groups.add_item(&mut doc, "sibling").unwrap();
        let third = groups.add_item(&mut doc, "sibling").unwrap();

        assert!(groups.remove_item(&mut doc, &second));
        let items = groups.items(&doc, "sibling");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], third.node);
        assert_eq!(names(&doc, third.node), vec!["sibling[2][name]".to_string()]);
        assert_contiguous(&doc, &groups);
    }

    #[test]
    fn test_arbitrary_add_remove_sequence_stays_contiguous() {
        let mut doc = siblings_page(2);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        assert_contiguous(&doc, &groups);

        for step in 0..12 {
            if step % 3 == 2 {
                let items = groups.items(&doc, "sibling");
                let victim = ItemHandle {
                    group: "sibling".to_string(),
                    node: items[step % items.len()],
                };
                groups.remove_item(&mut doc, &victim);
            } else {
                groups.add_item(&mut doc, "sibling").unwrap();
            }
            assert_contiguous(&doc, &groups);
        }
    }

    #[test]
    fn test_renumbering_rewrites_the_trailing_index_of_ids() {
        let mut doc = siblings_page(2);
        let container = doc.get_by_id("siblings-container").unwrap();
        let markup: Vec<NodeId> = doc
            .descendants(container)
            .into_iter()
            .filter(|&id| doc.node(id).has_class(ITEM_CLASS))
            .collect();
        for (i, &item) in markup.iter().enumerate() {
            doc.append(item, Node::element("div").with_id(format!("addr2-line-{}", i + 1)));
        }
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());

        let first = ItemHandle {
            group: "sibling".to_string(),
            node: markup[0],
        };
        assert!(groups.remove_item(&mut doc, &first));
        let moved = doc.get_by_id("addr2-line-1").unwrap();
        assert!(doc.is_descendant_or_self(moved, markup[1]));
        assert!(doc.get_by_id("addr1-line-2").is_none());
        assert_contiguous(&doc, &groups);
    }

    #[test]
    fn test_last_required_item_cannot_be_removed() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let only = ItemHandle {
            group: "sibling".to_string(),
            node: groups.items(&doc, "sibling")[0],
        };
        assert!(!groups.remove_item(&mut doc, &only));
        assert_eq!(groups.items(&doc, "sibling").len(), 1);
    }

    #[test]
    fn test_group_that_can_be_empty_keeps_remove_visible() {
        let mut doc = siblings_page(1);
        let specs = vec![sibling_spec().remove(0).allow_empty()];
        let groups = RepeatableGroups::setup(&mut doc, &specs);
        let only = groups.items(&doc, "sibling")[0];
        assert!(!doc.node(remove_button(&doc, only)).hidden);

        let handle = ItemHandle {
            group: "sibling".to_string(),
            node: only,
        };
        assert!(groups.remove_item(&mut doc, &handle));
        assert!(groups.items(&doc, "sibling").is_empty());
    }

    #[test]
    fn test_ensure_count_is_idempotent_and_never_shrinks() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());

        let added = groups.ensure_count(&mut doc, "sibling", 3).unwrap();
        assert_eq!(added.len(), 2);
        assert!(groups.ensure_count(&mut doc, "sibling", 3).unwrap().is_empty());
        assert!(groups.ensure_count(&mut doc, "sibling", 1).unwrap().is_empty());
        assert_eq!(groups.items(&doc, "sibling").len(), 3);
        assert_contiguous(&doc, &groups);
    }

    #[test]
    fn test_click_targets_resolve() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let add = doc.get_by_id("add-sibling").unwrap();
        assert_eq!(groups.group_for_add_button(add), Some("sibling"));

        let item = groups.items(&doc, "sibling")[0];
        let handle = groups
            .item_for_remove_button(&doc, remove_button(&doc, item))
            .unwrap();
        assert_eq!(handle.node, item);
        assert!(groups.item_for_remove_button(&doc, add).is_none());
    }

    #[test]
    fn test_renumber_restores_required_only_when_visible() {
        let mut doc = siblings_page(1);
        let groups = RepeatableGroups::setup(&mut doc, &sibling_spec());
        let second = groups.add_item(&mut doc, "sibling").unwrap();
        doc.set_hidden(second.node, true);
        groups.renumber(&mut doc, "sibling");

        let hidden_input = doc.fields(second.node)[0];
        assert!(!doc.field(hidden_input).unwrap().required);
        let first_input = doc.fields(groups.items(&doc, "sibling")[0])[0];
        assert!(doc.field(first_input).unwrap().required);
    }
}
