//! In-memory document model for section pages.
//!
//! A `Document` is an arena of nodes forming one tree under a root element,
//! plus any number of detached subtrees (template contents, removed items,
//! fresh clones). Only nodes reachable from the root are "in the page".
//!
//! Nodes carry just what the form engine needs: an optional id, classes,
//! `data-*` attributes, a hidden flag, and a kind (plain element, form field,
//! label, legend, template).

pub mod name;
pub mod selector;

use std::collections::BTreeMap;

pub use name::{FieldName, IndexPart};
pub use selector::Selector;

/// Index of a node inside its `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Kind of an input-capable element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    TextArea,
    Select,
    Date,
    Email,
    Checkbox,
    Radio,
    /// Buttons are never collected or populated.
    Button,
}

impl InputKind {
    /// Whether values of this kind take part in collection and population.
    pub fn carries_data(self) -> bool {
        !matches!(self, Self::Button)
    }
}

/// State of a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState {
    pub kind: InputKind,
    pub name: String,
    /// Current value. For checkboxes and radios this is the submitted value.
    pub value: String,
    pub checked: bool,
    /// Effective required flag.
    pub required: bool,
    /// Whether the field is required whenever it is visible.
    pub required_when_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String },
    Field(FieldState),
    Label { for_id: Option<String>, text: String },
    Legend { text: String },
    /// Inert template. `content` is the detached root of its subtree.
    Template { content: Option<NodeId> },
}

/// One node of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub data: BTreeMap<String, String>,
    pub hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            id: None,
            classes: Vec::new(),
            data: BTreeMap::new(),
            hidden: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Element { tag: tag.into() })
    }

    pub fn field(kind: InputKind, name: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Field(FieldState {
            kind,
            name: name.into(),
            value: String::new(),
            checked: false,
            required: false,
            required_when_visible: false,
        }))
    }

    pub fn text_input(name: impl Into<String>) -> Self {
        Self::field(InputKind::Text, name)
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::field(InputKind::Checkbox, name)
    }

    pub fn radio(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::field(InputKind::Radio, name).with_value(value)
    }

    pub fn button() -> Self {
        Self::field(InputKind::Button, "")
    }

    pub fn label(for_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Label {
            for_id: Some(for_id.into()),
            text: text.into(),
        })
    }

    pub fn legend(text: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Legend { text: text.into() })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        if let NodeKind::Field(field) = &mut self.kind {
            field.value = value.into();
        }
        self
    }

    pub fn checked(mut self) -> Self {
        if let NodeKind::Field(field) = &mut self.kind {
            field.checked = true;
        }
        self
    }

    /// Mark the field as required whenever it is visible.
    pub fn required(mut self) -> Self {
        if let NodeKind::Field(field) = &mut self.kind {
            field.required = true;
            field.required_when_visible = true;
        }
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn field_state(&self) -> Option<&FieldState> {
        match &self.kind {
            NodeKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    focused: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document whose root is a `body` element.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::element("body")],
            root: NodeId(0),
            focused: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Allocate a detached node.
    pub fn create(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Allocate a node and append it as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.create(node);
        self.append_child(parent, id);
        id
    }

    /// Attach `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove `node` from its parent. The subtree stays allocated.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
        if self.focused.is_some_and(|f| self.is_descendant_or_self(f, node)) {
            self.focused = None;
        }
    }

    /// Append a template under `parent` and return the detached root of its
    /// content, built from `content`.
    pub fn append_template(&mut self, parent: NodeId, template_id: &str, content: Node) -> NodeId {
        let template = self.append(
            parent,
            Node::with_kind(NodeKind::Template { content: None }).with_id(template_id),
        );
        let content_root = self.create(content);
        self.nodes[template.0].kind = NodeKind::Template {
            content: Some(content_root),
        };
        content_root
    }

    /// Detached content root of a template node.
    pub fn template_content(&self, template: NodeId) -> Option<NodeId> {
        match self.nodes[template.0].kind {
            NodeKind::Template { content } => content,
            _ => None,
        }
    }

    /// Deep-copy the subtree rooted at `source` into a new detached subtree.
    pub fn clone_subtree(&mut self, source: NodeId) -> NodeId {
        let mut copy = self.nodes[source.0].clone();
        copy.parent = None;
        let children = std::mem::take(&mut copy.children);
        let new_root = self.create(copy);
        for child in children {
            let new_child = self.clone_subtree(child);
            self.append_child(new_root, new_child);
        }
        new_root
    }

    /// Nodes of the subtree rooted at `scope` in document order, including
    /// `scope` itself. Template contents are not traversed.
    pub fn subtree(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Like [`subtree`](Self::subtree) but without `scope` itself.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut nodes = self.subtree(scope);
        nodes.remove(0);
        nodes
    }

    /// Ancestors of `node`, nearest first, excluding `node`.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[node.0].parent, |id| self.nodes[id.0].parent)
    }

    pub fn is_descendant_or_self(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether `node` is part of the page (reachable from the root).
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.is_descendant_or_self(node, self.root)
    }

    /// Nearest node, starting at `node` itself, satisfying `pred`.
    pub fn closest(&self, node: NodeId, pred: impl Fn(&Node) -> bool) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|&id| pred(&self.nodes[id.0]))
    }

    /// Whether `node` or any of its ancestors is hidden.
    pub fn is_hidden(&self, node: NodeId) -> bool {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .any(|id| self.nodes[id.0].hidden)
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.nodes[node.0].hidden = hidden;
    }

    pub fn field(&self, node: NodeId) -> Option<&FieldState> {
        self.nodes[node.0].field_state()
    }

    pub fn field_mut(&mut self, node: NodeId) -> Option<&mut FieldState> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Named, data-carrying fields within `scope`, in document order.
    pub fn fields(&self, scope: NodeId) -> Vec<NodeId> {
        self.subtree(scope)
            .into_iter()
            .filter(|&id| {
                self.field(id)
                    .is_some_and(|f| f.kind.carries_data() && !f.name.is_empty())
            })
            .collect()
    }

    /// Every node within `scope` matching `selector`, in document order.
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.subtree(scope)
            .into_iter()
            .filter(|&id| selector.matches(&self.nodes[id.0]))
            .collect()
    }

    pub fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.subtree(scope)
            .into_iter()
            .find(|&id| selector.matches(&self.nodes[id.0]))
    }

    /// Attached node with the given id, if any.
    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.select_first(self.root, &Selector::Id(id.to_string()))
    }

    /// Radios sharing `name` within `scope`.
    pub fn radio_group(&self, scope: NodeId, name: &str) -> Vec<NodeId> {
        self.fields(scope)
            .into_iter()
            .filter(|&id| {
                self.field(id)
                    .is_some_and(|f| f.kind == InputKind::Radio && f.name == name)
            })
            .collect()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn focus(&mut self, node: NodeId) {
        self.focused = Some(node);
    }
}
