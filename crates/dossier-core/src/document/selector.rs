//! Minimal element selectors used by page layouts.

use serde::{Deserialize, Serialize};

use super::{Node, NodeKind};

/// Selects nodes by id, class, field name or `data-*` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Id(String),
    Class(String),
    Name(String),
    Data { key: String, value: String },
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::Id(id) => node.id.as_deref() == Some(id.as_str()),
            Self::Class(class) => node.has_class(class),
            Self::Name(name) => {
                matches!(&node.kind, NodeKind::Field(field) if &field.name == name)
            }
            Self::Data { key, value } => node.data.get(key) == Some(value),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Class(class) => write!(f, ".{class}"),
            Self::Name(name) => write!(f, "[name=\"{name}\"]"),
            Self::Data { key, value } => write!(f, "[data-{key}=\"{value}\"]"),
        }
    }
}
