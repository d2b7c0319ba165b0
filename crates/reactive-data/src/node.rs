//! Materialized value tree.

use indexmap::IndexMap;
use serde_json::{Map, Value};

pub(crate) type Children = IndexMap<String, DataNode>;

/// A node in the materialized data tree.
///
/// A node either holds an opaque leaf value or named children, never both.
/// A node left with neither is detached from its parent rather than kept
/// around as an empty placeholder, so an existing node always exports to
/// something observable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DataNode {
    Leaf(Value),
    Branch(Children),
}

impl DataNode {
    pub(crate) fn empty_branch() -> Self {
        DataNode::Branch(Children::new())
    }

    pub(crate) fn is_empty_branch(&self) -> bool {
        matches!(self, DataNode::Branch(children) if children.is_empty())
    }

    /// Exported view of this node: the leaf value itself, or a plain object
    /// assembled from the children. A branch whose children all export to
    /// nothing yields `None`.
    pub(crate) fn export(&self) -> Option<Value> {
        match self {
            DataNode::Leaf(value) => Some(value.clone()),
            DataNode::Branch(children) => {
                let mut map = Map::new();
                for (key, child) in children {
                    if let Some(value) = child.export() {
                        map.insert(key.clone(), value);
                    }
                }
                if map.is_empty() {
                    None
                } else {
                    Some(Value::Object(map))
                }
            }
        }
    }
}
