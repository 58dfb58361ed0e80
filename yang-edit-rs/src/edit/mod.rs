//! Edit operations.
//!
//! This module holds the operation vocabulary shared by edit and diff
//! trees, the resolver that computes the effective operation of an edit
//! node, the edit applier and the edit builder.

mod apply;
mod builder;
mod insert;

use std::fmt;
use std::str::FromStr;

pub use apply::{apply_edit, apply_edit_with, EditOptions, EditOutcome};
pub use builder::{EditBuilder, EditItem, Position};
pub(crate) use insert::insert_node;

use crate::constants::{
    ATTR_INSERT, ATTR_KEY, ATTR_OPERATION, ATTR_VALUE, META_NS, NETCONF_NS, YANG_NS,
};
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::NodeKind;

/// Operation of an edit or diff node.
///
/// `Ether` only exists in edits: operate on the node if it exists,
/// otherwise skip it and check its descendants only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditOp {
    Ether,
    None,
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
}

impl EditOp {
    /// Returns the attribute value of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            EditOp::Ether => "ether",
            EditOp::None => "none",
            EditOp::Merge => "merge",
            EditOp::Replace => "replace",
            EditOp::Create => "create",
            EditOp::Delete => "delete",
            EditOp::Remove => "remove",
        }
    }

    /// Namespace of the `operation` attribute carrying this operation.
    pub fn namespace(self) -> &'static str {
        match self {
            EditOp::Ether | EditOp::None => META_NS,
            _ => NETCONF_NS,
        }
    }

    /// Whether `self`, used as a default operation, may override `current`
    /// already in effect on an ancestor.
    pub fn is_superior_to(self, current: EditOp) -> bool {
        match current {
            EditOp::Create | EditOp::Delete | EditOp::Replace | EditOp::Remove => false,
            EditOp::Merge => self == EditOp::Replace,
            EditOp::None => matches!(self, EditOp::Replace | EditOp::Merge),
            EditOp::Ether => matches!(self, EditOp::Replace | EditOp::Merge | EditOp::None),
        }
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "ether" => EditOp::Ether,
            "none" => EditOp::None,
            "merge" => EditOp::Merge,
            "replace" => EditOp::Replace,
            "create" => EditOp::Create,
            "delete" => EditOp::Delete,
            "remove" => EditOp::Remove,
            other => {
                return Err(Error::ValidationFailed(format!(
                    "Unknown operation \"{}\".",
                    other
                )))
            }
        })
    }
}

/// Placement of a user-ordered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Insert {
    #[default]
    Default,
    First,
    Last,
    Before,
    After,
}

impl FromStr for Insert {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Insert::First),
            "last" => Ok(Insert::Last),
            "before" => Ok(Insert::Before),
            "after" => Ok(Insert::After),
            other => Err(Error::ValidationFailed(format!(
                "Invalid value \"{}\" of the \"insert\" attribute.",
                other
            ))),
        }
    }
}

impl Insert {
    pub fn as_str(self) -> &'static str {
        match self {
            Insert::Default => "default",
            Insert::First => "first",
            Insert::Last => "last",
            Insert::Before => "before",
            Insert::After => "after",
        }
    }

    /// Placements that need an anchor instance.
    pub fn needs_anchor(self) -> bool {
        matches!(self, Insert::Before | Insert::After)
    }
}

/// Effective operation of a node with its placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOp {
    pub op: EditOp,
    pub insert: Insert,
    /// Anchor predicate (list) or value (leaf-list) from `key`/`value`.
    pub anchor: Option<String>,
}

/// Name of the anchor attribute of a user-ordered node: `key` for lists,
/// `value` for leaf-lists.
pub(crate) fn anchor_attr(kind: NodeKind) -> &'static str {
    if kind == NodeKind::List {
        ATTR_KEY
    } else {
        ATTR_VALUE
    }
}

/// Computes the effective operation of `node`, inheriting `parent_op`.
pub fn resolve_op(tree: &DataTree, node: NodeId, parent_op: EditOp) -> Result<ResolvedOp> {
    let mut resolved = ResolvedOp {
        op: parent_op,
        insert: Insert::Default,
        anchor: None,
    };
    let user_ordered = tree.is_user_ordered(node);
    let anchor_name = anchor_attr(tree.kind(node));

    for (name, value) in tree.attrs(node).iter() {
        let ns: &str = &name.namespace_uri;
        if name.local_name == ATTR_OPERATION && (ns == NETCONF_NS || ns == META_NS) {
            resolved.op = value.parse()?;
        } else if user_ordered && ns == YANG_NS {
            if name.local_name == ATTR_INSERT {
                resolved.insert = value.parse()?;
            } else if name.local_name == anchor_name {
                resolved.anchor = Some(value.to_string());
            }
        }
    }

    if resolved.insert.needs_anchor() && resolved.anchor.is_none() {
        return Err(Error::ValidationFailed(format!(
            "Missing attribute \"{}\" required by the \"insert\" attribute.",
            anchor_name
        )));
    }
    Ok(resolved)
}

/// Operation carried by the node itself, in either namespace.
pub fn own_operation(tree: &DataTree, node: NodeId) -> Result<Option<EditOp>> {
    let attrs = tree.attrs(node);
    attrs
        .get(NETCONF_NS, ATTR_OPERATION)
        .or_else(|| attrs.get(META_NS, ATTR_OPERATION))
        .map(EditOp::from_str)
        .transpose()
}

/// Operation in effect at the node (own or inherited) and whether it is
/// the node's own.
pub fn inherited_operation(tree: &DataTree, node: NodeId) -> Result<Option<(EditOp, bool)>> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if let Some(op) = own_operation(tree, n)? {
            return Ok(Some((op, n == node)));
        }
        cur = tree.parent(n);
    }
    Ok(None)
}

/// Replaces the node's own operation.
pub fn set_operation(tree: &mut DataTree, node: NodeId, op: EditOp) {
    remove_operation(tree, node);
    tree.attrs_mut(node).set(op.namespace(), ATTR_OPERATION, op.as_str());
}

/// Drops the node's own operation, if any.
pub fn remove_operation(tree: &mut DataTree, node: NodeId) {
    let attrs = tree.attrs_mut(node);
    attrs.remove(NETCONF_NS, ATTR_OPERATION);
    attrs.remove(META_NS, ATTR_OPERATION);
}
