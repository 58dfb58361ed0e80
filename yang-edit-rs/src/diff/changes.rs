//! Iteration over the individual changes of a diff.

use std::fmt;

use super::{anchor_attrs, node_op};
use crate::constants::{ATTR_OPERATION, ATTR_ORIG_VALUE, META_NS, NETCONF_NS};
use crate::edit::EditOp;
use crate::error::Result;
use crate::node::{DataTree, NodeId};
use crate::schema::NodeKind;

/// Kind of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Created,
    Deleted,
    /// A leaf or anydata value changed.
    Modified,
    /// A user-ordered instance changed position.
    Moved,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeOp::Created => "created",
            ChangeOp::Deleted => "deleted",
            ChangeOp::Modified => "modified",
            ChangeOp::Moved => "moved",
        })
    }
}

/// One changed node of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub operation: ChangeOp,
    /// The diff node.
    pub node: NodeId,
    /// Previous value of a modified node, or previous anchor of a moved one.
    pub previous: Option<String>,
}

/// Lists the changes recorded in `diff`, depth-first.
///
/// Nodes under `none` produce nothing. Every node of a created or deleted
/// subtree is reported on its own, list keys included, while the keys of
/// a moved list are not.
pub fn changes(diff: &DataTree) -> Result<Vec<Change>> {
    let mut out = Vec::new();
    for node in diff.all_nodes() {
        if diff.is_key(node) {
            if let Some(list) = diff.parent(node) {
                if diff.attr(list, NETCONF_NS, ATTR_OPERATION) == Some("replace") {
                    continue;
                }
            }
        }
        let (operation, previous) = match node_op(diff, node)? {
            EditOp::Create => (ChangeOp::Created, None),
            EditOp::Delete => (ChangeOp::Deleted, None),
            EditOp::Replace => match diff.kind(node) {
                kind @ (NodeKind::List | NodeKind::LeafList) => {
                    let (_, orig) = anchor_attrs(kind);
                    (ChangeOp::Moved, diff.attr(node, META_NS, orig).map(str::to_string))
                }
                _ => (
                    ChangeOp::Modified,
                    diff.attr(node, META_NS, ATTR_ORIG_VALUE).map(str::to_string),
                ),
            },
            _ => continue,
        };
        out.push(Change {
            operation,
            node,
            previous,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafType, Schema, SchemaBuilder};
    use crate::xml::parse_str;
    use std::rc::Rc;

    fn schema() -> Rc<Schema> {
        let mut b = SchemaBuilder::new();
        let m = b.module("ex", "urn:ex");
        let cont = b.container(m, "cont");
        b.leaf(cont, "name", LeafType::String);
        let user = b.list(cont, "user", &[("id", LeafType::Int)], true);
        b.leaf(user, "role", LeafType::String);
        b.leaf_list(cont, "tag", LeafType::String, true);
        b.build()
    }

    const NS: &str = r#"xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:yang="urn:ietf:params:xml:ns:yang:1" xmlns:meta="urn:yang-edit:meta:1.0""#;

    fn summary(diff: &DataTree) -> Vec<(ChangeOp, String, Option<String>)> {
        changes(diff)
            .unwrap()
            .into_iter()
            .map(|c| (c.operation, diff.name(c.node).to_string(), c.previous))
            .collect()
    }

    #[test]
    fn test_lists_changes_in_order() {
        let diff = parse_str(
            &schema(),
            &format!(
                r#"<cont {NS} meta:operation="none"><name nc:operation="replace" meta:orig-value="a">b</name><user nc:operation="replace" yang:key="" meta:orig-key="[id='2']"><id>1</id><role nc:operation="create">r</role></user><user nc:operation="delete" yang:key="[id='1']"><id>2</id></user><tag nc:operation="replace" yang:value="" meta:orig-value="y">x</tag></cont>"#
            ),
        )
        .unwrap();
        assert_eq!(
            summary(&diff),
            [
                (ChangeOp::Modified, "name".to_string(), Some("a".to_string())),
                (ChangeOp::Moved, "user".to_string(), Some("[id='2']".to_string())),
                (ChangeOp::Created, "role".to_string(), None),
                (ChangeOp::Deleted, "user".to_string(), None),
                (ChangeOp::Deleted, "id".to_string(), None),
                (ChangeOp::Moved, "tag".to_string(), Some("y".to_string())),
            ]
        );
    }

    #[test]
    fn test_none_only_diff_has_no_changes() {
        let diff = parse_str(&schema(), &format!(r#"<cont {NS} meta:operation="none"/>"#)).unwrap();
        assert!(changes(&diff).unwrap().is_empty());
    }
}
