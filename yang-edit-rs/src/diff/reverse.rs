//! Diff reversal.

use tracing::{debug, trace};

use super::anchor_attrs;
use crate::constants::{ATTR_OPERATION, ATTR_ORIG_DFLT, ATTR_ORIG_VALUE, META_NS, NETCONF_NS, YANG_NS};
use crate::edit::{set_operation, EditOp};
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::{NodeKind, SchemaId};

/// Computes the diff that undoes `diff`.
///
/// Applying `diff` and then its reverse leaves a data tree as it was.
/// `create` and `delete` swap, `replace` entries swap their current and
/// original values or anchors. Entries tagged `none` are kept as they are.
///
/// Every anchor of a user-ordered entry is only valid right after the
/// entries before it were applied, so those entries are undone last to
/// first: their order among siblings is reversed as well.
pub fn reverse_diff(diff: &DataTree) -> Result<DataTree> {
    let mut reversed = diff.clone();
    for node in reversed.all_nodes() {
        reverse_node(&mut reversed, node)?;
    }
    reverse_userord_entries(&mut reversed);
    debug!(nodes = reversed.node_count(), "diff reversed");
    Ok(reversed)
}

fn reverse_node(tree: &mut DataTree, node: NodeId) -> Result<()> {
    let op = match tree.attr(node, NETCONF_NS, ATTR_OPERATION) {
        Some(op) => op.parse::<EditOp>()?,
        None => return Ok(()),
    };
    trace!(node = tree.name(node), %op, "reversing");
    match op {
        EditOp::Create => set_operation(tree, node, EditOp::Delete),
        EditOp::Delete => set_operation(tree, node, EditOp::Create),
        EditOp::Replace => match tree.kind(node) {
            NodeKind::Leaf | NodeKind::AnyData => swap_value(tree, node)?,
            kind @ (NodeKind::List | NodeKind::LeafList) => {
                let (cur_name, orig_name) = anchor_attrs(kind);
                let cur = take_attr(tree, node, YANG_NS, cur_name)?;
                let orig = take_attr(tree, node, META_NS, orig_name)?;
                let attrs = tree.attrs_mut(node);
                attrs.set(YANG_NS, cur_name, orig);
                attrs.set(META_NS, orig_name, cur);
            }
            NodeKind::Container => {
                return Err(Error::Internal(format!(
                    "Container \"{}\" cannot be replaced in a diff.",
                    tree.name(node)
                )))
            }
        },
        other => {
            return Err(Error::Internal(format!(
                "Unexpected diff operation \"{}\" on node \"{}\".",
                other,
                tree.name(node)
            )))
        }
    }
    Ok(())
}

// Flips the order of user-ordered entries carrying their own operation,
// per schema node and parent. Descendants of created or deleted subtrees
// inherit the operation and keep their order.
fn reverse_userord_entries(tree: &mut DataTree) {
    let parents = std::iter::once(None).chain(
        tree.all_nodes()
            .into_iter()
            .filter(|&n| tree.kind(n).has_children())
            .map(Some),
    );
    let parents: Vec<Option<NodeId>> = parents.collect();

    for parent in parents {
        let siblings: Vec<NodeId> = match parent {
            Some(p) => tree.children(p).collect(),
            None => tree.roots().collect(),
        };
        let mut groups: Vec<(SchemaId, Vec<NodeId>)> = Vec::new();
        for node in siblings {
            if !tree.is_user_ordered(node) || tree.attr(node, NETCONF_NS, ATTR_OPERATION).is_none() {
                continue;
            }
            let schema = tree.schema_id(node);
            match groups.iter_mut().find(|(s, _)| *s == schema) {
                Some((_, group)) => group.push(node),
                None => groups.push((schema, vec![node])),
            }
        }
        for (_, group) in groups.into_iter().filter(|(_, g)| g.len() > 1) {
            trace!(node = tree.name(group[0]), count = group.len(), "reversing entry order");
            for i in 0..group.len() / 2 {
                swap_siblings(tree, group[i], group[group.len() - 1 - i]);
            }
        }
    }
}

// Swaps the places of two siblings, `a` coming before `b`.
fn swap_siblings(tree: &mut DataTree, a: NodeId, b: NodeId) {
    match tree.next(a) {
        Some(next) if next != b => {
            tree.unlink(a);
            tree.insert_after(b, a);
            tree.unlink(b);
            tree.insert_before(next, b);
        }
        _ => {
            tree.unlink(b);
            tree.insert_before(a, b);
        }
    }
}

// Current value and default marker trade places with the recorded originals.
fn swap_value(tree: &mut DataTree, node: NodeId) -> Result<()> {
    let orig = take_attr(tree, node, META_NS, ATTR_ORIG_VALUE)?;
    let orig_dflt = tree.attrs_mut(node).remove(META_NS, ATTR_ORIG_DFLT).is_some();
    let value = tree.value(node).unwrap_or("").to_string();
    let dflt = tree.is_default(node);

    tree.set_value(node, Some(orig));
    tree.set_default(node, orig_dflt);
    let attrs = tree.attrs_mut(node);
    attrs.set(META_NS, ATTR_ORIG_VALUE, value);
    if dflt {
        attrs.set(META_NS, ATTR_ORIG_DFLT, "");
    }
    Ok(())
}

fn take_attr(tree: &mut DataTree, node: NodeId, namespace: &str, name: &str) -> Result<String> {
    let value = tree.attrs_mut(node).remove(namespace, name);
    value.ok_or_else(|| {
        Error::Internal(format!(
            "Diff node \"{}\" is missing its \"{}\" attribute.",
            tree.path(node),
            name
        ))
    })
}
