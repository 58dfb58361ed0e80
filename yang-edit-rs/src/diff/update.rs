//! Diff update against current data.

use tracing::{debug, trace};

use super::diff_op;
use crate::edit::{EditOp, Insert};
use crate::error::{Error, ErrorKind, Result};
use crate::matching::{find_by_predicate, find_match};
use crate::node::{DataTree, NodeId};

/// Drops the entries of `diff` that can no longer be applied to `data`.
///
/// A stored diff is applied on top of `data` whenever the result is
/// needed. Once `data` changes, entries may point at nodes or anchors that
/// are gone, or replace a value with the one already there. Those entries
/// are removed, and so are `none` entries left without children.
pub fn update_diff(diff: &mut DataTree, data: &DataTree) -> Result<()> {
    let before = diff.node_count();
    let roots: Vec<NodeId> = diff.roots().collect();
    for root in roots {
        update_node(diff, data, data.first_root(), root)?;
    }
    debug!(before, after = diff.node_count(), "diff updated");
    Ok(())
}

fn update_node(
    diff: &mut DataTree,
    data: &DataTree,
    first: Option<NodeId>,
    node: NodeId,
) -> Result<()> {
    let (op, anchor) = diff_op(diff, node)?;

    let matched = match anchor {
        Some(anchor) => {
            let target = match op {
                EditOp::Replace => lookup(data, first, diff, node, op)?,
                _ => None,
            };
            let anchor_found = anchor.is_empty() || {
                match find_by_predicate(data, first, diff.schema_id(node), &anchor) {
                    Ok(_) => true,
                    Err(e) if e.kind() == ErrorKind::NotFound => false,
                    Err(e) => return Err(e),
                }
            };
            match (op, anchor_found) {
                (_, false) => None,
                (EditOp::Create, true) => return Ok(()),
                (_, true) => target,
            }
        }
        None => match op {
            EditOp::None => {
                if !diff.has_non_key_children(node) {
                    return Err(Error::Internal(format!(
                        "Diff node \"{}\" with no operation has no children.",
                        diff.path(node)
                    )));
                }
                lookup(data, first, diff, node, op)?
            }
            EditOp::Create => return Ok(()),
            EditOp::Delete => lookup(data, first, diff, node, op)?,
            EditOp::Replace => lookup(data, first, diff, node, op)?.filter(|&m| {
                data.value(m) != diff.value(node) || data.is_default(m) != diff.is_default(node)
            }),
            other => {
                return Err(Error::Internal(format!(
                    "Unexpected diff operation \"{}\".",
                    other
                )))
            }
        },
    };

    let Some(matched) = matched else {
        trace!(node = diff.name(node), %op, "stale diff node");
        diff.free_subtree(node);
        return Ok(());
    };

    if diff.kind(node).has_children() {
        for child in diff.non_key_children(node) {
            update_node(diff, data, data.first_child(matched), child)?;
        }
        if op == EditOp::None && !diff.has_non_key_children(node) {
            trace!(node = diff.name(node), "diff node left empty");
            diff.free_subtree(node);
        }
    }
    Ok(())
}

fn lookup(
    data: &DataTree,
    first: Option<NodeId>,
    diff: &DataTree,
    node: NodeId,
    op: EditOp,
) -> Result<Option<NodeId>> {
    Ok(find_match(data, first, diff, node, op, Insert::Default, None)?.node)
}
