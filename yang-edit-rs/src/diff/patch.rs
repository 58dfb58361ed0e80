//! Diff application.
//!
//! Replays a diff produced by the edit applier (or merged from several)
//! onto a data tree.

use tracing::{debug, trace};

use super::{diff_op, get_origin, set_cont_dflt, set_origin};
use crate::edit::{insert_node, EditOp, Insert};
use crate::error::{Error, Result};
use crate::matching::find_match;
use crate::node::{DataTree, DupFlags, NodeFlags, NodeId};
use crate::schema::NodeKind;

/// Diff applicator.
#[derive(Debug, Clone)]
pub struct Patch {
    with_origin: bool,
    module: Option<String>,
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch {
    /// Creates a diff applicator that leaves origins alone.
    pub fn new() -> Self {
        Patch {
            with_origin: false,
            module: None,
        }
    }

    /// Also copies the origin of every diff node to the data node.
    pub fn with_origin(mut self, with_origin: bool) -> Self {
        self.with_origin = with_origin;
        self
    }

    /// Applies only the top-level diff nodes of this module.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Applies a diff to a data tree.
    ///
    /// # Arguments
    /// * `data` - The data tree to modify
    /// * `diff` - A diff whose changes have not been applied to `data` yet
    ///
    /// A diff that does not fit the data is reported as an internal error;
    /// `data` may be partially modified then.
    pub fn apply(&self, data: &mut DataTree, diff: &DataTree) -> Result<()> {
        debug!(
            data_nodes = data.node_count(),
            diff_nodes = diff.node_count(),
            with_origin = self.with_origin,
            "applying diff"
        );
        for root in diff.roots() {
            if let Some(module) = &self.module {
                if diff.schema().module_of(diff.schema_id(root)).name != *module {
                    continue;
                }
            }
            self.apply_node(data, None, diff, root)?;
        }
        Ok(())
    }

    fn apply_node(
        &self,
        data: &mut DataTree,
        parent: Option<NodeId>,
        diff: &DataTree,
        node: NodeId,
    ) -> Result<()> {
        let (op, anchor) = diff_op(diff, node)?;
        trace!(node = diff.name(node), %op, "diff node");

        let matched = match anchor {
            Some(anchor) => self.apply_userord(data, parent, diff, node, op, &anchor)?,
            None => match op {
                EditOp::None => {
                    if !diff.has_non_key_children(node) {
                        return Err(Error::Internal(format!(
                            "Diff node \"{}\" with no operation has no children.",
                            diff.path(node)
                        )));
                    }
                    find_existing(data, parent, diff, node, op)?
                }
                EditOp::Create => {
                    let dup = diff.duplicate_into(node, data, DupFlags::WITH_KEYS | DupFlags::NO_ATTRS);
                    insert_node(data, parent, dup, Insert::Default, None)?;
                    dup
                }
                EditOp::Delete => {
                    let found = find_existing(data, parent, diff, node, op)?;
                    data.free_subtree(found);
                    set_cont_dflt(data, parent);
                    return Ok(());
                }
                EditOp::Replace => {
                    let found = find_existing(data, parent, diff, node, op)?;
                    replace_value(data, found, diff, node)?;
                    found
                }
                other => {
                    return Err(Error::Internal(format!(
                        "Unexpected diff operation \"{}\".",
                        other
                    )))
                }
            },
        };

        if self.with_origin {
            let origin = get_origin(diff, node).map(|(origin, _)| origin);
            set_origin(data, matched, origin.as_deref(), true);
        }

        if diff.kind(node).has_children() {
            for child in diff.non_key_children(node) {
                self.apply_node(data, Some(matched), diff, child)?;
            }
        }
        Ok(())
    }

    // Inserts or moves a user-ordered instance next to its anchor.
    fn apply_userord(
        &self,
        data: &mut DataTree,
        parent: Option<NodeId>,
        diff: &DataTree,
        node: NodeId,
        op: EditOp,
        anchor: &str,
    ) -> Result<NodeId> {
        let target = if op == EditOp::Replace {
            find_existing(data, parent, diff, node, op)?
        } else {
            diff.duplicate_into(node, data, DupFlags::WITH_KEYS | DupFlags::NO_ATTRS)
        };
        let placed = if anchor.is_empty() {
            insert_node(data, parent, target, Insert::First, None)
        } else {
            insert_node(data, parent, target, Insert::After, Some(anchor))
        };
        if let Err(e) = placed {
            if op == EditOp::Create {
                data.free_subtree(target);
            }
            return Err(e);
        }
        Ok(target)
    }
}

/// Applies a diff to a data tree, optionally copying origins.
pub fn apply_diff(data: &mut DataTree, diff: &DataTree, with_origin: bool) -> Result<()> {
    Patch::new().with_origin(with_origin).apply(data, diff)
}

// The data node a diff node refers to; it must exist.
fn find_existing(
    data: &DataTree,
    parent: Option<NodeId>,
    diff: &DataTree,
    node: NodeId,
    op: EditOp,
) -> Result<NodeId> {
    let found = find_match(data, data.first_sibling(parent), diff, node, op, Insert::Default, None)?;
    found.node.ok_or_else(|| {
        Error::Internal(format!(
            "Diff node \"{}\" does not exist in the data.",
            diff.path(node)
        ))
    })
}

// Takes over value and markers of a `replace` diff node; something must change.
fn replace_value(data: &mut DataTree, target: NodeId, diff: &DataTree, node: NodeId) -> Result<()> {
    let value = diff.value(node);
    let changed = data.value(target) != value || data.is_default(target) != diff.is_default(node);
    match diff.kind(node) {
        NodeKind::Leaf => {
            data.set_leaf_value(target, value.unwrap_or(""))?;
        }
        NodeKind::AnyData => data.set_value(target, value.map(str::to_string)),
        kind => {
            return Err(Error::Internal(format!(
                "Value of {} \"{}\" cannot be replaced.",
                kind.name(),
                diff.name(node)
            )))
        }
    }
    if !changed {
        return Err(Error::Internal(format!(
            "Replacing node \"{}\" changes nothing.",
            diff.path(node)
        )));
    }
    let markers = NodeFlags::DEFAULT | NodeFlags::VALIDATED;
    let flags = (data.flags(target) - markers) | (diff.flags(node) & markers);
    data.set_flags(target, flags);
    Ok(())
}
