//! Diff merging.
//!
//! Combines a new diff (the source) into an existing, possibly stored
//! diff (the target) so that applying the merged diff has the effect of
//! applying both one after the other.
//!
//! # Algorithm Overview
//!
//! The merge walks the source depth-first. Every source node is matched
//! against the children of the current target node:
//! 1. A matched node combines its operation with the source operation
//!    (created then deleted cancels, deleted then created becomes `none`
//!    or `replace`, moves keep their original anchor, ...)
//! 2. An unmatched node is copied into the target with all descendants
//! 3. The origin of the node is taken from the source, then its owner is
//!    reconciled in a separate pass
//! 4. Nodes left without any change are pruned

mod ownership;

pub use ownership::{get_owner, own_owner, remove_owner, Owner};

use tracing::{debug, trace};

use self::ownership::reconcile_owner;
use crate::constants::{ATTR_ORIG_DFLT, ATTR_ORIG_VALUE, META_NS, YANG_NS};
use crate::diff::{anchor_attrs, diff_op, get_origin, is_redundant, node_op, set_origin, set_origin_keep_children};
use crate::edit::{own_operation, set_operation, EditOp, Insert};
use crate::error::{Error, ErrorKind, Result};
use crate::matching::{find_by_predicate, find_match};
use crate::node::{DataTree, DupFlags, NodeId};
use crate::schema::NodeKind;

/// Options of [`merge_diff`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Writer the merged changes belong to; `None` leaves ownership alone.
    pub owner: Option<Owner>,
}

/// Merges `source` into `target`, returning whether `target` changed.
///
/// # Arguments
/// * `target` - The accumulated diff, modified in place
/// * `source` - A newer diff to fold in
/// * `options` - Ownership of the merged changes
///
/// Combinations of operations that well-formed diffs never produce (such
/// as creating a node the target already creates with the same value) are
/// internal errors.
pub fn merge_diff(target: &mut DataTree, source: &DataTree, options: &MergeOptions) -> Result<bool> {
    debug!(
        target_nodes = target.node_count(),
        source_nodes = source.node_count(),
        owner = options.owner.map(|o| o.to_string()),
        "merging diff"
    );
    let mut merger = DiffMerger {
        target,
        source,
        owner: options.owner,
        changed: false,
    };
    for root in source.roots() {
        merger.merge_node(root, None)?;
    }
    debug!(changed = merger.changed, nodes = merger.target.node_count(), "diff merged");
    Ok(merger.changed)
}

/// Outcome of combining two operations at one node.
enum Merged {
    Kept,
    /// The target node is gone; nothing below it is merged.
    Dropped,
}

struct DiffMerger<'a> {
    target: &'a mut DataTree,
    source: &'a DataTree,
    owner: Option<Owner>,
    changed: bool,
}

impl DiffMerger<'_> {
    fn merge_node(&mut self, src: NodeId, parent: Option<NodeId>) -> Result<()> {
        let (src_op, anchor) = diff_op(self.source, src)?;
        let found = find_match(
            self.target,
            self.target.first_sibling(parent),
            self.source,
            src,
            src_op,
            Insert::Default,
            None,
        )?;

        let node = match found.node {
            Some(node) => {
                let cur_op = node_op(self.target, node)?;
                trace!(node = self.source.name(src), %cur_op, %src_op, "merging");
                let merged = self
                    .merge_ops(node, cur_op, src, src_op, found.value_equal, anchor.as_deref())
                    .map_err(|e| e.in_operation(src_op, self.source.name(src)))?;
                if let Merged::Dropped = merged {
                    return Ok(());
                }
                let origin = get_origin(self.source, src).map(|(origin, _)| origin);
                set_origin_keep_children(self.target, node, origin.as_deref());
                if let Some(owner) = self.owner {
                    reconcile_owner(self.target, node, owner, true)?;
                }
                for child in self.source.non_key_children(src) {
                    self.merge_node(child, Some(node))?;
                }
                node
            }
            None => {
                let dup = self.source.duplicate_into(src, self.target, DupFlags::RECURSIVE);
                self.target.append(parent, dup);
                if node_op(self.target, dup).ok() != Some(src_op) {
                    set_operation(self.target, dup, src_op);
                }
                trace!(node = self.source.name(src), %src_op, "copied into target");
                self.changed = true;
                let origin = get_origin(self.source, src).map(|(origin, _)| origin);
                set_origin(self.target, dup, origin.as_deref(), true);
                if let Some(owner) = self.owner {
                    reconcile_owner(self.target, dup, owner, false)?;
                }
                dup
            }
        };

        if is_redundant(self.target, node)? {
            trace!(node = self.target.name(node), "pruned");
            self.target.free_subtree(node);
        }
        Ok(())
    }

    fn merge_ops(
        &mut self,
        node: NodeId,
        cur_op: EditOp,
        src: NodeId,
        src_op: EditOp,
        value_equal: bool,
        anchor: Option<&str>,
    ) -> Result<Merged> {
        match src_op {
            EditOp::None => match cur_op {
                EditOp::None | EditOp::Create | EditOp::Replace => return Ok(Merged::Kept),
                _ => return Err(self.invalid(node, cur_op, src_op)),
            },
            EditOp::Create => self.merge_create(node, cur_op, src, value_equal)?,
            EditOp::Replace => self.merge_replace(node, cur_op, src, value_equal, anchor)?,
            EditOp::Delete => {
                if cur_op == EditOp::Create {
                    trace!(node = self.target.name(node), "created then deleted");
                    self.target.free_subtree(node);
                    self.changed = true;
                    return Ok(Merged::Dropped);
                }
                self.merge_delete(node, cur_op)?
            }
            _ => return Err(self.invalid(node, cur_op, src_op)),
        }
        self.changed = true;
        Ok(Merged::Kept)
    }

    fn merge_create(&mut self, node: NodeId, cur_op: EditOp, src: NodeId, value_equal: bool) -> Result<()> {
        let kind = self.target.kind(node);
        match cur_op {
            EditOp::Delete if value_equal => {
                set_operation(self.target, node, EditOp::None);
                let (cur_name, _) = anchor_attrs(kind);
                self.target.attrs_mut(node).remove(YANG_NS, cur_name);
                for child in self.target.non_key_children(node) {
                    if own_operation(self.target, child)?.is_none() {
                        set_operation(self.target, child, EditOp::Delete);
                    }
                }
            }
            EditOp::Delete if matches!(kind, NodeKind::Leaf | NodeKind::AnyData) => {
                let old = self.target.value(node).unwrap_or("").to_string();
                let old_dflt = self.target.is_default(node);
                set_operation(self.target, node, EditOp::Replace);
                let attrs = self.target.attrs_mut(node);
                attrs.set(META_NS, ATTR_ORIG_VALUE, old);
                if old_dflt {
                    attrs.set(META_NS, ATTR_ORIG_DFLT, "");
                }
                self.copy_value(node, src);
            }
            EditOp::Create if !value_equal && matches!(kind, NodeKind::Leaf | NodeKind::AnyData) => {
                self.copy_value(node, src);
            }
            _ => return Err(self.invalid(node, cur_op, EditOp::Create)),
        }
        Ok(())
    }

    fn merge_replace(
        &mut self,
        node: NodeId,
        cur_op: EditOp,
        src: NodeId,
        value_equal: bool,
        anchor: Option<&str>,
    ) -> Result<()> {
        let kind = self.target.kind(node);
        match (cur_op, kind) {
            (EditOp::Create | EditOp::Replace, NodeKind::List | NodeKind::LeafList) => {
                let anchor = self.anchor(node, anchor)?;
                let (cur_name, _) = anchor_attrs(kind);
                self.target.attrs_mut(node).set(YANG_NS, cur_name, anchor);
            }
            (EditOp::Create | EditOp::Replace, NodeKind::Leaf | NodeKind::AnyData) if !value_equal => {
                self.copy_value(node, src);
            }
            (EditOp::None, NodeKind::List) if self.target.is_user_ordered(node) => {
                let anchor = self.anchor(node, anchor)?;
                let (cur_name, orig_name) = anchor_attrs(kind);
                let src_orig = self.source.attr(src, META_NS, orig_name).ok_or_else(|| {
                    Error::Internal(format!(
                        "Diff node \"{}\" is missing its \"{}\" attribute.",
                        self.source.path(src),
                        orig_name
                    ))
                })?;
                let orig = self.stored_anchor(node, src_orig)?;
                set_operation(self.target, node, EditOp::Replace);
                let attrs = self.target.attrs_mut(node);
                attrs.set(YANG_NS, cur_name, anchor);
                attrs.set(META_NS, orig_name, orig);
            }
            _ => return Err(self.invalid(node, cur_op, EditOp::Replace)),
        }
        Ok(())
    }

    fn merge_delete(&mut self, node: NodeId, cur_op: EditOp) -> Result<()> {
        match cur_op {
            EditOp::Replace => {
                let kind = self.target.kind(node);
                let (cur_name, orig_name) = anchor_attrs(kind);
                if matches!(kind, NodeKind::Leaf | NodeKind::AnyData) {
                    let attrs = self.target.attrs_mut(node);
                    let orig = attrs.remove(META_NS, ATTR_ORIG_VALUE);
                    let orig_dflt = attrs.remove(META_NS, ATTR_ORIG_DFLT).is_some();
                    if let Some(orig) = orig {
                        self.target.set_value(node, Some(orig));
                        self.target.set_default(node, orig_dflt);
                    }
                } else {
                    let attrs = self.target.attrs_mut(node);
                    attrs.remove(YANG_NS, cur_name);
                    attrs.remove(META_NS, orig_name);
                }
            }
            EditOp::None => {}
            _ => return Err(self.invalid(node, cur_op, EditOp::Delete)),
        }
        set_operation(self.target, node, EditOp::Delete);
        for child in self.target.non_key_children(node) {
            self.target.free_subtree(child);
        }
        Ok(())
    }

    // New value and default marker of a leaf or anydata from the source.
    fn copy_value(&mut self, node: NodeId, src: NodeId) {
        let value = self.source.value(src).map(str::to_string);
        self.target.set_value(node, value);
        self.target.set_default(node, self.source.is_default(src));
    }

    fn anchor(&self, node: NodeId, anchor: Option<&str>) -> Result<String> {
        anchor.map(str::to_string).ok_or_else(|| {
            Error::Internal(format!(
                "Missing anchor of the moved node \"{}\".",
                self.target.name(node)
            ))
        })
    }

    /// Original anchor of a move merged under a `none` node.
    ///
    /// When the source's original anchor is itself an instance of this
    /// diff, its own stored anchor is the position before any of the
    /// merged changes.
    fn stored_anchor(&self, node: NodeId, src_orig: &str) -> Result<String> {
        if src_orig.is_empty() {
            return Ok(String::new());
        }
        let parent = self.target.parent(node);
        let sibling = match find_by_predicate(
            self.target,
            self.target.first_sibling(parent),
            self.target.schema_id(node),
            src_orig,
        ) {
            Ok(sibling) => sibling,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(src_orig.to_string()),
            Err(e) => return Err(e),
        };
        let (cur_name, _) = anchor_attrs(self.target.kind(node));
        Ok(self
            .target
            .attr(sibling, YANG_NS, cur_name)
            .unwrap_or(src_orig)
            .to_string())
    }

    fn invalid(&self, node: NodeId, cur_op: EditOp, src_op: EditOp) -> Error {
        Error::Internal(format!(
            "Cannot merge operation \"{}\" into \"{}\" of node \"{}\".",
            src_op,
            cur_op,
            self.target.path(node)
        ))
    }
}
