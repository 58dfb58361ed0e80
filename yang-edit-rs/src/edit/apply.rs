//! Edit application.
//!
//! The applier walks an edit tree alongside a data tree. Each edit node
//! runs through a small state machine: its resolved operation degrades
//! step by step (`merge` to `create`, `replace` to `move`, `delete` to
//! `remove`, ...) until the node is done. Every change to the data tree is
//! recorded in a diff tree built at the same time.

use tracing::{debug, trace};

use super::{insert_node, resolve_op, set_operation, EditOp, Insert, ResolvedOp};
use crate::constants::{ATTR_ORIG_DFLT, ATTR_ORIG_VALUE, META_NS, YANG_NS};
use crate::diff::{anchor_attrs, get_origin, is_redundant, set_cont_dflt, set_origin};
use crate::error::{Error, Result};
use crate::matching::{find_match, previous_predicate, Match};
use crate::node::{DataTree, DupFlags, NodeId};
use crate::schema::NodeKind;

/// Options of [`apply_edit_with`].
#[derive(Debug, Clone)]
pub struct EditOptions {
    /// Operation of edit nodes that neither carry nor inherit one.
    pub default_operation: EditOp,
    /// Apply only the top-level edit nodes of this module.
    pub module: Option<String>,
}

impl Default for EditOptions {
    fn default() -> Self {
        EditOptions {
            default_operation: EditOp::Merge,
            module: None,
        }
    }
}

/// Result of a successful edit application.
#[derive(Debug)]
pub struct EditOutcome {
    /// Diff of the changes made to the data tree.
    pub diff: DataTree,
    /// Whether the edit changed anything; an unmatched `remove` also counts
    /// although it leaves the data and the diff as they were.
    pub changed: bool,
}

/// Applies `edit` to `data` with the default options.
pub fn apply_edit(data: &mut DataTree, edit: &DataTree) -> Result<EditOutcome> {
    apply_edit_with(data, edit, &EditOptions::default())
}

/// Applies `edit` to `data`, returning the diff of the changes.
///
/// On error `data` may be partially modified and should be discarded.
pub fn apply_edit_with(
    data: &mut DataTree,
    edit: &DataTree,
    options: &EditOptions,
) -> Result<EditOutcome> {
    debug!(
        data_nodes = data.node_count(),
        edit_nodes = edit.node_count(),
        module = options.module.as_deref(),
        "applying edit"
    );
    let diff = data.empty_like();
    let mut applier = EditApplier {
        data,
        edit,
        diff,
        changed: false,
    };
    for root in edit.roots() {
        if let Some(module) = &options.module {
            if edit.schema().module_of(edit.schema_id(root)).name != *module {
                continue;
            }
        }
        applier.apply_node(None, root, options.default_operation, None, Context::default())?;
    }
    debug!(changed = applier.changed, diff_nodes = applier.diff.node_count(), "edit applied");
    Ok(EditOutcome {
        diff: applier.diff,
        changed: applier.changed,
    })
}

/// Recursion mode, extended for a subtree and never shared with siblings.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    /// A `replace` above: data children missing from the edit are deleted.
    replace: bool,
    /// The data parent does not exist; only validate the operations.
    check_only: bool,
}

/// States of one edit node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ether,
    None,
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
    Move,
    /// Done with the node, continue with its children.
    Continue,
    /// Done with the whole subtree.
    Finish,
}

impl From<EditOp> for State {
    fn from(op: EditOp) -> Self {
        match op {
            EditOp::Ether => State::Ether,
            EditOp::None => State::None,
            EditOp::Merge => State::Merge,
            EditOp::Replace => State::Replace,
            EditOp::Create => State::Create,
            EditOp::Delete => State::Delete,
            EditOp::Remove => State::Remove,
        }
    }
}

/// Per-node working set of the state machine.
struct Step<'r> {
    data_parent: Option<NodeId>,
    edit_node: NodeId,
    resolved: &'r ResolvedOp,
    diff_parent: Option<NodeId>,
    matched: Option<NodeId>,
    value_equal: bool,
    diff_node: Option<NodeId>,
    ctx: Context,
}

struct EditApplier<'a> {
    data: &'a mut DataTree,
    edit: &'a DataTree,
    diff: DataTree,
    changed: bool,
}

impl EditApplier<'_> {
    fn apply_node(
        &mut self,
        data_parent: Option<NodeId>,
        edit_node: NodeId,
        parent_op: EditOp,
        diff_parent: Option<NodeId>,
        ctx: Context,
    ) -> Result<()> {
        let resolved = resolve_op(self.edit, edit_node, parent_op)?;
        let found = if ctx.check_only {
            Match {
                node: None,
                value_equal: false,
            }
        } else {
            find_match(
                self.data,
                self.data.first_sibling(data_parent),
                self.edit,
                edit_node,
                resolved.op,
                resolved.insert,
                resolved.anchor.as_deref(),
            )?
        };

        let mut step = Step {
            data_parent,
            edit_node,
            resolved: &resolved,
            diff_parent,
            matched: found.node,
            value_equal: found.value_equal,
            diff_node: None,
            ctx,
        };

        let mut state = State::from(resolved.op);
        while !matches!(state, State::Continue | State::Finish) {
            trace!(node = self.edit.name(edit_node), ?state, "edit state");
            state = self
                .run_state(state, &mut step)
                .map_err(|e| e.in_operation(resolved.op, self.edit.name(edit_node)))?;
        }

        if let (Some((origin, _)), Some(diff_node)) = (get_origin(self.edit, edit_node), step.diff_node) {
            set_origin(&mut self.diff, diff_node, Some(&origin), true);
        }
        if state == State::Finish {
            return Ok(());
        }

        let ctx = step.ctx;
        let matched = step.matched;
        let diff_node = step.diff_node;

        if ctx.replace {
            if let Some(matched) = matched {
                self.prune_replaced(matched, edit_node, diff_node)?;
            }
        }

        let child_parent = if ctx.check_only { None } else { matched };
        for child in self.edit.non_key_children(edit_node) {
            self.apply_node(child_parent, child, resolved.op, diff_node, ctx)?;
        }

        if let Some(diff_node) = diff_node {
            if is_redundant(&mut self.diff, diff_node)? {
                trace!(node = self.diff.name(diff_node), "pruning redundant diff node");
                self.diff.free_subtree(diff_node);
            }
        }
        Ok(())
    }

    fn run_state(&mut self, state: State, step: &mut Step<'_>) -> Result<State> {
        match state {
            State::Ether => Ok(self.apply_ether(step)),
            State::None => self.apply_none(step),
            State::Merge => self.apply_merge(step),
            State::Replace => self.apply_replace(step),
            State::Create => self.apply_create(step),
            State::Delete => self.apply_delete(step),
            State::Remove => Ok(self.apply_remove(step)),
            State::Move => self.apply_move(step),
            State::Continue | State::Finish => Err(Error::Internal(format!(
                "Unexpected state {:?} of node \"{}\".",
                state,
                self.edit.name(step.edit_node)
            ))),
        }
    }

    fn apply_ether(&mut self, step: &mut Step<'_>) -> State {
        if step.matched.is_none() {
            step.ctx.check_only = true;
            State::Continue
        } else {
            State::None
        }
    }

    fn apply_none(&mut self, step: &mut Step<'_>) -> Result<State> {
        let Some(matched) = step.matched else {
            return Err(Error::NotFound(format!(
                "Node \"{}\" does not exist.",
                self.edit.name(step.edit_node)
            )));
        };
        if matches!(self.data.kind(matched), NodeKind::Container | NodeKind::List) {
            // kept as a parent for the changes below
            step.diff_node = Some(self.diff_add(matched, EditOp::None, step.diff_parent));
        }
        Ok(State::Continue)
    }

    fn apply_remove(&mut self, step: &mut Step<'_>) -> State {
        // an unmatched remove still counts as a change, the diff stays empty
        self.changed = true;
        let Some(matched) = step.matched.take() else {
            step.ctx.check_only = true;
            return State::Continue;
        };
        let parent = self.data.parent(matched);
        let data: &DataTree = self.data;
        let anchors: Vec<Option<String>> = data
            .descendants(matched)
            .into_iter()
            .map(|n| data.is_user_ordered(n).then(|| previous_predicate(data, n)))
            .collect();

        let moved = self.data.transfer_into(matched, &mut self.diff);
        self.diff.append(step.diff_parent, moved);
        set_operation(&mut self.diff, moved, EditOp::Delete);
        for (node, anchor) in self.diff.descendants(moved).into_iter().zip(anchors) {
            if let Some(anchor) = anchor {
                let (name, _) = anchor_attrs(self.diff.kind(node));
                self.diff.attrs_mut(node).set(YANG_NS, name, anchor);
            }
        }
        step.diff_node = Some(moved);

        set_cont_dflt(self.data, parent);
        State::Finish
    }

    fn apply_move(&mut self, step: &mut Step<'_>) -> Result<State> {
        let (node, op) = match step.matched {
            Some(n) => (n, EditOp::Replace),
            None => {
                let dup = self.edit.duplicate_into(
                    step.edit_node,
                    self.data,
                    DupFlags::WITH_KEYS | DupFlags::NO_ATTRS,
                );
                (dup, EditOp::Create)
            }
        };
        let old_prev = previous_predicate(self.data, node);

        if let Err(e) = insert_node(
            self.data,
            step.data_parent,
            node,
            step.resolved.insert,
            step.resolved.anchor.as_deref(),
        ) {
            if op == EditOp::Create {
                self.data.free_subtree(node);
            }
            return Err(e);
        }
        step.matched = Some(node);

        let new_prev = previous_predicate(self.data, node);
        let diff_node = self.diff_add(node, op, step.diff_parent);
        let (cur_name, orig_name) = anchor_attrs(self.data.kind(node));
        let attrs = self.diff.attrs_mut(diff_node);
        attrs.set(YANG_NS, cur_name, new_prev);
        if op == EditOp::Replace {
            attrs.set(META_NS, orig_name, old_prev);
        }
        step.diff_node = Some(diff_node);
        self.changed = true;
        Ok(State::Continue)
    }

    fn apply_replace(&mut self, step: &mut Step<'_>) -> Result<State> {
        if step.ctx.check_only {
            return Err(self.missing_parent(step));
        }
        let Some(matched) = step.matched else {
            return Ok(State::Create);
        };

        let next = if step.value_equal {
            State::None
        } else {
            match self.data.kind(matched) {
                NodeKind::List | NodeKind::LeafList => State::Move,
                NodeKind::Leaf => {
                    let prev_value = self.data.value(matched).unwrap_or("").to_string();
                    let prev_dflt = self.data.is_default(matched);
                    let value = self.edit.value(step.edit_node).unwrap_or("");
                    self.data.set_leaf_value(matched, value)?;

                    let diff_node = self.diff_add(matched, EditOp::Replace, step.diff_parent);
                    let attrs = self.diff.attrs_mut(diff_node);
                    attrs.set(META_NS, ATTR_ORIG_VALUE, prev_value);
                    if prev_dflt {
                        attrs.set(META_NS, ATTR_ORIG_DFLT, "");
                    }
                    step.diff_node = Some(diff_node);
                    self.changed = true;
                    State::Continue
                }
                NodeKind::AnyData => {
                    let prev_value = self.data.value(matched).unwrap_or("").to_string();
                    let value = self.edit.value(step.edit_node).map(str::to_string);
                    self.data.set_value(matched, value);
                    self.data.set_default(matched, false);

                    let diff_node = self.diff_add(matched, EditOp::Replace, step.diff_parent);
                    self.diff
                        .attrs_mut(diff_node)
                        .set(META_NS, ATTR_ORIG_VALUE, prev_value);
                    step.diff_node = Some(diff_node);
                    self.changed = true;
                    State::Continue
                }
                NodeKind::Container => {
                    return Err(Error::Internal(format!(
                        "Container \"{}\" cannot differ in value.",
                        self.data.name(matched)
                    )))
                }
            }
        };
        step.ctx.replace = true;
        Ok(next)
    }

    fn apply_create(&mut self, step: &mut Step<'_>) -> Result<State> {
        if step.ctx.check_only {
            return Err(self.missing_parent(step));
        }
        if step.matched.is_some() {
            return Err(Error::AlreadyExists(format!(
                "Node \"{}\" to be created already exists.",
                self.edit.name(step.edit_node)
            )));
        }
        if self.edit.is_user_ordered(step.edit_node) {
            return Ok(State::Move);
        }

        let node = self.edit.duplicate_into(
            step.edit_node,
            self.data,
            DupFlags::WITH_KEYS | DupFlags::NO_ATTRS,
        );
        if let Err(e) = insert_node(self.data, step.data_parent, node, Insert::Default, None) {
            self.data.free_subtree(node);
            return Err(e);
        }
        step.matched = Some(node);
        step.diff_node = Some(self.diff_add(node, EditOp::Create, step.diff_parent));
        self.changed = true;
        Ok(State::Continue)
    }

    fn apply_merge(&mut self, step: &mut Step<'_>) -> Result<State> {
        if step.ctx.check_only {
            return Err(self.missing_parent(step));
        }
        let Some(matched) = step.matched else {
            return Ok(State::Create);
        };
        if step.value_equal {
            return Ok(State::None);
        }
        match self.data.kind(matched) {
            NodeKind::List | NodeKind::LeafList => Ok(State::Move),
            NodeKind::Leaf | NodeKind::AnyData => Ok(State::Replace),
            NodeKind::Container => Err(Error::Internal(format!(
                "Container \"{}\" cannot differ in value.",
                self.data.name(matched)
            ))),
        }
    }

    fn apply_delete(&mut self, step: &mut Step<'_>) -> Result<State> {
        if step.matched.is_none() {
            return Err(Error::NotFound(format!(
                "Node \"{}\" to be deleted does not exist.",
                self.edit.name(step.edit_node)
            )));
        }
        Ok(State::Remove)
    }

    /// Deletes the data children of a replaced node that the edit does not mention.
    fn prune_replaced(
        &mut self,
        matched: NodeId,
        edit_node: NodeId,
        diff_node: Option<NodeId>,
    ) -> Result<()> {
        let delete = ResolvedOp {
            op: EditOp::Delete,
            insert: Insert::Default,
            anchor: None,
        };
        for child in self.data.non_key_children(matched) {
            let found = find_match(
                self.edit,
                self.edit.first_child(edit_node),
                self.data,
                child,
                EditOp::Delete,
                Insert::Default,
                None,
            )?;
            if found.node.is_some() {
                continue;
            }
            trace!(node = self.data.name(child), "deleting node missing from replace");
            let origin = get_origin(self.data, child);
            let mut step = Step {
                data_parent: Some(matched),
                edit_node,
                resolved: &delete,
                diff_parent: diff_node,
                matched: Some(child),
                value_equal: true,
                diff_node: None,
                ctx: Context {
                    replace: true,
                    check_only: false,
                },
            };
            self.apply_remove(&mut step);
            if let Some(removed) = step.diff_node {
                if let Some((origin, _)) = origin {
                    set_origin(&mut self.diff, removed, Some(&origin), true);
                }
            }
        }
        Ok(())
    }

    /// Records a data node in the diff with the given operation.
    fn diff_add(&mut self, node: NodeId, op: EditOp, diff_parent: Option<NodeId>) -> NodeId {
        let dup = self
            .data
            .duplicate_into(node, &mut self.diff, DupFlags::WITH_KEYS | DupFlags::NO_ATTRS);
        self.diff.append(diff_parent, dup);
        set_operation(&mut self.diff, dup, op);
        dup
    }

    fn missing_parent(&self, step: &Step<'_>) -> Error {
        Error::Unsupported(format!(
            "Node \"{}\" cannot be created because its parent does not exist.",
            self.edit.name(step.edit_node)
        ))
    }
}
