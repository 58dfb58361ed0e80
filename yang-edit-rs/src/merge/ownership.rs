//! Ownership tags of operational diffs.
//!
//! Every stored operational diff node belongs to the writer that last
//! merged it: a process id plus a connection token, stored as the `pid`
//! and `conn-ptr` attributes and inherited like origins.

use std::fmt;

use tracing::{debug, trace};

use crate::constants::{ATTR_CONN, ATTR_PID, META_NS};
use crate::diff::is_redundant;
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};

/// Writer owning parts of an operational diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    pub pid: u32,
    pub conn: u64,
}

impl Owner {
    pub fn new(pid: u32, conn: u64) -> Self {
        Owner { pid, conn }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pid, self.conn)
    }
}

/// Owner tags carried by the node itself, if any.
pub fn own_owner(tree: &DataTree, node: NodeId) -> Result<Option<Owner>> {
    let pid = tree.attr(node, META_NS, ATTR_PID);
    let conn = tree.attr(node, META_NS, ATTR_CONN);
    match (pid, conn) {
        (None, None) => Ok(None),
        (Some(pid), Some(conn)) => {
            let bad = || {
                Error::Internal(format!(
                    "Invalid owner \"{}/{}\" of node \"{}\".",
                    pid,
                    conn,
                    tree.name(node)
                ))
            };
            Ok(Some(Owner {
                pid: pid.parse().map_err(|_| bad())?,
                conn: conn.parse().map_err(|_| bad())?,
            }))
        }
        _ => Err(Error::Internal(format!(
            "Node \"{}\" has an incomplete owner.",
            tree.path(node)
        ))),
    }
}

/// Owner in effect at the node and whether the node carries it itself.
pub fn get_owner(tree: &DataTree, node: NodeId) -> Result<Option<(Owner, bool)>> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if let Some(owner) = own_owner(tree, n)? {
            return Ok(Some((owner, n == node)));
        }
        cur = tree.parent(n);
    }
    Ok(None)
}

pub(crate) fn set_owner_attrs(tree: &mut DataTree, node: NodeId, owner: Owner) {
    let attrs = tree.attrs_mut(node);
    attrs.set(META_NS, ATTR_PID, owner.pid.to_string());
    attrs.set(META_NS, ATTR_CONN, owner.conn.to_string());
}

/// Makes `owner` the owner of `node`.
///
/// With `keep_children`, non-key children without their own tags stay
/// with the owner they had before.
pub(crate) fn reconcile_owner(
    tree: &mut DataTree,
    node: NodeId,
    owner: Owner,
    keep_children: bool,
) -> Result<()> {
    let current = get_owner(tree, node)?;
    if matches!(current, Some((cur, _)) if cur == owner) {
        return Ok(());
    }
    trace!(node = tree.name(node), %owner, "new owner");
    set_owner_attrs(tree, node, owner);

    if let (true, Some((previous, _))) = (keep_children, current) {
        for child in tree.non_key_children(node) {
            if own_owner(tree, child)?.is_none() {
                set_owner_attrs(tree, child, previous);
            }
        }
    }
    Ok(())
}

/// Drops every subtree of `diff` owned by `owner`, returning whether
/// anything was removed.
///
/// Used when a writer goes away: its contributions to a stored
/// operational diff are discarded. Ancestors left without changes are
/// pruned as well.
pub fn remove_owner(diff: &mut DataTree, owner: Owner) -> Result<bool> {
    let mut owned = Vec::new();
    for node in diff.all_nodes() {
        if own_owner(diff, node)? == Some(owner) {
            owned.push(node);
        }
    }

    let mut removed = 0;
    for node in owned {
        // nested subtrees of the same owner are gone already
        if !diff.contains(node) {
            continue;
        }
        let mut parent = diff.parent(node);
        diff.free_subtree(node);
        removed += 1;
        while let Some(p) = parent {
            if !is_redundant(diff, p)? {
                break;
            }
            parent = diff.parent(p);
            diff.free_subtree(p);
        }
    }
    debug!(%owner, removed, "owner removed from diff");
    Ok(removed > 0)
}
