//! Positional insertion of user-ordered instances.

use super::Insert;
use crate::error::{Error, Result};
use crate::matching::find_by_predicate;
use crate::node::{DataTree, NodeId};

/// Links `node` among the children of `parent` (or the top level) per
/// `insert`, resolving `anchor` for `before`/`after`.
///
/// The node is unlinked first, so this also repositions existing nodes.
pub(crate) fn insert_node(
    tree: &mut DataTree,
    parent: Option<NodeId>,
    node: NodeId,
    insert: Insert,
    anchor: Option<&str>,
) -> Result<()> {
    tree.unlink(node);
    let Some(first) = tree.first_sibling(parent) else {
        if anchor.is_some() && insert.needs_anchor() {
            return Err(Error::NotFound(format!(
                "Node \"{}\" instance to insert next to not found.",
                tree.name(node)
            )));
        }
        tree.append(parent, node);
        return Ok(());
    };

    let schema = tree.schema_id(node);
    let instances: Vec<NodeId> = tree
        .first_sibling(parent)
        .into_iter()
        .flat_map(|f| std::iter::successors(Some(f), |&n| tree.next(n)))
        .filter(|&n| tree.schema_id(n) == schema)
        .collect();

    // instances of one schema node stay grouped
    match insert {
        Insert::Default | Insert::Last => match instances.last() {
            Some(&last) => tree.insert_after(last, node),
            None => tree.append(parent, node),
        },
        Insert::First => match instances.first() {
            Some(&head) => tree.insert_before(head, node),
            None => tree.append(parent, node),
        },
        Insert::Before | Insert::After => {
            let pred = anchor.ok_or_else(|| {
                Error::Internal(format!("Missing anchor of node \"{}\".", tree.name(node)))
            })?;
            let target = find_by_predicate(tree, Some(first), schema, pred)?;
            if insert == Insert::Before {
                tree.insert_before(target, node);
            } else {
                tree.insert_after(target, node);
            }
        }
    }
    Ok(())
}
