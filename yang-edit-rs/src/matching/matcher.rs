//! Pairing of edit or diff nodes with the nodes of another tree.

use tracing::trace;

use super::{find_by_predicate, next_instance, previous_instance};
use crate::edit::{EditOp, Insert};
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::NodeKind;

/// Result of [`find_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// The matching node, if any.
    pub node: Option<NodeId>,
    /// Whether the value (and, for user-ordered instances, the position)
    /// already equals the needle's.
    pub value_equal: bool,
}

impl Match {
    fn none() -> Self {
        Match {
            node: None,
            value_equal: false,
        }
    }
}

/// Finds the sibling in `haystack` starting at `first` that corresponds to
/// `needle` of `needle_tree`.
///
/// Only the first structural match is considered. For user-ordered
/// instances with a `first`, `last`, `before` or `after` placement the
/// position is compared too: a node that would move is not value-equal.
pub fn find_match(
    haystack: &DataTree,
    first: Option<NodeId>,
    needle_tree: &DataTree,
    needle: NodeId,
    op: EditOp,
    insert: Insert,
    anchor: Option<&str>,
) -> Result<Match> {
    let schema = needle_tree.schema_id(needle);
    let kind = needle_tree.kind(needle);
    let existence_only = matches!(op, EditOp::Delete | EditOp::Remove);

    let key_values = if kind == NodeKind::List {
        Some(needle_keys(needle_tree, needle)?)
    } else {
        None
    };

    let mut cur = first;
    while let Some(n) = cur {
        cur = haystack.next(n);
        if haystack.schema_id(n) != schema {
            continue;
        }
        let (found, value_equal) = match kind {
            NodeKind::Container => (true, true),
            NodeKind::Leaf => {
                let equal = existence_only
                    || (haystack.is_default(n) == needle_tree.is_default(needle)
                        && haystack.schema().values_equal(
                            schema,
                            haystack.value(n).unwrap_or(""),
                            needle_tree.value(needle).unwrap_or(""),
                        )?);
                (true, equal)
            }
            NodeKind::AnyData => {
                let equal = existence_only || haystack.value(n) == needle_tree.value(needle);
                (true, equal)
            }
            NodeKind::List => {
                let keys = key_values.as_deref().unwrap_or_default();
                let same = haystack
                    .children(n)
                    .filter(|&c| haystack.is_key(c))
                    .map(|c| haystack.value(c).unwrap_or(""))
                    .eq(keys.iter().map(String::as_str));
                (same, true)
            }
            NodeKind::LeafList => (haystack.value(n) == needle_tree.value(needle), true),
        };
        if !found {
            continue;
        }

        let mut value_equal = value_equal;
        if kind.is_collection() && haystack.is_user_ordered(n) {
            let anchor_node = match (insert.needs_anchor(), anchor) {
                (true, Some(pred)) => Some(find_by_predicate(haystack, first, schema, pred)?),
                _ => None,
            };
            value_equal = !is_moved(haystack, n, insert, anchor_node);
        }
        trace!(node = haystack.name(n), value_equal, "matched");
        return Ok(Match {
            node: Some(n),
            value_equal,
        });
    }
    Ok(Match::none())
}

/// Whether placing `node` per `insert` (next to `anchor` for
/// `before`/`after`) would change its position.
pub fn is_moved(tree: &DataTree, node: NodeId, insert: Insert, anchor: Option<NodeId>) -> bool {
    match insert {
        Insert::Default => false,
        Insert::First | Insert::After => previous_instance(tree, node) != anchor,
        Insert::Last | Insert::Before => next_instance(tree, node) != anchor,
    }
}

// Key values of an edit list instance in schema order.
fn needle_keys(tree: &DataTree, node: NodeId) -> Result<Vec<String>> {
    let schema = tree.schema();
    let keys = schema.node(tree.schema_id(node)).keys();
    let mut children = tree.children(node);
    let mut values = Vec::with_capacity(keys.len());
    for &key in keys {
        let child = children.next().ok_or_else(|| {
            Error::ValidationFailed(format!(
                "List node \"{}\" is missing some keys.",
                tree.name(node)
            ))
        })?;
        if tree.schema_id(child) != key {
            if !tree.is_key(child) {
                return Err(Error::ValidationFailed(format!(
                    "List node \"{}\" is missing some keys.",
                    tree.name(node)
                )));
            }
            return Err(Error::ValidationFailed(format!(
                "Unexpected node \"{}\" instead of a key \"{}\".",
                tree.name(child),
                schema.name(key)
            )));
        }
        values.push(tree.value(child).unwrap_or("").to_string());
    }
    Ok(values)
}
