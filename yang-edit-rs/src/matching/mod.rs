//! Sibling navigation and node matching.
//!
//! The navigator functions here find neighbouring instances of a
//! user-ordered collection and translate between instances and their
//! position predicates. [`find_match`] pairs an edit or diff node with the
//! node it refers to in another tree.

mod matcher;

pub use matcher::{find_match, is_moved, Match};

use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::path::{format_predicate, list_key_values, parse_predicates};
use crate::schema::{NodeKind, SchemaId};

/// Nearest preceding sibling with the same schema node.
pub fn previous_instance(tree: &DataTree, node: NodeId) -> Option<NodeId> {
    let schema = tree.schema_id(node);
    let mut cur = tree.prev(node);
    while let Some(p) = cur {
        if tree.schema_id(p) == schema {
            return Some(p);
        }
        cur = tree.prev(p);
    }
    None
}

/// Nearest following sibling with the same schema node.
pub fn next_instance(tree: &DataTree, node: NodeId) -> Option<NodeId> {
    let schema = tree.schema_id(node);
    let mut cur = tree.next(node);
    while let Some(n) = cur {
        if tree.schema_id(n) == schema {
            return Some(n);
        }
        cur = tree.next(n);
    }
    None
}

/// Position anchor of an instance: `[k1='v1'][k2='v2']` for a list, the
/// value itself for a leaf-list.
pub fn position_predicate(tree: &DataTree, node: NodeId) -> String {
    match tree.kind(node) {
        NodeKind::List => tree
            .children(node)
            .filter(|&c| tree.is_key(c))
            .map(|k| format_predicate(tree.name(k), tree.value(k).unwrap_or("")))
            .collect(),
        _ => tree.value(node).unwrap_or("").to_string(),
    }
}

/// Anchor of the instance preceding `node`, or `""` if it is the first one.
pub(crate) fn previous_predicate(tree: &DataTree, node: NodeId) -> String {
    previous_instance(tree, node)
        .map(|p| position_predicate(tree, p))
        .unwrap_or_default()
}

/// Finds the sibling instance of `schema` identified by `predicate`.
///
/// No match is `NotFound`; more than one match means the sibling run is
/// corrupt and is an internal error.
pub fn find_by_predicate(
    tree: &DataTree,
    first: Option<NodeId>,
    schema: SchemaId,
    predicate: &str,
) -> Result<NodeId> {
    let s = tree.schema();
    let wanted: Vec<String> = match s.kind(schema) {
        NodeKind::List => list_key_values(s, schema, &parse_predicates(predicate)?)?,
        _ => vec![s.canonical_value(schema, predicate)?],
    };

    let mut siblings = Vec::new();
    let mut cur = first;
    while let Some(n) = cur {
        siblings.push(n);
        cur = tree.next(n);
    }
    let mut found = siblings.into_iter().filter(|&n| {
        tree.schema_id(n) == schema
            && match s.kind(schema) {
                NodeKind::List => tree
                    .children(n)
                    .filter(|&c| tree.is_key(c))
                    .map(|c| tree.value(c).unwrap_or(""))
                    .eq(wanted.iter().map(String::as_str)),
                _ => tree.value(n) == Some(wanted[0].as_str()),
            }
    });

    match (found.next(), found.next()) {
        (Some(n), None) => Ok(n),
        (None, _) => Err(Error::NotFound(format!(
            "Node \"{}\" instance to insert next to not found.",
            s.name(schema)
        ))),
        (Some(_), Some(_)) => Err(Error::Internal(format!(
            "Multiple instances of \"{}\" match the anchor \"{}\".",
            s.name(schema),
            predicate
        ))),
    }
}
