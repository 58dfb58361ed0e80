//! Diff trees.
//!
//! A diff records what an edit actually changed. Every node carries one of
//! the operations `none`, `create`, `delete` or `replace` (own or
//! inherited), `replace` entries keep the previous value or position in
//! `orig-*` attributes, and user-ordered entries carry their anchor in
//! `key`/`value`. This module holds the shared diff vocabulary and the
//! companion algorithms:
//!
//! - [`Patch`] replays a diff onto a data tree
//! - [`update_diff`] drops entries that no longer apply to changed data
//! - [`reverse_diff`] computes the diff that undoes a diff
//! - [`changes`] lists the individual changes of a diff

mod changes;
mod patch;
mod reverse;
mod update;

pub use changes::{changes, Change, ChangeOp};
pub use patch::{apply_diff, Patch};
pub use reverse::reverse_diff;
pub use update::update_diff;

use tracing::trace;

use crate::constants::{
    ATTR_KEY, ATTR_OPERATION, ATTR_ORIGIN, ATTR_ORIG_KEY, ATTR_ORIG_VALUE, ATTR_VALUE, META_NS,
    NETCONF_NS, OPER_ORIGIN, ORIGIN_NS, YANG_NS,
};
use crate::edit::{inherited_operation, set_operation, EditOp};
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::NodeKind;

/// Origin in effect at the node and whether the node carries it itself.
pub fn get_origin(tree: &DataTree, node: NodeId) -> Option<(String, bool)> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if let Some(origin) = tree.attr(n, ORIGIN_NS, ATTR_ORIGIN) {
            return Some((origin.to_string(), n == node));
        }
        cur = tree.parent(n);
    }
    None
}

/// Sets the node's origin (`unknown` when `None`).
///
/// Nothing happens when the origin already in effect is the same, or when
/// the node has its own origin and `overwrite` is false. Descendants
/// without their own origin inherit the new one.
pub fn set_origin(tree: &mut DataTree, node: NodeId, origin: Option<&str>, overwrite: bool) {
    let origin = origin.unwrap_or(OPER_ORIGIN);
    if let Some((cur, own)) = get_origin(tree, node) {
        if cur == origin || (!overwrite && own) {
            return;
        }
    }
    tree.attrs_mut(node).set(ORIGIN_NS, ATTR_ORIGIN, origin);
}

/// Sets the node's origin while its direct non-key children keep the
/// origin they had in effect, `unknown` when there was none.
pub fn set_origin_keep_children(tree: &mut DataTree, node: NodeId, origin: Option<&str>) {
    let previous = get_origin(tree, node).map(|(origin, _)| origin);
    set_origin(tree, node, origin, true);
    for child in tree.non_key_children(node) {
        set_origin(tree, child, previous.as_deref(), false);
    }
}

/// Operation in effect at a diff node.
///
/// `replace` on an ancestor does not apply to descendants; a node with no
/// operation in effect is malformed.
pub(crate) fn node_op(tree: &DataTree, node: NodeId) -> Result<EditOp> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if tree.attr(n, META_NS, ATTR_OPERATION).is_some() {
            return Ok(EditOp::None);
        }
        match tree.attr(n, NETCONF_NS, ATTR_OPERATION) {
            Some("create") => return Ok(EditOp::Create),
            Some("delete") => return Ok(EditOp::Delete),
            Some("replace") if n == node => return Ok(EditOp::Replace),
            Some("replace") | None => {}
            Some(other) => {
                return Err(Error::Internal(format!(
                    "Unexpected diff operation \"{}\" on node \"{}\".",
                    other,
                    tree.name(n)
                )))
            }
        }
        cur = tree.parent(n);
    }
    Err(Error::Internal(format!(
        "Diff node \"{}\" has no operation.",
        tree.path(node)
    )))
}

/// Operation of a diff node with the anchor of a user-ordered
/// `create`/`replace` entry.
pub(crate) fn diff_op(tree: &DataTree, node: NodeId) -> Result<(EditOp, Option<String>)> {
    let op = node_op(tree, node)?;

    let mut anchor = None;
    if tree.is_user_ordered(node) && matches!(op, EditOp::Create | EditOp::Replace) {
        let name = crate::edit::anchor_attr(tree.kind(node));
        let value = tree.attr(node, YANG_NS, name).ok_or_else(|| {
            Error::Internal(format!(
                "Diff node \"{}\" is missing its \"{}\" attribute.",
                tree.path(node),
                name
            ))
        })?;
        anchor = Some(value.to_string());
    }
    Ok((op, anchor))
}

/// Names of the (current, original) anchor attributes of a user-ordered node.
pub(crate) fn anchor_attrs(kind: NodeKind) -> (&'static str, &'static str) {
    if kind == NodeKind::List {
        (ATTR_KEY, ATTR_ORIG_KEY)
    } else {
        (ATTR_VALUE, ATTR_ORIG_VALUE)
    }
}

/// Whether a diff node records no change and should be pruned.
///
/// A `replace` move whose anchor did not change loses its anchors; if it
/// still has children it becomes a `none` carrier instead.
pub(crate) fn is_redundant(tree: &mut DataTree, node: NodeId) -> Result<bool> {
    let op = inherited_operation(tree, node)?.map(|(op, _)| op);
    let has_children = tree.has_non_key_children(node);

    if op == Some(EditOp::Replace) && tree.is_user_ordered(node) {
        let (cur_name, orig_name) = anchor_attrs(tree.kind(node));
        let cur = tree.attr(node, YANG_NS, cur_name);
        let orig = tree.attr(node, META_NS, orig_name);
        if cur.is_some() && cur == orig {
            let attrs = tree.attrs_mut(node);
            attrs.remove(YANG_NS, cur_name);
            attrs.remove(META_NS, orig_name);
            if has_children {
                set_operation(tree, node, EditOp::None);
                return Ok(false);
            }
            trace!(node = tree.name(node), "redundant move");
            return Ok(true);
        }
    }

    let presence = tree.kind(node) == NodeKind::Container && tree.snode(node).is_presence();
    Ok(!has_children && op == Some(EditOp::None) && !presence)
}

/// Marks `parent` as default when it is a non-presence container whose
/// remaining children are all defaults.
pub(crate) fn set_cont_dflt(tree: &mut DataTree, parent: Option<NodeId>) {
    let Some(parent) = parent else {
        return;
    };
    if tree.kind(parent) != NodeKind::Container || tree.snode(parent).is_presence() {
        return;
    }
    if tree.children(parent).all(|c| tree.is_default(c)) {
        tree.set_default(parent, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{LeafType, Schema, SchemaBuilder};
    use crate::xml::parse_str;
    use std::rc::Rc;

    fn schema() -> Rc<Schema> {
        let mut b = SchemaBuilder::new();
        let m = b.module("ex", "urn:ex");
        let cont = b.container(m, "cont");
        b.leaf_with_default(cont, "mode", LeafType::String, "auto");
        b.leaf(cont, "name", LeafType::String);
        let item = b.list(cont, "item", &[("id", LeafType::Int)], true);
        b.leaf(item, "val", LeafType::String);
        b.presence_container(m, "pres");
        b.build()
    }

    const NS: &str = r#"xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:yang="urn:ietf:params:xml:ns:yang:1" xmlns:meta="urn:yang-edit:meta:1.0" xmlns:or="urn:ietf:params:xml:ns:yang:ietf-origin""#;

    #[test]
    fn test_origin_inheritance() {
        let xml = format!(r#"<cont {NS} or:origin="intended"><name>a</name><mode or:origin="system">x</mode></cont>"#);
        let mut tree = parse_str(&schema(), &xml).unwrap();
        let cont = tree.first_root().unwrap();
        let name = tree.expect_path("/ex:cont/name").unwrap();
        let mode = tree.expect_path("/ex:cont/mode").unwrap();
        assert_eq!(get_origin(&tree, name), Some(("intended".to_string(), false)));

        set_origin(&mut tree, cont, Some("learned"), true);
        assert_eq!(get_origin(&tree, cont), Some(("learned".to_string(), true)));
        assert_eq!(get_origin(&tree, name), Some(("learned".to_string(), false)));
        assert_eq!(get_origin(&tree, mode), Some(("system".to_string(), true)));

        set_origin(&mut tree, cont, None, false);
        assert_eq!(tree.attr(cont, ORIGIN_NS, ATTR_ORIGIN), Some("learned"));
        set_origin(&mut tree, name, None, false);
        assert_eq!(tree.attr(name, ORIGIN_NS, ATTR_ORIGIN), Some("unknown"));
    }

    #[test]
    fn test_children_keep_previous_origin() {
        let xml = format!(r#"<cont {NS} or:origin="intended"><name>a</name><mode or:origin="system">x</mode></cont>"#);
        let mut tree = parse_str(&schema(), &xml).unwrap();
        let cont = tree.first_root().unwrap();
        let name = tree.expect_path("/ex:cont/name").unwrap();
        let mode = tree.expect_path("/ex:cont/mode").unwrap();

        set_origin_keep_children(&mut tree, cont, Some("learned"));
        assert_eq!(get_origin(&tree, cont), Some(("learned".to_string(), true)));
        assert_eq!(get_origin(&tree, name), Some(("intended".to_string(), true)));
        assert_eq!(get_origin(&tree, mode), Some(("system".to_string(), true)));

        // same origin again changes nothing below
        let before = tree.attrs(name).clone();
        set_origin_keep_children(&mut tree, cont, Some("learned"));
        assert_eq!(tree.attrs(name), &before);
    }

    #[test]
    fn test_children_without_origin_are_pinned_to_unknown() {
        let xml = format!(r#"<cont {NS}><name>a</name><mode or:origin="system">x</mode></cont>"#);
        let mut tree = parse_str(&schema(), &xml).unwrap();
        let cont = tree.first_root().unwrap();
        let name = tree.expect_path("/ex:cont/name").unwrap();
        let mode = tree.expect_path("/ex:cont/mode").unwrap();
        assert_eq!(get_origin(&tree, name), None);

        set_origin_keep_children(&mut tree, cont, Some("learned"));
        assert_eq!(tree.attr(cont, ORIGIN_NS, ATTR_ORIGIN), Some("learned"));
        assert_eq!(tree.attr(name, ORIGIN_NS, ATTR_ORIGIN), Some(OPER_ORIGIN));
        assert_eq!(tree.attr(mode, ORIGIN_NS, ATTR_ORIGIN), Some("system"));
    }

    #[test]
    fn test_diff_op_skips_parent_replace() {
        let xml = format!(
            r#"<cont {NS} meta:operation="none"><item nc:operation="replace" yang:key="" meta:orig-key="[id='2']"><id>1</id><val>v</val></item></cont>"#
        );
        let tree = parse_str(&schema(), &xml).unwrap();
        let item = tree.expect_path("/ex:cont/item[id='1']").unwrap();
        assert_eq!(diff_op(&tree, item).unwrap(), (EditOp::Replace, Some(String::new())));
        let val = tree.expect_path("/ex:cont/item[id='1']/val").unwrap();
        assert_eq!(diff_op(&tree, val).unwrap(), (EditOp::None, None));
    }

    #[test]
    fn test_diff_op_missing_anchor() {
        let xml = format!(r#"<cont {NS}><item nc:operation="create"><id>1</id></item></cont>"#);
        let tree = parse_str(&schema(), &xml).unwrap();
        let item = tree.expect_path("/ex:cont/item[id='1']").unwrap();
        assert_eq!(diff_op(&tree, item).unwrap_err().kind(), ErrorKind::Internal);
        let cont = tree.first_root().unwrap();
        assert_eq!(diff_op(&tree, cont).unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_redundant_nodes() {
        let xml = format!(
            r#"<cont {NS} meta:operation="none"><item nc:operation="replace" yang:key="[id='0']" meta:orig-key="[id='0']"><id>1</id></item></cont><pres {NS} meta:operation="none"/>"#
        );
        let mut tree = parse_str(&schema(), &xml).unwrap();
        let cont = tree.first_root().unwrap();
        let item = tree.expect_path("/ex:cont/item[id='1']").unwrap();
        assert!(!is_redundant(&mut tree, cont).unwrap());
        assert!(is_redundant(&mut tree, item).unwrap());
        tree.free_subtree(item);
        assert!(is_redundant(&mut tree, cont).unwrap());
        let pres = tree.expect_path("/ex:pres").unwrap();
        assert!(!is_redundant(&mut tree, pres).unwrap());
    }

    #[test]
    fn test_move_with_children_becomes_none() {
        let xml = format!(
            r#"<cont {NS} meta:operation="none"><item nc:operation="replace" yang:key="" meta:orig-key=""><id>1</id><val nc:operation="create">v</val></item></cont>"#
        );
        let mut tree = parse_str(&schema(), &xml).unwrap();
        let item = tree.expect_path("/ex:cont/item[id='1']").unwrap();
        assert!(!is_redundant(&mut tree, item).unwrap());
        assert_eq!(tree.attr(item, META_NS, ATTR_OPERATION), Some("none"));
        assert_eq!(tree.attr(item, YANG_NS, ATTR_KEY), None);
    }

    #[test]
    fn test_set_cont_dflt() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:ncwd="urn:ietf:params:xml:ns:netconf:default:1.0"><mode ncwd:default="true">auto</mode></cont><pres xmlns="urn:ex"/>"#;
        let mut tree = parse_str(&schema(), xml).unwrap();
        let cont = tree.first_root();
        set_cont_dflt(&mut tree, cont);
        assert!(tree.is_default(cont.unwrap()));
        let pres = tree.expect_path("/ex:pres").unwrap();
        set_cont_dflt(&mut tree, Some(pres));
        assert!(!tree.is_default(pres));
    }
}
