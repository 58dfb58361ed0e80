//! Arena-backed data trees.
//!
//! Data, edit and diff trees are all [`DataTree`]s. Nodes live in a slot
//! vector and refer to each other through [`NodeId`] handles: parent,
//! previous/next sibling and first/last child. Top-level siblings form a
//! forest headed by [`DataTree::first_root`]. Every tree holds the shared
//! [`Schema`] its nodes refer to; trees exchanging nodes must share it.

pub mod attributes;
pub mod namespace;

use std::rc::Rc;

use bitflags::bitflags;

pub use attributes::Attributes;

use crate::error::{Error, Result};
use crate::schema::path::{
    check_predicates, format_predicate, leaf_list_value, list_key_values, parse_path, resolve_path,
};
use crate::schema::{NodeKind, Schema, SchemaId, SchemaNode};

bitflags! {
    /// Markers carried by a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// The node exists only because of a schema default.
        const DEFAULT = 0b0000_0001;
        /// The node has passed validation.
        const VALIDATED = 0b0000_0010;
    }
}

bitflags! {
    /// Options of [`DataTree::duplicate_into`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DupFlags: u8 {
        /// Copy the whole subtree.
        const RECURSIVE = 0b0000_0001;
        /// Without `RECURSIVE`, still copy the key leaves of a list.
        const WITH_KEYS = 0b0000_0010;
        /// Do not copy attributes.
        const NO_ATTRS = 0b0000_0100;
    }
}

/// Handle of a node inside its [`DataTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    schema: SchemaId,
    value: Option<String>,
    flags: NodeFlags,
    attrs: Attributes,
    parent: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

/// A forest of schema-typed nodes.
#[derive(Debug, Clone)]
pub struct DataTree {
    schema: Rc<Schema>,
    slots: Vec<Option<NodeData>>,
    free: Vec<u32>,
    first: Option<NodeId>,
    last: Option<NodeId>,
}

/// Iterator over a run of siblings.
pub struct Siblings<'a> {
    tree: &'a DataTree,
    next: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.tree.next(cur);
        Some(cur)
    }
}

impl DataTree {
    /// Creates an empty tree over a schema.
    pub fn new(schema: Rc<Schema>) -> Self {
        DataTree {
            schema,
            slots: Vec::new(),
            free: Vec::new(),
            first: None,
            last: None,
        }
    }

    /// Schema the tree is built over.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shared handle of the schema, for building sibling trees.
    pub fn schema_rc(&self) -> &Rc<Schema> {
        &self.schema
    }

    /// Creates an empty tree over the same schema.
    pub fn empty_like(&self) -> DataTree {
        DataTree::new(self.schema.clone())
    }

    /// Whether the tree has no top-level node.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Number of live nodes, linked or not.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether the handle refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    fn data(&self, id: NodeId) -> &NodeData {
        match self.slots.get(id.index()) {
            Some(Some(d)) => d,
            _ => panic!("stale node handle {:?}", id),
        }
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        match self.slots.get_mut(id.index()) {
            Some(Some(d)) => d,
            _ => panic!("stale node handle {:?}", id),
        }
    }

    // ---- node creation and content ----

    /// Allocates a new unlinked node.
    pub fn new_node(&mut self, schema: SchemaId, value: Option<String>) -> NodeId {
        let data = NodeData {
            schema,
            value,
            flags: NodeFlags::empty(),
            attrs: Attributes::new(),
            parent: None,
            prev: None,
            next: None,
            first_child: None,
            last_child: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(data);
                NodeId(idx)
            }
            None => {
                self.slots.push(Some(data));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Schema node handle of a data node.
    pub fn schema_id(&self, id: NodeId) -> SchemaId {
        self.data(id).schema
    }

    /// Schema node of a data node.
    pub fn snode(&self, id: NodeId) -> &SchemaNode {
        self.schema.node(self.data(id).schema)
    }

    /// Kind of the node's schema node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.snode(id).kind()
    }

    /// Local name of the node.
    pub fn name(&self, id: NodeId) -> &str {
        self.snode(id).name()
    }

    /// Whether the node is a list or leaf-list whose instance order matters.
    pub fn is_user_ordered(&self, id: NodeId) -> bool {
        let s = self.snode(id);
        s.kind().is_collection() && s.is_user_ordered()
    }

    /// Value of a leaf, leaf-list or anydata node; `None` for inner nodes.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.data(id).value.as_deref()
    }

    /// Stores a value as given, without canonicalisation.
    pub fn set_value(&mut self, id: NodeId, value: Option<String>) {
        self.data_mut(id).value = value;
    }

    /// Sets a leaf value from a canonical or raw string and clears the
    /// default marker. Returns whether the node changed.
    pub fn set_leaf_value(&mut self, id: NodeId, raw: &str) -> Result<bool> {
        let canonical = self.schema.canonical_value(self.schema_id(id), raw)?;
        let data = self.data_mut(id);
        let changed =
            data.value.as_deref() != Some(canonical.as_str()) || data.flags.contains(NodeFlags::DEFAULT);
        data.value = Some(canonical);
        data.flags.remove(NodeFlags::DEFAULT);
        Ok(changed)
    }

    /// Default and validation markers.
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.data(id).flags
    }

    /// Replaces all markers of the node.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.data_mut(id).flags = flags;
    }

    /// Whether the node exists only as a schema default.
    pub fn is_default(&self, id: NodeId) -> bool {
        self.data(id).flags.contains(NodeFlags::DEFAULT)
    }

    /// Sets or clears the default marker.
    pub fn set_default(&mut self, id: NodeId, default: bool) {
        self.data_mut(id).flags.set(NodeFlags::DEFAULT, default);
    }

    /// Attributes of the node.
    pub fn attrs(&self, id: NodeId) -> &Attributes {
        &self.data(id).attrs
    }

    /// Mutable attributes of the node.
    pub fn attrs_mut(&mut self, id: NodeId) -> &mut Attributes {
        &mut self.data_mut(id).attrs
    }

    /// Shorthand for reading one attribute.
    pub fn attr(&self, id: NodeId, namespace: &str, name: &str) -> Option<&str> {
        self.data(id).attrs.get(namespace, name)
    }

    // ---- navigation ----

    /// First top-level node.
    pub fn first_root(&self) -> Option<NodeId> {
        self.first
    }

    /// Top-level nodes in order.
    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            tree: self,
            next: self.first,
        }
    }

    /// Parent node; `None` at the top level.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// Next sibling.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).next
    }

    /// Previous sibling.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).prev
    }

    /// First child, keys included.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).first_child
    }

    /// Last child.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).last_child
    }

    /// Children of a node in order.
    pub fn children(&self, id: NodeId) -> Siblings<'_> {
        Siblings {
            tree: self,
            next: self.data(id).first_child,
        }
    }

    /// First node of a sibling run; `None` parent means the top level.
    pub fn first_sibling(&self, parent: Option<NodeId>) -> Option<NodeId> {
        match parent {
            Some(p) => self.data(p).first_child,
            None => self.first,
        }
    }

    /// Whether the node is a key leaf of its parent list.
    pub fn is_key(&self, id: NodeId) -> bool {
        self.schema.is_key(self.schema_id(id))
    }

    /// Children that are not list keys, collected so the tree may be mutated meanwhile.
    pub fn non_key_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).filter(|&c| !self.is_key(c)).collect()
    }

    /// Whether the node has any child besides list keys.
    pub fn has_non_key_children(&self, id: NodeId) -> bool {
        self.children(id).any(|c| !self.is_key(c))
    }

    /// The node and all its descendants, depth-first, parents first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let children: Vec<_> = self.children(cur).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Every linked node of the forest, depth-first.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.roots().flat_map(|r| self.descendants(r)).collect()
    }

    /// Whether the node is part of the forest or of some subtree.
    pub fn is_linked(&self, id: NodeId) -> bool {
        let d = self.data(id);
        d.parent.is_some() || d.prev.is_some() || d.next.is_some() || self.first == Some(id)
    }

    // ---- structure ----

    fn set_first(&mut self, parent: Option<NodeId>, node: Option<NodeId>) {
        match parent {
            Some(p) => self.data_mut(p).first_child = node,
            None => self.first = node,
        }
    }

    fn set_last(&mut self, parent: Option<NodeId>, node: Option<NodeId>) {
        match parent {
            Some(p) => self.data_mut(p).last_child = node,
            None => self.last = node,
        }
    }

    fn last_sibling(&self, parent: Option<NodeId>) -> Option<NodeId> {
        match parent {
            Some(p) => self.data(p).last_child,
            None => self.last,
        }
    }

    // An explicit node makes its ancestors explicit too.
    fn clear_parent_defaults(&mut self, node: NodeId) {
        if self.is_default(node) {
            return;
        }
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if !self.is_default(p) {
                break;
            }
            self.set_default(p, false);
            cur = self.parent(p);
        }
    }

    /// Detaches a node (with its subtree) from its parent or the forest.
    pub fn unlink(&mut self, id: NodeId) {
        if !self.is_linked(id) {
            return;
        }
        let (parent, prev, next) = {
            let d = self.data(id);
            (d.parent, d.prev, d.next)
        };
        match prev {
            Some(p) => self.data_mut(p).next = next,
            None => self.set_first(parent, next),
        }
        match next {
            Some(n) => self.data_mut(n).prev = prev,
            None => self.set_last(parent, prev),
        }
        let d = self.data_mut(id);
        d.parent = None;
        d.prev = None;
        d.next = None;
    }

    /// Appends a node as the last child of `parent`, or last top-level node.
    pub fn append(&mut self, parent: Option<NodeId>, node: NodeId) {
        self.unlink(node);
        let last = self.last_sibling(parent);
        {
            let d = self.data_mut(node);
            d.parent = parent;
            d.prev = last;
        }
        match last {
            Some(l) => self.data_mut(l).next = Some(node),
            None => self.set_first(parent, Some(node)),
        }
        self.set_last(parent, Some(node));
        self.clear_parent_defaults(node);
    }

    /// Inserts a node right before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.unlink(node);
        let (parent, prev) = {
            let a = self.data(anchor);
            (a.parent, a.prev)
        };
        {
            let d = self.data_mut(node);
            d.parent = parent;
            d.prev = prev;
            d.next = Some(anchor);
        }
        self.data_mut(anchor).prev = Some(node);
        match prev {
            Some(p) => self.data_mut(p).next = Some(node),
            None => self.set_first(parent, Some(node)),
        }
        self.clear_parent_defaults(node);
    }

    /// Inserts a node right after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        if anchor == node {
            return;
        }
        self.unlink(node);
        let (parent, next) = {
            let a = self.data(anchor);
            (a.parent, a.next)
        };
        {
            let d = self.data_mut(node);
            d.parent = parent;
            d.prev = Some(anchor);
            d.next = next;
        }
        self.data_mut(anchor).next = Some(node);
        match next {
            Some(n) => self.data_mut(n).prev = Some(node),
            None => self.set_last(parent, Some(node)),
        }
        self.clear_parent_defaults(node);
    }

    /// Unlinks a node and releases it with its whole subtree.
    pub fn free_subtree(&mut self, id: NodeId) {
        self.unlink(id);
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            stack.extend(self.children(cur));
            self.slots[cur.index()] = None;
            self.free.push(cur.0);
        }
    }

    /// Copies a node into `dst` (which may be `self`'s clone or another
    /// tree over the same schema). The copy is returned unlinked.
    pub fn duplicate_into(&self, id: NodeId, dst: &mut DataTree, flags: DupFlags) -> NodeId {
        let src = self.data(id);
        let new = dst.new_node(src.schema, src.value.clone());
        {
            let d = dst.data_mut(new);
            d.flags = src.flags;
            if !flags.contains(DupFlags::NO_ATTRS) {
                d.attrs = src.attrs.clone();
            }
        }
        let children: Vec<NodeId> = if flags.contains(DupFlags::RECURSIVE) {
            self.children(id).collect()
        } else if flags.contains(DupFlags::WITH_KEYS) {
            self.children(id).filter(|&c| self.is_key(c)).collect()
        } else {
            Vec::new()
        };
        for child in children {
            let copy = self.duplicate_into(child, dst, flags);
            dst.append(Some(new), copy);
        }
        new
    }

    /// Moves a whole subtree, attributes included, into `dst`. The moved
    /// node is returned unlinked.
    pub fn transfer_into(&mut self, id: NodeId, dst: &mut DataTree) -> NodeId {
        let moved = self.duplicate_into(id, dst, DupFlags::RECURSIVE);
        self.free_subtree(id);
        moved
    }

    // ---- comparison and lookup ----

    /// Structural equality of two subtrees: schema, value, default marker
    /// and children in order. Attributes are not compared.
    pub fn subtree_eq(&self, a: NodeId, other: &DataTree, b: NodeId) -> bool {
        if self.schema_id(a) != other.schema_id(b)
            || self.value(a) != other.value(b)
            || self.is_default(a) != other.is_default(b)
        {
            return false;
        }
        let mut left = self.children(a);
        let mut right = other.children(b);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.subtree_eq(x, other, y) => {}
                _ => return false,
            }
        }
    }

    /// Structural equality of two forests.
    pub fn forest_eq(&self, other: &DataTree) -> bool {
        let mut left = self.roots();
        let mut right = other.roots();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.subtree_eq(x, other, y) => {}
                _ => return false,
            }
        }
    }

    /// Finds the first node matching a path such as
    /// `/ex:cont/item[a='1']/tags[.='x']`.
    pub fn find_path(&self, path: &str) -> Result<Option<NodeId>> {
        let segments = parse_path(path)?;
        let ids = resolve_path(&self.schema, &segments)?;
        let mut parent: Option<NodeId> = None;
        for (seg, &sid) in segments.iter().zip(ids.iter()) {
            check_predicates(&self.schema, sid, seg)?;
            let mut siblings = Siblings {
                tree: self,
                next: self.first_sibling(parent),
            };
            let found = match self.schema.kind(sid) {
                NodeKind::List if !seg.predicates.is_empty() => {
                    let keys = list_key_values(&self.schema, sid, &seg.predicates)?;
                    siblings.find(|&n| {
                        self.schema_id(n) == sid
                            && self
                                .children(n)
                                .filter(|&c| self.is_key(c))
                                .map(|c| self.value(c).unwrap_or(""))
                                .eq(keys.iter().map(String::as_str))
                    })
                }
                NodeKind::LeafList => match leaf_list_value(&seg.predicates) {
                    Some(raw) => {
                        let value = self.schema.canonical_value(sid, raw)?;
                        siblings.find(|&n| self.schema_id(n) == sid && self.value(n) == Some(value.as_str()))
                    }
                    None => siblings.find(|&n| self.schema_id(n) == sid),
                },
                _ => siblings.find(|&n| self.schema_id(n) == sid),
            };
            match found {
                Some(n) => parent = Some(n),
                None => return Ok(None),
            }
        }
        Ok(parent)
    }

    /// Like [`find_path`](Self::find_path) but a missing node is an error.
    pub fn expect_path(&self, path: &str) -> Result<NodeId> {
        self.find_path(path)?
            .ok_or_else(|| Error::NotFound(format!("Node \"{}\" does not exist.", path)))
    }

    /// Path of a node, for messages and logs.
    pub fn path(&self, id: NodeId) -> String {
        let mut chain = vec![id];
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            chain.push(p);
            cur = self.parent(p);
        }
        let mut out = String::new();
        let mut prev_module: Option<&str> = None;
        for &n in chain.iter().rev() {
            let module = self.schema.module_of(self.schema_id(n)).name.as_str();
            out.push('/');
            if prev_module != Some(module) {
                out.push_str(module);
                out.push(':');
            }
            out.push_str(self.name(n));
            match self.kind(n) {
                NodeKind::List => {
                    for key in self.children(n).filter(|&c| self.is_key(c)) {
                        out.push_str(&format_predicate(self.name(key), self.value(key).unwrap_or("")));
                    }
                }
                NodeKind::LeafList => {
                    out.push_str(&format_predicate(".", self.value(n).unwrap_or("")));
                }
                _ => {}
            }
            prev_module = Some(module);
        }
        out
    }
}
