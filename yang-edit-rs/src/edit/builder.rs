//! Incremental construction of edit trees.

use std::rc::Rc;

use tracing::{debug, trace};

use super::{anchor_attr, inherited_operation, own_operation, remove_operation, set_operation, EditOp};
use crate::constants::{ATTR_INSERT, CONFIG_ORIGIN, OPER_ORIGIN, YANG_NS};
use crate::diff::set_origin;
use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::schema::path::{
    check_predicates, leaf_list_value, list_key_values, parse_path, resolve_path, PathSegment,
};
use crate::schema::{NodeKind, Schema, SchemaId};

/// Placement of a user-ordered instance added to an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    /// Before the instance with this anchor (key predicate or value).
    Before(String),
    /// After the instance with this anchor (key predicate or value).
    After(String),
}

/// One change to add to an edit.
///
/// # Example
///
/// ```
/// use yang_edit::edit::{EditItem, EditOp, Position};
///
/// let item = EditItem::new("/ex:cont/tags")
///     .value("blue")
///     .operation(EditOp::Create)
///     .position(Position::After("red".to_string()));
/// assert_eq!(item.path(), "/ex:cont/tags");
/// ```
#[derive(Debug, Clone)]
pub struct EditItem {
    path: String,
    value: Option<String>,
    operation: EditOp,
    default_operation: EditOp,
    position: Option<Position>,
    origin: Option<String>,
}

impl EditItem {
    /// A `merge` of the node at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        EditItem {
            path: path.into(),
            value: None,
            operation: EditOp::Merge,
            default_operation: EditOp::Merge,
            position: None,
            origin: None,
        }
    }

    /// Value of the leaf, leaf-list or anydata node.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Operation of the node itself, `merge` unless set.
    pub fn operation(mut self, op: EditOp) -> Self {
        self.operation = op;
        self
    }

    /// Operation given to ancestors the edit does not have yet.
    pub fn default_operation(mut self, op: EditOp) -> Self {
        self.default_operation = op;
        self
    }

    /// Where a user-ordered instance goes among its siblings.
    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Origin of the node; operational edits only.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Path of the node this item changes.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Builds an edit tree item by item.
///
/// A failed [`add`](Self::add) discards the whole edit.
#[derive(Debug)]
pub struct EditBuilder {
    edit: DataTree,
    operational: bool,
}

impl EditBuilder {
    /// Creates a builder of configuration edits.
    pub fn new(schema: Rc<Schema>) -> Self {
        EditBuilder {
            edit: DataTree::new(schema),
            operational: false,
        }
    }

    /// Creates a builder of operational edits, which carry origins.
    pub fn operational(schema: Rc<Schema>) -> Self {
        EditBuilder {
            edit: DataTree::new(schema),
            operational: true,
        }
    }

    /// The edit built so far.
    pub fn edit(&self) -> &DataTree {
        &self.edit
    }

    /// Consumes the builder and returns the edit.
    pub fn into_edit(self) -> DataTree {
        self.edit
    }

    /// Whether no item was added yet.
    pub fn is_empty(&self) -> bool {
        self.edit.is_empty()
    }

    /// Adds one change.
    pub fn add(&mut self, item: EditItem) -> Result<()> {
        let result = self.add_item(&item);
        if let Err(e) = &result {
            debug!(path = item.path.as_str(), error = %e, "discarding edit");
            self.edit = self.edit.empty_like();
        }
        result
    }

    fn add_item(&mut self, item: &EditItem) -> Result<()> {
        let segments = parse_path(&item.path)?;
        let ids = resolve_path(self.edit.schema(), &segments)?;
        let last = segments.len() - 1;

        let mut parent: Option<NodeId> = None;
        for (i, (seg, &sid)) in segments.iter().zip(ids.iter()).enumerate() {
            check_predicates(self.edit.schema(), sid, seg)?;
            let value = self.segment_value(sid, seg, (i == last).then_some(item))?;
            let keys = match self.edit.schema().kind(sid) {
                NodeKind::List => list_key_values(self.edit.schema(), sid, &seg.predicates)?,
                _ => Vec::new(),
            };

            match self.find_existing(parent, sid, &keys, value.as_deref()) {
                Some(existing) if i == last => return self.check_same(existing, item, value.as_deref()),
                Some(existing) => parent = Some(existing),
                None => {
                    let node = self.edit.new_node(sid, value);
                    let key_ids = self.edit.schema().node(sid).keys().to_vec();
                    for (key, key_value) in key_ids.into_iter().zip(keys) {
                        let k = self.edit.new_node(key, Some(key_value));
                        self.edit.append(Some(node), k);
                    }
                    self.edit.append(parent, node);
                    parent = Some(node);
                }
            }
        }
        let node = parent.ok_or_else(|| Error::Internal("Empty edit path.".to_string()))?;

        if item.position.is_some() && !self.edit.is_user_ordered(node) {
            return Err(Error::ValidationFailed(
                "Position can be specified only for user-ordered lists or leaf-lists.".to_string(),
            ));
        }

        self.push_default_operation(node, item.default_operation)?;
        set_operation(&mut self.edit, node, item.operation);

        if let Some(position) = &item.position {
            let (insert, anchor) = match position {
                Position::First => ("first", None),
                Position::Last => ("last", None),
                Position::Before(a) => ("before", Some(a)),
                Position::After(a) => ("after", Some(a)),
            };
            let anchor_name = anchor_attr(self.edit.kind(node));
            let attrs = self.edit.attrs_mut(node);
            attrs.set(YANG_NS, ATTR_INSERT, insert);
            if let Some(anchor) = anchor {
                attrs.set(YANG_NS, anchor_name, anchor.as_str());
            }
        }

        if self.operational {
            set_origin(&mut self.edit, node, item.origin.as_deref(), true);
        }
        trace!(path = item.path.as_str(), op = %item.operation, "edit item added");
        Ok(())
    }

    // Value stored on a new node: leaf-list instances and the target leaf.
    fn segment_value(
        &self,
        sid: SchemaId,
        seg: &PathSegment,
        target: Option<&EditItem>,
    ) -> Result<Option<String>> {
        let schema = self.edit.schema();
        match schema.kind(sid) {
            NodeKind::LeafList => {
                let raw = leaf_list_value(&seg.predicates)
                    .or_else(|| target.and_then(|t| t.value.as_deref()))
                    .ok_or_else(|| {
                        Error::ValidationFailed(format!(
                            "Leaf-list \"{}\" needs a value.",
                            seg.name
                        ))
                    })?;
                Ok(Some(schema.canonical_value(sid, raw)?))
            }
            NodeKind::Leaf | NodeKind::AnyData => match target {
                Some(t) => match (&t.value, t.operation) {
                    (Some(v), _) => Ok(Some(schema.canonical_value(sid, v)?)),
                    (None, EditOp::Delete | EditOp::Remove) => Ok(None),
                    (None, _) => Ok(Some(schema.canonical_value(sid, "")?)),
                },
                None => Err(Error::ValidationFailed(format!(
                    "Node \"{}\" cannot have children.",
                    seg.name
                ))),
            },
            NodeKind::Container | NodeKind::List => match target.and_then(|t| t.value.as_ref()) {
                Some(_) => Err(Error::ValidationFailed(format!(
                    "Node \"{}\" cannot have a value.",
                    seg.name
                ))),
                None => Ok(None),
            },
        }
    }

    fn find_existing(
        &self,
        parent: Option<NodeId>,
        sid: SchemaId,
        keys: &[String],
        value: Option<&str>,
    ) -> Option<NodeId> {
        let edit = &self.edit;
        let mut cur = edit.first_sibling(parent);
        while let Some(n) = cur {
            cur = edit.next(n);
            if edit.schema_id(n) != sid {
                continue;
            }
            let same = match edit.kind(n) {
                NodeKind::List => edit
                    .children(n)
                    .filter(|&c| edit.is_key(c))
                    .map(|c| edit.value(c).unwrap_or(""))
                    .eq(keys.iter().map(String::as_str)),
                NodeKind::LeafList => edit.value(n) == value,
                _ => true,
            };
            if same {
                return Some(n);
            }
        }
        None
    }

    // The target already exists: fine only with the same operation and value.
    fn check_same(&self, existing: NodeId, item: &EditItem, value: Option<&str>) -> Result<()> {
        let current = inherited_operation(&self.edit, existing)?.map(|(op, _)| op);
        let same_value = match self.edit.kind(existing) {
            NodeKind::Leaf | NodeKind::AnyData => self.edit.value(existing) == value,
            _ => true,
        };
        if current == Some(item.operation) && same_value {
            trace!(path = item.path.as_str(), "edit item already present");
            return Ok(());
        }
        Err(Error::ValidationFailed(format!(
            "Node \"{}\" is already part of the edit with a different operation or value.",
            item.path
        )))
    }

    /// Gives the ancestors of a new node the default operation, pushing
    /// weaker inherited operations down onto the other siblings.
    fn push_default_operation(&mut self, node: NodeId, default_op: EditOp) -> Result<()> {
        let Some(parent) = self.edit.parent(node) else {
            return Ok(());
        };

        if inherited_operation(&self.edit, parent)?.is_none() {
            let mut top = parent;
            while let Some(p) = self.edit.parent(top) {
                top = p;
            }
            if self.operational {
                let mut cur = Some(parent);
                while let Some(p) = cur {
                    let origin = if self.edit.schema().is_config(self.edit.schema_id(p)) {
                        CONFIG_ORIGIN
                    } else {
                        OPER_ORIGIN
                    };
                    set_origin(&mut self.edit, p, Some(origin), true);
                    cur = self.edit.parent(p);
                }
            }
            set_operation(&mut self.edit, top, default_op);
            return Ok(());
        }

        let missing = || Error::Internal("Edit node without an operation.".to_string());
        let mut child = node;
        let mut cur = Some(parent);
        let mut checked: Option<(EditOp, bool)> = None;
        while let Some(p) = cur {
            let (op, own) = match checked.take() {
                Some(known) => known,
                None => {
                    let known = inherited_operation(&self.edit, p)?.ok_or_else(missing)?;
                    if !default_op.is_superior_to(known.0) {
                        break;
                    }
                    known
                }
            };

            for sibling in self.edit.non_key_children(p) {
                if sibling != child && own_operation(&self.edit, sibling)?.is_none() {
                    set_operation(&mut self.edit, sibling, op);
                }
            }

            if own {
                remove_operation(&mut self.edit, p);
                let above = match self.edit.parent(p) {
                    Some(gp) => Some(inherited_operation(&self.edit, gp)?.ok_or_else(missing)?),
                    None => None,
                };
                match above {
                    Some(known) if default_op.is_superior_to(known.0) => checked = Some(known),
                    _ => {
                        set_operation(&mut self.edit, p, default_op);
                        break;
                    }
                }
            }
            child = p;
            cur = self.edit.parent(p);
        }
        Ok(())
    }
}
