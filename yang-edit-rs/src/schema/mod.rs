//! Schema oracle.
//!
//! The engine never parses schema definitions. It asks a [`Schema`] for
//! the kind of a node, its keys, whether it is user-ordered, its default
//! value, presence status and config status, and for canonical values.
//! [`SchemaBuilder`] assembles an in-memory schema.

pub mod path;

use std::rc::Rc;

use crate::error::{Error, Result};

/// Handle of a schema node inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u32);

impl SchemaId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a module inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(usize);

/// Kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Container,
    List,
    Leaf,
    LeafList,
    AnyData,
}

impl NodeKind {
    /// Lists and leaf-lists have many instances under one parent.
    pub fn is_collection(self) -> bool {
        matches!(self, NodeKind::List | NodeKind::LeafList)
    }

    /// Nodes carrying a value rather than children.
    pub fn has_value(self) -> bool {
        matches!(self, NodeKind::Leaf | NodeKind::LeafList | NodeKind::AnyData)
    }

    /// Nodes that may have children.
    pub fn has_children(self) -> bool {
        matches!(self, NodeKind::Container | NodeKind::List)
    }

    /// Returns the YANG keyword of the kind.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::List => "list",
            NodeKind::Leaf => "leaf",
            NodeKind::LeafList => "leaf-list",
            NodeKind::AnyData => "anydata",
        }
    }
}

/// Built-in value types that know their canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafType {
    String,
    Int,
    Uint,
    Boolean,
    Empty,
}

impl LeafType {
    /// Returns the canonical form of `raw`, or `None` if it is not a valid value.
    pub fn canonicalize(self, raw: &str) -> Option<String> {
        match self {
            LeafType::String => Some(raw.to_string()),
            LeafType::Int => raw.trim().parse::<i64>().ok().map(|v| v.to_string()),
            LeafType::Uint => raw.trim().parse::<u64>().ok().map(|v| v.to_string()),
            LeafType::Boolean => match raw.trim() {
                "true" => Some("true".to_string()),
                "false" => Some("false".to_string()),
                _ => None,
            },
            LeafType::Empty => raw.trim().is_empty().then(String::new),
        }
    }
}

/// A module: a name and the namespace of its nodes.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub namespace: Rc<str>,
}

/// One node of the schema tree.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    name: String,
    module: ModuleId,
    parent: Option<SchemaId>,
    children: Vec<SchemaId>,
    kind: NodeKind,
    user_ordered: bool,
    keys: Vec<SchemaId>,
    presence: bool,
    default: Option<String>,
    config: bool,
    leaf_type: LeafType,
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    pub fn children(&self) -> &[SchemaId] {
        &self.children
    }

    /// Key leaves of a list in declaration order; empty for anything else.
    pub fn keys(&self) -> &[SchemaId] {
        &self.keys
    }

    /// Whether instance order is significant (`ordered-by user`).
    pub fn is_user_ordered(&self) -> bool {
        self.user_ordered
    }

    /// Whether a container carries meaning by its mere existence.
    pub fn is_presence(&self) -> bool {
        self.presence
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn leaf_type(&self) -> LeafType {
        self.leaf_type
    }
}

/// An in-memory schema: modules and their node trees.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    modules: Vec<Module>,
    nodes: Vec<SchemaNode>,
    top: Vec<SchemaId>,
}

impl Schema {
    /// Returns a schema node. Ids always come from this schema.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: SchemaId) -> NodeKind {
        self.node(id).kind
    }

    pub fn name(&self, id: SchemaId) -> &str {
        &self.node(id).name
    }

    /// Returns the module a node belongs to.
    pub fn module_of(&self, id: SchemaId) -> &Module {
        &self.modules[self.node(id).module.0]
    }

    pub fn namespace(&self, id: SchemaId) -> &Rc<str> {
        &self.module_of(id).namespace
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn module_by_namespace(&self, namespace: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.namespace.as_ref() == namespace)
    }

    /// Top-level schema nodes of all modules.
    pub fn top_level(&self) -> &[SchemaId] {
        &self.top
    }

    /// Finds a child schema node by namespace and name; `None` parent means top level.
    pub fn find_child(
        &self,
        parent: Option<SchemaId>,
        namespace: &str,
        name: &str,
    ) -> Option<SchemaId> {
        let candidates = match parent {
            Some(p) => self.node(p).children.as_slice(),
            None => self.top.as_slice(),
        };
        candidates
            .iter()
            .copied()
            .find(|&id| self.name(id) == name && self.namespace(id).as_ref() == namespace)
    }

    /// Whether the node is a key leaf of its parent list.
    pub fn is_key(&self, id: SchemaId) -> bool {
        match self.node(id).parent {
            Some(p) => self.node(p).keys.contains(&id),
            None => false,
        }
    }

    /// Whether the node is configuration (no `config false` on it or an ancestor).
    pub fn is_config(&self, id: SchemaId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if !self.node(c).config {
                return false;
            }
            cur = self.node(c).parent;
        }
        true
    }

    /// Returns the canonical form of a value of the node.
    pub fn canonical_value(&self, id: SchemaId, raw: &str) -> Result<String> {
        let node = self.node(id);
        match node.kind {
            NodeKind::Leaf | NodeKind::LeafList => {
                node.leaf_type.canonicalize(raw).ok_or_else(|| {
                    Error::ValidationFailed(format!(
                        "Invalid value \"{}\" of node \"{}\".",
                        raw, node.name
                    ))
                })
            }
            NodeKind::AnyData => Ok(raw.to_string()),
            NodeKind::Container | NodeKind::List => Err(Error::Internal(format!(
                "Node \"{}\" of kind {} has no value.",
                node.name,
                node.kind.name()
            ))),
        }
    }

    /// Compares two values of the node by their canonical forms.
    pub fn values_equal(&self, id: SchemaId, a: &str, b: &str) -> Result<bool> {
        Ok(self.canonical_value(id, a)? == self.canonical_value(id, b)?)
    }
}

/// Where a new schema node is attached.
#[derive(Debug, Clone, Copy)]
pub enum Parent {
    Module(ModuleId),
    Node(SchemaId),
}

impl From<ModuleId> for Parent {
    fn from(m: ModuleId) -> Self {
        Parent::Module(m)
    }
}

impl From<SchemaId> for Parent {
    fn from(id: SchemaId) -> Self {
        Parent::Node(id)
    }
}

/// Builds a [`Schema`] node by node.
///
/// ```
/// use yang_edit::schema::{LeafType, SchemaBuilder};
///
/// let mut b = SchemaBuilder::new();
/// let m = b.module("ex", "urn:ex");
/// let cont = b.container(m, "cont");
/// b.leaf(cont, "name", LeafType::String);
/// b.list(cont, "user", &[("id", LeafType::Uint)], true);
/// let schema = b.build();
/// assert_eq!(schema.top_level().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module.
    pub fn module(&mut self, name: &str, namespace: &str) -> ModuleId {
        self.schema.modules.push(Module {
            name: name.to_string(),
            namespace: namespace.into(),
        });
        ModuleId(self.schema.modules.len() - 1)
    }

    /// Adds a non-presence container.
    pub fn container(&mut self, parent: impl Into<Parent>, name: &str) -> SchemaId {
        self.add(parent.into(), name, NodeKind::Container)
    }

    /// Adds a presence container.
    pub fn presence_container(&mut self, parent: impl Into<Parent>, name: &str) -> SchemaId {
        let id = self.add(parent.into(), name, NodeKind::Container);
        self.schema.nodes[id.index()].presence = true;
        id
    }

    pub fn leaf(&mut self, parent: impl Into<Parent>, name: &str, ty: LeafType) -> SchemaId {
        let id = self.add(parent.into(), name, NodeKind::Leaf);
        self.schema.nodes[id.index()].leaf_type = ty;
        id
    }

    /// Adds a leaf with a schema default.
    pub fn leaf_with_default(
        &mut self,
        parent: impl Into<Parent>,
        name: &str,
        ty: LeafType,
        default: &str,
    ) -> SchemaId {
        let id = self.leaf(parent, name, ty);
        self.schema.nodes[id.index()].default = Some(default.to_string());
        id
    }

    pub fn leaf_list(
        &mut self,
        parent: impl Into<Parent>,
        name: &str,
        ty: LeafType,
        user_ordered: bool,
    ) -> SchemaId {
        let id = self.add(parent.into(), name, NodeKind::LeafList);
        let node = &mut self.schema.nodes[id.index()];
        node.leaf_type = ty;
        node.user_ordered = user_ordered;
        id
    }

    /// Adds a list and its key leaves, in key order, as its first children.
    pub fn list(
        &mut self,
        parent: impl Into<Parent>,
        name: &str,
        keys: &[(&str, LeafType)],
        user_ordered: bool,
    ) -> SchemaId {
        let id = self.add(parent.into(), name, NodeKind::List);
        self.schema.nodes[id.index()].user_ordered = user_ordered;
        for (key, ty) in keys {
            let key_id = self.leaf(id, key, *ty);
            self.schema.nodes[id.index()].keys.push(key_id);
        }
        id
    }

    pub fn anydata(&mut self, parent: impl Into<Parent>, name: &str) -> SchemaId {
        self.add(parent.into(), name, NodeKind::AnyData)
    }

    /// Marks a node and its subtree as state data (`config false`).
    pub fn state(&mut self, id: SchemaId) -> &mut Self {
        self.schema.nodes[id.index()].config = false;
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> Rc<Schema> {
        Rc::new(self.schema)
    }

    fn add(&mut self, parent: Parent, name: &str, kind: NodeKind) -> SchemaId {
        let id = SchemaId(self.schema.nodes.len() as u32);
        let (module, parent_id) = match parent {
            Parent::Module(m) => (m, None),
            Parent::Node(p) => (self.schema.nodes[p.index()].module, Some(p)),
        };
        self.schema.nodes.push(SchemaNode {
            name: name.to_string(),
            module,
            parent: parent_id,
            children: Vec::new(),
            kind,
            user_ordered: false,
            keys: Vec::new(),
            presence: false,
            default: None,
            config: true,
            leaf_type: LeafType::String,
        });
        match parent_id {
            Some(p) => self.schema.nodes[p.index()].children.push(id),
            None => self.schema.top.push(id),
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Rc<Schema>, SchemaId, SchemaId, SchemaId) {
        let mut b = SchemaBuilder::new();
        let m = b.module("ex", "urn:ex");
        let cont = b.container(m, "cont");
        let list = b.list(cont, "item", &[("a", LeafType::Int), ("b", LeafType::String)], true);
        let stats = b.container(cont, "stats");
        b.leaf(stats, "count", LeafType::Uint);
        b.state(stats);
        (b.build(), cont, list, stats)
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(LeafType::Int.canonicalize("007"), Some("7".to_string()));
        assert_eq!(LeafType::Int.canonicalize("-3"), Some("-3".to_string()));
        assert_eq!(LeafType::Uint.canonicalize("-3"), None);
        assert_eq!(LeafType::Boolean.canonicalize("TRUE"), None);
        assert_eq!(LeafType::Empty.canonicalize(""), Some(String::new()));
        assert_eq!(LeafType::Empty.canonicalize("x"), None);
    }

    #[test]
    fn test_lookup_and_keys() {
        let (schema, cont, list, _) = sample();
        assert_eq!(schema.find_child(None, "urn:ex", "cont"), Some(cont));
        assert_eq!(schema.find_child(None, "urn:other", "cont"), None);
        assert_eq!(schema.find_child(Some(cont), "urn:ex", "item"), Some(list));

        let keys = schema.node(list).keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(schema.name(keys[0]), "a");
        assert!(schema.is_key(keys[1]));
        assert!(!schema.is_key(list));
        assert!(schema.node(list).is_user_ordered());
        assert_eq!(schema.node(list).children()[..2], keys[..]);
    }

    #[test]
    fn test_config_is_inherited() {
        let (schema, cont, _, stats) = sample();
        let count = schema.node(stats).children()[0];
        assert!(schema.is_config(cont));
        assert!(!schema.is_config(stats));
        assert!(!schema.is_config(count));
    }

    #[test]
    fn test_values_equal() {
        let (schema, _, list, _) = sample();
        let a = schema.node(list).keys()[0];
        assert!(schema.values_equal(a, "10", "010").unwrap());
        assert!(!schema.values_equal(a, "10", "11").unwrap());
        assert!(schema.values_equal(a, "x", "1").is_err());
    }
}
