//! Namespace-qualified names and XML namespace scoping.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::constants::KNOWN_PREFIXES;

/// Attribute name resolved to its namespace.
///
/// Attribute maps are keyed by it, so they iterate by namespace first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    /// Namespace URI; empty for unprefixed attributes.
    pub namespace_uri: Rc<str>,
    /// Name without prefix.
    pub local_name: String,
}

impl ExpandedName {
    /// Creates a name in the given namespace.
    pub fn new(uri: impl Into<Rc<str>>, local: impl Into<String>) -> Self {
        ExpandedName {
            namespace_uri: uri.into(),
            local_name: local.into(),
        }
    }

    /// Whether this is `local` in namespace `uri`.
    pub fn is(&self, uri: &str, local: &str) -> bool {
        self.namespace_uri.as_ref() == uri && self.local_name == local
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

/// Prefix bindings in scope while reading XML, one map per open element.
pub struct NamespaceContext {
    uris: HashMap<String, Rc<str>>,
    scopes: Vec<HashMap<String, Rc<str>>>,
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceContext {
    /// Only `xml` is bound initially.
    pub fn new() -> Self {
        let mut ctx = NamespaceContext {
            uris: HashMap::new(),
            scopes: vec![HashMap::new()],
        };
        ctx.bind("xml", "http://www.w3.org/XML/1998/namespace");
        ctx
    }

    /// Opens the scope of a new element.
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Closes the innermost element scope; the document scope stays.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Binds `prefix` in the innermost scope; `""` is the default namespace.
    pub fn bind(&mut self, prefix: &str, uri: &str) {
        let uri = self.intern(uri);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(prefix.to_string(), uri);
        }
    }

    /// Innermost binding of `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<Rc<str>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix).cloned())
    }

    /// Namespace of unprefixed element names.
    pub fn default_namespace(&self) -> Option<Rc<str>> {
        self.resolve("")
    }

    // Every element and attribute of one document shares the same URI strings.
    fn intern(&mut self, uri: &str) -> Rc<str> {
        self.uris
            .entry(uri.to_string())
            .or_insert_with(|| Rc::from(uri))
            .clone()
    }
}

/// Hands out prefixes for namespaces when writing XML.
///
/// Well-known namespaces get fixed prefixes, anything else `ns0`, `ns1`, ...
#[derive(Debug, Default)]
pub struct PrefixMap {
    assigned: HashMap<Rc<str>, String>,
}

impl PrefixMap {
    /// Creates an empty prefix map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prefix for a namespace, assigning one on first use.
    pub fn prefix_for(&mut self, uri: &Rc<str>) -> String {
        if let Some(prefix) = self.assigned.get(uri) {
            return prefix.clone();
        }
        let prefix = KNOWN_PREFIXES
            .iter()
            .find(|(ns, _)| *ns == uri.as_ref())
            .map(|(_, p)| p.to_string())
            .unwrap_or_else(|| format!("ns{}", self.assigned.len()));
        self.assigned.insert(uri.clone(), prefix.clone());
        prefix
    }
}

/// Splits `prefix:local`; a name without a colon has no prefix.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Whether an attribute name is a namespace declaration.
pub fn is_xmlns_attr(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{META_NS, NETCONF_NS};

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("nc:operation"), (Some("nc"), "operation"));
        assert_eq!(split_qname("operation"), (None, "operation"));
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.push_scope();
        ctx.bind("nc", NETCONF_NS);
        assert_eq!(ctx.resolve("nc").unwrap().as_ref(), NETCONF_NS);

        ctx.pop_scope();
        assert!(ctx.resolve("nc").is_none());
        assert!(ctx.resolve("xml").is_some());
    }

    #[test]
    fn test_expanded_name_ordering() {
        let a = ExpandedName::new(META_NS, "orig-value");
        let b = ExpandedName::new(NETCONF_NS, "operation");
        let c = ExpandedName::new(META_NS, "conn-ptr");
        let mut names = vec![b.clone(), a.clone(), c.clone()];
        names.sort();
        assert_eq!(names, vec![b, c, a]);
    }

    #[test]
    fn test_prefix_map() {
        let mut map = PrefixMap::new();
        assert_eq!(map.prefix_for(&Rc::from(NETCONF_NS)), "nc");
        assert_eq!(map.prefix_for(&Rc::from("urn:other")), "ns1");
        assert_eq!(map.prefix_for(&Rc::from("urn:other")), "ns1");
    }
}
