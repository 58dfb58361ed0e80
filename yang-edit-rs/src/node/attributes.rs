//! Attribute map of a tree node.

use std::collections::BTreeMap;

use super::namespace::ExpandedName;

/// Attributes keyed by (namespace, name), iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    map: BTreeMap<ExpandedName, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&str> {
        self.map
            .iter()
            .find(|(k, _)| k.is(namespace, name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }

    /// Sets an attribute, returning the previous value.
    pub fn set(&mut self, namespace: &str, name: &str, value: impl Into<String>) -> Option<String> {
        self.map
            .insert(ExpandedName::new(namespace, name), value.into())
    }

    pub fn insert(&mut self, name: ExpandedName, value: String) -> Option<String> {
        self.map.insert(name, value)
    }

    pub fn remove(&mut self, namespace: &str, name: &str) -> Option<String> {
        self.map.remove(&ExpandedName::new(namespace, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExpandedName, &str)> {
        self.map.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
