//! XML reader that builds schema-typed trees.
//!
//! Elements are resolved against the schema by namespace and name.
//! Namespaced attributes are kept on the nodes, except the with-defaults
//! `default="true"` marker, which becomes [`NodeFlags::DEFAULT`]. Leaf
//! values are trimmed and stored in canonical form, list keys are moved to the front
//! of their list in key order, and anydata keeps its raw inner text.

use std::path::Path;
use std::rc::Rc;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::constants::{ATTR_DEFAULT, WITH_DEFAULTS_NS};
use crate::error::{Error, Result};
use crate::node::namespace::{is_xmlns_attr, split_qname, ExpandedName, NamespaceContext};
use crate::node::{DataTree, NodeFlags, NodeId};
use crate::schema::{NodeKind, Schema};

/// An element whose end tag has not been seen yet.
struct Open {
    node: NodeId,
    default: bool,
    text: String,
}

/// XML parser producing [`DataTree`]s over one schema.
pub struct XmlParser {
    schema: Rc<Schema>,
}

impl XmlParser {
    /// Creates a parser for the given schema.
    pub fn new(schema: Rc<Schema>) -> Self {
        XmlParser { schema }
    }

    /// Parses a forest from a string.
    pub fn parse_str(&self, xml: &str) -> Result<DataTree> {
        // text is trimmed per element, entity references arrive as separate events
        let mut reader = Reader::from_str(xml);

        let mut tree = DataTree::new(self.schema.clone());
        let mut ns = NamespaceContext::new();
        let mut stack: Vec<Open> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let parent = stack.last().map(|o| o.node);
                    let (node, default) = self.open_element(&mut tree, &mut ns, &e, parent)?;
                    if tree.kind(node) == NodeKind::AnyData {
                        let raw = reader.read_text(e.name())?;
                        tree.set_value(node, Some(raw.trim().to_string()));
                        if default {
                            tree.set_default(node, true);
                        }
                        ns.pop_scope();
                    } else {
                        stack.push(Open {
                            node,
                            default,
                            text: String::new(),
                        });
                    }
                }
                Event::Empty(e) => {
                    let parent = stack.last().map(|o| o.node);
                    let (node, default) = self.open_element(&mut tree, &mut ns, &e, parent)?;
                    self.close_element(&mut tree, node, default, "")?;
                    ns.pop_scope();
                }
                Event::End(_) => {
                    let open = stack
                        .pop()
                        .ok_or_else(|| Error::Parse("unbalanced end tag".to_string()))?;
                    self.close_element(&mut tree, open.node, open.default, &open.text)?;
                    ns.pop_scope();
                }
                Event::Text(e) => {
                    let raw =
                        std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                    let text = unescape(raw).map_err(|e| Error::Parse(e.to_string()))?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(e.as_ref());
                    push_text(&mut stack, &text)?;
                }
                Event::GeneralRef(e) => {
                    let name =
                        std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                    let resolved = resolve_entity(name)?;
                    push_text(&mut stack, &resolved)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::Parse(format!(
                "unclosed element \"{}\"",
                tree.name(open.node)
            )));
        }
        Ok(tree)
    }

    /// Parses a forest from a file.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<DataTree> {
        let xml = std::fs::read_to_string(path)?;
        self.parse_str(&xml)
    }

    /// Creates the node of a start tag and links it under `parent`.
    fn open_element(
        &self,
        tree: &mut DataTree,
        ns: &mut NamespaceContext,
        e: &BytesStart,
        parent: Option<NodeId>,
    ) -> Result<(NodeId, bool)> {
        ns.push_scope();

        let mut attributes = Vec::new();
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|e| Error::Parse(format!("Attribute error: {}", e)))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Parse(e.to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::Parse(e.to_string()))?
                .to_string();
            if is_xmlns_attr(&key) {
                let prefix = key.strip_prefix("xmlns:").unwrap_or("");
                ns.bind(prefix, &value);
            } else {
                attributes.push((key, value));
            }
        }

        let name = e.name();
        let qname = std::str::from_utf8(name.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
        let (prefix, local) = split_qname(qname);
        let namespace = match prefix {
            Some(p) => ns
                .resolve(p)
                .ok_or_else(|| Error::Parse(format!("unbound prefix \"{}\"", p)))?,
            None => match (ns.default_namespace(), parent) {
                (Some(uri), _) => uri,
                (None, Some(p)) => tree.schema().namespace(tree.schema_id(p)).clone(),
                (None, None) => {
                    return Err(Error::Parse(format!(
                        "top-level element \"{}\" has no namespace",
                        local
                    )))
                }
            },
        };

        let parent_schema = parent.map(|p| tree.schema_id(p));
        let schema_id = self
            .schema
            .find_child(parent_schema, &namespace, local)
            .ok_or_else(|| {
                Error::Parse(format!(
                    "unknown element \"{}\" in namespace \"{}\"",
                    local, namespace
                ))
            })?;

        let node = tree.new_node(schema_id, None);
        let mut default = false;
        for (key, value) in attributes {
            let (prefix, local) = split_qname(&key);
            let uri: Rc<str> = match prefix {
                Some(p) => ns
                    .resolve(p)
                    .ok_or_else(|| Error::Parse(format!("unbound prefix \"{}\"", p)))?,
                None => "".into(),
            };
            if uri.as_ref() == WITH_DEFAULTS_NS && local == ATTR_DEFAULT {
                default = value == "true" || value == "1";
                continue;
            }
            tree.attrs_mut(node)
                .insert(ExpandedName::new(uri, local), value);
        }
        tree.append(parent, node);
        Ok((node, default))
    }

    /// Stores the collected text and finishes the node.
    fn close_element(
        &self,
        tree: &mut DataTree,
        node: NodeId,
        default: bool,
        text: &str,
    ) -> Result<()> {
        let text = text.trim();
        match tree.kind(node) {
            NodeKind::Leaf | NodeKind::LeafList => {
                let sid = tree.schema_id(node);
                match self.schema.canonical_value(sid, text) {
                    Ok(value) => tree.set_value(node, Some(value)),
                    // `<leaf nc:operation="delete"/>` carries no value
                    Err(_) if text.is_empty() => tree.set_value(node, None),
                    Err(e) => return Err(e),
                }
            }
            NodeKind::AnyData => tree.set_value(node, Some(text.to_string())),
            NodeKind::Container | NodeKind::List => {
                if !text.is_empty() {
                    return Err(Error::Parse(format!(
                        "unexpected text in {} \"{}\"",
                        tree.kind(node).name(),
                        tree.name(node)
                    )));
                }
                if tree.kind(node) == NodeKind::List {
                    order_keys(tree, node);
                }
            }
        }
        if default {
            let flags = tree.flags(node) | NodeFlags::DEFAULT;
            tree.set_flags(node, flags);
        }
        Ok(())
    }
}

fn push_text(stack: &mut [Open], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(open) => {
            open.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::Parse(format!("text outside of any element: \"{}\"", text))),
    }
}

fn resolve_entity(name: &str) -> Result<String> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "apos" => '\'',
        "quot" => '"',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
                .ok_or_else(|| Error::Parse(format!("unknown entity \"&{};\"", name)))?
        }
    };
    Ok(c.to_string())
}

/// Moves the key leaves of a list to its front, in key order.
fn order_keys(tree: &mut DataTree, list: NodeId) {
    let keys = tree.snode(list).keys().to_vec();
    for &key in keys.iter().rev() {
        let found = tree.children(list).find(|&c| tree.schema_id(c) == key);
        if let (Some(k), Some(first)) = (found, tree.first_child(list)) {
            tree.insert_before(first, k);
        }
    }
}

/// Parses a forest from a string with the given schema.
pub fn parse_str(schema: &Rc<Schema>, xml: &str) -> Result<DataTree> {
    XmlParser::new(schema.clone()).parse_str(xml)
}

/// Parses a forest from a file with the given schema.
pub fn parse_file<P: AsRef<Path>>(schema: &Rc<Schema>, path: P) -> Result<DataTree> {
    XmlParser::new(schema.clone()).parse_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{NETCONF_NS, YANG_NS};
    use crate::schema::{LeafType, SchemaBuilder};

    fn schema() -> Rc<Schema> {
        let mut b = SchemaBuilder::new();
        let m = b.module("ex", "urn:ex");
        let cont = b.container(m, "cont");
        b.leaf(cont, "count", LeafType::Int);
        b.leaf_with_default(cont, "mode", LeafType::String, "auto");
        b.list(cont, "item", &[("a", LeafType::String), ("b", LeafType::Int)], true);
        b.leaf_list(cont, "tag", LeafType::String, true);
        b.anydata(cont, "blob");
        b.build()
    }

    #[test]
    fn test_parse_values_and_attributes() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0"
                           xmlns:yang="urn:ietf:params:xml:ns:yang:1">
            <count nc:operation="replace">007</count>
            <tag yang:insert="after" yang:value="x">y &amp; z</tag>
        </cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let cont = tree.first_root().unwrap();
        let count = tree.first_child(cont).unwrap();
        assert_eq!(tree.value(count), Some("7"));
        assert_eq!(tree.attr(count, NETCONF_NS, "operation"), Some("replace"));
        let tag = tree.next(count).unwrap();
        assert_eq!(tree.value(tag), Some("y & z"));
        assert_eq!(tree.attr(tag, YANG_NS, "value"), Some("x"));
    }

    #[test]
    fn test_keys_are_moved_first() {
        let xml = r#"<cont xmlns="urn:ex"><item><b>2</b><a>x</a></item></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let item = tree.find_path("/ex:cont/item[a='x'][b='2']").unwrap().unwrap();
        let names: Vec<_> = tree.children(item).map(|c| tree.name(c).to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_default_marker() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:ncwd="urn:ietf:params:xml:ns:netconf:default:1.0">
            <mode ncwd:default="true">auto</mode></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let mode = tree.find_path("/ex:cont/mode").unwrap().unwrap();
        assert!(tree.is_default(mode));
        assert!(tree.attrs(mode).is_empty());
    }

    #[test]
    fn test_anydata_keeps_raw_content() {
        let xml = r#"<cont xmlns="urn:ex"><blob><x a="1">t</x></blob></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let blob = tree.find_path("/ex:cont/blob").unwrap().unwrap();
        assert_eq!(tree.value(blob), Some(r#"<x a="1">t</x>"#));
    }

    #[test]
    fn test_errors() {
        let s = schema();
        assert!(parse_str(&s, r#"<cont xmlns="urn:other"/>"#).is_err());
        assert!(parse_str(&s, r#"<cont xmlns="urn:ex"><count>abc</count></cont>"#).is_err());
        assert!(parse_str(&s, r#"<cont xmlns="urn:ex">text</cont>"#).is_err());
        assert!(parse_str(&s, r#"<cont/>"#).is_err());
    }

    #[test]
    fn test_valueless_leaf() {
        let xml = r#"<cont xmlns="urn:ex"><count/></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let count = tree.find_path("/ex:cont/count").unwrap().unwrap();
        assert_eq!(tree.value(count), None);
    }
}
