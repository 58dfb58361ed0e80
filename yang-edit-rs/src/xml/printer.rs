//! XML printer for data, edit and diff trees.
//!
//! Output is deterministic: attributes come out in (namespace, name) order
//! and well-known namespaces always use the same prefixes. Every prefix a
//! subtree uses is declared once, on its top-level element.

use std::io::Write;
use std::rc::Rc;

use quick_xml::escape::escape;

use crate::constants::{ATTR_DEFAULT, WITH_DEFAULTS_NS};
use crate::error::Result;
use crate::node::namespace::PrefixMap;
use crate::node::{DataTree, NodeId};
use crate::schema::NodeKind;

/// Options for XML printing.
#[derive(Debug, Clone, Default)]
pub struct XmlPrinterOptions {
    /// Whether to pretty-print with indentation.
    pub pretty_print: bool,
}

/// XML printer that writes trees to a writer.
pub struct XmlPrinter<W: Write> {
    writer: W,
    options: XmlPrinterOptions,
    prefixes: PrefixMap,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, XmlPrinterOptions::default())
    }

    /// Creates a new XML printer with the given options.
    pub fn with_options(writer: W, options: XmlPrinterOptions) -> Self {
        XmlPrinter {
            writer,
            options,
            prefixes: PrefixMap::new(),
        }
    }

    /// Prints every top-level node of the tree.
    pub fn print(&mut self, tree: &DataTree) -> Result<()> {
        for root in tree.roots() {
            self.print_subtree(tree, root)?;
        }
        Ok(())
    }

    /// Prints one subtree.
    pub fn print_subtree(&mut self, tree: &DataTree, node: NodeId) -> Result<()> {
        let declarations = self.subtree_namespaces(tree, node);
        self.print_node(tree, node, None, &declarations, &[], 0)
    }

    /// Consumes the printer and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    // Prefixed namespaces used by attributes anywhere in the subtree.
    fn subtree_namespaces(&mut self, tree: &DataTree, node: NodeId) -> Vec<(String, Rc<str>)> {
        let mut found: Vec<(String, Rc<str>)> = Vec::new();
        for n in tree.descendants(node) {
            let uris = tree
                .attrs(n)
                .iter()
                .map(|(k, _)| k.namespace_uri.clone())
                .chain(tree.is_default(n).then(|| Rc::from(WITH_DEFAULTS_NS)));
            for uri in uris.filter(|uri| !uri.is_empty()) {
                let prefix = self.prefixes.prefix_for(&uri);
                if !found.iter().any(|(p, _)| *p == prefix) {
                    found.push((prefix, uri));
                }
            }
        }
        found.sort();
        found
    }

    fn print_node(
        &mut self,
        tree: &DataTree,
        node: NodeId,
        parent_ns: Option<&str>,
        declare: &[(String, Rc<str>)],
        declared: &[String],
        depth: usize,
    ) -> Result<()> {
        let pretty = self.options.pretty_print;
        let name = tree.name(node);
        let namespace = tree.schema().namespace(tree.schema_id(node)).clone();
        let ns_str: &str = &namespace;

        let mut attributes: Vec<(Rc<str>, String, String)> = tree
            .attrs(node)
            .iter()
            .map(|(k, v)| (k.namespace_uri.clone(), k.local_name.clone(), v.to_string()))
            .collect();
        if tree.is_default(node) {
            attributes.push((WITH_DEFAULTS_NS.into(), ATTR_DEFAULT.to_string(), "true".to_string()));
        }

        if pretty {
            write!(self.writer, "{}", "  ".repeat(depth))?;
        }
        write!(self.writer, "<{}", name)?;
        if parent_ns != Some(ns_str) {
            write!(self.writer, " xmlns=\"{}\"", escape(ns_str))?;
        }

        let mut in_scope = declared.to_vec();
        for (prefix, uri) in declare {
            let uri_str: &str = uri;
            write!(self.writer, " xmlns:{}=\"{}\"", prefix, escape(uri_str))?;
            in_scope.push(prefix.clone());
        }
        let mut written = Vec::with_capacity(attributes.len());
        for (uri, local, value) in &attributes {
            if uri.is_empty() {
                written.push(format!(" {}=\"{}\"", local, escape(value.as_str())));
                continue;
            }
            let prefix = self.prefixes.prefix_for(uri);
            if !in_scope.contains(&prefix) {
                let uri_str: &str = uri;
                write!(self.writer, " xmlns:{}=\"{}\"", prefix, escape(uri_str))?;
                in_scope.push(prefix.clone());
            }
            written.push(format!(" {}:{}=\"{}\"", prefix, local, escape(value.as_str())));
        }
        for attr in written {
            write!(self.writer, "{}", attr)?;
        }

        let value = tree.value(node).filter(|v| !v.is_empty());
        let has_children = tree.first_child(node).is_some();
        match (value, has_children) {
            (Some(v), _) => {
                // anydata holds raw markup
                if tree.kind(node) == NodeKind::AnyData {
                    write!(self.writer, ">{}</{}>", v, name)?;
                } else {
                    write!(self.writer, ">{}</{}>", escape(v), name)?;
                }
            }
            (None, true) => {
                write!(self.writer, ">")?;
                if pretty {
                    writeln!(self.writer)?;
                }
                let children: Vec<NodeId> = tree.children(node).collect();
                for child in children {
                    self.print_node(tree, child, Some(ns_str), &[], &in_scope, depth + 1)?;
                }
                if pretty {
                    write!(self.writer, "{}", "  ".repeat(depth))?;
                }
                write!(self.writer, "</{}>", name)?;
            }
            (None, false) => write!(self.writer, "/>")?,
        }
        if pretty {
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

/// Prints a tree to a compact string.
pub fn print_to_string(tree: &DataTree) -> Result<String> {
    print_with(tree, XmlPrinterOptions::default())
}

/// Prints a tree to an indented string.
pub fn print_to_string_pretty(tree: &DataTree) -> Result<String> {
    print_with(tree, XmlPrinterOptions { pretty_print: true })
}

fn print_with(tree: &DataTree, options: XmlPrinterOptions) -> Result<String> {
    let mut printer = XmlPrinter::with_options(Vec::new(), options);
    printer.print(tree)?;
    Ok(String::from_utf8_lossy(&printer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafType, Schema, SchemaBuilder};
    use crate::xml::parse_str;

    fn schema() -> Rc<Schema> {
        let mut b = SchemaBuilder::new();
        let m = b.module("ex", "urn:ex");
        let cont = b.container(m, "cont");
        b.leaf(cont, "name", LeafType::String);
        b.leaf_with_default(cont, "mode", LeafType::String, "auto");
        b.list(cont, "item", &[("id", LeafType::Int)], false);
        b.build()
    }

    #[test]
    fn test_compact_output() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0"><name nc:operation="replace">a &lt; b</name><item><id>1</id></item></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let out = print_to_string(&tree).unwrap();
        assert_eq!(out, xml);
    }

    #[test]
    fn test_default_marker_round_trip() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:ncwd="urn:ietf:params:xml:ns:netconf:default:1.0"><mode ncwd:default="true">auto</mode></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        assert_eq!(print_to_string(&tree).unwrap(), xml);
    }

    #[test]
    fn test_namespaces_declared_once_per_root() {
        let xml = r#"<cont xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:yang="urn:ietf:params:xml:ns:yang:1"><name nc:operation="create">a</name><item nc:operation="delete" yang:key=""><id>1</id></item><item nc:operation="delete" yang:key="[id='1']"><id>2</id></item></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let out = print_to_string(&tree).unwrap();
        assert_eq!(out, xml);
        assert_eq!(out.matches("xmlns:nc=").count(), 1);
        assert_eq!(out.matches("xmlns:yang=").count(), 1);

        // a subtree printed alone declares what it uses itself
        let mut printer = XmlPrinter::new(Vec::new());
        let item = tree.expect_path("/ex:cont/item[id='2']").unwrap();
        printer.print_subtree(&tree, item).unwrap();
        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(
            out,
            r#"<item xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:yang="urn:ietf:params:xml:ns:yang:1" nc:operation="delete" yang:key="[id='1']"><id>2</id></item>"#
        );
    }

    #[test]
    fn test_pretty_output() {
        let xml = r#"<cont xmlns="urn:ex"><name>x</name><item><id>1</id></item></cont>"#;
        let tree = parse_str(&schema(), xml).unwrap();
        let out = print_to_string_pretty(&tree).unwrap();
        let expected = "<cont xmlns=\"urn:ex\">\n  <name>x</name>\n  <item>\n    <id>1</id>\n  </item>\n</cont>\n";
        assert_eq!(out, expected);

        let reparsed = parse_str(&schema(), &out).unwrap();
        assert!(reparsed.forest_eq(&tree));
    }
}
