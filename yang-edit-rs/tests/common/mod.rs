//! Shared fixtures of the integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use tracing_subscriber::EnvFilter;
use yang_edit::schema::{LeafType, Schema, SchemaBuilder};
use yang_edit::xml::parse_str;
use yang_edit::DataTree;

/// Namespace declarations for the root element of test documents.
pub const NS: &str = concat!(
    r#"xmlns="urn:ex" "#,
    r#"xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0" "#,
    r#"xmlns:yang="urn:ietf:params:xml:ns:yang:1" "#,
    r#"xmlns:meta="urn:yang-edit:meta:1.0" "#,
    r#"xmlns:ncwd="urn:ietf:params:xml:ns:netconf:default:1.0""#,
);

/// Installs a fmt subscriber honouring `RUST_LOG`; repeated calls are fine.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema() -> Rc<Schema> {
    let mut b = SchemaBuilder::new();
    let m = b.module("ex", "urn:ex");

    let a = b.container(m, "a");
    b.leaf(a, "b", LeafType::Int);

    let cont = b.container(m, "cont");
    b.leaf(cont, "name", LeafType::String);
    let user = b.list(cont, "user", &[("id", LeafType::Int)], true);
    b.leaf(user, "role", LeafType::String);
    b.leaf_list(cont, "tag", LeafType::String, true);
    let inner = b.container(cont, "inner");
    b.leaf_with_default(inner, "level", LeafType::Int, "1");
    b.build()
}

/// Parses one `cont` document; `attrs` go on the root element.
pub fn cont(attrs: &str, body: &str) -> DataTree {
    parse_str(&schema(), &format!(r#"<cont {NS} {attrs}>{body}</cont>"#)).unwrap()
}

/// Values of the `tag` leaf-list in data order.
pub fn tags(tree: &DataTree) -> Vec<String> {
    let Some(root) = tree.first_root() else {
        return Vec::new();
    };
    tree.children(root)
        .filter(|&c| tree.name(c) == "tag")
        .map(|c| tree.value(c).unwrap_or("").to_string())
        .collect()
}

/// `cont` body listing the given tags after a fixed name leaf.
pub fn tag_body(values: &[String]) -> String {
    let mut body = String::from("<name>x</name>");
    for v in values {
        body.push_str(&format!("<tag>{v}</tag>"));
    }
    body
}
