//! yang-edit - Edit, diff and merge engine for YANG-modelled data
//!
//! This library applies NETCONF-style edits to schema-aware data trees
//! and keeps a precise record of what changed.
//!
//! # Overview
//!
//! An edit is a tree of desired changes whose nodes carry operations
//! (`merge`, `replace`, `create`, `delete`, `remove`, `none`) and, for
//! user-ordered lists and leaf-lists, insert directives. Applying an edit
//! to a data tree mutates the data and produces a diff: a tree that
//! records every effective change with enough information to replay it,
//! undo it, or combine it with later diffs.
//!
//! # Key Features
//!
//! - Edit application with operation inheritance and user-ordered moves
//! - Diffs that can be applied, reversed, merged and updated against data
//! - Origin and ownership tags for multi-writer operational data
//! - XML reading and writing of data, edit and diff trees
//!
//! # Example
//!
//! ```
//! use yang_edit::edit::apply_edit;
//! use yang_edit::diff::{apply_diff, reverse_diff};
//! use yang_edit::schema::{LeafType, SchemaBuilder};
//! use yang_edit::xml::parse_str;
//!
//! let mut b = SchemaBuilder::new();
//! let m = b.module("ex", "urn:ex");
//! let a = b.container(m, "a");
//! b.leaf(a, "b", LeafType::Int);
//! let schema = b.build();
//!
//! let mut data = parse_str(&schema, r#"<a xmlns="urn:ex"><b>5</b></a>"#).unwrap();
//! let edit = parse_str(
//!     &schema,
//!     r#"<a xmlns="urn:ex" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
//!          <b nc:operation="replace">7</b>
//!        </a>"#,
//! )
//! .unwrap();
//!
//! let outcome = apply_edit(&mut data, &edit).unwrap();
//! assert!(outcome.changed);
//!
//! let undo = reverse_diff(&outcome.diff).unwrap();
//! apply_diff(&mut data, &undo, false).unwrap();
//! let b_node = data.expect_path("/ex:a/b").unwrap();
//! assert_eq!(data.value(b_node), Some("5"));
//! ```

pub mod constants;
pub mod diff;
pub mod edit;
pub mod error;
pub mod matching;
pub mod merge;
pub mod node;
pub mod schema;
pub mod xml;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use node::{DataTree, DupFlags, NodeFlags, NodeId};
pub use schema::{LeafType, NodeKind, Schema, SchemaBuilder, SchemaId};
pub use xml::{parse_file, parse_str, XmlParser, XmlPrinter};

// Re-export edit types
pub use edit::{apply_edit, apply_edit_with, EditBuilder, EditItem, EditOp, EditOptions, EditOutcome, Position};

// Re-export diff types
pub use diff::{apply_diff, changes, reverse_diff, update_diff, Change, ChangeOp, Patch};

// Re-export merge types
pub use merge::{merge_diff, remove_owner, MergeOptions, Owner};
