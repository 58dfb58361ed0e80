//! Namespaces, attribute names and origin identities.
//!
//! These make up the attribute vocabulary shared by edit and diff trees.
//! Every attribute is keyed by (namespace, name).

/// NETCONF base namespace; carries `operation` for the editing vocabulary.
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// YANG namespace; carries `insert`, `key` and `value`.
pub const YANG_NS: &str = "urn:ietf:params:xml:ns:yang:1";

/// Engine metadata namespace; carries `none`/`ether` operations, the
/// `orig-*` attributes and ownership tags.
pub const META_NS: &str = "urn:yang-edit:meta:1.0";

/// ietf-origin namespace; carries `origin`.
pub const ORIGIN_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-origin";

/// NETCONF with-defaults namespace; `default="true"` marks default nodes in XML.
pub const WITH_DEFAULTS_NS: &str = "urn:ietf:params:xml:ns:netconf:default:1.0";

/// Operation attribute name.
pub const ATTR_OPERATION: &str = "operation";

/// Insert placement attribute name.
pub const ATTR_INSERT: &str = "insert";

/// List anchor attribute name.
pub const ATTR_KEY: &str = "key";

/// Leaf-list anchor attribute name.
pub const ATTR_VALUE: &str = "value";

/// Previous list anchor.
pub const ATTR_ORIG_KEY: &str = "orig-key";

/// Previous leaf value or leaf-list anchor.
pub const ATTR_ORIG_VALUE: &str = "orig-value";

/// Present when the previous leaf value was a default.
pub const ATTR_ORIG_DFLT: &str = "orig-dflt";

/// Provenance attribute name.
pub const ATTR_ORIGIN: &str = "origin";

/// Owning process id.
pub const ATTR_PID: &str = "pid";

/// Owning connection token.
pub const ATTR_CONN: &str = "conn-ptr";

/// With-defaults marker attribute name.
pub const ATTR_DEFAULT: &str = "default";

/// Origin of configuration data.
pub const CONFIG_ORIGIN: &str = "intended";

/// Fallback origin of operational data.
pub const OPER_ORIGIN: &str = "unknown";

/// Prefixes used when writing the well-known namespaces.
pub const KNOWN_PREFIXES: [(&str, &str); 5] = [
    (NETCONF_NS, "nc"),
    (YANG_NS, "yang"),
    (META_NS, "meta"),
    (ORIGIN_NS, "or"),
    (WITH_DEFAULTS_NS, "ncwd"),
];
