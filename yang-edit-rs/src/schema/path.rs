//! Path and key-predicate text.
//!
//! Paths look like `/ex:cont/item[a='1'][b='x']/tags[.='blue']`. The first
//! segment names its module; later segments inherit the module of their
//! parent unless they carry their own prefix. The same predicate syntax is
//! used for list anchors stored in `key` / `orig-key` attributes.

use super::{NodeKind, Schema, SchemaId};
use crate::error::{Error, Result};
use crate::node::namespace::split_qname;

/// One `name[pred]...` step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub prefix: Option<String>,
    pub name: String,
    pub predicates: Vec<Predicate>,
}

/// A `[name='value']` predicate; `name` is `.` for a leaf-list value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub name: String,
    pub value: String,
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Scanner { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(&format!("expected '{}', found '{}'", want, c))),
            None => Err(self.error(&format!("expected '{}', found end of input", want))),
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn error(&self, what: &str) -> Error {
        Error::Parse(format!("{} at offset {} in \"{}\"", what, self.pos, self.text))
    }

    fn predicate(&mut self) -> Result<Predicate> {
        self.expect('[')?;
        self.skip_ws();
        let qname = self.take_while(|c| !c.is_whitespace() && c != '=' && c != ']');
        if qname.is_empty() {
            return Err(self.error("empty predicate name"));
        }
        let (_, name) = split_qname(qname);
        self.skip_ws();
        self.expect('=')?;
        self.skip_ws();
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected quoted predicate value")),
        };
        let value = self.take_while(|c| c != quote);
        self.expect(quote)?;
        self.skip_ws();
        self.expect(']')?;
        Ok(Predicate {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>> {
        let mut preds = Vec::new();
        while self.peek() == Some('[') {
            preds.push(self.predicate()?);
        }
        Ok(preds)
    }
}

/// Parses a sequence of `[name='value']` predicates.
pub fn parse_predicates(text: &str) -> Result<Vec<Predicate>> {
    let mut scanner = Scanner::new(text.trim());
    let preds = scanner.predicates()?;
    if scanner.peek().is_some() {
        return Err(scanner.error("unexpected trailing text"));
    }
    Ok(preds)
}

/// Parses an absolute path into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut scanner = Scanner::new(path.trim());
    let mut segments = Vec::new();
    while scanner.peek().is_some() {
        scanner.expect('/')?;
        let qname = scanner.take_while(|c| c != '/' && c != '[');
        if qname.is_empty() {
            return Err(scanner.error("empty path segment"));
        }
        let (prefix, name) = split_qname(qname);
        segments.push(PathSegment {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
            predicates: scanner.predicates()?,
        });
    }
    if segments.is_empty() {
        return Err(Error::Parse(format!("empty path \"{}\"", path)));
    }
    Ok(segments)
}

/// Formats one `[name='value']` predicate, switching quotes if needed.
pub fn format_predicate(name: &str, value: &str) -> String {
    if value.contains('\'') {
        format!("[{}=\"{}\"]", name, value)
    } else {
        format!("[{}='{}']", name, value)
    }
}

/// Resolves the schema nodes of a parsed path.
pub fn resolve_path(schema: &Schema, segments: &[PathSegment]) -> Result<Vec<SchemaId>> {
    let mut ids: Vec<SchemaId> = Vec::with_capacity(segments.len());
    for seg in segments {
        let parent = ids.last().copied();
        let namespace = match (&seg.prefix, parent) {
            (Some(prefix), _) => schema
                .module_by_name(prefix)
                .map(|m| m.namespace.clone())
                .ok_or_else(|| Error::ValidationFailed(format!("Unknown module \"{}\".", prefix)))?,
            (None, Some(p)) => schema.namespace(p).clone(),
            (None, None) => {
                return Err(Error::ValidationFailed(format!(
                    "Top-level node \"{}\" needs a module prefix.",
                    seg.name
                )))
            }
        };
        let id = schema.find_child(parent, &namespace, &seg.name).ok_or_else(|| {
            Error::ValidationFailed(format!("Schema node \"{}\" not found.", seg.name))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

/// Key values of a list segment, in schema key order and canonical form.
pub fn list_key_values(
    schema: &Schema,
    list: SchemaId,
    predicates: &[Predicate],
) -> Result<Vec<String>> {
    let node = schema.node(list);
    node.keys()
        .iter()
        .map(|&key| {
            let pred = predicates
                .iter()
                .find(|p| p.name == schema.name(key))
                .ok_or_else(|| {
                    Error::ValidationFailed(format!(
                        "List node \"{}\" is missing some keys.",
                        node.name()
                    ))
                })?;
            schema.canonical_value(key, &pred.value)
        })
        .collect()
}

/// Value of a leaf-list segment given as `[.='value']`.
pub fn leaf_list_value(predicates: &[Predicate]) -> Option<&str> {
    predicates
        .iter()
        .find(|p| p.name == ".")
        .map(|p| p.value.as_str())
}

/// Checks that predicates are only used where they mean something.
pub(crate) fn check_predicates(schema: &Schema, id: SchemaId, seg: &PathSegment) -> Result<()> {
    let allowed = matches!(schema.kind(id), NodeKind::List | NodeKind::LeafList);
    if !allowed && !seg.predicates.is_empty() {
        return Err(Error::ValidationFailed(format!(
            "Predicates are not allowed on {} \"{}\".",
            schema.kind(id).name(),
            seg.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        let segs = parse_path("/ex:cont/item[a='1'][ b = \"x]y\" ]/tags[.='blue']").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].prefix.as_deref(), Some("ex"));
        assert_eq!(segs[0].name, "cont");
        assert_eq!(segs[1].predicates.len(), 2);
        assert_eq!(segs[1].predicates[1].value, "x]y");
        assert_eq!(leaf_list_value(&segs[2].predicates), Some("blue"));
    }

    #[test]
    fn test_parse_predicates_with_prefix() {
        let preds = parse_predicates("[ex:k='v'][k2='w']").unwrap();
        assert_eq!(preds[0].name, "k");
        assert_eq!(preds[1].value, "w");
        assert!(parse_predicates("[k='v'").is_err());
        assert!(parse_predicates("[k=v]").is_err());
    }

    #[test]
    fn test_parse_path_errors() {
        assert!(parse_path("").is_err());
        assert!(parse_path("cont").is_err());
        assert!(parse_path("/ex:cont//x").is_err());
    }

    #[test]
    fn test_format_predicate() {
        assert_eq!(format_predicate("k", "v"), "[k='v']");
        assert_eq!(format_predicate("k", "it's"), "[k=\"it's\"]");
    }
}
