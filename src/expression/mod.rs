//! Index key paths.
//!
//! The engine's query planner and LINQ-style expression language are
//! out-of-scope external collaborators (see the crate-level design notes);
//! this module only implements the one thing the engine actually asks of
//! it — parsing a root-relative field path such as `$.name` or
//! `$.address.city` out of an index definition, and reading the
//! corresponding value back out of a document when maintaining that index.

use crate::bson;
use crate::utils::Collation;
use std::fmt::{Display, Formatter};

/// The type represents expression parsing error
#[derive(Debug)]
pub struct ParseError(String);

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed `$.field.path` index key expression.
#[derive(Debug, Clone)]
pub struct BsonExpression {
    source: String,
    fields: Vec<String>,
}

impl BsonExpression {
    /// Parses a path expression of the form `$.field` or `$.a.b.c`.
    ///
    /// This is a path-only grammar: no operators, no function calls, no
    /// array indexing/wildcards. It covers every expression this engine
    /// ever constructs (index definitions and the implicit `$._id` index).
    pub fn create(expr: &str) -> Result<Self, ParseError> {
        let source = expr.trim();

        let Some(rest) = source.strip_prefix('$') else {
            return Err(ParseError(format!(
                "expected expression to start with '$': {source}"
            )));
        };
        let Some(path) = rest.strip_prefix('.') else {
            return Err(ParseError(format!(
                "expected '.' after '$' in expression: {source}"
            )));
        };

        let mut fields = Vec::new();
        for segment in path.split('.') {
            if !is_valid_field(segment) {
                return Err(ParseError(format!(
                    "invalid path segment `{segment}` in expression `{source}`"
                )));
            }
            fields.push(segment.to_string());
        }

        Ok(Self {
            source: source.to_string(),
            fields,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every expression this grammar accepts references at least one field
    /// and is a pure, deterministic read, so it is always indexable.
    pub(crate) fn is_indexable(&self) -> bool {
        true
    }

    /// A path expression never fans out into multiple values (there is no
    /// array wildcard in this grammar), so it is always scalar.
    pub(crate) fn is_scalar(&self) -> bool {
        true
    }
}

impl Display for BsonExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn is_valid_field(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

static NULL: bson::Value = bson::Value::Null;

/// Carries the collation an expression is evaluated under. Field-path
/// lookups don't compare strings, so the collation is currently unused by
/// `get_index_keys` itself, but it's kept on the type so callers (which do
/// compare the resulting keys against an index's collation) have a single
/// place to construct and thread it through, matching the shape the rest of
/// the engine expects from an execution scope.
pub(crate) struct ExecutionScope {
    #[allow(dead_code)]
    collation: Collation,
}

impl ExecutionScope {
    pub(crate) fn new(collation: Collation) -> Self {
        Self { collation }
    }

    /// Resolves `expression`'s field path against `root`, walking nested
    /// documents one segment at a time. A missing field (or a path that
    /// walks through a non-document value) resolves to `Null`, matching the
    /// behavior of the index service treating absent keys as ordinary
    /// (non-unique, sortable) `Null` entries.
    pub(crate) fn get_index_keys<'a>(
        &self,
        expression: &BsonExpression,
        root: &'a bson::Value,
    ) -> impl Iterator<Item = super::Result<&'a bson::Value>> + Clone + Sync + Send + use<'a> {
        let mut current = root;
        for field in &expression.fields {
            current = match current {
                bson::Value::Document(doc) => doc.get(field).unwrap_or(&NULL),
                _ => &NULL,
            };
        }
        std::iter::once(Ok(current))
    }
}
