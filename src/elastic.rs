// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Lowering an AST to an Elasticsearch-style boolean query document.
//!
//! [`QueryGenerator`] walks the full tree (not the flat filter) and emits a
//! nested must/should/must_not/term/terms/range structure. Two hooks
//! customize the walk: a field-name mapper that validates and canonicalizes
//! incoming names, and a field-value mapper that validates or transforms raw
//! values. Both receive fully-qualified (prefix-rewritten) field names.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::ast::{Node, RangeOperator};
use crate::error::BoxError;

/// A node of the emitted boolean-query document. Serializes to the
/// externally-tagged JSON shapes Elasticsearch expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    Bool(BoolQuery),
    Term(BTreeMap<String, TermQuery>),
    Terms(BTreeMap<String, Vec<String>>),
    Range(BTreeMap<String, RangeQuery>),
    MatchAll(MatchAllQuery),
    MatchNone(MatchNoneQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermQuery {
    pub value: String,
}

/// Range condition; numeric when the literal parses as a number, a date
/// range when it parses as an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RangeQuery {
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        gt: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lt: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<f64>,
    },
    Date {
        #[serde(skip_serializing_if = "Option::is_none")]
        gt: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gte: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lt: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lte: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAllQuery {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchNoneQuery {}

/// Error raised while lowering an AST to a boolean query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{field}: {source}")]
    FieldMapper {
        field: String,
        #[source]
        source: BoxError,
    },
    #[error("{field}: {source}")]
    ValueMapper {
        field: String,
        #[source]
        source: BoxError,
    },
    #[error("{field}: expected literal node")]
    ExpectedLiteral { field: String },
    #[error("{field}: invalid syntax")]
    InvalidListSyntax { field: String },
    #[error("{field}: expected number or date literal")]
    InvalidRangeValue { field: String },
    #[error("only boolean literals are supported; {value}")]
    UnsupportedLiteral { value: String },
    #[error("unexpected node type: {kind}")]
    UnsupportedNode { kind: &'static str },
}

/// Validates incoming field names and maps them to internally defined ones.
pub type FieldMapperFn = Arc<dyn Fn(&str) -> Result<String, BoxError> + Send + Sync>;

/// Validates or transforms raw values; receives the mapped field name.
pub type FieldValueMapperFn = Arc<dyn Fn(&str, &str) -> Result<String, BoxError> + Send + Sync>;

/// Converts parsed filter expressions into boolean-query documents.
pub struct QueryGenerator {
    map_field_name: FieldMapperFn,
    map_field_value: FieldValueMapperFn,
}

impl Default for QueryGenerator {
    fn default() -> Self {
        Self {
            map_field_name: Arc::new(|name| Ok(name.to_string())),
            map_field_value: Arc::new(|_, value| Ok(value.to_string())),
        }
    }
}

impl QueryGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field-name mapper. Use it to reject unknown names or rewrite
    /// external names to index-internal ones, e.g. `start_time` to `time`.
    pub fn with_field_mapper(
        mut self,
        mapper: impl Fn(&str) -> Result<String, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.map_field_name = Arc::new(mapper);
        self
    }

    /// Sets the field-value mapper. Use it to reject or rewrite raw values
    /// for particular fields.
    pub fn with_field_value_mapper(
        mut self,
        mapper: impl Fn(&str, &str) -> Result<String, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.map_field_value = Arc::new(mapper);
        self
    }

    /// Converts an AST to a boolean-query document. The tree is not
    /// modified; mapped values only appear in the output.
    pub fn convert_ast(&self, root: &Node) -> Result<Query, QueryError> {
        self.convert_node(root, "")
    }

    fn convert_node(&self, node: &Node, prefix: &str) -> Result<Query, QueryError> {
        match node {
            Node::And { nodes } => {
                let must = nodes
                    .iter()
                    .map(|n| self.convert_node(n, prefix))
                    .collect::<Result<_, _>>()?;
                Ok(Query::Bool(BoolQuery {
                    must,
                    ..Default::default()
                }))
            }
            Node::Or { nodes } => {
                let should = nodes
                    .iter()
                    .map(|n| self.convert_node(n, prefix))
                    .collect::<Result<_, _>>()?;
                Ok(Query::Bool(BoolQuery {
                    should,
                    ..Default::default()
                }))
            }
            Node::Not { expr } => Ok(Query::Bool(BoolQuery {
                must_not: vec![self.convert_node(expr, prefix)?],
                ..Default::default()
            })),
            Node::Is { identifier, value } => {
                let field = self.map_field(prefix, identifier)?;
                match value.as_ref() {
                    // x:{y:z} becomes x.y:z
                    Node::Nested { expr } => self.convert_node(expr, &format!("{field}.")),
                    Node::Or { nodes } => {
                        let mut values = Vec::with_capacity(nodes.len());
                        for child in nodes {
                            let Node::Literal { value } = child else {
                                return Err(QueryError::InvalidListSyntax { field });
                            };
                            values.push(self.map_value(&field, value)?);
                        }
                        Ok(Query::Terms(BTreeMap::from([(field, values)])))
                    }
                    Node::Literal { value } => {
                        let value = self.map_value(&field, value)?;
                        Ok(Query::Term(BTreeMap::from([(field, TermQuery { value })])))
                    }
                    _ => Err(QueryError::ExpectedLiteral { field }),
                }
            }
            Node::Range {
                identifier,
                operator,
                value,
            } => {
                let field = self.map_field(prefix, identifier)?;
                let Node::Literal { value } = value.as_ref() else {
                    return Err(QueryError::ExpectedLiteral { field });
                };
                let value = self.map_value(&field, value)?;
                let Some(range) = range_query(*operator, &value) else {
                    return Err(QueryError::InvalidRangeValue { field });
                };
                Ok(Query::Range(BTreeMap::from([(field, range)])))
            }
            Node::Literal { value } => match value.as_str() {
                "true" => Ok(Query::MatchAll(MatchAllQuery {})),
                "false" => Ok(Query::MatchNone(MatchNoneQuery {})),
                other => Err(QueryError::UnsupportedLiteral {
                    value: other.to_string(),
                }),
            },
            Node::Nested { .. } | Node::Array { .. } => Err(QueryError::UnsupportedNode {
                kind: node.kind(),
            }),
        }
    }

    fn map_field(&self, prefix: &str, identifier: &str) -> Result<String, QueryError> {
        let name = format!("{prefix}{identifier}");
        (self.map_field_name)(&name).map_err(|source| QueryError::FieldMapper {
            field: name.clone(),
            source,
        })
    }

    fn map_value(&self, field: &str, value: &str) -> Result<String, QueryError> {
        (self.map_field_value)(field, value).map_err(|source| QueryError::ValueMapper {
            field: field.to_string(),
            source,
        })
    }
}

fn range_query(operator: RangeOperator, value: &str) -> Option<RangeQuery> {
    if let Ok(number) = value.parse::<f64>() {
        let (gt, gte, lt, lte) = range_slots(operator, number);
        return Some(RangeQuery::Number { gt, gte, lt, lte });
    }
    if chrono::DateTime::parse_from_rfc3339(value).is_ok() {
        let (gt, gte, lt, lte) = range_slots(operator, value.to_string());
        return Some(RangeQuery::Date { gt, gte, lt, lte });
    }
    None
}

#[allow(clippy::type_complexity)]
fn range_slots<T>(
    operator: RangeOperator,
    value: T,
) -> (Option<T>, Option<T>, Option<T>, Option<T>) {
    match operator {
        RangeOperator::Gt => (Some(value), None, None, None),
        RangeOperator::Gte => (None, Some(value), None, None),
        RangeOperator::Lt => (None, None, Some(value), None),
        RangeOperator::Lte => (None, None, None, Some(value)),
    }
}
