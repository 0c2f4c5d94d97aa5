// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Flat conjunctive filters projected from an AST.
//!
//! A [`Filter`] is the depth-limited projection used by the SQL lowerings:
//! an ordered list of `(field, operator, values)` clauses that are AND'ed
//! together by the consumer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ast::{ArrayOperator, Node, RangeOperator};
use crate::error::{ConvertError, Error};
use crate::parser::{parse_ast_with, ParseOptions};

/// A flat, conjunctive filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

/// A single filter clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub field: String,
    pub operator: ClauseOperator,
    /// For `IN`, `<@` and `>@` the list of values to match against; for all
    /// other operators a list of exactly one value.
    pub values: Vec<String>,
}

/// Operators a flat clause can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClauseOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "<@")]
    ContainedBy,
    #[serde(rename = ">@")]
    Contains,
}

impl ClauseOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ClauseOperator::Eq => "=",
            ClauseOperator::Neq => "!=",
            ClauseOperator::Lt => "<",
            ClauseOperator::Lte => "<=",
            ClauseOperator::Gt => ">",
            ClauseOperator::Gte => ">=",
            ClauseOperator::In => "IN",
            ClauseOperator::ContainedBy => "<@",
            ClauseOperator::Contains => ">@",
        }
    }
}

impl std::fmt::Display for ClauseOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RangeOperator> for ClauseOperator {
    fn from(op: RangeOperator) -> Self {
        match op {
            RangeOperator::Lt => ClauseOperator::Lt,
            RangeOperator::Lte => ClauseOperator::Lte,
            RangeOperator::Gt => ClauseOperator::Gt,
            RangeOperator::Gte => ClauseOperator::Gte,
        }
    }
}

impl From<ArrayOperator> for ClauseOperator {
    fn from(op: ArrayOperator) -> Self {
        match op {
            ArrayOperator::ContainedBy => ClauseOperator::ContainedBy,
            ArrayOperator::Contains => ClauseOperator::Contains,
        }
    }
}

impl Filter {
    /// Parses a filter string into a flat `Filter`.
    ///
    /// The input must contain only simple clauses of the form `field:value`
    /// (plus ranges, negations and value lists), all AND'ed together; no
    /// boolean `or`, grouping or nested queries. Whitespace-only input
    /// yields an empty filter. Use [`parse_ast`](crate::parse_ast) for the
    /// full language.
    pub fn parse(input: &str) -> Result<Filter, Error> {
        if input.trim().is_empty() {
            return Ok(Filter::default());
        }
        let ast = parse_ast_with(input, ParseOptions::default().max_depth(2))?;
        Ok(Filter::from_ast(&ast)?)
    }

    /// Projects an AST onto a flat filter.
    ///
    /// The tree must be a single simple clause or a top-level conjunction of
    /// simple clauses; anything else is rejected.
    pub fn from_ast(ast: &Node) -> Result<Filter, ConvertError> {
        let clauses = match ast {
            Node::And { nodes } => convert_and(nodes)?,
            Node::Is { identifier, value } => vec![convert_is(identifier, value)?],
            Node::Range {
                identifier,
                operator,
                value,
            } => vec![convert_range(identifier, *operator, value)?],
            Node::Not { expr } => vec![convert_not(expr)?],
            Node::Literal { value } => vec![convert_literal(value)?],
            Node::Array {
                identifier,
                operator,
                nodes,
            } => vec![convert_array(identifier, *operator, nodes)?],
            other => {
                return Err(ConvertError::UnsupportedNode {
                    kind: other.kind(),
                })
            }
        };
        Ok(Filter { clauses })
    }
}

fn convert_and(nodes: &[Node]) -> Result<Vec<Clause>, ConvertError> {
    let mut clauses = Vec::with_capacity(nodes.len());
    for node in nodes {
        let clause = match node {
            Node::Is { identifier, value } => convert_is(identifier, value)?,
            Node::Not { expr } => convert_not(expr)?,
            Node::Range {
                identifier,
                operator,
                value,
            } => convert_range(identifier, *operator, value)?,
            Node::Literal { value } => convert_literal(value)?,
            Node::Array {
                identifier,
                operator,
                nodes,
            } => convert_array(identifier, *operator, nodes)?,
            other => {
                return Err(ConvertError::UnsupportedNode {
                    kind: other.kind(),
                })
            }
        };
        clauses.push(clause);
    }
    // Up to two clauses per field, supporting a lower plus upper bound on
    // the same column.
    let mut field_counts: HashMap<&str, usize> = HashMap::new();
    for clause in &clauses {
        let count = field_counts.entry(clause.field.as_str()).or_insert(0);
        *count += 1;
        if *count > 2 {
            return Err(ConvertError::FieldCountExceeded {
                field: clause.field.clone(),
            });
        }
    }
    Ok(clauses)
}

fn convert_is(identifier: &str, value: &Node) -> Result<Clause, ConvertError> {
    let (operator, values) = match value {
        Node::Literal { value } => (ClauseOperator::Eq, vec![value.clone()]),
        Node::Or { nodes } => {
            let mut values = Vec::with_capacity(nodes.len());
            for node in nodes {
                let Node::Literal { value } = node else {
                    return Err(ConvertError::UnsupportedNode { kind: node.kind() });
                };
                values.push(value.clone());
            }
            (ClauseOperator::In, values)
        }
        other => {
            return Err(ConvertError::UnsupportedNode {
                kind: other.kind(),
            })
        }
    };
    Ok(Clause {
        field: identifier.to_string(),
        operator,
        values,
    })
}

fn convert_not(expr: &Node) -> Result<Clause, ConvertError> {
    let Node::Is { identifier, value } = expr else {
        return Err(ConvertError::UnsupportedNode { kind: expr.kind() });
    };
    let mut clause = convert_is(identifier, value)?;
    if clause.operator != ClauseOperator::Eq {
        return Err(ConvertError::NegationNotAllowed {
            operator: clause.operator.as_str().to_string(),
        });
    }
    clause.operator = ClauseOperator::Neq;
    Ok(clause)
}

fn convert_range(
    identifier: &str,
    operator: RangeOperator,
    value: &Node,
) -> Result<Clause, ConvertError> {
    let Node::Literal { value } = value else {
        return Err(ConvertError::UnsupportedNode { kind: value.kind() });
    };
    Ok(Clause {
        field: identifier.to_string(),
        operator: operator.into(),
        values: vec![value.clone()],
    })
}

fn convert_array(
    identifier: &str,
    operator: ArrayOperator,
    nodes: &[Node],
) -> Result<Clause, ConvertError> {
    let mut values = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Literal { value } = node else {
            return Err(ConvertError::UnsupportedNode { kind: node.kind() });
        };
        values.push(value.clone());
    }
    Ok(Clause {
        field: identifier.to_string(),
        operator: operator.into(),
        values,
    })
}

fn convert_literal(value: &str) -> Result<Clause, ConvertError> {
    // Bare boolean literals lower to a sentinel clause on the constant
    // column "1"; the SQL lowerings recognize exactly this shape.
    let sentinel = match value {
        "true" => "1",
        "false" => "0",
        other => {
            return Err(ConvertError::UnsupportedLiteral {
                value: other.to_string(),
            })
        }
    };
    Ok(Clause {
        field: "1".to_string(),
        operator: ClauseOperator::Eq,
        values: vec![sentinel.to_string()],
    })
}
