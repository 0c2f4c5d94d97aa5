// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Abstract syntax tree for parsed filter expressions.
//!
//! The node family is a closed sum type; the lowerings match exhaustively
//! over it. Trees are immutable once returned by the parser and may be read
//! from any number of threads without synchronization.

use serde::{Deserialize, Serialize};

/// Expression node in a parsed filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// A bare or quoted value.
    Literal { value: String },
    /// Equality or membership: `field:value`, `field:(a or b)`, `field:{...}`.
    Is {
        identifier: String,
        value: Box<Node>,
    },
    /// A range comparison: `field >= value`.
    Range {
        identifier: String,
        operator: RangeOperator,
        value: Box<Node>,
    },
    /// Conjunction with unbounded arity, flattened at parse time.
    And { nodes: Vec<Node> },
    /// Disjunction with unbounded arity, flattened at parse time.
    Or { nodes: Vec<Node> },
    /// Negation of a single expression.
    Not { expr: Box<Node> },
    /// A nested-object value, only meaningful as an `Is` value.
    Nested { expr: Box<Node> },
    /// Array containment: `field<@(a and b)` or `field>@(a and b)`.
    Array {
        identifier: String,
        operator: ArrayOperator,
        nodes: Vec<Node>,
    },
}

impl Node {
    /// Variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Literal { .. } => "literal",
            Node::Is { .. } => "is",
            Node::Range { .. } => "range",
            Node::And { .. } => "and",
            Node::Or { .. } => "or",
            Node::Not { .. } => "not",
            Node::Nested { .. } => "nested",
            Node::Array { .. } => "array",
        }
    }
}

/// Range comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeOperator {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl RangeOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            RangeOperator::Lt => "<",
            RangeOperator::Lte => "<=",
            RangeOperator::Gt => ">",
            RangeOperator::Gte => ">=",
        }
    }
}

impl std::fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Array containment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayOperator {
    /// `<@`: the column array is contained by the provided values.
    ContainedBy,
    /// `>@`: the column array contains all provided values.
    Contains,
}

impl ArrayOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ArrayOperator::ContainedBy => "<@",
            ArrayOperator::Contains => ">@",
        }
    }
}

impl std::fmt::Display for ArrayOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
