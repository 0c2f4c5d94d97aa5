// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Error types for parsing, projecting and lowering filter expressions.

use thiserror::Error;

/// Boxed error type returned by user-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised while lexing or parsing a filter expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Malformed input the lexer could not tokenize, such as an
    /// unterminated quoted string.
    #[error("{message} at position {position}")]
    Lex { message: String, position: usize },
    /// Grammar violation at a specific input position.
    #[error("{message} at position {position}")]
    Syntax { message: String, position: usize },
    #[error("maximum expression depth of {max_depth} exceeded")]
    DepthExceeded { max_depth: usize },
    #[error("maximum expression complexity of {max_complexity} exceeded")]
    ComplexityExceeded { max_complexity: usize },
    #[error("complex expressions are not allowed")]
    ComplexExpressionsDisabled,
    #[error("empty query")]
    Empty,
}

/// Error raised while projecting an AST into a flat [`Filter`](crate::Filter).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("unsupported node type {kind}")]
    UnsupportedNode { kind: &'static str },
    #[error("only boolean literals are supported; {value}")]
    UnsupportedLiteral { value: String },
    #[error("field count maximum in filter exceeded for {field}")]
    FieldCountExceeded { field: String },
    #[error("cannot support negation on operator {operator}")]
    NegationNotAllowed { operator: String },
}

/// Error raised while lowering a [`Filter`](crate::Filter) to SQL.
#[derive(Error, Debug)]
pub enum SqlError {
    #[error("unknown field: {field}")]
    UnknownField { field: String },
    #[error("multiple values are not allowed for field {field}")]
    MultipleValuesNotAllowed { field: String },
    #[error("operator {operator} not supported for field: {field}")]
    OperatorNotAllowedForField { operator: String, field: String },
    #[error("operator {operator} not supported for field type {column_type}")]
    OperatorNotAllowedForType {
        operator: String,
        column_type: &'static str,
    },
    #[error("invalid {column_type} value: {value}")]
    ValueConvert {
        column_type: &'static str,
        value: String,
    },
    #[error("unexpected value type: want {expected}, got {actual}")]
    UnexpectedValueType {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("required field {field} missing")]
    RequiredFieldMissing { field: String },
    #[error("{field} can only be used in this filter in combination with {companion}")]
    RequiredCompanionMissing { field: String, companion: String },
    #[error("field {field}: {source}")]
    MapValue {
        field: String,
        #[source]
        source: BoxError,
    },
    #[error("custom builder failed for field {field}: {source}")]
    CustomBuilder {
        field: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to build clause {index}: {source}")]
    Clause {
        index: usize,
        #[source]
        source: Box<SqlError>,
    },
}

/// Error returned by [`Filter::parse`](crate::Filter::parse).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}
