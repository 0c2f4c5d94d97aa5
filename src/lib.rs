// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! KQL filter compilation: parsing and lowering.
//!
//! Parses filter expressions modeled on the Kibana Query Language into an
//! AST with bounded depth and complexity, and lowers the tree into
//! backend-specific query fragments.
//!
//! # Syntax
//!
//! ```text
//! name:Beau
//! userId:12345 email:john@example.*
//! type_id:team and (active:false or disabled:true)
//! favorite_day:(Monday OR Tuesday)
//! birthdate>"1993-11-26T07:00:00Z"
//! not name:"John Adams"
//! fields:{position:(goalkeeper OR defender)}
//! sports<@(soccer AND basketball)
//! ```
//!
//! # Operators
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | `:` | Equality or membership | `name:Beau` |
//! | `:(... OR ...)` | Value list | `day:(Monday OR Tuesday)` |
//! | `:{...}` | Nested object access | `fields:{active:true}` |
//! | `<`, `<=`, `>`, `>=` | Range | `age>=21` |
//! | `<@`, `>@` | Array containment | `sports<@(a AND b)` |
//! | `and`, `or`, `not` | Boolean connectives (case-insensitive) | `not a:1 or b:2` |
//!
//! Adjacent expressions combine with an implicit `and`.
//!
//! # Lowerings
//!
//! | Target | Entry point | Output |
//! |--------|-------------|--------|
//! | Flat filter | [`Filter::parse`] / [`Filter::from_ast`] | ordered `(field, operator, values)` clauses |
//! | Spanner SQL | [`Filter::to_spanner_sql`] | predicate fragments plus `@KQLn` parameters |
//! | sqlx statement | [`Filter::to_sqlx_sql`] | an extended [`sqlx::QueryBuilder`] |
//! | Boolean query | [`QueryGenerator::convert_ast`] | nested must/should/must_not document |
//! | Equality probe | [`has_must_equal`] | values a field must equal |
//!
//! Parsing and lowering are synchronous and allocate only their outputs; the
//! only resource knobs are [`ParseOptions::max_depth`] and
//! [`ParseOptions::max_complexity`].

pub mod ast;
pub mod convert;
pub mod elastic;
pub mod error;
pub mod field;
pub mod filter;
mod lexer;
pub mod must_equal;
pub mod parser;
mod query_builder;
mod spanner;

pub use ast::{ArrayOperator, Node, RangeOperator};
pub use convert::SqlValue;
pub use elastic::{Query, QueryError, QueryGenerator};
pub use error::{BoxError, ConvertError, Error, ParseError, SqlError};
pub use field::{ColumnType, FieldConfig};
pub use filter::{Clause, ClauseOperator, Filter};
pub use must_equal::has_must_equal;
pub use parser::{parse_ast, parse_ast_with, ParseOptions};
