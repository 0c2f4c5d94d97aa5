// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Typed parameter values and the coercion helpers shared by the SQL
//! lowerings.

use chrono::{DateTime, Utc};

use crate::error::SqlError;

/// A typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    StringArray(Vec<String>),
    Int64Array(Vec<i64>),
    Float64Array(Vec<f64>),
    BoolArray(Vec<bool>),
    TimestampArray(Vec<DateTime<Utc>>),
}

impl SqlValue {
    /// Name of the carried type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::String(_) => "STRING",
            SqlValue::Int64(_) => "INT64",
            SqlValue::Float64(_) => "FLOAT64",
            SqlValue::Bool(_) => "BOOL",
            SqlValue::Timestamp(_) => "TIMESTAMP",
            SqlValue::StringArray(_) => "ARRAY<STRING>",
            SqlValue::Int64Array(_) => "ARRAY<INT64>",
            SqlValue::Float64Array(_) => "ARRAY<FLOAT64>",
            SqlValue::BoolArray(_) => "ARRAY<BOOL>",
            SqlValue::TimestampArray(_) => "ARRAY<TIMESTAMP>",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            SqlValue::StringArray(_)
                | SqlValue::Int64Array(_)
                | SqlValue::Float64Array(_)
                | SqlValue::BoolArray(_)
                | SqlValue::TimestampArray(_)
        )
    }
}

/// Parses a base-10 signed 64-bit integer.
pub fn parse_int64(value: &str) -> Result<i64, SqlError> {
    value.parse::<i64>().map_err(|_| SqlError::ValueConvert {
        column_type: "INT64",
        value: value.to_string(),
    })
}

/// Parses a 64-bit float.
pub fn parse_float64(value: &str) -> Result<f64, SqlError> {
    value.parse::<f64>().map_err(|_| SqlError::ValueConvert {
        column_type: "FLOAT64",
        value: value.to_string(),
    })
}

/// Parses a boolean. Accepts exactly `1`, `t`, `T`, `TRUE`, `true`, `True`,
/// `0`, `f`, `F`, `FALSE`, `false` and `False`.
pub fn parse_bool(value: &str) -> Result<bool, SqlError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(SqlError::ValueConvert {
            column_type: "BOOL",
            value: value.to_string(),
        }),
    }
}

/// Parses an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SqlError::ValueConvert {
            column_type: "TIMESTAMP",
            value: value.to_string(),
        })
}

/// Coerces a value to an integer. Numeric values cross-coerce; strings
/// parse; anything else is the wrong family.
pub fn to_int64(value: &SqlValue) -> Result<i64, SqlError> {
    match value {
        SqlValue::Int64(v) => Ok(*v),
        SqlValue::Float64(v) => Ok(*v as i64),
        SqlValue::String(s) => parse_int64(s),
        other => Err(SqlError::UnexpectedValueType {
            expected: "INT64",
            actual: other.type_name(),
        }),
    }
}

/// Coerces a value to a float.
pub fn to_float64(value: &SqlValue) -> Result<f64, SqlError> {
    match value {
        SqlValue::Float64(v) => Ok(*v),
        SqlValue::Int64(v) => Ok(*v as f64),
        SqlValue::String(s) => parse_float64(s),
        other => Err(SqlError::UnexpectedValueType {
            expected: "FLOAT64",
            actual: other.type_name(),
        }),
    }
}

/// Coerces a value to a boolean. Numbers are deliberately not accepted.
pub fn to_bool(value: &SqlValue) -> Result<bool, SqlError> {
    match value {
        SqlValue::Bool(v) => Ok(*v),
        SqlValue::String(s) => parse_bool(s),
        other => Err(SqlError::UnexpectedValueType {
            expected: "BOOL",
            actual: other.type_name(),
        }),
    }
}

/// Coerces a value to a UTC timestamp.
pub fn to_timestamp(value: &SqlValue) -> Result<DateTime<Utc>, SqlError> {
    match value {
        SqlValue::Timestamp(v) => Ok(*v),
        SqlValue::String(s) => parse_timestamp(s),
        other => Err(SqlError::UnexpectedValueType {
            expected: "TIMESTAMP",
            actual: other.type_name(),
        }),
    }
}

/// Coerces a scalar value to its string form.
pub fn to_string_value(value: &SqlValue) -> Result<String, SqlError> {
    match value {
        SqlValue::String(s) => Ok(s.clone()),
        SqlValue::Int64(v) => Ok(v.to_string()),
        SqlValue::Float64(v) => Ok(v.to_string()),
        SqlValue::Bool(v) => Ok(v.to_string()),
        SqlValue::Timestamp(v) => Ok(v.to_rfc3339()),
        other => Err(SqlError::UnexpectedValueType {
            expected: "STRING",
            actual: other.type_name(),
        }),
    }
}
