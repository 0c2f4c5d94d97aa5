// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Lowering a flat filter through a host `sqlx` statement builder.
//!
//! Instead of emitting placeholder fragments, this lowering extends a
//! [`sqlx::QueryBuilder`] the caller hands in (typically holding a
//! `SELECT ... FROM ...` prefix), pushing `WHERE`/`AND` separators and
//! bound arguments. Field configs may carry a
//! [`custom_builder`](crate::FieldConfig::custom_builder) hook that takes
//! over clause construction entirely.

use std::collections::BTreeMap;

use sqlx::{Postgres, QueryBuilder};

use crate::convert::SqlValue;
use crate::error::SqlError;
use crate::field::{check_required, dedup_array, like_pattern, resolve, ColumnType, FieldConfig};
use crate::filter::{Clause, ClauseOperator, Filter};

impl Filter {
    /// Extends a `sqlx` statement with the filter's clauses.
    ///
    /// The builder must not yet contain a `WHERE` clause; this lowering
    /// writes `WHERE` before the first condition and `AND` before each
    /// subsequent one. Semantics (field resolution, coercion, operator
    /// gating, required/requires checks) match
    /// [`to_spanner_sql`](Filter::to_spanner_sql); array containment
    /// operators are not supported in this form.
    pub fn to_sqlx_sql<'args>(
        &self,
        mut builder: QueryBuilder<'args, Postgres>,
        field_configs: &BTreeMap<String, FieldConfig>,
    ) -> Result<QueryBuilder<'args, Postgres>, SqlError> {
        tracing::trace!(clauses = self.clauses.len(), "lowering filter to sqlx statement");
        let mut first = true;
        for (index, clause) in self.clauses.iter().enumerate() {
            push_clause(&mut builder, clause, field_configs, &mut first).map_err(|source| {
                SqlError::Clause {
                    index,
                    source: Box::new(source),
                }
            })?;
        }
        check_required(field_configs, self)?;
        Ok(builder)
    }
}

fn push_separator(builder: &mut QueryBuilder<'_, Postgres>, first: &mut bool) {
    if *first {
        builder.push(" WHERE ");
        *first = false;
    } else {
        builder.push(" AND ");
    }
}

fn push_clause(
    builder: &mut QueryBuilder<'_, Postgres>,
    clause: &Clause,
    configs: &BTreeMap<String, FieldConfig>,
    first: &mut bool,
) -> Result<(), SqlError> {
    let Some(config) = resolve(configs, &clause.field) else {
        if let Some(value) = boolean_sentinel(clause) {
            push_separator(builder, first);
            builder.push("1 = ");
            builder.push_bind(value);
            return Ok(());
        }
        return Err(SqlError::UnknownField {
            field: clause.field.clone(),
        });
    };
    if config.ignore {
        return Ok(());
    }

    if let Some(custom) = &config.custom_builder {
        push_separator(builder, first);
        return custom(builder, clause.operator, &clause.values).map_err(|source| {
            SqlError::CustomBuilder {
                field: clause.field.clone(),
                source,
            }
        });
    }

    let column = config.column_or(&clause.field).to_string();
    let mapped = config.map_values(&clause.field, &clause.values)?;

    if clause.values.len() > 1 && clause.operator != ClauseOperator::In {
        return Err(SqlError::MultipleValuesNotAllowed {
            field: clause.field.clone(),
        });
    }

    match clause.operator {
        ClauseOperator::Eq | ClauseOperator::Neq => {
            let negated = clause.operator == ClauseOperator::Neq;
            if negated && !config.allow_negation {
                return Err(SqlError::OperatorNotAllowedForField {
                    operator: "!=".to_string(),
                    field: clause.field.clone(),
                });
            }
            if let SqlValue::String(s) = &mapped {
                if let Some(pattern) = like_pattern(config, s) {
                    push_separator(builder, first);
                    let operator = if negated { " NOT LIKE " } else { " LIKE " };
                    if config.allow_case_insensitive {
                        builder.push("LOWER(");
                        builder.push(&column);
                        builder.push(")");
                        builder.push(operator);
                        builder.push("LOWER(");
                        builder.push_bind(pattern);
                        builder.push(")");
                    } else {
                        builder.push(&column);
                        builder.push(operator);
                        builder.push_bind(pattern);
                    }
                    return Ok(());
                }
            }
            push_separator(builder, first);
            builder.push(&column);
            builder.push(if negated { " != " } else { " = " });
            push_bind_scalar(builder, mapped)?;
        }
        ClauseOperator::Lt | ClauseOperator::Lte | ClauseOperator::Gt | ClauseOperator::Gte => {
            if !config.allow_ranges {
                return Err(SqlError::OperatorNotAllowedForField {
                    operator: clause.operator.as_str().to_string(),
                    field: clause.field.clone(),
                });
            }
            if !matches!(
                config.column_type,
                ColumnType::Int64 | ColumnType::Float64 | ColumnType::Timestamp
            ) {
                return Err(SqlError::OperatorNotAllowedForType {
                    operator: clause.operator.as_str().to_string(),
                    column_type: config.column_type.as_str(),
                });
            }
            push_separator(builder, first);
            builder.push(&column);
            builder.push(format!(" {} ", clause.operator.as_str()));
            push_bind_scalar(builder, mapped)?;
        }
        ClauseOperator::In => {
            if matches!(config.column_type, ColumnType::Bool) {
                return Err(SqlError::OperatorNotAllowedForType {
                    operator: "IN".to_string(),
                    column_type: "BOOL",
                });
            }
            let array = dedup_array(if mapped.is_array() {
                mapped
            } else {
                config.typed_array(vec![mapped])?
            });
            push_separator(builder, first);
            builder.push(&column);
            builder.push(" IN (");
            push_bind_list(builder, array)?;
            builder.push(")");
        }
        ClauseOperator::ContainedBy | ClauseOperator::Contains => {
            return Err(SqlError::OperatorNotAllowedForField {
                operator: clause.operator.as_str().to_string(),
                field: clause.field.clone(),
            });
        }
    }
    Ok(())
}

fn boolean_sentinel(clause: &Clause) -> Option<i64> {
    if clause.field != "1" || clause.operator != ClauseOperator::Eq {
        return None;
    }
    match clause.values.as_slice() {
        [v] if v == "1" => Some(1),
        [v] if v == "0" => Some(0),
        _ => None,
    }
}

fn push_bind_scalar(
    builder: &mut QueryBuilder<'_, Postgres>,
    value: SqlValue,
) -> Result<(), SqlError> {
    match value {
        SqlValue::String(v) => {
            builder.push_bind(v);
        }
        SqlValue::Int64(v) => {
            builder.push_bind(v);
        }
        SqlValue::Float64(v) => {
            builder.push_bind(v);
        }
        SqlValue::Bool(v) => {
            builder.push_bind(v);
        }
        SqlValue::Timestamp(v) => {
            builder.push_bind(v);
        }
        other => {
            return Err(SqlError::UnexpectedValueType {
                expected: "scalar",
                actual: other.type_name(),
            })
        }
    }
    Ok(())
}

fn push_bind_list(
    builder: &mut QueryBuilder<'_, Postgres>,
    value: SqlValue,
) -> Result<(), SqlError> {
    let mut separated = builder.separated(",");
    match value {
        SqlValue::StringArray(vs) => {
            for v in vs {
                separated.push_bind(v);
            }
        }
        SqlValue::Int64Array(vs) => {
            for v in vs {
                separated.push_bind(v);
            }
        }
        SqlValue::Float64Array(vs) => {
            for v in vs {
                separated.push_bind(v);
            }
        }
        SqlValue::TimestampArray(vs) => {
            for v in vs {
                separated.push_bind(v);
            }
        }
        other => {
            return Err(SqlError::UnexpectedValueType {
                expected: "array",
                actual: other.type_name(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn configs(entries: Vec<(&str, FieldConfig)>) -> BTreeMap<String, FieldConfig> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn lower(input: &str, configs: &BTreeMap<String, FieldConfig>) -> Result<String, SqlError> {
        let filter = Filter::parse(input).expect("should parse");
        let builder = QueryBuilder::new("SELECT * FROM users");
        let builder = filter.to_sqlx_sql(builder, configs)?;
        Ok(builder.into_sql())
    }

    #[test]
    fn test_one_string_field() {
        let configs = configs(vec![(
            "name",
            FieldConfig {
                column_name: "name".to_string(),
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower("name:Beau", &configs).expect("should lower"),
            "SELECT * FROM users WHERE name = $1"
        );
    }

    #[test]
    fn test_scalar_column_types() {
        let configs = configs(vec![
            (
                "age",
                FieldConfig {
                    column_name: "age".to_string(),
                    column_type: ColumnType::Int64,
                    ..Default::default()
                },
            ),
            (
                "weight",
                FieldConfig {
                    column_name: "weight".to_string(),
                    column_type: ColumnType::Float64,
                    ..Default::default()
                },
            ),
            (
                "local",
                FieldConfig {
                    column_name: "local".to_string(),
                    column_type: ColumnType::Bool,
                    ..Default::default()
                },
            ),
        ]);
        assert_eq!(
            lower("age:30", &configs).expect("should lower"),
            "SELECT * FROM users WHERE age = $1"
        );
        assert_eq!(
            lower("weight:70.7 local:false", &configs).expect("should lower"),
            "SELECT * FROM users WHERE weight = $1 AND local = $2"
        );
    }

    #[test]
    fn test_timestamp_range() {
        let configs = configs(vec![(
            "birthdate",
            FieldConfig {
                column_name: "birthdate".to_string(),
                column_type: ColumnType::Timestamp,
                allow_ranges: true,
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower("birthdate>\"1993-11-26T07:00:00Z\"", &configs).expect("should lower"),
            "SELECT * FROM users WHERE birthdate > $1"
        );
    }

    #[test]
    fn test_range_disallowed_wraps_clause_index() {
        let configs = configs(vec![
            (
                "userId",
                FieldConfig {
                    column_name: "userId".to_string(),
                    column_type: ColumnType::Int64,
                    ..Default::default()
                },
            ),
            (
                "birthdate",
                FieldConfig {
                    column_name: "birthdate".to_string(),
                    column_type: ColumnType::Timestamp,
                    allow_ranges: true,
                    ..Default::default()
                },
            ),
        ]);
        let err = lower(
            "userId>12345 and birthdate>\"1993-11-26T07:00:00Z\"",
            &configs,
        )
        .expect_err("should fail");
        let SqlError::Clause { index, source } = err else {
            panic!("expected clause error, got {err}");
        };
        assert_eq!(index, 0);
        assert!(matches!(
            *source,
            SqlError::OperatorNotAllowedForField { .. }
        ));
    }

    #[test]
    fn test_all_value_types_together() {
        let configs = configs(vec![
            (
                "name",
                FieldConfig {
                    column_name: "name".to_string(),
                    ..Default::default()
                },
            ),
            (
                "age",
                FieldConfig {
                    column_name: "age".to_string(),
                    column_type: ColumnType::Int64,
                    ..Default::default()
                },
            ),
            (
                "weight",
                FieldConfig {
                    column_name: "weight".to_string(),
                    column_type: ColumnType::Float64,
                    ..Default::default()
                },
            ),
            (
                "local",
                FieldConfig {
                    column_name: "local".to_string(),
                    column_type: ColumnType::Bool,
                    ..Default::default()
                },
            ),
            (
                "favorite_day",
                FieldConfig {
                    column_name: "favorite_day".to_string(),
                    allow_multiple_values: true,
                    ..Default::default()
                },
            ),
        ]);
        assert_eq!(
            lower(
                "name:Beau age:30 weight:70.7 local:false favorite_day: (Monday OR Tuesday)",
                &configs
            )
            .expect("should lower"),
            "SELECT * FROM users WHERE name = $1 AND age = $2 AND weight = $3 AND local = $4 AND favorite_day IN ($5,$6)"
        );
    }

    #[test]
    fn test_in_operator() {
        let configs = configs(vec![(
            "favorite_day",
            FieldConfig {
                column_name: "favorite_day".to_string(),
                allow_multiple_values: true,
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower("favorite_day: (Monday OR Tuesday)", &configs).expect("should lower"),
            "SELECT * FROM users WHERE favorite_day IN ($1,$2)"
        );
    }

    #[test]
    fn test_prefix_match() {
        let configs = configs(vec![(
            "self_intro",
            FieldConfig {
                column_name: "self_intro".to_string(),
                allow_prefix_match: true,
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower(r#"self_intro:"Monday_%a\\_\\%\\**""#, &configs).expect("should lower"),
            "SELECT * FROM users WHERE self_intro LIKE $1"
        );
    }

    #[test]
    fn test_map_value_hook() {
        let configs = configs(vec![(
            "before",
            FieldConfig {
                column_name: "create_time".to_string(),
                column_type: ColumnType::Timestamp,
                allow_multiple_values: true,
                allow_ranges: true,
                map_value: Some(Arc::new(|raw| match raw {
                    "now" => Ok(SqlValue::Timestamp(crate::convert::parse_timestamp(
                        "2023-01-01T00:00:00Z",
                    )?)),
                    _ => Err("wrong value".into()),
                })),
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower("before< now", &configs).expect("should lower"),
            "SELECT * FROM users WHERE create_time < $1"
        );
    }

    #[test]
    fn test_unknown_field() {
        let configs = configs(vec![(
            "age",
            FieldConfig {
                column_name: "age".to_string(),
                column_type: ColumnType::Int64,
                ..Default::default()
            },
        )]);
        let err = lower("name:Beau age:30", &configs).expect_err("should fail");
        let SqlError::Clause { source, .. } = err else {
            panic!("expected clause error, got {err}");
        };
        assert!(matches!(*source, SqlError::UnknownField { .. }));
    }

    #[test]
    fn test_wrong_value_type() {
        let configs = configs(vec![(
            "age",
            FieldConfig {
                column_name: "age".to_string(),
                column_type: ColumnType::Int64,
                ..Default::default()
            },
        )]);
        let err = lower("age:Beau", &configs).expect_err("should fail");
        let SqlError::Clause { source, .. } = err else {
            panic!("expected clause error, got {err}");
        };
        assert!(matches!(*source, SqlError::ValueConvert { .. }));
    }

    #[test]
    fn test_multiple_values_disallowed() {
        let configs = configs(vec![(
            "age",
            FieldConfig {
                column_name: "age".to_string(),
                column_type: ColumnType::Int64,
                ..Default::default()
            },
        )]);
        let err = lower("age: (1 OR 2)", &configs).expect_err("should fail");
        let SqlError::Clause { source, .. } = err else {
            panic!("expected clause error, got {err}");
        };
        assert!(matches!(*source, SqlError::MultipleValuesNotAllowed { .. }));
    }

    #[test]
    fn test_custom_builder() {
        let configs = configs(vec![(
            "age",
            FieldConfig {
                column_name: "age".to_string(),
                custom_builder: Some(Arc::new(|builder, _operator, values| {
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            builder.push(" AND ");
                        }
                        let parsed: i64 = value.parse()?;
                        builder.push("age > ");
                        builder.push_bind(parsed);
                    }
                    Ok(())
                })),
                ..Default::default()
            },
        )]);
        assert_eq!(
            lower("age: (1 OR 2)", &configs).expect("should lower"),
            "SELECT * FROM users WHERE age > $1 AND age > $2"
        );
    }

    #[test]
    fn test_array_operators_unsupported() {
        let configs = configs(vec![(
            "sports",
            FieldConfig {
                allow_multiple_values: true,
                allow_contained_by: true,
                ..Default::default()
            },
        )]);
        let err = lower("sports<@(soccer AND basketball)", &configs).expect_err("should fail");
        let SqlError::Clause { source, .. } = err else {
            panic!("expected clause error, got {err}");
        };
        assert!(matches!(
            *source,
            SqlError::OperatorNotAllowedForField { .. }
        ));
    }

    #[test]
    fn test_boolean_sentinel() {
        assert_eq!(
            lower("false", &BTreeMap::new()).expect("should lower"),
            "SELECT * FROM users WHERE 1 = $1"
        );
    }
}
