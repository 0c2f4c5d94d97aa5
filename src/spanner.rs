// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Lowering a flat filter to a partial Spanner SQL statement.
//!
//! The output is a list of predicate fragments plus a map of typed
//! parameters; the caller joins the fragments with `AND` into an existing
//! `WHERE` clause. Placeholders are named `KQL0`, `KQL1`, ... in clause
//! order.

use std::collections::BTreeMap;

use crate::convert::SqlValue;
use crate::error::SqlError;
use crate::field::{check_required, dedup_array, like_pattern, resolve, ColumnType, FieldConfig};
use crate::filter::{Clause, ClauseOperator, Filter};

impl Filter {
    /// Turns the filter into a partial Spanner SQL statement.
    ///
    /// Takes a map of fields that are allowed to be queried via this filter
    /// (a user must not be able to query arbitrary columns). Returns
    /// predicate fragments that can be appended to an existing `WHERE`
    /// clause (AND these first), along with the associated parameters.
    ///
    /// A filter like
    /// `[(field: "userId", op: =, values: ["12345"])]` with a config
    /// `{"userId": (column_name: "user_id", column_type: Int64)}` lowers to
    /// `["user_id=@KQL0"]` and `{"KQL0": Int64(12345)}`.
    pub fn to_spanner_sql(
        &self,
        field_configs: &BTreeMap<String, FieldConfig>,
    ) -> Result<(Vec<String>, BTreeMap<String, SqlValue>), SqlError> {
        tracing::trace!(clauses = self.clauses.len(), "lowering filter to spanner sql");
        let mut conditions = Vec::with_capacity(self.clauses.len());
        let mut params = BTreeMap::new();
        let mut param_index = 0usize;

        for clause in &self.clauses {
            let Some(config) = resolve(field_configs, &clause.field) else {
                if let Some(value) = boolean_sentinel(clause) {
                    let name = format!("KQL{param_index}");
                    conditions.push(format!("1=@{name}"));
                    params.insert(name, SqlValue::Int64(value));
                    param_index += 1;
                    continue;
                }
                return Err(SqlError::UnknownField {
                    field: clause.field.clone(),
                });
            };
            if config.ignore {
                continue;
            }

            let column = config.column_or(&clause.field);
            let mapped = config.map_values(&clause.field, &clause.values)?;
            let name = format!("KQL{param_index}");

            if clause.values.len() > 1
                && !matches!(
                    clause.operator,
                    ClauseOperator::In | ClauseOperator::ContainedBy | ClauseOperator::Contains
                )
            {
                return Err(SqlError::MultipleValuesNotAllowed {
                    field: clause.field.clone(),
                });
            }

            let (condition, value) = match clause.operator {
                ClauseOperator::Eq | ClauseOperator::Neq => {
                    build_equality(clause, config, column, &name, mapped)?
                }
                ClauseOperator::Lt
                | ClauseOperator::Lte
                | ClauseOperator::Gt
                | ClauseOperator::Gte => {
                    if !config.allow_ranges {
                        return Err(SqlError::OperatorNotAllowedForField {
                            operator: clause.operator.as_str().to_string(),
                            field: clause.field.clone(),
                        });
                    }
                    check_comparable_type(clause.operator, config.column_type)?;
                    (
                        format!("{column}{}@{name}", clause.operator.as_str()),
                        mapped,
                    )
                }
                ClauseOperator::In => {
                    check_comparable_type(clause.operator, config.column_type)?;
                    let array = dedup_array(into_array(config, mapped)?);
                    (format!("{column} IN UNNEST(@{name})"), array)
                }
                ClauseOperator::ContainedBy => {
                    if !config.allow_contained_by {
                        return Err(SqlError::OperatorNotAllowedForField {
                            operator: clause.operator.as_str().to_string(),
                            field: clause.field.clone(),
                        });
                    }
                    check_comparable_type(clause.operator, config.column_type)?;
                    let array = dedup_array(into_array(config, mapped)?);
                    (
                        format!(
                            "ARRAY_LENGTH({column}) = ARRAY_LENGTH(ARRAY(SELECT x FROM UNNEST({column}) AS x WHERE x IN UNNEST(@{name})))"
                        ),
                        array,
                    )
                }
                ClauseOperator::Contains => {
                    if !config.allow_contains {
                        return Err(SqlError::OperatorNotAllowedForField {
                            operator: clause.operator.as_str().to_string(),
                            field: clause.field.clone(),
                        });
                    }
                    check_comparable_type(clause.operator, config.column_type)?;
                    let array = dedup_array(into_array(config, mapped)?);
                    (
                        format!(
                            "ARRAY_LENGTH(ARRAY(SELECT x FROM UNNEST(@{name}) AS x WHERE x IN UNNEST({column}))) = ARRAY_LENGTH(@{name})"
                        ),
                        array,
                    )
                }
            };

            conditions.push(condition);
            params.insert(name, value);
            param_index += 1;
        }

        check_required(field_configs, self)?;

        Ok((conditions, params))
    }
}

/// Recognizes the sentinel clause emitted for bare boolean literals:
/// field `"1"`, operator `=`, value `"0"` or `"1"`.
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

/// Equality and negation, including the wildcard rewrite to `LIKE`.
fn build_equality(
    clause: &Clause,
    config: &FieldConfig,
    column: &str,
    name: &str,
    mapped: SqlValue,
) -> Result<(String, SqlValue), SqlError> {
    let negated = clause.operator == ClauseOperator::Neq;
    if negated && !config.allow_negation {
        return Err(SqlError::OperatorNotAllowedForField {
            operator: "!=".to_string(),
            field: clause.field.clone(),
        });
    }

    if let SqlValue::String(s) = &mapped {
        if let Some(pattern) = like_pattern(config, s) {
            let operator = if negated { " NOT LIKE " } else { " LIKE " };
            let condition = if config.allow_case_insensitive {
                format!("LOWER({column}){operator}LOWER(@{name})")
            } else {
                format!("{column}{operator}@{name}")
            };
            return Ok((condition, SqlValue::String(pattern)));
        }
    }

    let operator = if negated { "!=" } else { "=" };
    Ok((format!("{column}{operator}@{name}"), mapped))
}

/// List operators work on everything but boolean columns.
fn check_comparable_type(operator: ClauseOperator, column_type: ColumnType) -> Result<(), SqlError> {
    let allowed = match operator {
        ClauseOperator::In | ClauseOperator::ContainedBy | ClauseOperator::Contains => {
            !matches!(column_type, ColumnType::Bool)
        }
        ClauseOperator::Lt | ClauseOperator::Lte | ClauseOperator::Gt | ClauseOperator::Gte => {
            matches!(
                column_type,
                ColumnType::Int64 | ColumnType::Float64 | ColumnType::Timestamp
            )
        }
        _ => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(SqlError::OperatorNotAllowedForType {
            operator: operator.as_str().to_string(),
            column_type: column_type.as_str(),
        })
    }
}

/// Promotes a scalar to a one-element array of the column type.
fn into_array(config: &FieldConfig, value: SqlValue) -> Result<SqlValue, SqlError> {
    if value.is_array() {
        return Ok(value);
    }
    config.typed_array(vec![value])
}
