// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Per-field configuration consumed by the SQL lowerings.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::{Postgres, QueryBuilder};

use crate::convert::{
    parse_bool, parse_float64, parse_int64, parse_timestamp, to_bool, to_float64, to_int64,
    to_string_value, to_timestamp, SqlValue,
};
use crate::error::{BoxError, SqlError};
use crate::filter::{Clause, ClauseOperator, Filter};

/// SQL column type of a filterable field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnType {
    #[default]
    String,
    Int64,
    Float64,
    Bool,
    Timestamp,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
            ColumnType::Int64 => "INT64",
            ColumnType::Float64 => "FLOAT64",
            ColumnType::Bool => "BOOL",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook converting one raw input value into a typed value.
pub type MapValueFn = Arc<dyn Fn(&str) -> Result<SqlValue, BoxError> + Send + Sync>;

/// Hook replacing the default clause construction in the statement-builder
/// lowering. Receives the builder (positioned after the `WHERE`/`AND`
/// separator), the clause operator and the raw values, and writes its own
/// conditions.
pub type CustomBuilderFn = Arc<
    dyn for<'args> Fn(
            &mut QueryBuilder<'args, Postgres>,
            ClauseOperator,
            &[String],
        ) -> Result<(), BoxError>
        + Send
        + Sync,
>;

/// Configuration of one field that may be queried through a filter.
///
/// The map key under which a config is registered is the field name users
/// write in filter expressions; `aliases` admits alternate spellings.
#[derive(Clone, Default)]
pub struct FieldConfig {
    /// SQL column name. Can be omitted if equal to the key in the config map.
    pub column_name: String,
    /// SQL column type. Defaults to `STRING`.
    pub column_type: ColumnType,
    /// If true, the filter must contain this field. Does not apply to empty
    /// filters.
    pub required: bool,
    /// Other fields that must be present in the filter for this field to be
    /// allowed. Typically used to force a query to follow the structure of
    /// an index.
    pub requires: Vec<String>,
    /// Alternate field names accepted from input, e.g. to allow both
    /// `type_id` and `typeId`.
    pub aliases: Vec<String>,
    /// Allow prefix matching when a wildcard (`*`) ends a string value.
    pub allow_prefix_match: bool,
    /// Allow suffix matching when a wildcard (`*`) starts a string value.
    pub allow_suffix_match: bool,
    /// Force `LOWER()` on both sides of a `LIKE` comparison.
    pub allow_case_insensitive: bool,
    /// Allow multiple values (`IN`) for this field.
    pub allow_multiple_values: bool,
    /// Allow the range operators `<`, `<=`, `>`, `>=`.
    pub allow_ranges: bool,
    /// Allow the array containment operator `>@`.
    pub allow_contains: bool,
    /// Allow the array containment operator `<@`.
    pub allow_contained_by: bool,
    /// Allow `!=` via `not field:value`.
    pub allow_negation: bool,
    /// Silently drop clauses on this field.
    pub ignore: bool,
    /// Converts a raw user value into the value as stored in the database.
    /// The default uses the value as-is, coerced per `column_type`.
    pub map_value: Option<MapValueFn>,
    /// Total override of clause construction in the statement-builder
    /// lowering; the default path is skipped when present.
    pub custom_builder: Option<CustomBuilderFn>,
}

impl FieldConfig {
    /// Column name, falling back to the name the clause used.
    pub(crate) fn column_or<'a>(&'a self, field: &'a str) -> &'a str {
        if self.column_name.is_empty() {
            field
        } else {
            &self.column_name
        }
    }

    /// Runs the `map_value` hook (or passes raw strings through), collapses
    /// a single-element list to a scalar, and applies column-type coercion.
    pub(crate) fn map_values(&self, field: &str, values: &[String]) -> Result<SqlValue, SqlError> {
        let mut mapped: Vec<SqlValue> = match &self.map_value {
            Some(hook) => values
                .iter()
                .map(|v| {
                    hook(v).map_err(|source| SqlError::MapValue {
                        field: field.to_string(),
                        source,
                    })
                })
                .collect::<Result<_, _>>()?,
            None => values
                .iter()
                .map(|v| SqlValue::String(v.clone()))
                .collect(),
        };

        if mapped.len() == 1 {
            // Mapped strings still undergo column-type coercion; other
            // mapped values are already typed.
            return match mapped.swap_remove(0) {
                SqlValue::String(s) => self.convert_value(&s),
                other => Ok(other),
            };
        }

        if !self.allow_multiple_values {
            return Err(SqlError::MultipleValuesNotAllowed {
                field: field.to_string(),
            });
        }
        self.typed_array(mapped)
    }

    /// Coerces a raw string per the configured column type.
    pub(crate) fn convert_value(&self, value: &str) -> Result<SqlValue, SqlError> {
        match self.column_type {
            ColumnType::String => Ok(SqlValue::String(value.to_string())),
            ColumnType::Int64 => parse_int64(value).map(SqlValue::Int64),
            ColumnType::Float64 => parse_float64(value).map(SqlValue::Float64),
            ColumnType::Bool => parse_bool(value).map(SqlValue::Bool),
            ColumnType::Timestamp => parse_timestamp(value).map(SqlValue::Timestamp),
        }
    }

    /// Builds the homogeneous array form of the configured column type.
    pub(crate) fn typed_array(&self, values: Vec<SqlValue>) -> Result<SqlValue, SqlError> {
        match self.column_type {
            ColumnType::String => values
                .iter()
                .map(to_string_value)
                .collect::<Result<_, _>>()
                .map(SqlValue::StringArray),
            ColumnType::Int64 => values
                .iter()
                .map(to_int64)
                .collect::<Result<_, _>>()
                .map(SqlValue::Int64Array),
            ColumnType::Float64 => values
                .iter()
                .map(to_float64)
                .collect::<Result<_, _>>()
                .map(SqlValue::Float64Array),
            ColumnType::Bool => values
                .iter()
                .map(to_bool)
                .collect::<Result<_, _>>()
                .map(SqlValue::BoolArray),
            ColumnType::Timestamp => values
                .iter()
                .map(to_timestamp)
                .collect::<Result<_, _>>()
                .map(SqlValue::TimestampArray),
        }
    }
}

/// Resolves a clause field against the config map, consulting aliases in
/// key order when there is no direct entry.
pub(crate) fn resolve<'a>(
    configs: &'a BTreeMap<String, FieldConfig>,
    field: &str,
) -> Option<&'a FieldConfig> {
    if let Some(config) = configs.get(field) {
        return Some(config);
    }
    configs
        .values()
        .find(|config| config.aliases.iter().any(|alias| alias == field))
}

/// Whether a clause addresses `field` directly or through one of the
/// config's aliases.
fn clause_matches(clause: &Clause, field: &str, config: &FieldConfig) -> bool {
    clause.field == field || config.aliases.iter().any(|alias| *alias == clause.field)
}

/// Post-checks shared by the SQL lowerings: `required` fields must be
/// present, and fields carrying `requires` must co-occur with their
/// companions.
pub(crate) fn check_required(
    configs: &BTreeMap<String, FieldConfig>,
    filter: &Filter,
) -> Result<(), SqlError> {
    for (field, config) in configs {
        if config.required
            && !filter
                .clauses
                .iter()
                .any(|clause| clause_matches(clause, field, config))
        {
            return Err(SqlError::RequiredFieldMissing {
                field: field.clone(),
            });
        }
    }
    for clause in &filter.clauses {
        let Some(config) = resolve(configs, &clause.field) else {
            continue;
        };
        for companion in &config.requires {
            let companion_config = configs.get(companion);
            let found = filter.clauses.iter().any(|candidate| {
                candidate.field == *companion
                    || companion_config
                        .is_some_and(|c| c.aliases.iter().any(|alias| alias == &candidate.field))
            });
            if !found {
                return Err(SqlError::RequiredCompanionMissing {
                    field: clause.field.clone(),
                    companion: companion.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Rewrites a value carrying terminal wildcards into a `LIKE` pattern.
///
/// A trailing `*` (not preceded by a backslash) needs `allow_prefix_match`;
/// a leading `*` needs `allow_suffix_match`. If any present wildcard lacks
/// its flag the clause falls back to plain equality, and wildcards in the
/// middle of a value are always literal. On the `LIKE` path, `\`, `_` and
/// `%` are escaped and the terminal `*`s become `%`.
pub(crate) fn like_pattern(config: &FieldConfig, value: &str) -> Option<String> {
    let trailing = value.ends_with('*') && !value.ends_with("\\*");
    let leading = value.starts_with('*');
    if !leading && !trailing {
        return None;
    }
    if (leading && !config.allow_suffix_match) || (trailing && !config.allow_prefix_match) {
        return None;
    }

    let mut inner = value;
    if leading {
        inner = &inner[1..];
    }
    if trailing && !inner.is_empty() {
        inner = &inner[..inner.len() - 1];
    }
    let escaped = inner
        .replace('\\', "\\\\")
        .replace('_', "\\_")
        .replace('%', "\\%");

    let mut pattern = String::with_capacity(escaped.len() + 2);
    if leading {
        pattern.push('%');
    }
    pattern.push_str(&escaped);
    if trailing {
        pattern.push('%');
    }
    Some(pattern)
}

/// Deduplicates while preserving first-occurrence order.
pub(crate) fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Applies first-occurrence deduplication to an array value.
pub(crate) fn dedup_array(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::StringArray(vs) => SqlValue::StringArray(dedup(vs)),
        SqlValue::Int64Array(vs) => SqlValue::Int64Array(dedup(vs)),
        SqlValue::Float64Array(vs) => SqlValue::Float64Array(dedup(vs)),
        SqlValue::BoolArray(vs) => SqlValue::BoolArray(dedup(vs)),
        SqlValue::TimestampArray(vs) => SqlValue::TimestampArray(dedup(vs)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_direct_and_alias() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "userId".to_string(),
            FieldConfig {
                aliases: vec!["user_id".to_string()],
                ..Default::default()
            },
        );
        assert!(resolve(&configs, "userId").is_some());
        assert!(resolve(&configs, "user_id").is_some());
        assert!(resolve(&configs, "password").is_none());
    }

    #[test]
    fn test_map_values_singleton_collapses() {
        let config = FieldConfig {
            column_type: ColumnType::Int64,
            ..Default::default()
        };
        assert_eq!(
            config
                .map_values("age", &["30".to_string()])
                .expect("should map"),
            SqlValue::Int64(30)
        );
    }

    #[test]
    fn test_map_values_multiple_needs_flag() {
        let config = FieldConfig::default();
        let err = config
            .map_values("day", &["a".to_string(), "b".to_string()])
            .expect_err("should fail");
        assert!(matches!(err, SqlError::MultipleValuesNotAllowed { .. }));
    }

    #[test]
    fn test_map_value_hook_string_result_is_coerced() {
        let config = FieldConfig {
            column_type: ColumnType::Int64,
            map_value: Some(Arc::new(|raw| {
                Ok(SqlValue::String(raw.trim_start_matches("id_").to_string()))
            })),
            ..Default::default()
        };
        assert_eq!(
            config
                .map_values("id", &["id_7".to_string()])
                .expect("should map"),
            SqlValue::Int64(7)
        );
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        assert_eq!(dedup(vec!["b", "a", "b", "c", "a"]), vec!["b", "a", "c"]);
    }
}
