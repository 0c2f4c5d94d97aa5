// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Filter Integration Tests
//!
//! End-to-end tests covering the parser, the flat-filter projection and the
//! lowerings to Spanner SQL, sqlx statements and boolean-query documents.

use std::collections::BTreeMap;

use kqlfilter::{
    has_must_equal, parse_ast, ColumnType, FieldConfig, Filter, QueryGenerator, SqlError,
    SqlValue,
};
use serde_json::json;

fn configs(entries: Vec<(&str, FieldConfig)>) -> BTreeMap<String, FieldConfig> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn spanner(
    input: &str,
    configs: &BTreeMap<String, FieldConfig>,
) -> (Vec<String>, BTreeMap<String, SqlValue>) {
    Filter::parse(input)
        .expect("should parse")
        .to_spanner_sql(configs)
        .expect("should lower")
}

// ============================================================================
// Parse → Spanner SQL
// ============================================================================

#[test]
fn test_string_equality() {
    let configs = configs(vec![("name", FieldConfig::default())]);
    let (conditions, params) = spanner("name:Beau", &configs);
    assert_eq!(conditions, vec!["name=@KQL0"]);
    assert_eq!(params["KQL0"], SqlValue::String("Beau".to_string()));
}

#[test]
fn test_integer_equality() {
    let configs = configs(vec![(
        "age",
        FieldConfig {
            column_type: ColumnType::Int64,
            ..Default::default()
        },
    )]);
    let (conditions, params) = spanner("age:30", &configs);
    assert_eq!(conditions, vec!["age=@KQL0"]);
    assert_eq!(params["KQL0"], SqlValue::Int64(30));
}

#[test]
fn test_timestamp_range() {
    let configs = configs(vec![(
        "birthdate",
        FieldConfig {
            column_type: ColumnType::Timestamp,
            allow_ranges: true,
            ..Default::default()
        },
    )]);
    let (conditions, params) = spanner("birthdate>\"1993-11-26T07:00:00Z\"", &configs);
    assert_eq!(conditions, vec!["birthdate>@KQL0"]);
    assert_eq!(
        params["KQL0"],
        SqlValue::Timestamp(
            kqlfilter::convert::parse_timestamp("1993-11-26T07:00:00Z").expect("valid date")
        )
    );
}

#[test]
fn test_prefix_match_escapes_specials() {
    let configs = configs(vec![(
        "self_intro",
        FieldConfig {
            allow_prefix_match: true,
            ..Default::default()
        },
    )]);
    let (conditions, params) = spanner(r#"self_intro:"Monday_%a\\_\\%\\**""#, &configs);
    assert_eq!(conditions, vec!["self_intro LIKE @KQL0"]);
    assert_eq!(
        params["KQL0"],
        SqlValue::String(r"Monday\_\%a\\\_\\\%\\*%".to_string())
    );
}

#[test]
fn test_value_list_lowers_to_in_unnest() {
    let configs = configs(vec![(
        "favorite_day",
        FieldConfig {
            allow_multiple_values: true,
            ..Default::default()
        },
    )]);
    let (conditions, params) = spanner("favorite_day:(Monday OR Tuesday)", &configs);
    assert_eq!(conditions, vec!["favorite_day IN UNNEST(@KQL0)"]);
    assert_eq!(
        params["KQL0"],
        SqlValue::StringArray(vec!["Monday".to_string(), "Tuesday".to_string()])
    );
}

#[test]
fn test_negated_equality() {
    let configs = configs(vec![(
        "name",
        FieldConfig {
            column_name: "Name".to_string(),
            allow_negation: true,
            ..Default::default()
        },
    )]);
    let (conditions, params) = spanner(r#"not name:"John Adams""#, &configs);
    assert_eq!(conditions, vec!["Name!=@KQL0"]);
    assert_eq!(params["KQL0"], SqlValue::String("John Adams".to_string()));
}

#[test]
fn test_range_not_allowed_names_field_and_operator() {
    let configs = configs(vec![
        (
            "userId",
            FieldConfig {
                column_type: ColumnType::Int64,
                ..Default::default()
            },
        ),
        (
            "birthdate",
            FieldConfig {
                column_type: ColumnType::Timestamp,
                allow_ranges: true,
                ..Default::default()
            },
        ),
    ]);
    let filter =
        Filter::parse("userId>=12345 and birthdate>\"1993-11-26T07:00:00Z\"").expect("should parse");
    let err = filter.to_spanner_sql(&configs).expect_err("should fail");
    let SqlError::OperatorNotAllowedForField { operator, field } = err else {
        panic!("expected operator error, got {err}");
    };
    assert_eq!(operator, ">=");
    assert_eq!(field, "userId");
}

#[test]
fn test_predicate_order_follows_clause_order() {
    let configs = configs(vec![
        ("a", FieldConfig::default()),
        ("b", FieldConfig::default()),
        ("c", FieldConfig::default()),
    ]);
    let (conditions, _) = spanner("c:3 a:1 b:2", &configs);
    assert_eq!(conditions, vec!["c=@KQL0", "a=@KQL1", "b=@KQL2"]);
}

// ============================================================================
// Parse → boolean query
// ============================================================================

#[test]
fn test_boolean_query_document() {
    let ast = parse_ast("type_id:team and (active:false or disabled:true)").expect("should parse");
    let query = QueryGenerator::new().convert_ast(&ast).expect("should convert");
    assert_eq!(
        serde_json::to_value(&query).expect("should serialize"),
        json!({"bool": {"must": [
            {"term": {"type_id": {"value": "team"}}},
            {"bool": {"should": [
                {"term": {"active": {"value": "false"}}},
                {"term": {"disabled": {"value": "true"}}},
            ]}},
        ]}})
    );
}

#[test]
fn test_nested_object_and_numeric_range() {
    let ast = parse_ast("fields:{established_year < 2000}").expect("should parse");
    let query = QueryGenerator::new().convert_ast(&ast).expect("should convert");
    assert_eq!(
        serde_json::to_value(&query).expect("should serialize"),
        json!({"range": {"fields.established_year": {"lt": 2000.0}}})
    );
}

// ============================================================================
// Parse → equality probe
// ============================================================================

#[test]
fn test_probe_constrained_under_and() {
    let ast = parse_ast("type_id:team and (active:false or disabled:true)").expect("should parse");
    assert_eq!(has_must_equal(&ast, "type_id"), vec!["team"]);
}

#[test]
fn test_probe_unconstrained_under_or() {
    let ast = parse_ast("type_id:team or disabled:true").expect("should parse");
    assert!(has_must_equal(&ast, "type_id").is_empty());
}

// ============================================================================
// Cross-lowering consistency
// ============================================================================

#[test]
fn test_same_ast_feeds_every_lowering() {
    let input = "type_id:team and userId:12345";
    let ast = parse_ast(input).expect("should parse");

    let filter = Filter::from_ast(&ast).expect("should project");
    let configs = configs(vec![
        ("type_id", FieldConfig::default()),
        (
            "userId",
            FieldConfig {
                column_name: "user_id".to_string(),
                column_type: ColumnType::Int64,
                ..Default::default()
            },
        ),
    ]);
    let (conditions, params) = filter.to_spanner_sql(&configs).expect("should lower");
    assert_eq!(conditions, vec!["type_id=@KQL0", "user_id=@KQL1"]);
    assert_eq!(params.len(), 2);

    let builder = sqlx::QueryBuilder::new("SELECT * FROM things");
    let builder = filter.to_sqlx_sql(builder, &configs).expect("should lower");
    assert_eq!(
        builder.into_sql(),
        "SELECT * FROM things WHERE type_id = $1 AND user_id = $2"
    );

    let query = QueryGenerator::new().convert_ast(&ast).expect("should convert");
    assert_eq!(
        serde_json::to_value(&query).expect("should serialize"),
        json!({"bool": {"must": [
            {"term": {"type_id": {"value": "team"}}},
            {"term": {"userId": {"value": "12345"}}},
        ]}})
    );

    assert_eq!(has_must_equal(&ast, "type_id"), vec!["team"]);
}

#[test]
fn test_ast_serializes_for_clients() {
    let ast = parse_ast("type_id:team").expect("should parse");
    assert_eq!(
        serde_json::to_value(&ast).expect("should serialize"),
        json!({
            "type": "is",
            "identifier": "type_id",
            "value": {"type": "literal", "value": "team"},
        })
    );
}
