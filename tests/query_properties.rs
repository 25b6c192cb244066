// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Compiler-level properties: type dispatch, tag escaping, match-all
//! defaults and schema compilation determinism.
//!
//! Run with: `cargo test --test query_properties`

use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
use docgrid::search::{
    compile_filter, escape_tag, unescape_tag, Criteria, Operator, QueryCompiler, SchemaCompiler, MATCH_ALL,
};
use docgrid::{DocError, DocGridConfig};

fn catalog() -> DocumentSchema {
    DocumentSchema::from_items(
        "catalog",
        vec![
            SchemaItem::new("sku", LogicalType::Text).primary().tag(),
            SchemaItem::new("title", LogicalType::Text).stemmed().weighted(2.0),
            SchemaItem::new("price", LogicalType::Double),
            SchemaItem::new("stock", LogicalType::Integer),
            SchemaItem::new("listed", LogicalType::Date),
            SchemaItem::new("active", LogicalType::Boolean),
            SchemaItem::new("brand", LogicalType::Text).facet().titled("Brand"),
        ],
    )
    .unwrap()
}

fn compile(criteria: &Criteria) -> Result<String, DocError> {
    QueryCompiler::default()
        .compile(criteria, &catalog())
        .map(|compiled| compiled.query)
}

// =============================================================================
// Type dispatch
// =============================================================================

#[test]
fn between_is_open_range_and_inclusive_is_closed() {
    let open = compile(&Criteria::new().and("price", Operator::Between, ["10", "20"])).unwrap();
    assert_eq!(open, "@price:[(10 (20]");

    let closed = compile(&Criteria::new().and("price", Operator::BetweenInclusive, ["10", "20"])).unwrap();
    assert_eq!(closed, "@price:[10 20]");

    let negated = compile(&Criteria::new().and("price", Operator::NotBetween, ["10", "20"])).unwrap();
    assert_eq!(negated, "-@price:[10 20]");
}

#[test]
fn between_requires_two_values() {
    let err = compile(&Criteria::new().and("price", Operator::Between, ["10"])).unwrap_err();
    assert!(matches!(err, DocError::Arity { actual: 1, .. }));
    assert!(err.is_validation());
}

#[test]
fn date_predicates_target_the_shadow_field() {
    let query = compile(&Criteria::new().and("listed", Operator::GreaterThanEqual, ["2024-01-01"])).unwrap();
    assert_eq!(query, "@listed_epoch:[1704067200000 +inf]");

    let err = compile(&Criteria::new().and("listed", Operator::Equal, ["yesterday"])).unwrap_err();
    assert!(matches!(err, DocError::Type { expected: "date", .. }));
}

#[test]
fn numbers_reject_non_numeric_values() {
    let err = compile(&Criteria::new().and("stock", Operator::LessThan, ["many"])).unwrap_err();
    assert!(matches!(err, DocError::Type { .. }));
}

#[test]
fn booleans_compile_to_tag_groups() {
    let query = compile(&Criteria::new().and("active", Operator::Equal, ["true"])).unwrap();
    assert!(query.starts_with("@active"));
    assert!(query.ends_with("{true}"));
}

#[test]
fn unknown_field_is_rejected() {
    let err = compile(&Criteria::new().and("colour", Operator::Equal, ["red"])).unwrap_err();
    assert!(matches!(err, DocError::UnknownField(ref f) if f == "colour"));
}

// =============================================================================
// Tag escaping
// =============================================================================

#[test]
fn tag_equality_escapes_every_separator() {
    let query = compile(&Criteria::new().and("sku", Operator::Equal, ["a-b,c"])).unwrap();
    assert_eq!(query, r"@sku_tag:{a\-b\,c}");
    assert_eq!(unescape_tag(r"a\-b\,c"), "a-b,c");
    assert_eq!(escape_tag("plain42"), "plain42");
}

#[test]
fn empty_in_list_is_dropped() {
    let query = compile(&Criteria::new().and("sku", Operator::In, Vec::<String>::new())).unwrap();
    assert_eq!(query, MATCH_ALL);

    let with_other = compile(
        &Criteria::new()
            .and("sku", Operator::NotIn, Vec::<String>::new())
            .and("stock", Operator::Equal, ["3"]),
    )
    .unwrap();
    assert_eq!(with_other, "@stock:[3 3]");
}

// =============================================================================
// Match-all and free text
// =============================================================================

#[test]
fn empty_criteria_compiles_to_match_all() {
    assert_eq!(compile(&Criteria::new()).unwrap(), MATCH_ALL);
}

#[test]
fn match_all_free_text_yields_to_predicates() {
    let criteria = Criteria::new().with_query(MATCH_ALL).and("stock", Operator::Equal, ["1"]);
    assert_eq!(compile(&criteria).unwrap(), "@stock:[1 1]");

    let criteria = Criteria::new().with_query("lamp").and("stock", Operator::Equal, ["1"]);
    assert_eq!(compile(&criteria).unwrap(), "lamp @stock:[1 1]");
}

#[test]
fn meta_entries_are_not_predicates() {
    let criteria = Criteria::new().with_offset(10).with_limit(5);
    assert_eq!(compile(&criteria).unwrap(), MATCH_ALL);
}

#[test]
fn last_sort_wins() {
    let criteria = Criteria::new()
        .and("price", Operator::Sort, ["ASC"])
        .and("stock", Operator::Sort, ["DESC"]);
    let compiled = QueryCompiler::default().compile(&criteria, &catalog()).unwrap();
    let sort = compiled.sort.unwrap();
    assert_eq!(sort.alias, "stock");
    assert!(!sort.ascending);
}

// =============================================================================
// Schema compilation
// =============================================================================

#[test]
fn schema_compilation_is_deterministic() {
    let compiler = SchemaCompiler::new(&DocGridConfig::default());
    let first = compiler.compile("catalog", "cat:", &catalog(), None).unwrap();
    let second = compiler.compile("catalog", "cat:", &catalog(), None).unwrap();
    assert_eq!(first.to_ft_create_args(), second.to_ft_create_args());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn schema_limit_is_checked_before_create() {
    let config = DocGridConfig {
        max_fields: 3,
        ..Default::default()
    };
    let err = SchemaCompiler::new(&config)
        .compile("catalog", "cat:", &catalog(), None)
        .unwrap_err();
    assert!(matches!(err, DocError::SchemaLimit { ceiling: 3, .. }));
}

#[test]
fn row_filter_compiles_to_filter_expression() {
    let filter = Criteria::new().and("stock", Operator::GreaterThan, ["5"]);
    assert_eq!(compile_filter(&filter, &catalog()).unwrap().as_deref(), Some("@stock>5"));
    assert_eq!(compile_filter(&Criteria::new(), &catalog()).unwrap(), None);
}
