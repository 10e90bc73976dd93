//! Tests for the query matcher
//!
//! These tests verify:
//! - Clause parsing (quotes, whitespace, empty clauses)
//! - String vs. integer-prefix comparison
//! - Conjunction semantics
//! - Rejection of invalid field names

use serde_json::json;
use sydb::error::SydbError;
use sydb::query::{matches_query, parse_int_prefix, Query};

// =============================================================================
// Parsing Tests
// =============================================================================

#[test]
fn test_parse_multiple_clauses() {
    let query = Query::parse("title:Widget,qty:3").unwrap();

    assert_eq!(query.clauses.len(), 2);
    assert_eq!(query.clauses[0].field, "title");
    assert_eq!(query.clauses[0].value, "Widget");
    assert_eq!(query.clauses[1].field, "qty");
    assert_eq!(query.clauses[1].value, "3");
}

#[test]
fn test_parse_strips_quotes() {
    let query: Query = r#"name:"two words",tag:'x'"#.parse().unwrap();

    assert_eq!(query.clauses[0].value, "two words");
    assert_eq!(query.clauses[1].value, "x");
}

#[test]
fn test_parse_empty_query() {
    let query = Query::parse("").unwrap();

    assert!(query.is_empty());
    assert!(query.matches(&json!({ "anything": 1 })));
}

#[test]
fn test_parse_rejects_invalid_field() {
    assert!(matches!(
        Query::parse("bad field:1"),
        Err(SydbError::Validation(_))
    ));
    assert!(matches!(
        Query::parse("no_colon"),
        Err(SydbError::Validation(_))
    ));
}

// =============================================================================
// Matching Tests
// =============================================================================

#[test]
fn test_string_fields_compare_textually() {
    let doc = json!({ "title": "Widget", "code": "007" });

    assert!(matches_query("title:Widget", &doc));
    assert!(!matches_query("title:widget", &doc));
    assert!(!matches_query("code:7", &doc));
}

#[test]
fn test_numbers_compare_by_integer_prefix() {
    let doc = json!({ "qty": 3, "price": 3.9 });

    assert!(matches_query("qty:3", &doc));
    assert!(matches_query("qty:3abc", &doc));
    assert!(matches_query("price:3", &doc));
    assert!(!matches_query("qty:4", &doc));
    assert!(!matches_query("qty:many", &doc));
}

#[test]
fn test_missing_field_never_matches() {
    let doc = json!({ "title": "Widget" });

    assert!(!matches_query("qty:3", &doc));
}

#[test]
fn test_all_clauses_must_match() {
    let doc = json!({ "title": "Widget", "qty": 3 });

    assert!(matches_query("title:Widget,qty:3", &doc));
    assert!(!matches_query("title:Widget,qty:2", &doc));
}

#[test]
fn test_invalid_query_matches_nothing() {
    let doc = json!({ "title": "Widget" });

    assert!(!matches_query("bad-field:Widget", &doc));
}

// =============================================================================
// Integer Prefix Tests
// =============================================================================

#[test]
fn test_parse_int_prefix() {
    assert_eq!(parse_int_prefix("42"), Some(42));
    assert_eq!(parse_int_prefix("42abc"), Some(42));
    assert_eq!(parse_int_prefix("  -7"), Some(-7));
    assert_eq!(parse_int_prefix("+5"), Some(5));
    assert_eq!(parse_int_prefix("3.9"), Some(3));
    assert_eq!(parse_int_prefix("abc"), None);
    assert_eq!(parse_int_prefix(""), None);
    assert_eq!(parse_int_prefix("-"), None);
}
