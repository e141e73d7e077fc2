//! Behavioral tests for predicate evaluation through the public API.
//!
//! Predicates are parsed from their JSON form exactly as they appear in an
//! imposter definition, then evaluated against normalized requests.

use rift_match::predicate::{parse_predicate, Encoding, Predicate};
use rift_match::request::Request;
use serde_json::{json, Value};

fn predicate(definition: Value) -> Predicate {
    parse_predicate(&definition, "predicate").unwrap()
}

fn request(fields: Value) -> Request {
    serde_json::from_value(fields).unwrap()
}

fn holds(definition: Value, fields: Value) -> bool {
    predicate(definition).evaluate(&request(fields))
}

fn body(document: Value) -> Value {
    json!({ "field": document.to_string() })
}

// ---------------------------------------------------------------------------
// contains
// ---------------------------------------------------------------------------

#[test]
fn test_contains_plain_field() {
    assert!(!holds(json!({"contains": {"field": "middle"}}), json!({"field": "begin end"})));
    assert!(holds(
        json!({"contains": {"field": "middle"}}),
        json!({"field": "begin middle end"})
    ));
}

#[test]
fn test_contains_case_sensitivity() {
    assert!(holds(
        json!({"contains": {"field": "MIDDLE"}}),
        json!({"field": "begin Middle end"})
    ));
    assert!(!holds(
        json!({"contains": {"field": "MIDDLE"}, "caseSensitive": true}),
        json!({"field": "begin Middle end"})
    ));
}

#[test]
fn test_contains_object_fields() {
    let headers = json!({"contains": {"headers": {"key": "middle"}}});
    assert!(holds(headers.clone(), json!({"headers": {"key": "begin middle end"}})));
    assert!(!holds(headers.clone(), json!({"headers": {}})));
    assert!(!holds(headers, json!({"headers": {"key": "begin end"}})));

    assert!(holds(
        json!({"contains": {"headers": {"key": "Middle"}}}),
        json!({"headers": {"key": "begin MIDDLE end"}})
    ));
    assert!(!holds(
        json!({"contains": {"headers": {"key": "Middle"}}, "caseSensitive": true}),
        json!({"headers": {"key": "begin MIDDLE end"}})
    ));
}

#[test]
fn test_contains_binary_sequence() {
    // [2, 3] inside [1, 2, 3, 4]
    let found = predicate(json!({"contains": {"field": "AgM="}}));
    assert!(found.evaluate_encoded(&request(json!({"field": "AQIDBA=="})), Encoding::Base64));

    // [2, 4] is not a contiguous run of [1, 2, 3, 4]
    let missing = predicate(json!({"contains": {"field": "AgQ="}}));
    assert!(!missing.evaluate_encoded(&request(json!({"field": "AQIDBA=="})), Encoding::Base64));
}

#[test]
fn test_contains_repeated_query_key() {
    assert!(holds(
        json!({"contains": {"query": {"key": "123"}}}),
        json!({"query": {"key": ["123", "234"]}})
    ));
    assert!(holds(
        json!({"contains": {"query": {"key": "mid"}}}),
        json!({"query": {"key": ["begin", "middle", "end"]}})
    ));
    assert!(!holds(
        json!({"contains": {"query": {"key": "bid"}}}),
        json!({"query": {"key": ["begin", "middle", "end"]}})
    ));
}

#[test]
fn test_contains_array_operand() {
    assert!(holds(
        json!({"contains": {"field": ["be", "nd", "iddl"]}}),
        json!({"field": ["begin", "middle", "end"]})
    ));
    assert!(!holds(
        json!({"contains": {"query": {"key": ["be", "nd", "iddl", "wtf"]}}}),
        json!({"query": {"key": ["begin", "middle", "end"]}})
    ));
    // the actual array may hold more elements than the operand
    assert!(holds(
        json!({"contains": {"query": {"key": ["fi", "se"]}}}),
        json!({"query": {"key": ["first", "second", "third"]}})
    ));
}

#[test]
fn test_contains_array_of_objects() {
    let definition = json!({"contains": {"query": {"key": [{"key1": "1"}, {"key1": "2"}]}}});
    assert!(holds(
        definition.clone(),
        json!({"query": {"key": [{"key1": "value1"}, {"key1": "value2"}]}})
    ));
    assert!(!holds(
        definition,
        json!({"query": {"key": [{"key1": "value1"}, {"key1": "value3"}]}})
    ));
}

// ---------------------------------------------------------------------------
// jsonpath
// ---------------------------------------------------------------------------

#[test]
fn test_jsonpath_equals() {
    let definition = json!({"equals": {"field": "VALUE"}, "jsonpath": {"selector": "$..title"}});
    // not JSON at all
    assert!(!holds(definition.clone(), json!({"field": "VALUE"})));
    assert!(holds(definition, body(json!({"title": "VALUE"}))));

    assert!(!holds(
        json!({"equals": {"field": "NOT VALUE"}, "jsonpath": {"selector": "$..title"}}),
        body(json!({"title": "VALUE"}))
    ));
}

#[test]
fn test_jsonpath_selector_case_sensitivity() {
    assert!(holds(
        json!({"equals": {"field": "VALUE"}, "jsonpath": {"selector": "$..Title"}}),
        body(json!({"title": "VALUE"}))
    ));
    assert!(!holds(
        json!({
            "equals": {"field": "value"},
            "jsonpath": {"selector": "$..title"},
            "caseSensitive": true
        }),
        body(json!({"TITLE": "value"}))
    ));
    assert!(holds(
        json!({
            "equals": {"field": "value"},
            "jsonpath": {"selector": "$..Title"},
            "caseSensitive": true
        }),
        body(json!({"Title": "value"}))
    ));
}

#[test]
fn test_jsonpath_with_except() {
    let definition = |expected: &str| {
        json!({
            "equals": {"field": expected},
            "jsonpath": {"selector": "$..Title"},
            "caseSensitive": true,
            "except": "alu"
        })
    };
    assert!(holds(definition("ve"), body(json!({"Title": "value"}))));
    assert!(!holds(definition("v"), body(json!({"Title": "value"}))));
}

#[test]
fn test_jsonpath_deep_equals() {
    assert!(!holds(
        json!({"deepEquals": {"field": "VALUE"}, "jsonpath": {"selector": "$..title"}}),
        json!({"field": "VALUE"})
    ));
    assert!(!holds(
        json!({"deepEquals": {"field": "NOT VALUE"}, "jsonpath": {"selector": "$.title..attribute"}}),
        body(json!({"Title": {"attribute": "value"}}))
    ));
    assert!(holds(
        json!({"deepEquals": {"field": "value"}, "jsonpath": {"selector": "$.title.attribute"}}),
        body(json!({"title": {"attribute": "value"}}))
    ));
    assert!(holds(
        json!({"deepEquals": {"field": "value"}, "jsonpath": {"selector": "$.title.attribute.test"}}),
        body(json!({"title": {"attribute": {"test": "value"}}}))
    ));
}

#[test]
fn test_jsonpath_deep_equals_multiple_hits() {
    let document = body(json!({"title": [{"attribute": "value"}, {"attribute": "other value"}]}));

    assert!(holds(
        json!({"deepEquals": {"field": ["value", "other value"]}, "jsonpath": {"selector": "$.title..attribute"}}),
        document.clone()
    ));
    // order of hits does not matter
    assert!(holds(
        json!({"deepEquals": {"field": ["other value", "value"]}, "jsonpath": {"selector": "$.title..attribute"}}),
        document.clone()
    ));
    // a single indexed hit is a plain value, not a one-element array
    assert!(holds(
        json!({"deepEquals": {"field": "value"}, "jsonpath": {"selector": "$..title[0].attribute"}}),
        document
    ));

    assert!(!holds(
        json!({"deepEquals": {"field": ["value", "other value"]}, "jsonpath": {"selector": "$.title..attribute"}}),
        body(json!({"title": [
            {"attribute": "value"},
            {"attribute": "other value"},
            {"attribute": "last value"}
        ]}))
    ));
}

#[test]
fn test_jsonpath_text_operators() {
    let document = body(json!({"title": "this is a value"}));
    assert!(holds(
        json!({"contains": {"field": "value"}, "jsonpath": {"selector": "$..title"}}),
        document.clone()
    ));
    assert!(!holds(
        json!({"contains": {"field": "VALUE"}, "jsonpath": {"selector": "$..title"}, "caseSensitive": true}),
        document.clone()
    ));
    assert!(holds(
        json!({"startsWith": {"field": "this"}, "jsonpath": {"selector": "$..title"}}),
        document
    ));
    assert!(!holds(
        json!({"startsWith": {"field": "this"}, "jsonpath": {"selector": "$..title"}}),
        body(json!({"title": "if this is a value, it is a value"}))
    ));
}

#[test]
fn test_jsonpath_exists() {
    let definition = json!({"exists": {"field": true}, "jsonpath": {"selector": "$..title"}});
    assert!(holds(definition.clone(), body(json!({"title": "value"}))));
    assert!(!holds(definition, body(json!({"newTitle": "value"}))));
}

#[test]
fn test_jsonpath_matches() {
    assert!(holds(
        json!({"matches": {"field": "^v"}, "jsonpath": {"selector": "$..title"}}),
        body(json!({"title": "value"}))
    ));
    assert!(!holds(
        json!({"matches": {"field": "v$"}, "jsonpath": {"selector": "$..title"}}),
        body(json!({"title": "value"}))
    ));
    assert!(holds(
        json!({"matches": {"body": "111\\.222\\.333\\.*"}, "jsonpath": {"selector": "$.ipAddress"}}),
        json!({"body": "{ \"ipAddress\": \"111.222.333.456\" }"})
    ));
}

#[test]
fn test_jsonpath_boolean_selection() {
    let document = json!({"field": "{ \"active\": false }"});
    assert!(holds(
        json!({"deepEquals": {"field": false}, "jsonpath": {"selector": "$..active"}}),
        document.clone()
    ));
    assert!(holds(
        json!({"equals": {"field": false}, "jsonpath": {"selector": "$..active"}}),
        document
    ));
}

// ---------------------------------------------------------------------------
// xpath
// ---------------------------------------------------------------------------

#[test]
fn test_xpath_equals() {
    let definition = json!({"equals": {"body": "Harry Potter"}, "xpath": {"selector": "//title"}});
    assert!(holds(
        definition.clone(),
        json!({"body": "<books><book><title>Harry Potter</title></book></books>"})
    ));
    assert!(!holds(definition, json!({"body": "Harry Potter"})));
}

#[test]
fn test_xpath_default_namespace_ignored_without_ns() {
    assert!(holds(
        json!({"equals": {"body": "value"}, "xpath": {"selector": "//Title"}}),
        json!({"body": "<doc xmlns=\"urn:books\"><title>VALUE</title></doc>"})
    ));
}

#[test]
fn test_xpath_with_namespace_map() {
    let document = json!({"body": concat!(
        "<root xmlns:isbn=\"http://schemas.isbn.org/ns/1999/basic.dtd\">",
        "<isbn:book>Lord of the Rings</isbn:book>",
        "<book>Hobbit</book>",
        "</root>"
    )});

    assert!(holds(
        json!({
            "equals": {"body": "lord of the rings"},
            "xpath": {
                "selector": "//isbn:book",
                "ns": {"isbn": "http://schemas.isbn.org/ns/1999/basic.dtd"}
            }
        }),
        document
    ));
}

#[test]
fn test_xpath_multiple_nodes() {
    let document = json!({"body": "<list><item>first</item><item>second</item></list>"});
    assert!(holds(
        json!({"deepEquals": {"body": ["second", "first"]}, "xpath": {"selector": "//item"}}),
        document.clone()
    ));
    assert!(holds(
        json!({"contains": {"body": "sec"}, "xpath": {"selector": "//item"}}),
        document.clone()
    ));
    assert!(!holds(
        json!({"exists": {"body": true}, "xpath": {"selector": "//missing"}}),
        document
    ));
}

#[test]
fn test_xpath_count_is_numeric() {
    assert!(holds(
        json!({"equals": {"body": 2}, "xpath": {"selector": "count(//item)"}}),
        json!({"body": "<list><item>a</item><item>b</item></list>"})
    ));
}

// ---------------------------------------------------------------------------
// logical composition
// ---------------------------------------------------------------------------

#[test]
fn test_logical_composition() {
    let definition = json!({
        "and": [
            {"equals": {"method": "POST"}},
            {"or": [
                {"startsWith": {"path": "/api"}},
                {"exists": {"headers": {"X-Debug": true}}}
            ]},
            {"not": {"contains": {"body": "secret"}}}
        ]
    });

    assert!(holds(
        definition.clone(),
        json!({"method": "POST", "path": "/api/users", "body": "{}"})
    ));
    assert!(holds(
        definition.clone(),
        json!({"method": "post", "path": "/other", "headers": {"x-debug": "1"}})
    ));
    assert!(!holds(
        definition.clone(),
        json!({"method": "POST", "path": "/api", "body": "top secret"})
    ));
    assert!(!holds(definition, json!({"method": "GET", "path": "/api"})));
}

#[test]
fn test_empty_combinators() {
    assert!(holds(json!({"and": []}), json!({})));
    assert!(!holds(json!({"or": []}), json!({})));
}

#[test]
fn test_missing_field() {
    assert!(!holds(json!({"equals": {"body": ""}}), json!({})));
    assert!(holds(json!({"exists": {"body": false}}), json!({})));
    assert!(holds(json!({"not": {"equals": {"body": "x"}}}), json!({})));
}

#[test]
fn test_json_body_object_operand() {
    let fields = json!({"body": "{\"user\": {\"name\": \"Alice\", \"roles\": [\"admin\", \"dev\"]}}"});
    assert!(holds(
        json!({"equals": {"body": {"user": {"name": "alice"}}}}),
        fields.clone()
    ));
    assert!(holds(
        json!({"contains": {"body": {"user": {"roles": "adm"}}}}),
        fields.clone()
    ));
    assert!(!holds(json!({"equals": {"body": {"user": {"name": "bob"}}}}), fields));
}

#[test]
fn test_parsed_body_is_read_as_json_text() {
    let fields = json!({"body": {"title": "VALUE"}});
    assert!(holds(json!({"contains": {"body": "title"}}), fields.clone()));
    assert!(holds(json!({"endsWith": {"body": "\"value\"}"}}), fields.clone()));
    assert!(!holds(json!({"contains": {"body": "other"}}), fields));
}

#[test]
fn test_jsonpath_on_parsed_body() {
    let fields = json!({"body": {"title": "VALUE", "tags": ["a", "b"]}});
    assert!(holds(
        json!({"equals": {"body": "VALUE"}, "jsonpath": {"selector": "$..title"}}),
        fields.clone()
    ));
    assert!(holds(
        json!({"deepEquals": {"body": ["b", "a"]}, "jsonpath": {"selector": "$.tags[*]"}}),
        fields.clone()
    ));
    assert!(!holds(
        json!({"equals": {"body": "other"}, "jsonpath": {"selector": "$..title"}}),
        fields
    ));
}

// ---------------------------------------------------------------------------
// creation-time errors
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_predicates_are_rejected() {
    let cases = [
        (json!({"equals": {"path": "/"}, "contains": {"path": "/"}}), "predicate"),
        (json!({"caseSensitive": true}), "predicate"),
        (json!({"matches": {"path": "(["}}), "predicate"),
        (json!({"exists": {"path": "yes"}}), "predicate"),
        (json!({"equals": {"path": "/"}, "jsonpath": {"selector": "$[?"}}), "predicate"),
        (json!({"or": [{"equals": {"path": "/"}}, {"bogus": {}}]}), "predicate.or[1]"),
        (json!({"not": {"and": {"equals": {}}}}), "predicate.not"),
    ];

    for (definition, location) in cases {
        let err = parse_predicate(&definition, "predicate").unwrap_err();
        assert_eq!(err.location, location, "for {definition}");
    }
}
