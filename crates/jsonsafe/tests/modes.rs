use jsonsafe::{CompileError, Mode};
use serde_json::{json, Value};
use test_case::test_case;

const DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

fn build(mode: Mode, schema: &Value) -> Result<jsonsafe::Validator, CompileError> {
    jsonsafe::options().with_mode(mode).build(schema)
}

#[test_case(&json!({"foo": 1}); "unknown keyword")]
#[test_case(&json!({"then": {}}); "then without if")]
#[test_case(&json!({"type": "string", "minimum": 1}); "number keyword on a string")]
#[test_case(&json!({"type": "array", "required": ["a"]}); "object keyword on an array")]
#[test_case(&json!({"format": "no-such-format"}); "unknown format")]
#[test_case(&json!({"minContains": 1}); "minContains without contains")]
fn test_rejected_unless_permissive(schema: &Value) {
    assert!(build(Mode::Standard, schema).is_err());
    assert!(build(Mode::Strict, schema).is_err());
    assert!(build(Mode::Permissive, schema).is_ok());
}

#[test_case(&json!({"minimum": 5, "maximum": 1}); "numbers")]
#[test_case(&json!({"minLength": 5, "maxLength": 1}); "strings")]
#[test_case(&json!({"minItems": 5, "maxItems": 1}); "arrays")]
#[test_case(&json!({"minProperties": 5, "maxProperties": 1}); "objects")]
fn test_inverted_range(schema: &Value) {
    assert!(matches!(
        build(Mode::Standard, schema),
        Err(CompileError::InvalidRange { .. })
    ));
}

#[test_case(&json!({"multipleOf": 0}); "zero divisor")]
#[test_case(&json!({"minLength": -1}); "negative length")]
#[test_case(&json!({"required": "a"}); "required is not a list")]
#[test_case(&json!({"pattern": "("}); "broken regex")]
#[test_case(&json!({"type": "float"}); "unknown type")]
#[test_case(&json!(42); "number as a schema")]
fn test_malformed_in_every_mode(schema: &Value) {
    for mode in [Mode::Permissive, Mode::Standard, Mode::Strict] {
        assert!(build(mode, schema).is_err(), "{mode:?} accepted {schema}");
    }
}

#[test]
fn test_type_mismatch_error() {
    let error =
        build(Mode::Standard, &json!({"properties": {"a": {"type": "string", "minimum": 1}}}))
            .expect_err("Type mismatch");
    let CompileError::TypeMismatch { keyword, location, .. } = &error else {
        panic!("Unexpected error: {error}");
    };
    assert_eq!(keyword, "minimum");
    assert_eq!(location.as_str(), "/properties/a/minimum");
}

#[test]
fn test_permissive_ignores_inapplicable_keywords() {
    let validator = build(Mode::Permissive, &json!({"type": "string", "minimum": 10, "foo": 1}))
        .expect("Valid schema");
    assert!(validator.is_valid(&json!("abc")));
    assert!(!validator.is_valid(&json!(100)));
}

#[test_case(&json!({"$schema": DIALECT, "type": "integer"}); "integer")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "format": "email"}); "string with format")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "pattern": "^[a-z]+$"}); "anchored pattern")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "pattern": "^[a-z]+[0-9]+$", "maxLength": 32}); "complex pattern with max length")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "enum": ["a", "b"]}); "string enum")]
#[test_case(&json!({"$schema": DIALECT, "type": "object", "additionalProperties": false}); "closed object")]
#[test_case(&json!({"$schema": DIALECT, "type": "object", "unevaluatedProperties": false}); "unevaluated object")]
#[test_case(&json!({"$schema": DIALECT, "type": "array", "items": {"type": "integer"}}); "array with items")]
#[test_case(&json!({
    "$schema": DIALECT,
    "type": "object",
    "allOf": [{"type": "object", "properties": {"a": {"type": "integer"}}}],
    "unevaluatedProperties": false
}); "object constrained by the enclosing schema")]
#[test_case(&json!({
    "$schema": DIALECT,
    "type": "object",
    "patternProperties": {"^x-[a-z]+$": {"type": "integer"}},
    "additionalProperties": false
}); "anchored pattern properties")]
fn test_strict_accepts(schema: &Value) {
    assert!(build(Mode::Strict, schema).is_ok());
}

#[test_case(&json!({"type": "integer"}); "missing dialect")]
#[test_case(&json!({"$schema": DIALECT, "type": "string"}); "unconstrained string")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "pattern": "[a-z]+"}); "unanchored pattern")]
#[test_case(&json!({"$schema": DIALECT, "type": "string", "pattern": "^[a-z]+[0-9]+$"}); "complex pattern")]
#[test_case(&json!({"$schema": DIALECT, "type": "object"}); "open object")]
#[test_case(&json!({"$schema": DIALECT, "type": "array"}); "open array")]
#[test_case(&json!({"$schema": DIALECT, "type": "array", "prefixItems": [{"type": "integer"}]}); "open tuple")]
#[test_case(&json!({
    "$schema": DIALECT,
    "type": "object",
    "patternProperties": {"x-": {"type": "integer"}},
    "additionalProperties": false
}); "unanchored pattern properties")]
#[test_case(&json!({
    "$schema": DIALECT,
    "type": "object",
    "patternProperties": {"^[a-z]+[0-9]+$": {"type": "integer"}},
    "additionalProperties": false
}); "complex pattern properties")]
#[test_case(&json!({
    "$schema": "http://json-schema.org/draft-07/schema#",
    "$ref": "#/definitions/a",
    "minimum": 1,
    "definitions": {"a": {"type": "integer"}}
}); "ignored ref siblings")]
fn test_strict_rejects(schema: &Value) {
    assert!(build(Mode::Standard, schema).is_ok());
    assert!(build(Mode::Strict, schema).is_err());
}

#[test]
fn test_strict_error_location() {
    let error = build(
        Mode::Strict,
        &json!({
            "$schema": DIALECT,
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "additionalProperties": false
        }),
    )
    .expect_err("Unconstrained string");
    let CompileError::Strict { location, .. } = &error else {
        panic!("Unexpected error: {error}");
    };
    assert_eq!(location.as_str(), "/properties/name");
}

#[test]
fn test_strict_requires_dialect_in_additional_documents() {
    let error = jsonsafe::options()
        .with_mode(Mode::Strict)
        .with_schema("https://example.com/a.json", json!({"type": "integer"}))
        .build(&json!({"$schema": DIALECT, "$ref": "https://example.com/a.json"}))
        .expect_err("Missing dialect");
    assert!(matches!(error, CompileError::Strict { .. }));
}

#[test]
fn test_strict_disables_weak_formats() {
    let schema = json!({"$schema": DIALECT, "type": "string", "format": "regex"});
    assert!(build(Mode::Standard, &schema).is_ok());
    assert!(build(Mode::Strict, &schema).is_err());
}

#[test]
fn test_format_tables() {
    let weak = json!({"format": "regex"});
    assert!(jsonsafe::options().with_disable_weak_formats(true).build(&weak).is_err());
    let extra = json!({"format": "hex"});
    assert!(jsonsafe::validator_for(&extra).is_err());
    let validator = jsonsafe::options()
        .with_enable_extra_formats(true)
        .build(&extra)
        .expect("Extra formats enabled");
    assert!(validator.is_valid(&json!("c0ffee")));
    assert!(!validator.is_valid(&json!("coffee")));
}

#[test]
fn test_custom_format() {
    let validator = jsonsafe::options()
        .with_format_fn("even-length", |value| value.len() % 2 == 0)
        .build(&json!({"format": "even-length"}))
        .expect("Custom format");
    assert!(validator.is_valid(&json!("ab")));
    assert!(!validator.is_valid(&json!("abc")));
    assert!(validator.is_valid(&json!(3)));
}

#[test]
fn test_options_from_json() {
    let options: jsonsafe::ValidationOptions = serde_json::from_value(json!({
        "mode": "permissive",
        "collectAllErrors": true,
        "defaultSchemaVersion": "draft7"
    }))
    .expect("Valid options");
    assert_eq!(options.mode(), Mode::Permissive);
    let validator = options.build(&json!({"foo": 1, "maximum": 1})).expect("Valid schema");
    assert_eq!(validator.draft(), jsonsafe::Draft::Draft7);
    assert!(!validator.is_valid(&json!(2)));
}

#[test_case(&json!({"$schema": DIALECT, "type": "string", "pattern": "^(?=a)[a-z]+$", "maxLength": 8}), "/pattern")]
#[test_case(&json!({
    "$schema": DIALECT,
    "type": "object",
    "patternProperties": {"^(?!x-)[a-z]+$": {"type": "integer"}},
    "additionalProperties": false
}), "/patternProperties/^(?!x-)[a-z]+$")]
fn test_strict_rejects_unanalyzable_pattern(schema: &Value, expected: &str) {
    let error = build(Mode::Strict, schema).expect_err("Pattern can not be analyzed");
    let CompileError::Strict { location, .. } = &error else {
        panic!("Unexpected error: {error}");
    };
    assert_eq!(location.as_str(), expected);
    let validator = build(Mode::Standard, schema).expect("Look-around is supported");
    assert!(!validator.is_valid(&json!("b")));
}
