use jsonsafe::ValidationErrorKind;
use serde_json::{json, Value};
use test_case::test_case;

fn base_and_extension() -> Value {
    json!({
        "$defs": {
            "base": {
                "type": "object",
                "properties": {"id": {"type": "integer"}},
                "required": ["id"]
            }
        },
        "$ref": "#/$defs/base",
        "properties": {"name": {"type": "string"}},
        "unevaluatedProperties": false
    })
}

#[test_case(&json!({"id": 1}), true)]
#[test_case(&json!({"id": 1, "name": "x"}), true)]
#[test_case(&json!({"id": 1, "extra": true}), false)]
#[test_case(&json!({"name": "x"}), false)]
fn test_properties_through_reference(instance: &Value, expected: bool) {
    let validator = jsonsafe::validator_for(&base_and_extension()).expect("Valid schema");
    assert!(!validator.uses_dynamic_tracing());
    assert_eq!(validator.is_valid(instance), expected);
}

#[test_case(&json!({"kind": "a", "a": 1}), true; "then branch")]
#[test_case(&json!({"kind": "b", "b": 1}), true; "else branch")]
#[test_case(&json!({"kind": "a", "b": 1}), false; "else member under then")]
#[test_case(&json!({"kind": "b", "a": 1}), false; "then member under else")]
fn test_conditional_branches(instance: &Value, expected: bool) {
    let validator = jsonsafe::validator_for(&json!({
        "properties": {"kind": {"enum": ["a", "b"]}},
        "if": {"properties": {"kind": {"const": "a"}}},
        "then": {"properties": {"a": {"type": "integer"}}},
        "else": {"properties": {"b": {"type": "integer"}}},
        "unevaluatedProperties": false
    }))
    .expect("Valid schema");
    assert!(validator.uses_dynamic_tracing());
    assert_eq!(validator.is_valid(instance), expected);
}

#[test_case(&json!({"a": 1}), true)]
#[test_case(&json!({"a": 1, "b": 2}), false)]
#[test_case(&json!({"b": 2}), false)]
fn test_one_of_branches(instance: &Value, expected: bool) {
    let validator = jsonsafe::validator_for(&json!({
        "oneOf": [
            {"properties": {"a": {"type": "integer"}}, "required": ["a"]},
            {"properties": {"c": {"type": "integer"}}, "required": ["c"]}
        ],
        "unevaluatedProperties": false
    }))
    .expect("Valid schema");
    assert_eq!(validator.is_valid(instance), expected);
}

#[test]
fn test_pattern_properties_are_evaluated() {
    let validator = jsonsafe::validator_for(&json!({
        "allOf": [{"patternProperties": {"^x-": true}}],
        "unevaluatedProperties": false
    }))
    .expect("Valid schema");
    assert!(validator.is_valid(&json!({"x-trace": 1})));
    assert!(!validator.is_valid(&json!({"trace": 1})));
}

#[test]
fn test_unevaluated_schema_applies_to_leftovers() {
    let validator = jsonsafe::validator_for(&json!({
        "properties": {"a": true},
        "unevaluatedProperties": {"type": "string"}
    }))
    .expect("Valid schema");
    assert!(validator.is_valid(&json!({"a": 1, "b": "x"})));
    assert!(!validator.is_valid(&json!({"a": 1, "b": 2})));
}

#[test_case(&json!([1, "a"]), true)]
#[test_case(&json!([1, "a", "b"]), false)]
#[test_case(&json!([1]), true)]
fn test_items_after_prefix(instance: &Value, expected: bool) {
    let validator = jsonsafe::validator_for(&json!({
        "allOf": [{"prefixItems": [{"type": "integer"}]}],
        "prefixItems": [true, {"type": "string"}],
        "unevaluatedItems": false
    }))
    .expect("Valid schema");
    assert_eq!(validator.is_valid(instance), expected);
}

#[test]
fn test_items_error() {
    let validator = jsonsafe::validator_for(&json!({
        "prefixItems": [{"type": "integer"}],
        "unevaluatedItems": false
    }))
    .expect("Valid schema");
    let instance = json!([1, "a", null]);
    let output = validator.validate(&instance);
    assert_eq!(output.errors[0].keyword_location.as_str(), "/unevaluatedItems");
    assert_eq!(
        output.errors[0].kind,
        ValidationErrorKind::UnevaluatedItems {
            unexpected: vec![r#""a""#.to_string(), "null".to_string()]
        }
    );
}

#[test]
fn test_failed_branches_do_not_evaluate() {
    let schema = json!({
        "anyOf": [
            {"properties": {"a": {"type": "integer"}}},
            {"properties": {"b": {"type": "integer"}}}
        ],
        "unevaluatedProperties": false
    });
    let validator = jsonsafe::validator_for(&schema).expect("Valid schema");
    assert!(validator.uses_dynamic_tracing());
    assert!(validator.is_valid(&json!({"a": 1, "b": 2})));
    assert!(validator.is_valid(&json!({"b": 2})));
    assert!(!validator.is_valid(&json!({"a": "x", "b": 2})));
    assert!(!validator.is_valid(&json!({"c": 1})));
}

#[test]
fn test_not_does_not_evaluate() {
    let validator = jsonsafe::validator_for(&json!({
        "not": {"not": {"properties": {"a": true}}},
        "unevaluatedProperties": false
    }))
    .expect("Valid schema");
    assert!(!validator.is_valid(&json!({"a": 1})));
    assert!(validator.is_valid(&json!({})));
}
