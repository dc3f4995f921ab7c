use jsonsafe::CompileError;
use serde_json::{json, Value};
use test_case::test_case;

fn defaults() -> jsonsafe::ValidationOptions {
    jsonsafe::options().should_apply_defaults(true)
}

fn unlisted() -> jsonsafe::ValidationOptions {
    jsonsafe::options().should_remove_unlisted(true)
}

#[test_case(
    &json!({"properties": {"a": {"default": 1}, "b": {"default": "x"}}}),
    json!({"b": "y"}),
    &json!({"a": 1, "b": "y"});
    "existing members are kept"
)]
#[test_case(
    &json!({"properties": {"nested": {"properties": {"flag": {"default": false}}}}}),
    json!({"nested": {}}),
    &json!({"nested": {"flag": false}});
    "nested objects"
)]
#[test_case(
    &json!({"properties": {"nested": {"properties": {"flag": {"default": false}}}}}),
    json!({}),
    &json!({});
    "missing parents are not created"
)]
#[test_case(
    &json!({"prefixItems": [{"default": 1}, {"default": 2}]}),
    json!([]),
    &json!([1, 2]);
    "tuple items"
)]
#[test_case(
    &json!({"prefixItems": [{"default": 1}, {"default": 2}]}),
    json!([7]),
    &json!([7, 2]);
    "partial tuple"
)]
#[test_case(
    &json!({"allOf": [{"properties": {"a": {"default": 1}}}, {"properties": {"b": {"default": 2}}}]}),
    json!({}),
    &json!({"a": 1, "b": 2});
    "all of"
)]
#[test_case(
    &json!({"$defs": {"config": {"properties": {"retries": {"default": 3}}}}, "properties": {"config": {"$ref": "#/$defs/config"}}}),
    json!({"config": {}}),
    &json!({"config": {"retries": 3}});
    "references"
)]
#[test_case(
    &json!({"items": {"properties": {"enabled": {"default": true}}}}),
    json!([{}, {"enabled": false}]),
    &json!([{"enabled": true}, {"enabled": false}]);
    "every item"
)]
fn test_apply_defaults(schema: &Value, mut instance: Value, expected: &Value) {
    let validator = defaults().build(schema).expect("Valid schema");
    assert!(validator.validate_mut(&mut instance).valid);
    assert_eq!(&instance, expected);
}

#[test]
fn test_defaults_are_ignored_without_the_option() {
    let validator = jsonsafe::validator_for(&json!({"properties": {"a": {"default": 1}}}))
        .expect("Valid schema");
    let mut instance = json!({});
    assert!(validator.validate_mut(&mut instance).valid);
    assert_eq!(instance, json!({}));
}

#[test]
fn test_defaults_are_validated() {
    let validator = defaults()
        .build(&json!({"properties": {"a": {"type": "integer", "default": "one"}}}))
        .expect("Valid schema");
    let mut instance = json!({});
    let output = validator.validate_mut(&mut instance);
    assert!(!output.valid);
    assert_eq!(output.errors[0].instance_location.as_str(), "/a");
}

#[test_case(
    &json!({"properties": {"a": true}, "additionalProperties": false}),
    json!({"a": 1, "b": 2, "c": 3}),
    &json!({"a": 1});
    "object"
)]
#[test_case(
    &json!({"properties": {"a": true}, "patternProperties": {"^x-": true}, "additionalProperties": false}),
    json!({"a": 1, "x-b": 2, "c": 3}),
    &json!({"a": 1, "x-b": 2});
    "pattern properties are listed"
)]
#[test_case(
    &json!({"properties": {"inner": {"properties": {"a": true}, "additionalProperties": false}}}),
    json!({"inner": {"a": 1, "b": 2}, "other": 3}),
    &json!({"inner": {"a": 1}, "other": 3});
    "nested object"
)]
#[test_case(
    &json!({"prefixItems": [true, true], "items": false}),
    json!([1, 2, 3, 4]),
    &json!([1, 2]);
    "array"
)]
#[test_case(
    &json!({"$schema": "http://json-schema.org/draft-07/schema#", "items": [true], "additionalItems": false}),
    json!([1, 2]),
    &json!([1]);
    "draft 7 array"
)]
fn test_remove_unlisted(schema: &Value, mut instance: Value, expected: &Value) {
    let validator = unlisted().build(schema).expect("Valid schema");
    assert!(validator.validate_mut(&mut instance).valid);
    assert_eq!(&instance, expected);
}

#[test]
fn test_unlisted_members_fail_without_removal() {
    let validator =
        jsonsafe::validator_for(&json!({"properties": {"a": true}, "additionalProperties": false}))
            .expect("Valid schema");
    let mut instance = json!({"a": 1, "b": 2});
    assert!(!validator.validate_mut(&mut instance).valid);
    assert_eq!(instance, json!({"a": 1, "b": 2}));
}

#[test_case(&json!({"anyOf": [{"properties": {"a": {"default": 1}}}, true]}); "any of")]
#[test_case(&json!({"oneOf": [{"properties": {"a": {"default": 1}}}, false]}); "one of")]
#[test_case(&json!({"not": {"properties": {"a": {"default": 1}}}}); "not")]
#[test_case(&json!({"if": true, "then": {"properties": {"a": {"default": 1}}}}); "then")]
#[test_case(&json!({"contains": {"properties": {"a": {"default": 1}}}}); "contains")]
#[test_case(&json!({"dependentSchemas": {"b": {"properties": {"a": {"default": 1}}}}}); "dependent schemas")]
fn test_conditional_defaults_are_rejected(schema: &Value) {
    assert!(jsonsafe::validator_for(schema).is_ok());
    assert!(matches!(
        defaults().build(schema),
        Err(CompileError::UnsupportedOption { .. })
    ));
}

#[test_case(&json!({"anyOf": [{"additionalProperties": false}, true]}); "any of")]
#[test_case(&json!({"if": {"prefixItems": [true], "items": false}}); "if")]
#[test_case(&json!({"else": true, "if": true, "then": {"additionalProperties": false}}); "then")]
fn test_conditional_removal_is_rejected(schema: &Value) {
    assert!(jsonsafe::validator_for(schema).is_ok());
    assert!(matches!(
        unlisted().build(schema),
        Err(CompileError::UnsupportedOption { .. })
    ));
}
