//! `$ref`, `$recursiveRef` and `$dynamicRef`.
//!
//! Every reference target is compiled once into a subroutine of the validator. Recursive and
//! dynamic references pick the subroutine at runtime, from the resources entered so far.
use jsonsafe_referencing::split_fragment;
use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{CompileError, ErrorIterator, ValidationError},
    keywords::{ApplicatorResult, BoxedValidator},
    paths::{LazyLocation, Location},
    template::{format, Arg, SafeCode},
    validator::{Evaluated, Validate, ValidationContext},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Static(usize),
    /// The outermost resource with `$recursiveAnchor: true`, if the static target has one.
    Recursive(usize),
    /// The outermost resource defining the anchor, if the static target has it.
    Dynamic { anchor: String, fallback: usize },
}

pub(crate) struct RefValidator {
    route: Route,
}

fn subroutine_name(ctx: &compiler::Context, idx: usize) -> Result<SafeCode, CompileStop> {
    ctx.scope
        .subroutine_name(idx)
        .ok_or(CompileStop::Failed(CompileError::Internal("reference to an unknown subroutine")))
}

fn reference<'v>(
    ctx: &compiler::Context,
    keyword: &str,
    value: &'v Value,
) -> Result<&'v str, CompileError> {
    value.as_str().ok_or_else(|| {
        CompileError::invalid_keyword(ctx.location(), keyword, value, "expected a string")
    })
}

/// Resolve `reference` and compile its target.
fn target<'a>(
    ctx: &compiler::Context<'a>,
    keyword: &str,
    reference: &str,
) -> Result<(compiler::Target<'a>, usize, crate::tracer::EvaluationDelta), CompileStop> {
    let target = ctx.resolve(reference, keyword)?;
    let (idx, delta) = compiler::compile_subroutine(
        ctx.scope,
        &target,
        ctx.enclosing_properties(),
        ctx.enclosing_items(),
    )?;
    Ok((target, idx, delta))
}

pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, value: &'a Value) -> ApplicatorResult {
    let reference = reference(ctx, "$ref", value)?;
    let (_, idx, delta) = target(ctx, "$ref", reference)?;
    ctx.record_call(idx, "$ref")?;
    let name = subroutine_name(ctx, idx)?;
    ctx.check(
        &format("!%s(%s)", &[Arg::Code(&name), Arg::Code(ctx.data())])?,
        "$ref",
    )?;
    Ok((
        Box::new(RefValidator {
            route: Route::Static(idx),
        }),
        delta,
    ))
}

pub(crate) fn compile_recursive<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
) -> ApplicatorResult {
    let reference = reference(ctx, "$recursiveRef", value)?;
    if reference != "#" {
        return Err(CompileError::invalid_keyword(
            ctx.location(),
            "$recursiveRef",
            value,
            "only '#' is supported",
        )
        .into());
    }
    let (target, idx, delta) = target(ctx, "$recursiveRef", reference)?;
    let name = subroutine_name(ctx, idx)?;
    if target.value.get("$recursiveAnchor") == Some(&Value::Bool(true)) {
        ctx.scope.mark_dynamic();
        ctx.check(
            &format(
                "!(recursive ?? %s)(%s)",
                &[Arg::Code(&name), Arg::Code(ctx.data())],
            )?,
            "$recursiveRef",
        )?;
        Ok((
            Box::new(RefValidator {
                route: Route::Recursive(idx),
            }),
            delta.into_dynamic(),
        ))
    } else {
        ctx.record_call(idx, "$recursiveRef")?;
        ctx.check(
            &format("!%s(%s)", &[Arg::Code(&name), Arg::Code(ctx.data())])?,
            "$recursiveRef",
        )?;
        Ok((
            Box::new(RefValidator {
                route: Route::Static(idx),
            }),
            delta,
        ))
    }
}

pub(crate) fn compile_dynamic<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
) -> ApplicatorResult {
    let reference = reference(ctx, "$dynamicRef", value)?;
    let (target, idx, delta) = target(ctx, "$dynamicRef", reference)?;
    let name = subroutine_name(ctx, idx)?;
    let (_, fragment) = split_fragment(reference);
    let anchored = !fragment.is_empty()
        && !fragment.starts_with('/')
        && target.value.get("$dynamicAnchor").and_then(Value::as_str) == Some(fragment);
    if anchored {
        ctx.scope.mark_dynamic();
        let anchor = Value::String(fragment.to_string());
        ctx.check(
            &format(
                "!dynamicAnchor(%j, %s)(%s)",
                &[Arg::Literal(Some(&anchor)), Arg::Code(&name), Arg::Code(ctx.data())],
            )?,
            "$dynamicRef",
        )?;
        Ok((
            Box::new(RefValidator {
                route: Route::Dynamic {
                    anchor: fragment.to_string(),
                    fallback: idx,
                },
            }),
            delta.into_dynamic(),
        ))
    } else {
        ctx.record_call(idx, "$dynamicRef")?;
        ctx.check(
            &format("!%s(%s)", &[Arg::Code(&name), Arg::Code(ctx.data())])?,
            "$dynamicRef",
        )?;
        Ok((
            Box::new(RefValidator {
                route: Route::Static(idx),
            }),
            delta,
        ))
    }
}

impl RefValidator {
    /// Call the subroutine `idx` in place of a node compiled into it.
    pub(crate) fn to_subroutine(
        ctx: &compiler::Context,
        idx: usize,
        location: Location,
    ) -> Result<BoxedValidator, CompileStop> {
        let name = subroutine_name(ctx, idx)?;
        ctx.check_at(
            &format("!%s(%s)", &[Arg::Code(&name), Arg::Code(ctx.data())])?,
            &location,
        )?;
        Ok(Box::new(RefValidator {
            route: Route::Static(idx),
        }))
    }

    fn target(&self, ctx: &ValidationContext) -> usize {
        match &self.route {
            Route::Static(idx) => *idx,
            Route::Recursive(fallback) => ctx.recursive_target(*fallback),
            Route::Dynamic { anchor, fallback } => ctx.dynamic_target(anchor, *fallback),
        }
    }
}

impl Validate for RefValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        let node = ctx.subroutine(self.target(ctx));
        node.is_valid(instance, ctx)
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        let node = ctx.subroutine(self.target(ctx));
        node.validate(instance, location, ctx)
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        let node = ctx.subroutine(self.target(ctx));
        node.iter_errors(instance, location, ctx)
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        let node = ctx.subroutine(self.target(ctx));
        node.record(instance, ctx, evaluated);
    }

    fn normalize(&self, instance: &mut Value, ctx: &mut ValidationContext) {
        let node = ctx.subroutine(self.target(ctx));
        node.normalize(instance, ctx);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::CompileError;

    #[test_case(&json!({"a": 1}), true)]
    #[test_case(&json!({"a": "1"}), false)]
    #[test_case(&json!({"a": {"a": {"a": 1}}}), true)]
    #[test_case(&json!({"a": {"a": {"a": "x"}}}), false)]
    fn test_recursive_ref(instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({
            "properties": {"a": {"anyOf": [{"type": "integer"}, {"$ref": "#"}]}},
        }))
        .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_error_location_is_target_location() {
        let validator = crate::validator_for(&json!({
            "$defs": {"positive": {"minimum": 0}},
            "properties": {"a": {"$ref": "#/$defs/positive"}}
        }))
        .expect("Valid schema");
        let instance = json!({"a": -1});
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].keyword_location.as_str(), "/$defs/positive/minimum");
        assert_eq!(output.errors[0].instance_location.as_str(), "/a");
    }

    #[test]
    fn test_shared_subroutine() {
        let validator = crate::validator_for(&json!({
            "$defs": {"name": {"type": "string"}},
            "properties": {"a": {"$ref": "#/$defs/name"}, "b": {"$ref": "#/$defs/name"}}
        }))
        .expect("Valid schema");
        assert_eq!(validator.listing().matches("function ref0(data) {").count(), 1);
        assert!(!validator.is_valid(&json!({"b": 1})));
    }

    #[test]
    fn test_unresolvable() {
        let error = crate::validator_for(&json!({"$ref": "#/$defs/missing"}))
            .expect_err("Unresolvable");
        assert!(matches!(
            error,
            CompileError::UnresolvableReference { .. } | CompileError::Reference { .. }
        ));
    }

    #[test]
    fn test_external_document() {
        let validator = crate::options()
            .with_schema("https://example.com/name.json", json!({"type": "string"}))
            .build(&json!({"properties": {"name": {"$ref": "https://example.com/name.json"}}}))
            .expect("Valid schema");
        assert!(validator.is_valid(&json!({"name": "x"})));
        assert!(!validator.is_valid(&json!({"name": 1})));
    }

    #[test]
    fn test_recursive_anchor() {
        let tree = json!({
            "$schema": "https://json-schema.org/draft/2019-09/schema",
            "$id": "https://example.com/tree",
            "$recursiveAnchor": true,
            "type": "object",
            "properties": {"children": {"type": "array", "items": {"$recursiveRef": "#"}}}
        });
        let strict_tree = json!({
            "$schema": "https://json-schema.org/draft/2019-09/schema",
            "$id": "https://example.com/strict-tree",
            "$recursiveAnchor": true,
            "$ref": "tree",
            "unevaluatedProperties": false
        });
        let validator = crate::options()
            .with_schema("https://example.com/tree", tree)
            .build(&strict_tree)
            .expect("Valid schema");
        assert!(validator.is_valid(&json!({"children": [{"children": []}]})));
        assert!(!validator.is_valid(&json!({"children": [{"daat": 1}]})));
    }

    #[test]
    fn test_dynamic_ref() {
        let list = json!({
            "$id": "https://example.com/list",
            "$defs": {"item": {"$dynamicAnchor": "item"}},
            "type": "array",
            "items": {"$dynamicRef": "#item"}
        });
        let strings = json!({
            "$id": "https://example.com/strings",
            "$ref": "list",
            "$defs": {"item": {"$dynamicAnchor": "item", "type": "string"}}
        });
        let validator = crate::options()
            .with_schema("https://example.com/list", list)
            .build(&strings)
            .expect("Valid schema");
        assert!(validator.is_valid(&json!(["a", "b"])));
        assert!(!validator.is_valid(&json!(["a", 1])));
    }
}
