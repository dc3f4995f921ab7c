use serde_json::Value;

use crate::{
    compiler,
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    primitives::{deep_equal, Primitive},
    template::{format, Arg, SafeCode},
    validator::{Validate, ValidationContext},
};

pub(crate) struct EnumValidator {
    options: Value,
    items: Vec<Value>,
    location: Location,
}

/// Enum with only scalar options, matched without the deep comparison.
pub(crate) struct ScalarEnumValidator {
    options: Value,
    items: Vec<Value>,
    location: Location,
}

#[inline]
pub(crate) fn compile(ctx: &compiler::Context, value: &Value) -> CompilationResult {
    let Value::Array(items) = value else {
        return Err(
            CompileError::invalid_keyword(ctx.location(), "enum", value, "expected an array")
                .into(),
        );
    };
    if items.is_empty() {
        return Err(CompileError::invalid_keyword(
            ctx.location(),
            "enum",
            value,
            "expected a non-empty array",
        )
        .into());
    }
    let location = ctx.keyword_location("enum");
    let options = ctx.scope.constant("options", value)?;
    if items.iter().all(|item| !item.is_object() && !item.is_array() && !item.is_number()) {
        ctx.check(
            &format("!%s.includes(%s)", &[Arg::Code(&options), Arg::Code(ctx.data())])?,
            "enum",
        )?;
        return Ok(Box::new(ScalarEnumValidator {
            options: value.clone(),
            items: items.clone(),
            location,
        }));
    }
    let deep_equal = ctx.scope.primitive(Primitive::DeepEqual)?;
    let item: SafeCode = ctx.name("option")?;
    ctx.check(
        &format(
            "!%s.some((%s) => %s(%s, %s))",
            &[
                Arg::Code(&options),
                Arg::Code(&item),
                Arg::Code(&deep_equal),
                Arg::Code(ctx.data()),
                Arg::Code(&item),
            ],
        )?,
        "enum",
    )?;
    Ok(Box::new(EnumValidator {
        options: value.clone(),
        items: items.clone(),
        location,
    }))
}

impl Validate for EnumValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        self.items.iter().any(|item| deep_equal(instance, item))
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if self.is_valid(instance, ctx) {
            Ok(())
        } else {
            Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::Enum {
                    options: self.options.clone(),
                },
            ))
        }
    }
}

impl Validate for ScalarEnumValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        self.items.iter().any(|item| item == instance)
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if self.is_valid(instance, ctx) {
            Ok(())
        } else {
            Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                ValidationErrorKind::Enum {
                    options: self.options.clone(),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(["a", null, true]), &json!(null), true)]
    #[test_case(&json!(["a", null, true]), &json!("b"), false)]
    #[test_case(&json!([1, {"a": 1}]), &json!(1.0), true)]
    #[test_case(&json!([1, {"a": 1}]), &json!({"a": 1}), true)]
    #[test_case(&json!([1, {"a": 1}]), &json!({"a": 2}), false)]
    fn test_enum(options: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({ "enum": options })).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_empty_enum() {
        assert!(crate::validator_for(&json!({"enum": []})).is_err());
    }
}
