use serde_json::Value;

use crate::{
    compiler,
    error::{ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    primitives::{deep_equal, Primitive},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct ConstValidator {
    value: Value,
    location: Location,
}

#[inline]
pub(crate) fn compile(ctx: &compiler::Context, value: &Value) -> CompilationResult {
    let condition = if value.is_object() || value.is_array() {
        let deep_equal = ctx.scope.primitive(Primitive::DeepEqual)?;
        let expected = ctx.scope.constant("constant", value)?;
        format(
            "!%s(%s, %s)",
            &[Arg::Code(&deep_equal), Arg::Code(ctx.data()), Arg::Code(&expected)],
        )?
    } else {
        format("%s !== %j", &[Arg::Code(ctx.data()), Arg::Literal(Some(value))])?
    };
    ctx.check(&condition, "const")?;
    Ok(Box::new(ConstValidator {
        value: value.clone(),
        location: ctx.keyword_location("const"),
    }))
}

impl Validate for ConstValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        deep_equal(&self.value, instance)
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
                ValidationErrorKind::Constant {
                    expected_value: self.value.clone(),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(1), &json!(1.0), true)]
    #[test_case(&json!({"a": [1, 2]}), &json!({"a": [1, 2.0]}), true)]
    #[test_case(&json!([1, 2]), &json!([2, 1]), false)]
    #[test_case(&json!(null), &json!(false), false)]
    fn test_const(value: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({ "const": value })).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }
}
