use serde_json::{Number, Value};

use crate::{
    compiler,
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    primitives::{is_multiple_of, Primitive},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct MultipleOfValidator {
    multiple_of: Number,
    location: Location,
}

#[inline]
pub(crate) fn compile(ctx: &compiler::Context, value: &Value) -> CompilationResult {
    let positive = value.as_f64().is_some_and(|number| number > 0.0);
    let Value::Number(multiple_of) = value else {
        return Err(CompileError::invalid_keyword(
            ctx.location(),
            "multipleOf",
            value,
            "expected a number",
        )
        .into());
    };
    if !positive {
        return Err(CompileError::invalid_keyword(
            ctx.location(),
            "multipleOf",
            value,
            "expected a positive number",
        )
        .into());
    }
    let primitive = ctx.scope.primitive(Primitive::IsMultipleOf)?;
    ctx.check(
        &format(
            "!%s(%s, %d)",
            &[
                Arg::Code(&primitive),
                Arg::Code(ctx.data()),
                Arg::Number(value.as_f64().unwrap_or(f64::NAN)),
            ],
        )?,
        "multipleOf",
    )?;
    Ok(Box::new(MultipleOfValidator {
        multiple_of: multiple_of.clone(),
        location: ctx.keyword_location("multipleOf"),
    }))
}

impl Validate for MultipleOfValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Number(item) = instance {
            is_multiple_of(item, &self.multiple_of)
        } else {
            true
        }
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
                ValidationErrorKind::MultipleOf {
                    multiple_of: Value::Number(self.multiple_of.clone()),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(2), &json!(4), true)]
    #[test_case(&json!(0.1), &json!(0.3), true)]
    #[test_case(&json!(0.5), &json!(1.7), false)]
    #[test_case(&json!(3), &json!(7), false)]
    #[test_case(&json!(3), &json!("7"), true)]
    fn test_multiple_of(multiple_of: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({ "multipleOf": multiple_of }))
            .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test_case(&json!(0))]
    #[test_case(&json!(-2))]
    #[test_case(&json!("2"))]
    fn test_invalid(multiple_of: &Value) {
        assert!(crate::validator_for(&json!({ "multipleOf": multiple_of })).is_err());
    }
}
