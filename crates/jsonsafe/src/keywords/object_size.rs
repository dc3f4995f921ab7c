use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{ValidationError, ValidationErrorKind},
    keywords::{helpers, BoxedValidator},
    paths::{LazyLocation, Location},
    template::{format, Arg, CompareOp},
    validator::{Validate, ValidationContext},
};

pub(crate) struct MinPropertiesValidator {
    limit: u64,
    location: Location,
}

pub(crate) struct MaxPropertiesValidator {
    limit: u64,
    location: Location,
}

#[allow(clippy::cast_precision_loss)]
fn check(
    ctx: &compiler::Context,
    keyword: &str,
    op: CompareOp,
    limit: u64,
) -> Result<(), CompileStop> {
    ctx.check(
        &format(
            "Object.keys(%s).length %c %d",
            &[Arg::Code(ctx.data()), Arg::Compare(op), Arg::Number(limit as f64)],
        )?,
        keyword,
    )?;
    Ok(())
}

pub(crate) fn compile(
    ctx: &compiler::Context,
    min_properties: Option<&Value>,
    max_properties: Option<&Value>,
) -> Result<Vec<BoxedValidator>, CompileStop> {
    if let (Some(min), Some(max)) = (min_properties, max_properties) {
        helpers::check_range(ctx, ("minProperties", min), ("maxProperties", max))?;
    }
    let mut validators: Vec<BoxedValidator> = Vec::new();
    if let Some(value) = min_properties {
        let limit = helpers::non_negative_integer(ctx, "minProperties", value)?;
        if limit > 0 {
            check(ctx, "minProperties", CompareOp::Lt, limit)?;
            validators.push(Box::new(MinPropertiesValidator {
                limit,
                location: ctx.keyword_location("minProperties"),
            }));
        }
    }
    if let Some(value) = max_properties {
        let limit = helpers::non_negative_integer(ctx, "maxProperties", value)?;
        check(ctx, "maxProperties", CompareOp::Gt, limit)?;
        validators.push(Box::new(MaxPropertiesValidator {
            limit,
            location: ctx.keyword_location("maxProperties"),
        }));
    }
    Ok(validators)
}

impl Validate for MinPropertiesValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Object(map) = instance {
            map.len() as u64 >= self.limit
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
                ValidationErrorKind::MinProperties { limit: self.limit },
            ))
        }
    }
}

impl Validate for MaxPropertiesValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Object(map) = instance {
            map.len() as u64 <= self.limit
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
                ValidationErrorKind::MaxProperties { limit: self.limit },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!({"minProperties": 1}), &json!({}), false)]
    #[test_case(&json!({"minProperties": 1}), &json!({"a": 1}), true)]
    #[test_case(&json!({"maxProperties": 1}), &json!({"a": 1, "b": 2}), false)]
    #[test_case(&json!({"maxProperties": 0}), &json!([1, 2]), true)]
    fn test_object_size(schema: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(schema).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_inverted_range() {
        assert!(crate::validator_for(&json!({"minProperties": 3, "maxProperties": 1})).is_err());
    }
}
