use jsonsafe_referencing::Draft;
use serde_json::{Number, Value};

use crate::{
    compiler::{self, CompileStop},
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::{helpers, BoxedValidator},
    paths::{LazyLocation, Location},
    primitives::compare_numbers,
    template::{format, Arg, CompareOp},
    validator::{Validate, ValidationContext},
};

/// Numeric limit keywords present on a schema.
pub(crate) struct Bounds<'a> {
    pub(crate) minimum: Option<&'a Value>,
    pub(crate) maximum: Option<&'a Value>,
    pub(crate) exclusive_minimum: Option<&'a Value>,
    pub(crate) exclusive_maximum: Option<&'a Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitKind {
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
}

impl LimitKind {
    /// Operator that holds when the instance is out of bounds.
    fn fails_on(self) -> CompareOp {
        match self {
            LimitKind::Minimum => CompareOp::Lt,
            LimitKind::ExclusiveMinimum => CompareOp::Le,
            LimitKind::Maximum => CompareOp::Gt,
            LimitKind::ExclusiveMaximum => CompareOp::Ge,
        }
    }
}

pub(crate) struct NumericLimit {
    limit: Number,
    kind: LimitKind,
    location: Location,
}

impl NumericLimit {
    fn build(
        ctx: &compiler::Context,
        keyword: &str,
        limit: &Number,
        kind: LimitKind,
    ) -> Result<BoxedValidator, CompileStop> {
        let value = limit.as_f64().unwrap_or(f64::NAN);
        ctx.check(
            &format(
                "%s %c %d",
                &[Arg::Code(ctx.data()), Arg::Compare(kind.fails_on()), Arg::Number(value)],
            )?,
            keyword,
        )?;
        Ok(Box::new(NumericLimit {
            limit: limit.clone(),
            kind,
            location: ctx.keyword_location(keyword),
        }))
    }

    fn error_kind(&self) -> ValidationErrorKind {
        let limit = Value::Number(self.limit.clone());
        match self.kind {
            LimitKind::Minimum => ValidationErrorKind::Minimum { limit },
            LimitKind::Maximum => ValidationErrorKind::Maximum { limit },
            LimitKind::ExclusiveMinimum => ValidationErrorKind::ExclusiveMinimum { limit },
            LimitKind::ExclusiveMaximum => ValidationErrorKind::ExclusiveMaximum { limit },
        }
    }
}

impl Validate for NumericLimit {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Number(item) = instance {
            !self.kind.fails_on().holds(compare_numbers(item, &self.limit))
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
                self.error_kind(),
            ))
        }
    }
}

/// Draft 4 `exclusiveMinimum` / `exclusiveMaximum` are booleans modifying their sibling.
fn legacy_flag(
    ctx: &compiler::Context,
    keyword: &str,
    value: Option<&Value>,
) -> Result<bool, CompileError> {
    match value {
        None | Some(Value::Bool(false)) => Ok(false),
        Some(Value::Bool(true)) => Ok(true),
        Some(value) => Err(CompileError::invalid_keyword(
            ctx.location(),
            keyword,
            value,
            "expected a boolean",
        )),
    }
}

pub(crate) fn compile(
    ctx: &compiler::Context,
    bounds: Bounds<'_>,
) -> Result<Vec<BoxedValidator>, CompileStop> {
    let mut validators = Vec::new();
    if ctx.draft == Draft::Draft4 {
        let exclusive_minimum = legacy_flag(ctx, "exclusiveMinimum", bounds.exclusive_minimum)?;
        let exclusive_maximum = legacy_flag(ctx, "exclusiveMaximum", bounds.exclusive_maximum)?;
        if let (Some(minimum), Some(maximum)) = (bounds.minimum, bounds.maximum) {
            helpers::check_range(ctx, ("minimum", minimum), ("maximum", maximum))?;
        }
        if let Some(minimum) = bounds.minimum {
            let limit = helpers::number(ctx, "minimum", minimum)?;
            let kind = if exclusive_minimum {
                LimitKind::ExclusiveMinimum
            } else {
                LimitKind::Minimum
            };
            validators.push(NumericLimit::build(ctx, "minimum", limit, kind)?);
        }
        if let Some(maximum) = bounds.maximum {
            let limit = helpers::number(ctx, "maximum", maximum)?;
            let kind = if exclusive_maximum {
                LimitKind::ExclusiveMaximum
            } else {
                LimitKind::Maximum
            };
            validators.push(NumericLimit::build(ctx, "maximum", limit, kind)?);
        }
        return Ok(validators);
    }
    if let (Some(minimum), Some(maximum)) = (bounds.minimum, bounds.maximum) {
        helpers::check_range(ctx, ("minimum", minimum), ("maximum", maximum))?;
    }
    if let (Some(minimum), Some(maximum)) = (bounds.exclusive_minimum, bounds.exclusive_maximum) {
        helpers::check_range(ctx, ("exclusiveMinimum", minimum), ("exclusiveMaximum", maximum))?;
    }
    for (keyword, value, kind) in [
        ("minimum", bounds.minimum, LimitKind::Minimum),
        ("exclusiveMinimum", bounds.exclusive_minimum, LimitKind::ExclusiveMinimum),
        ("maximum", bounds.maximum, LimitKind::Maximum),
        ("exclusiveMaximum", bounds.exclusive_maximum, LimitKind::ExclusiveMaximum),
    ] {
        if let Some(value) = value {
            let limit = helpers::number(ctx, keyword, value)?;
            validators.push(NumericLimit::build(ctx, keyword, limit, kind)?);
        }
    }
    Ok(validators)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    use crate::ValidationErrorKind;

    #[test_case(&json!({"minimum": 1}), &json!(1), true)]
    #[test_case(&json!({"minimum": 1}), &json!(0.5), false)]
    #[test_case(&json!({"exclusiveMinimum": 1}), &json!(1), false)]
    #[test_case(&json!({"maximum": 1.5}), &json!(2), false)]
    #[test_case(&json!({"exclusiveMaximum": 3}), &json!(2.99), true)]
    #[test_case(&json!({"maximum": 18_446_744_073_709_551_615_u64}), &json!(-1), true)]
    #[test_case(&json!({"minimum": 1}), &json!("0"), true)]
    fn test_limits(schema: &Value, instance: &Value, expected: bool) {
        let validator = crate::validator_for(schema).expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_legacy_exclusive() {
        let validator = crate::validator_for(&json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "minimum": 5,
            "exclusiveMinimum": true
        }))
        .expect("Valid schema");
        let instance = json!(5);
        let output = validator.validate(&instance);
        assert!(!output.valid);
        assert_eq!(
            output.errors[0].kind,
            ValidationErrorKind::ExclusiveMinimum { limit: json!(5) }
        );
        assert_eq!(output.errors[0].keyword_location.as_str(), "/minimum");
    }

    #[test]
    fn test_legacy_exclusive_requires_limit() {
        let schema =
            json!({"$schema": "http://json-schema.org/draft-04/schema#", "exclusiveMaximum": true});
        assert!(crate::validator_for(&schema).is_err());
    }
}
