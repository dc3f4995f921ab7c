use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{ValidationError, ValidationErrorKind},
    keywords::{helpers, BoxedValidator},
    paths::{LazyLocation, Location},
    primitives::{string_length, Primitive},
    template::{format, Arg, CompareOp},
    validator::{Validate, ValidationContext},
};

/// `minLength` or `maxLength`, counted in code points.
pub(crate) struct StringLengthValidator {
    limit: u64,
    maximum: bool,
    location: Location,
}

impl StringLengthValidator {
    #[allow(clippy::cast_precision_loss)]
    fn build(
        ctx: &compiler::Context,
        keyword: &str,
        limit: u64,
        maximum: bool,
    ) -> Result<BoxedValidator, CompileStop> {
        let length = ctx.scope.primitive(Primitive::StringLength)?;
        let op = if maximum { CompareOp::Gt } else { CompareOp::Lt };
        ctx.check(
            &format(
                "%s(%s) %c %d",
                &[
                    Arg::Code(&length),
                    Arg::Code(ctx.data()),
                    Arg::Compare(op),
                    Arg::Number(limit as f64),
                ],
            )?,
            keyword,
        )?;
        Ok(Box::new(StringLengthValidator {
            limit,
            maximum,
            location: ctx.keyword_location(keyword),
        }))
    }
}

pub(crate) fn compile(
    ctx: &compiler::Context,
    min_length: Option<&Value>,
    max_length: Option<&Value>,
) -> Result<Vec<BoxedValidator>, CompileStop> {
    if let (Some(min), Some(max)) = (min_length, max_length) {
        helpers::check_range(ctx, ("minLength", min), ("maxLength", max))?;
    }
    let mut validators = Vec::new();
    if let Some(value) = min_length {
        let limit = helpers::non_negative_integer(ctx, "minLength", value)?;
        if limit > 0 {
            validators.push(StringLengthValidator::build(ctx, "minLength", limit, false)?);
        }
    }
    if let Some(value) = max_length {
        let limit = helpers::non_negative_integer(ctx, "maxLength", value)?;
        validators.push(StringLengthValidator::build(ctx, "maxLength", limit, true)?);
    }
    Ok(validators)
}

impl Validate for StringLengthValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::String(item) = instance {
            // Byte length bounds the code point count from above.
            if self.maximum && (item.len() as u64) <= self.limit {
                return true;
            }
            let length = string_length(item);
            if self.maximum {
                length <= self.limit
            } else {
                length >= self.limit
            }
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
            return Ok(());
        }
        let kind = if self.maximum {
            ValidationErrorKind::MaxLength { limit: self.limit }
        } else {
            ValidationErrorKind::MinLength { limit: self.limit }
        };
        Err(ValidationError::new(
            self.location.clone(),
            location.materialize(),
            instance,
            kind,
        ))
    }
}
