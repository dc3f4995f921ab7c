use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{ValidationError, ValidationErrorKind},
    keywords::{helpers, BoxedValidator},
    paths::{LazyLocation, Location},
    template::{format, Arg, CompareOp},
    validator::{Validate, ValidationContext},
};

pub(crate) struct MinItemsValidator {
    limit: u64,
    location: Location,
}

pub(crate) struct MaxItemsValidator {
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
            "%s.length %c %d",
            &[Arg::Code(ctx.data()), Arg::Compare(op), Arg::Number(limit as f64)],
        )?,
        keyword,
    )?;
    Ok(())
}

pub(crate) fn compile(
    ctx: &compiler::Context,
    min_items: Option<&Value>,
    max_items: Option<&Value>,
) -> Result<Vec<BoxedValidator>, CompileStop> {
    if let (Some(min), Some(max)) = (min_items, max_items) {
        helpers::check_range(ctx, ("minItems", min), ("maxItems", max))?;
    }
    let mut validators: Vec<BoxedValidator> = Vec::new();
    if let Some(value) = min_items {
        let limit = helpers::non_negative_integer(ctx, "minItems", value)?;
        if limit > 0 {
            check(ctx, "minItems", CompareOp::Lt, limit)?;
            validators.push(Box::new(MinItemsValidator {
                limit,
                location: ctx.keyword_location("minItems"),
            }));
        }
    }
    if let Some(value) = max_items {
        let limit = helpers::non_negative_integer(ctx, "maxItems", value)?;
        check(ctx, "maxItems", CompareOp::Gt, limit)?;
        validators.push(Box::new(MaxItemsValidator {
            limit,
            location: ctx.keyword_location("maxItems"),
        }));
    }
    Ok(validators)
}

impl Validate for MinItemsValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Array(items) = instance {
            items.len() as u64 >= self.limit
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
                ValidationErrorKind::MinItems { limit: self.limit },
            ))
        }
    }
}

impl Validate for MaxItemsValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Array(items) = instance {
            items.len() as u64 <= self.limit
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
                ValidationErrorKind::MaxItems { limit: self.limit },
            ))
        }
    }
}
