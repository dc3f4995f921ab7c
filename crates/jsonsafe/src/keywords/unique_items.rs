use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::BoxedValidator,
    paths::{LazyLocation, Location},
    primitives::{has_duplicates, Primitive},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct UniqueItemsValidator {
    location: Location,
}

/// `uniqueItems: false` asserts nothing.
#[inline]
pub(crate) fn compile(
    ctx: &compiler::Context,
    value: &Value,
) -> Result<Option<BoxedValidator>, CompileStop> {
    match value {
        Value::Bool(true) => {
            let primitive = ctx.scope.primitive(Primitive::HasDuplicates)?;
            ctx.check(
                &format("%s(%s)", &[Arg::Code(&primitive), Arg::Code(ctx.data())])?,
                "uniqueItems",
            )?;
            Ok(Some(Box::new(UniqueItemsValidator {
                location: ctx.keyword_location("uniqueItems"),
            })))
        }
        Value::Bool(false) => Ok(None),
        _ => Err(CompileError::invalid_keyword(
            ctx.location(),
            "uniqueItems",
            value,
            "expected a boolean",
        )
        .into()),
    }
}

impl Validate for UniqueItemsValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::Array(items) = instance {
            !has_duplicates(items)
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
                ValidationErrorKind::UniqueItems,
            ))
        }
    }
}
