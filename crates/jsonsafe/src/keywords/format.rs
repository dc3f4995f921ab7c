//! Validator for `format` keyword.
use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{CompileError, ValidationError, ValidationErrorKind},
    formats::{lookup, FormatCheck},
    keywords::BoxedValidator,
    paths::{LazyLocation, Location},
    template::{format, Arg},
    validator::{Validate, ValidationContext},
};

pub(crate) struct FormatValidator {
    format: String,
    check: FormatCheck,
    location: Location,
}

/// `None` when the format is unknown and the mode allows ignoring it.
#[inline]
pub(crate) fn compile(
    ctx: &compiler::Context,
    value: &Value,
) -> Result<Option<BoxedValidator>, CompileStop> {
    let Value::String(name) = value else {
        return Err(
            CompileError::invalid_keyword(ctx.location(), "format", value, "expected a string")
                .into(),
        );
    };
    let location = ctx.keyword_location("format");
    let Some(check) = lookup(name, ctx.options()) else {
        if ctx.options().mode.is_permissive() {
            tracing::debug!(
                format = name.as_str(),
                location = %location,
                "Ignoring unknown format"
            );
            return Ok(None);
        }
        return Err(CompileError::UnknownFormat {
            format: name.clone(),
            location,
        }
        .into());
    };
    ctx.check(
        &format(
            "!formats[%j](%s)",
            &[Arg::Literal(Some(value)), Arg::Code(ctx.data())],
        )?,
        "format",
    )?;
    Ok(Some(Box::new(FormatValidator {
        format: name.clone(),
        check,
        location,
    })))
}

impl Validate for FormatValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::String(item) = instance {
            self.check.is_match(item)
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
                ValidationErrorKind::Format {
                    format: self.format.clone(),
                },
            ))
        }
    }
}
