use std::sync::Arc;

use serde_json::Value;

use crate::{
    compiler,
    error::{CompileError, ValidationError, ValidationErrorKind},
    keywords::CompilationResult,
    paths::{LazyLocation, Location},
    regex::CompiledRegex,
    template::{format, Arg, SafeCode},
    validator::{Validate, ValidationContext},
};

pub(crate) struct PatternValidator {
    regex: Arc<CompiledRegex>,
    location: Location,
}

/// Compile a schema-provided regex through the scope, so equal patterns share one instance.
pub(crate) fn regex(
    ctx: &compiler::Context,
    pattern: &str,
    location: Location,
) -> Result<(SafeCode, Arc<CompiledRegex>), CompileError> {
    ctx.scope.regex(pattern).map_err(|error| CompileError::InvalidRegex {
        pattern: pattern.to_string(),
        location,
        message: error.to_string(),
    })
}

#[inline]
pub(crate) fn compile(ctx: &compiler::Context, value: &Value) -> CompilationResult {
    let Value::String(pattern) = value else {
        return Err(
            CompileError::invalid_keyword(ctx.location(), "pattern", value, "expected a string")
                .into(),
        );
    };
    let location = ctx.keyword_location("pattern");
    let (name, regex) = regex(ctx, pattern, location.clone())?;
    ctx.check(
        &format("!%s.test(%s)", &[Arg::Code(&name), Arg::Code(ctx.data())])?,
        "pattern",
    )?;
    Ok(Box::new(PatternValidator { regex, location }))
}

impl Validate for PatternValidator {
    fn is_valid(&self, instance: &Value, _ctx: &mut ValidationContext) -> bool {
        if let Value::String(item) = instance {
            self.regex.is_match(item).unwrap_or(false)
        } else {
            true
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        _ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        if let Value::String(item) = instance {
            let kind = match self.regex.is_match(item) {
                Ok(true) => return Ok(()),
                Ok(false) => ValidationErrorKind::Pattern {
                    pattern: self.regex.source().to_string(),
                },
                Err(error) => ValidationErrorKind::BacktrackLimit {
                    message: error.to_string(),
                },
            };
            return Err(ValidationError::new(
                self.location.clone(),
                location.materialize(),
                instance,
                kind,
            ));
        }
        Ok(())
    }
}
