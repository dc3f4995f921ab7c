use serde_json::Value;

use crate::{
    compiler,
    error::{no_error, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::ApplicatorResult,
    node::SchemaNode,
    paths::{LazyLocation, Location},
    template::{format, Arg, SafeCode},
    validator::{Evaluated, Validate, ValidationContext},
};

pub(crate) struct AnyOfValidator {
    schemas: Vec<SchemaNode>,
    location: Location,
}

/// `a || b || ...` over the outcome identifiers of the branches.
pub(crate) fn disjunction(names: &[SafeCode]) -> Result<SafeCode, compiler::CompileStop> {
    let mut names = names.iter();
    let Some(first) = names.next() else {
        return Ok(format("false", &[])?);
    };
    let mut condition = first.clone();
    for name in names {
        condition = format("%s || %s", &[Arg::Code(&condition), Arg::Code(name)])?;
    }
    Ok(condition)
}

#[inline]
pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, value: &'a Value) -> ApplicatorResult {
    let branches = compiler::compile_alternatives(ctx, "anyOf", value)?;
    let (names, compiled): (Vec<_>, Vec<_>) = branches.into_iter().unzip();
    ctx.check(&format("!(%s)", &[Arg::Code(&disjunction(&names)?)])?, "anyOf")?;
    let delta = compiler::any_delta(compiled.iter().map(|compiled| &compiled.delta));
    Ok((
        Box::new(AnyOfValidator {
            schemas: compiled.into_iter().map(|compiled| compiled.node).collect(),
            location: ctx.keyword_location("anyOf"),
        }),
        delta,
    ))
}

impl AnyOfValidator {
    fn error<'i>(&self, instance: &'i Value, location: &LazyLocation) -> ValidationError<'i> {
        ValidationError::new(
            self.location.clone(),
            location.materialize(),
            instance,
            ValidationErrorKind::AnyOf,
        )
    }
}

impl Validate for AnyOfValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        self.schemas.iter().any(|schema| schema.is_valid(instance, ctx))
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
            Err(self.error(instance, location))
        }
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        if self.is_valid(instance, ctx) {
            return no_error();
        }
        let mut errors: Vec<_> = self
            .schemas
            .iter()
            .flat_map(|schema| schema.iter_errors(instance, location, ctx))
            .collect();
        errors.push(self.error(instance, location));
        Box::new(errors.into_iter())
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        for schema in &self.schemas {
            if schema.is_valid(instance, ctx) {
                schema.record(instance, ctx, evaluated);
            }
        }
    }
}
