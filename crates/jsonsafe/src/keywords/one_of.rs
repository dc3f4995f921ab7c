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

pub(crate) struct OneOfValidator {
    schemas: Vec<SchemaNode>,
    location: Location,
}

fn count_passing(names: &[SafeCode]) -> Result<SafeCode, compiler::CompileStop> {
    let mut names = names.iter();
    let Some(first) = names.next() else {
        return Ok(format("0", &[])?);
    };
    let mut sum = format("+%s", &[Arg::Code(first)])?;
    for name in names {
        sum = format("%s + %s", &[Arg::Code(&sum), Arg::Code(name)])?;
    }
    Ok(sum)
}

#[inline]
pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, value: &'a Value) -> ApplicatorResult {
    let branches = compiler::compile_alternatives(ctx, "oneOf", value)?;
    let (names, compiled): (Vec<_>, Vec<_>) = branches.into_iter().unzip();
    ctx.check(
        &format("%s !== 1", &[Arg::Code(&count_passing(&names)?)])?,
        "oneOf",
    )?;
    let delta = compiler::any_delta(compiled.iter().map(|compiled| &compiled.delta));
    Ok((
        Box::new(OneOfValidator {
            schemas: compiled.into_iter().map(|compiled| compiled.node).collect(),
            location: ctx.keyword_location("oneOf"),
        }),
        delta,
    ))
}

impl OneOfValidator {
    /// Index of the first passing branch.
    fn first_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> Option<usize> {
        self.schemas
            .iter()
            .position(|schema| schema.is_valid(instance, ctx))
    }

    fn are_others_valid(&self, instance: &Value, idx: usize, ctx: &mut ValidationContext) -> bool {
        self.schemas
            .iter()
            .skip(idx + 1)
            .any(|schema| schema.is_valid(instance, ctx))
    }

    fn error<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        kind: ValidationErrorKind,
    ) -> ValidationError<'i> {
        ValidationError::new(self.location.clone(), location.materialize(), instance, kind)
    }
}

impl Validate for OneOfValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        match self.first_valid(instance, ctx) {
            Some(idx) => !self.are_others_valid(instance, idx, ctx),
            None => false,
        }
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        match self.first_valid(instance, ctx) {
            Some(idx) if self.are_others_valid(instance, idx, ctx) => Err(self.error(
                instance,
                location,
                ValidationErrorKind::OneOfMultipleValid,
            )),
            Some(_) => Ok(()),
            None => Err(self.error(instance, location, ValidationErrorKind::OneOfNotValid)),
        }
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        match self.first_valid(instance, ctx) {
            Some(idx) if self.are_others_valid(instance, idx, ctx) => {
                Box::new(std::iter::once(self.error(
                    instance,
                    location,
                    ValidationErrorKind::OneOfMultipleValid,
                )))
            }
            Some(_) => no_error(),
            None => {
                let mut errors: Vec<_> = self
                    .schemas
                    .iter()
                    .flat_map(|schema| schema.iter_errors(instance, location, ctx))
                    .collect();
                errors.push(self.error(instance, location, ValidationErrorKind::OneOfNotValid));
                Box::new(errors.into_iter())
            }
        }
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        if let Some(idx) = self.first_valid(instance, ctx) {
            self.schemas[idx].record(instance, ctx, evaluated);
        }
    }
}
