//! `dependencies`, `dependentRequired` and `dependentSchemas`.
use serde_json::Value;

use crate::{
    compiler::{self, CompileStop},
    error::{no_error, CompileError, ErrorIterator, ValidationError, ValidationErrorKind},
    keywords::{helpers, required::write_checks, ApplicatorResult, BoxedValidator},
    node::SchemaNode,
    paths::{LazyLocation, Location},
    regex::pattern_matches,
    template::{format, Arg},
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

enum Dependency {
    Required(Vec<String>, Location),
    Schema(SchemaNode),
}

pub(crate) struct DependenciesValidator {
    dependencies: Vec<(String, Dependency)>,
}

enum Allowed {
    Required,
    Schemas,
    Both,
}

fn compile_entries<'a>(
    ctx: &compiler::Context<'a>,
    keyword: &str,
    value: &'a Value,
    allowed: &Allowed,
) -> Result<(DependenciesValidator, EvaluationDelta), CompileStop> {
    let Value::Object(map) = value else {
        return Err(
            CompileError::invalid_keyword(ctx.location(), keyword, value, "expected an object")
                .into(),
        );
    };
    let keyword_ctx = ctx.new_at_location(keyword);
    let mut dependencies = Vec::with_capacity(map.len());
    let mut delta = EvaluationDelta::neutral();
    for (property, dependency) in map {
        let open = format(
            "if (%s !== undefined) {",
            &[Arg::Code(&ctx.property_data(property)?)],
        )?;
        let entry = ctx.block(&open, || -> Result<Dependency, CompileStop> {
            Ok(match (dependency, allowed) {
                (Value::Array(_), Allowed::Required | Allowed::Both) => {
                    let names = helpers::string_list(&keyword_ctx, property, dependency)?;
                    write_checks(&keyword_ctx, &names, property)?;
                    Dependency::Required(
                        names.iter().map(|name| (*name).to_string()).collect(),
                        keyword_ctx.keyword_location(property),
                    )
                }
                (_, Allowed::Schemas | Allowed::Both) => {
                    let child = keyword_ctx.new_at_location(property).as_conditional();
                    let compiled = compiler::compile(&child, dependency)?;
                    delta.apply(&EvaluationDelta::neutral().or(&compiled.delta, &pattern_matches));
                    Dependency::Schema(compiled.node)
                }
                (_, Allowed::Required) => {
                    return Err(CompileError::invalid_keyword(
                        keyword_ctx.location(),
                        property,
                        dependency,
                        "expected an array of strings",
                    )
                    .into())
                }
            })
        })?;
        dependencies.push((property.clone(), entry));
    }
    Ok((DependenciesValidator { dependencies }, delta))
}

/// Draft 4 to 7 `dependencies`: arrays of names or schemas.
pub(crate) fn compile_dependencies<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
) -> ApplicatorResult {
    let (validator, delta) = compile_entries(ctx, "dependencies", value, &Allowed::Both)?;
    Ok((Box::new(validator), delta))
}

pub(crate) fn compile_dependent_required<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
) -> Result<BoxedValidator, CompileStop> {
    let (validator, _) = compile_entries(ctx, "dependentRequired", value, &Allowed::Required)?;
    Ok(Box::new(validator))
}

pub(crate) fn compile_dependent_schemas<'a>(
    ctx: &compiler::Context<'a>,
    value: &'a Value,
) -> ApplicatorResult {
    let (validator, delta) = compile_entries(ctx, "dependentSchemas", value, &Allowed::Schemas)?;
    Ok((Box::new(validator), delta))
}

fn missing<'i>(
    instance: &'i Value,
    location: &LazyLocation,
    required: &[String],
    keyword_location: &Location,
) -> impl Iterator<Item = ValidationError<'i>> {
    let map = instance.as_object();
    let location = location.materialize();
    let keyword_location = keyword_location.clone();
    required
        .iter()
        .filter(move |name| map.is_some_and(|map| !map.contains_key(*name)))
        .map(move |name| {
            ValidationError::new(
                keyword_location.clone(),
                location.clone(),
                instance,
                ValidationErrorKind::Required {
                    property: name.clone(),
                },
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
}

impl Validate for DependenciesValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        let Value::Object(map) = instance else {
            return true;
        };
        self.dependencies
            .iter()
            .filter(|(property, _)| map.contains_key(property))
            .all(|(_, dependency)| match dependency {
                Dependency::Required(required, _) => {
                    required.iter().all(|name| map.contains_key(name))
                }
                Dependency::Schema(node) => node.is_valid(instance, ctx),
            })
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        let Value::Object(map) = instance else {
            return Ok(());
        };
        for (property, dependency) in &self.dependencies {
            if !map.contains_key(property) {
                continue;
            }
            match dependency {
                Dependency::Required(required, keyword_location) => {
                    if let Some(error) =
                        missing(instance, location, required, keyword_location).next()
                    {
                        return Err(error);
                    }
                }
                Dependency::Schema(node) => node.validate(instance, location, ctx)?,
            }
        }
        Ok(())
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        let Value::Object(map) = instance else {
            return no_error();
        };
        let mut errors = Vec::new();
        for (property, dependency) in &self.dependencies {
            if !map.contains_key(property) {
                continue;
            }
            match dependency {
                Dependency::Required(required, keyword_location) => {
                    errors.extend(missing(instance, location, required, keyword_location));
                }
                Dependency::Schema(node) => {
                    errors.extend(node.iter_errors(instance, location, ctx));
                }
            }
        }
        Box::new(errors.into_iter())
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        let Value::Object(map) = instance else {
            return;
        };
        for (property, dependency) in &self.dependencies {
            if let (true, Dependency::Schema(node)) = (map.contains_key(property), dependency) {
                node.record(instance, ctx, evaluated);
            }
        }
    }
}
