use serde_json::Value;

use crate::{
    compiler,
    error::{no_error, ErrorIterator, ValidationError},
    keywords::ApplicatorResult,
    node::SchemaNode,
    paths::LazyLocation,
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

pub(crate) struct AllOfValidator {
    schemas: Vec<SchemaNode>,
}

#[inline]
pub(crate) fn compile<'a>(ctx: &compiler::Context<'a>, value: &'a Value) -> ApplicatorResult {
    let compiled = compiler::compile_all(ctx, "allOf", value)?;
    let delta = compiled
        .iter()
        .fold(EvaluationDelta::neutral(), |delta, compiled| delta.and(&compiled.delta));
    Ok((
        Box::new(AllOfValidator {
            schemas: compiled.into_iter().map(|compiled| compiled.node).collect(),
        }),
        delta,
    ))
}

impl Validate for AllOfValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        self.schemas.iter().all(|schema| schema.is_valid(instance, ctx))
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        for schema in &self.schemas {
            schema.validate(instance, location, ctx)?;
        }
        Ok(())
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        let errors: Vec<_> = self
            .schemas
            .iter()
            .flat_map(|schema| schema.iter_errors(instance, location, ctx))
            .collect();
        if errors.is_empty() {
            no_error()
        } else {
            Box::new(errors.into_iter())
        }
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        for schema in &self.schemas {
            schema.record(instance, ctx, evaluated);
        }
    }

    fn normalize(&self, instance: &mut Value, ctx: &mut ValidationContext) {
        for schema in &self.schemas {
            schema.normalize(instance, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(5), true)]
    #[test_case(&json!(0), false)]
    #[test_case(&json!(50), false)]
    fn test_all_of(instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({"allOf": [{"minimum": 1}, {"maximum": 10}]}))
            .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_defaults_are_applied_through_all_of() {
        let validator = crate::options()
            .should_apply_defaults(true)
            .build(&json!({"allOf": [{"properties": {"a": {"default": 1}}}]}))
            .expect("Valid schema");
        let mut instance = json!({});
        assert!(validator.validate_mut(&mut instance).valid);
        assert_eq!(instance, json!({"a": 1}));
    }
}
