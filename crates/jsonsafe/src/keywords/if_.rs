//! `if` / `then` / `else`.
use serde_json::Value;

use crate::{
    compiler,
    error::{no_error, ErrorIterator, ValidationError},
    keywords::ApplicatorResult,
    node::SchemaNode,
    paths::LazyLocation,
    regex::pattern_matches,
    template::{format, Arg},
    tracer::EvaluationDelta,
    validator::{Evaluated, Validate, ValidationContext},
};

pub(crate) struct IfThenElseValidator {
    schema: SchemaNode,
    then_schema: Option<SchemaNode>,
    else_schema: Option<SchemaNode>,
}

pub(crate) fn compile<'a>(
    ctx: &compiler::Context<'a>,
    schema: &'a Value,
    then_schema: Option<&'a Value>,
    else_schema: Option<&'a Value>,
) -> ApplicatorResult {
    let if_ctx = ctx.new_at_location("if").as_conditional();
    let (ok, condition) = ctx.subcheck(|| compiler::compile(&if_ctx, schema))?;
    let branch = |keyword: &str,
                  value: Option<&'a Value>,
                  guard: &str|
     -> Result<_, compiler::CompileStop> {
        let Some(value) = value else {
            return Ok(None);
        };
        let compiled = ctx.block(&format(guard, &[Arg::Code(&ok)])?, || {
            compiler::compile(&ctx.new_at_location(keyword).as_conditional(), value)
        })?;
        Ok(Some(compiled))
    };
    let then_compiled = branch("then", then_schema, "if (%s) {")?;
    let else_compiled = branch("else", else_schema, "if (!%s) {")?;
    let passing = match &then_compiled {
        Some(then_compiled) => condition.delta.and(&then_compiled.delta),
        None => condition.delta.clone(),
    };
    let failing = else_compiled
        .as_ref()
        .map_or_else(EvaluationDelta::neutral, |compiled| compiled.delta.clone());
    let delta = passing.or(&failing, &pattern_matches);
    Ok((
        Box::new(IfThenElseValidator {
            schema: condition.node,
            then_schema: then_compiled.map(|compiled| compiled.node),
            else_schema: else_compiled.map(|compiled| compiled.node),
        }),
        delta,
    ))
}

impl IfThenElseValidator {
    fn branch(&self, instance: &Value, ctx: &mut ValidationContext) -> Option<&SchemaNode> {
        if self.schema.is_valid(instance, ctx) {
            self.then_schema.as_ref()
        } else {
            self.else_schema.as_ref()
        }
    }
}

impl Validate for IfThenElseValidator {
    fn is_valid(&self, instance: &Value, ctx: &mut ValidationContext) -> bool {
        self.branch(instance, ctx)
            .map_or(true, |node| node.is_valid(instance, ctx))
    }

    fn validate<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> Result<(), ValidationError<'i>> {
        match self.branch(instance, ctx) {
            Some(node) => node.validate(instance, location, ctx),
            None => Ok(()),
        }
    }

    fn iter_errors<'i>(
        &self,
        instance: &'i Value,
        location: &LazyLocation,
        ctx: &mut ValidationContext,
    ) -> ErrorIterator<'i> {
        match self.branch(instance, ctx) {
            Some(node) => node.iter_errors(instance, location, ctx),
            None => no_error(),
        }
    }

    fn record(&self, instance: &Value, ctx: &mut ValidationContext, evaluated: &mut Evaluated) {
        if self.schema.is_valid(instance, ctx) {
            self.schema.record(instance, ctx, evaluated);
            if let Some(node) = &self.then_schema {
                node.record(instance, ctx, evaluated);
            }
        } else if let Some(node) = &self.else_schema {
            node.record(instance, ctx, evaluated);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(5), true)]
    #[test_case(&json!(15), false)]
    #[test_case(&json!("abc"), true)]
    #[test_case(&json!("abcdef"), false)]
    #[test_case(&json!(null), true)]
    fn test_if_then_else(instance: &Value, expected: bool) {
        let validator = crate::validator_for(&json!({
            "if": {"type": "integer"},
            "then": {"maximum": 10},
            "else": {"maxLength": 3}
        }))
        .expect("Valid schema");
        assert_eq!(validator.is_valid(instance), expected);
    }

    #[test]
    fn test_error_location() {
        let validator =
            crate::validator_for(&json!({"if": {"type": "integer"}, "then": {"maximum": 10}}))
                .expect("Valid schema");
        let instance = json!(11);
        let output = validator.validate(&instance);
        assert_eq!(output.errors[0].keyword_location.as_str(), "/then/maximum");
    }

    #[test]
    fn test_listing_branches() {
        let validator =
            crate::validator_for(&json!({"if": {"type": "integer"}, "else": {"maxLength": 3}}))
                .expect("Valid schema");
        assert!(validator.listing().contains("const ok0 = (() => {"));
        assert!(validator.listing().contains("if (!ok0) {"));
    }
}
